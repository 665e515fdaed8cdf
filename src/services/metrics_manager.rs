use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::conversation::Outcome;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsData {
    pub replies: u64,
    pub failures: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone)]
pub struct MetricsManager {
    inner: Arc<RwLock<MetricsData>>,
}

impl Default for MetricsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsData::default())),
        }
    }

    pub async fn record_outcome(&self, outcome: Outcome) {
        let mut data = self.inner.write().await;
        match outcome {
            Outcome::Replied => data.replies += 1,
            Outcome::Failed => data.failures += 1,
        }
    }

    pub async fn record_rejected(&self) {
        self.inner.write().await.rejected += 1;
    }

    pub async fn get_metrics(&self) -> MetricsData {
        self.inner.read().await.clone()
    }
}
