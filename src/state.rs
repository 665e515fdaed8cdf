// src/state.rs
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::gateway::ChatGateway;
use crate::services::metrics_manager::MetricsManager;
use crate::services::session_manager::SessionManager;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub sessions: SessionManager,
    pub metrics: MetricsManager,
    pub gateway: Arc<dyn ChatGateway>,
    pub admin_key: String,
    pub public_dir: PathBuf,
}

impl AppState {
    pub fn new(gateway: Arc<dyn ChatGateway>, session_ttl: Duration) -> Self {
        Self {
            sessions: SessionManager::new(session_ttl),
            metrics: MetricsManager::new(),
            gateway,
            admin_key: "secret123".to_string(),
            public_dir: PathBuf::from("public"),
        }
    }

    pub fn from_config(gateway: Arc<dyn ChatGateway>, config: &AppConfig) -> Self {
        Self {
            admin_key: config.admin_key.clone(),
            public_dir: config.public_dir.clone(),
            ..Self::new(gateway, config.session_ttl)
        }
    }
}
