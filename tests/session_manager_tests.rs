mod common;

use common::{GatedGateway, ScriptedGateway};
use smartcity_assistant::conversation::{APOLOGY, ChatState, MessageRole, Outcome, SubmitError};
use smartcity_assistant::services::session_manager::SessionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn basic_session_flow() {
    let gateway = Arc::new(ScriptedGateway::new().reply("Cuaca hari ini cerah."));
    let mgr = SessionManager::new(Duration::from_secs(60));
    let sid = mgr.create_session().await;
    assert!(!sid.is_empty());

    let turn = mgr.submit(&sid, "Info Cuaca", gateway).await.unwrap();
    assert_eq!(turn.reply, "Cuaca hari ini cerah.");
    assert_eq!(turn.outcome, Some(Outcome::Replied));
    assert_eq!(turn.messages.len(), 2);

    let history = mgr.get_history(&sid).await.unwrap();
    assert_eq!(history, turn.messages);
    assert!(mgr.remove_session(&sid).await);
}

#[tokio::test]
async fn test_session_expiration() {
    let mgr = SessionManager::new(Duration::from_millis(10));
    let sid = mgr.create_session().await;

    // Wait for expiration
    sleep(Duration::from_millis(20)).await;

    let removed_count = mgr.purge_expired().await;
    assert_eq!(removed_count, 1, "Should have removed 1 expired session");
    assert!(
        !mgr.remove_session(&sid).await,
        "Session should already be gone"
    );
}

#[tokio::test]
async fn only_one_call_in_flight_per_session() {
    let gateway = Arc::new(GatedGateway::new("Cuaca hari ini cerah."));
    let mgr = SessionManager::new(Duration::from_secs(60));
    let sid = mgr.create_session().await;

    let first = {
        let mgr = mgr.clone();
        let gateway = gateway.clone();
        let sid = sid.clone();
        tokio::spawn(async move { mgr.submit(&sid, "Info Cuaca", gateway).await })
    };
    gateway.started.notified().await;
    assert_eq!(mgr.get_state(&sid).await, Some(ChatState::Sending));

    let second = mgr.submit(&sid, "Info Cuaca lagi", gateway.clone()).await;
    assert_eq!(second.unwrap_err(), SubmitError::Busy);
    assert_eq!(gateway.calls(), 1);

    gateway.release.notify_one();
    let turn = first.await.unwrap().unwrap();
    assert_eq!(turn.outcome, Some(Outcome::Replied));
    assert_eq!(gateway.calls(), 1);

    let history = mgr.get_history(&sid).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].text, "Info Cuaca");
    assert_eq!(mgr.get_state(&sid).await, Some(ChatState::Idle));
}

#[tokio::test]
async fn pending_sessions_survive_purge() {
    let gateway = Arc::new(GatedGateway::new("ok"));
    let mgr = SessionManager::new(Duration::from_millis(5));
    let sid = mgr.create_session().await;

    let pending = {
        let mgr = mgr.clone();
        let gateway = gateway.clone();
        let sid = sid.clone();
        tokio::spawn(async move { mgr.submit(&sid, "Info Pendidikan", gateway).await })
    };
    gateway.started.notified().await;
    sleep(Duration::from_millis(15)).await;

    assert_eq!(mgr.purge_expired().await, 0);
    gateway.release.notify_one();
    let turn = pending.await.unwrap().unwrap();
    assert_eq!(turn.messages.len(), 2);
}

#[tokio::test]
async fn failed_call_records_apology() {
    let gateway = Arc::new(ScriptedGateway::new().fail());
    let mgr = SessionManager::new(Duration::from_secs(60));
    let sid = mgr.create_session().await;

    let turn = mgr.submit(&sid, "Info Keamanan", gateway).await.unwrap();
    assert_eq!(turn.outcome, Some(Outcome::Failed));
    assert_eq!(turn.reply, APOLOGY);
    assert_eq!(turn.messages[1].role, MessageRole::Assistant);
    assert_eq!(turn.messages[1].text, APOLOGY);
}

#[tokio::test]
async fn reset_clears_history() {
    let gateway = Arc::new(ScriptedGateway::new().reply("Halo!"));
    let mgr = SessionManager::new(Duration::from_secs(60));
    let sid = mgr.ensure_session("browser-tab-1").await;
    assert_eq!(sid, "browser-tab-1");

    mgr.submit(&sid, "Halo", gateway).await.unwrap();
    assert!(mgr.reset_session(&sid).await);
    assert_eq!(mgr.get_history(&sid).await, Some(vec![]));
    assert!(!mgr.reset_session("missing").await);
    assert_eq!(mgr.list_session_ids().await, vec![sid]);
}

#[tokio::test]
async fn abandoned_request_still_settles() {
    let held = Arc::new(GatedGateway::new("Cuaca hari ini cerah."));
    let mgr = SessionManager::new(Duration::from_secs(60));
    let sid = mgr.create_session().await;

    // The visitor closes the tab: the submit future is dropped mid-call.
    let abandoned = timeout(
        Duration::from_millis(20),
        mgr.submit(&sid, "Halo", held.clone()),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(held.calls(), 1);

    held.release.notify_one();
    for _ in 0..100 {
        if mgr.get_state(&sid).await == Some(ChatState::Idle) {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(mgr.get_state(&sid).await, Some(ChatState::Idle));
    assert_eq!(mgr.get_history(&sid).await.unwrap().len(), 2);

    let next = Arc::new(ScriptedGateway::new().reply("Sama-sama."));
    let turn = mgr.submit(&sid, "Halo lagi", next).await.unwrap();
    assert_eq!(turn.outcome, Some(Outcome::Replied));
    assert_eq!(turn.messages.len(), 4);
}

#[tokio::test]
async fn reply_from_before_reset_is_dropped() {
    let old_gateway = Arc::new(GatedGateway::new("jawaban untuk pertanyaan lama"));
    let mgr = SessionManager::new(Duration::from_secs(60));
    let sid = mgr.create_session().await;

    let old = {
        let mgr = mgr.clone();
        let gateway = old_gateway.clone();
        let sid = sid.clone();
        tokio::spawn(async move { mgr.submit(&sid, "pertanyaan lama", gateway).await })
    };
    old_gateway.started.notified().await;
    assert!(mgr.reset_session(&sid).await);

    let new_gateway = Arc::new(GatedGateway::new("jawaban untuk pertanyaan baru"));
    let new = {
        let mgr = mgr.clone();
        let gateway = new_gateway.clone();
        let sid = sid.clone();
        tokio::spawn(async move { mgr.submit(&sid, "pertanyaan baru", gateway).await })
    };
    new_gateway.started.notified().await;

    old_gateway.release.notify_one();
    let old_turn = old.await.unwrap().unwrap();
    assert_eq!(old_turn.outcome, None);
    assert_eq!(mgr.get_state(&sid).await, Some(ChatState::Sending));

    new_gateway.release.notify_one();
    let new_turn = new.await.unwrap().unwrap();
    assert_eq!(new_turn.outcome, Some(Outcome::Replied));
    assert_eq!(new_turn.reply, "jawaban untuk pertanyaan baru");

    let history: Vec<(MessageRole, String)> = mgr
        .get_history(&sid)
        .await
        .unwrap()
        .into_iter()
        .map(|m| (m.role, m.text))
        .collect();
    assert_eq!(
        history,
        vec![
            (MessageRole::User, "pertanyaan baru".to_string()),
            (MessageRole::Assistant, "jawaban untuk pertanyaan baru".to_string()),
        ]
    );
}
