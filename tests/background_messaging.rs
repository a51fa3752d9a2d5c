use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use comment_spoiler_shield::error::ClassifyError;
use comment_spoiler_shield::infrastructure::{DomEvent, FailPoint, MemoryDom, Notice};
use comment_spoiler_shield::models::PageInstanceId;
use comment_spoiler_shield::orchestrator::{
    run_sessions, BackgroundEvent, BackgroundHandle, BackgroundWorker, Session, SessionOptions,
    SpoilerGateway,
};
use comment_spoiler_shield::services::{
    BadgeUpdate, ClassificationClient, CompletionRequest, CompletionTransport,
};
use comment_spoiler_shield::settings::{Settings, SettingsStore};
use tokio::sync::mpsc;

struct FixedTransport(Result<String, ClassifyError>);

#[async_trait]
impl CompletionTransport for FixedTransport {
    async fn complete(
        &self,
        _api_key: &str,
        _request: &CompletionRequest,
    ) -> Result<String, ClassifyError> {
        self.0.clone()
    }
}

/// 启动后台，把徽标变化转发出来
fn spawn_background(
    reply: Result<String, ClassifyError>,
    api_key: Option<&str>,
) -> (
    mpsc::UnboundedSender<BackgroundEvent>,
    mpsc::UnboundedReceiver<BadgeUpdate>,
) {
    let settings = SettingsStore::in_memory(Settings {
        api_key: api_key.map(str::to_string),
        debug_mode: true,
    });
    let mut worker = BackgroundWorker::new(ClassificationClient::new(
        FixedTransport(reply),
        Arc::new(settings),
        "google/gemini-2.0-flash-001",
    ));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (badge_tx, badge_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let Some(update) = worker.handle_event(event) {
                let _ = badge_tx.send(update);
            }
        }
    });
    (event_tx, badge_rx)
}

#[tokio::test]
async fn test_session_reports_badge_through_background() {
    let (event_tx, mut badges) = spawn_background(
        Ok("```json\n{\"spoilerIndices\":[0,4],\"reasoning\":\"score\"}\n```".to_string()),
        Some("sk-test"),
    );
    let page = PageInstanceId::new("tab-1");
    let handle = Arc::new(BackgroundHandle::new(page.clone(), event_tx));

    let dom = MemoryDom::new();
    let mut session = Session::new(dom.clone(), Arc::clone(&handle), SessionOptions::default());
    session.start().await.unwrap();

    dom.append_numbered(20);
    let request = session.on_mutation().await.expect("首批");
    let outcome = handle.check_spoilers(request.title, request.comments).await;
    session.on_classified(outcome).await;

    assert_eq!(dom.hidden_texts(), vec!["comment 0", "comment 4"]);
    let update = badges.recv().await.unwrap();
    assert_eq!(
        update,
        BadgeUpdate {
            page,
            text: "2".to_string()
        }
    );
}

#[tokio::test]
async fn test_missing_key_reveals_everything_with_notice() {
    let (event_tx, mut badges) =
        spawn_background(Ok("{\"spoilerIndices\":[0]}".to_string()), None);
    let handle = Arc::new(BackgroundHandle::new(PageInstanceId::new("tab-2"), event_tx));

    let dom = MemoryDom::new();
    let mut session = Session::new(dom.clone(), Arc::clone(&handle), SessionOptions::default());
    session.start().await.unwrap();

    dom.append_numbered(20);
    let request = session.on_mutation().await.expect("首批");
    let outcome = handle.check_spoilers(request.title, request.comments).await;
    session.on_classified(outcome).await;

    assert!(dom.hidden_texts().is_empty());
    assert!(dom.container_visible());
    assert_eq!(
        dom.notices(),
        vec![Notice::Error {
            message: "No API key configured; comments were not checked.".to_string(),
            duration: Duration::from_millis(5000),
        }]
    );
    assert_eq!(badges.recv().await.unwrap().text, "");
}

#[tokio::test]
async fn test_navigation_and_close_reset_badge() {
    let (event_tx, mut badges) = spawn_background(Ok("{}".to_string()), Some("sk"));
    let handle = BackgroundHandle::new(PageInstanceId::new("tab-3"), event_tx);

    handle.update_spoiler_count(6);
    assert_eq!(badges.recv().await.unwrap().text, "6");

    handle.page_navigated("https://www.youtube.com/results?search_query=final");
    handle.page_navigated("https://www.youtube.com/watch?v=other");
    assert_eq!(badges.recv().await.unwrap().text, "");

    handle.update_spoiler_count(1);
    assert_eq!(badges.recv().await.unwrap().text, "1");
    handle.page_closed();
}

#[tokio::test]
async fn test_failed_session_start_does_not_end_the_page_loop() {
    let (background_tx, mut background_rx) = mpsc::unbounded_channel();
    let handle = Arc::new(BackgroundHandle::new(PageInstanceId::new("tab-4"), background_tx));
    let dom = MemoryDom::new();
    dom.fail_on(FailPoint::Observe);

    let (dom_tx, mut dom_events) = mpsc::unbounded_channel();
    dom_tx.send(DomEvent::Mutated).unwrap();
    dom_tx
        .send(DomEvent::Navigated {
            url: "https://www.youtube.com/watch?v=next".to_string(),
        })
        .unwrap();
    dom_tx.send(DomEvent::Closed).unwrap();

    run_sessions(
        dom.clone(),
        Arc::clone(&handle),
        SessionOptions::default(),
        &mut dom_events,
        "https://www.youtube.com/watch?v=first".to_string(),
    )
    .await;
    drop(handle);

    // 两次启动都失败，结构变化被丢弃，导航和关闭照常上报
    assert_eq!(dom.scan_count(), 0);
    let mut seen = Vec::new();
    while let Some(event) = background_rx.recv().await {
        seen.push(event);
    }
    assert_eq!(seen.len(), 2);
    assert!(matches!(
        &seen[0],
        BackgroundEvent::PageNavigated { url, .. } if url.ends_with("v=next")
    ));
    assert!(matches!(&seen[1], BackgroundEvent::PageClosed(_)));
}

#[tokio::test]
async fn test_next_navigation_starts_a_working_session_after_failed_start() {
    let (background_tx, _background_rx) = mpsc::unbounded_channel();
    let handle = Arc::new(BackgroundHandle::new(PageInstanceId::new("tab-5"), background_tx));
    let dom = MemoryDom::new();
    dom.fail_on(FailPoint::Observe);

    let (dom_tx, mut dom_events) = mpsc::unbounded_channel();
    let task = tokio::spawn({
        let dom = dom.clone();
        async move {
            run_sessions(
                dom,
                handle,
                SessionOptions::default(),
                &mut dom_events,
                "https://www.youtube.com/watch?v=first".to_string(),
            )
            .await;
        }
    });
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
    assert!(!dom.observing());

    dom.clear_failures();
    dom_tx
        .send(DomEvent::Navigated {
            url: "https://www.youtube.com/watch?v=next".to_string(),
        })
        .unwrap();
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
    assert!(dom.observing());

    dom_tx.send(DomEvent::Closed).unwrap();
    task.await.unwrap();
    assert!(!dom.observing());
}
