use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use comment_spoiler_shield::error::ClassifyError;
use comment_spoiler_shield::infrastructure::{DomEvent, FailPoint, MemoryDom, Notice};
use comment_spoiler_shield::models::{ClassificationOutcome, ClassificationResult};
use comment_spoiler_shield::orchestrator::{
    Session, SessionEnd, SessionOptions, SessionPhase, SpoilerGateway,
};
use tokio::sync::mpsc;

/// 按顺序返回预设结果的分类通道
#[derive(Default)]
struct ScriptedGateway {
    replies: Mutex<VecDeque<ClassificationOutcome>>,
    requests: Mutex<Vec<(String, Vec<String>)>>,
    counts: Mutex<Vec<u32>>,
    count_tx: Option<mpsc::UnboundedSender<u32>>,
    never_reply: bool,
}

impl ScriptedGateway {
    fn replying(replies: Vec<ClassificationOutcome>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    fn counts(&self) -> Vec<u32> {
        self.counts.lock().unwrap().clone()
    }

    fn requests(&self) -> Vec<(String, Vec<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpoilerGateway for ScriptedGateway {
    async fn check_spoilers(&self, title: String, comments: Vec<String>) -> ClassificationOutcome {
        self.requests.lock().unwrap().push((title, comments));
        if self.never_reply {
            std::future::pending::<()>().await;
        }
        let reply = self.replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| ClassificationOutcome::success(ClassificationResult::empty()))
    }

    fn update_spoiler_count(&self, count: u32) {
        self.counts.lock().unwrap().push(count);
        if let Some(tx) = &self.count_tx {
            let _ = tx.send(count);
        }
    }
}

fn flagged(indices: &[usize]) -> ClassificationOutcome {
    ClassificationOutcome::success(ClassificationResult::with_indices(indices.iter().copied()))
}

fn numbered(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|n| format!("comment {n}")).collect()
}

/// 当前隐藏评论的标识，按文档顺序
fn hidden_identities(dom: &MemoryDom) -> Vec<String> {
    dom.comments()
        .into_iter()
        .filter(|comment| !comment.visible)
        .filter_map(|comment| comment.shield_id.or(comment.native_id))
        .collect()
}

fn session(
    dom: &MemoryDom,
    gateway: &Arc<ScriptedGateway>,
) -> Session<MemoryDom, ScriptedGateway> {
    Session::new(dom.clone(), Arc::clone(gateway), SessionOptions::default())
}

#[tokio::test]
async fn test_first_batch_hides_flagged_and_releases_container() {
    let dom = MemoryDom::new();
    dom.set_title("Grand Final Highlights");
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);

    session.start().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::WaitingForInitialBatch);
    assert_eq!(dom.styles_injected(), 1);
    assert!(dom.observing());

    dom.append_numbered(25);
    let request = session.on_mutation().await.expect("25 条评论应放出批次");

    assert_eq!(request.title, "Grand Final Highlights");
    assert_eq!(request.comments, numbered(0..20));
    assert_eq!(session.phase(), SessionPhase::Processing { first_batch: true });
    assert!(session.is_cycle_in_flight());
    assert!(!dom.container_visible());
    assert!(dom.loading());
    assert_eq!(dom.hidden_texts(), numbered(0..20));

    session.on_classified(flagged(&[1, 3])).await;

    assert_eq!(dom.hidden_texts(), vec!["comment 1", "comment 3"]);
    assert!(dom.container_visible());
    assert!(!dom.loading());
    assert!(!session.is_cycle_in_flight());
    assert!(!session.is_first_batch());
    assert_eq!(session.phase(), SessionPhase::Observing);
    assert_eq!(gateway.counts(), vec![2]);
    assert_eq!(
        dom.notices(),
        vec![Notice::SpoilersHidden {
            count: 2,
            duration: Duration::from_millis(10000),
        }]
    );
}

#[tokio::test]
async fn test_container_hidden_as_soon_as_first_comment_appears() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    assert!(session.on_mutation().await.is_none());
    assert!(dom.container_visible());

    dom.append_numbered(1);
    assert!(session.on_mutation().await.is_none());
    assert!(!dom.container_visible());
    assert_eq!(session.phase(), SessionPhase::WaitingForInitialBatch);
    assert!(dom.hidden_texts().is_empty());

    dom.append_numbered(19);
    let request = session.on_mutation().await.expect("满 20 条应放出批次");
    assert_eq!(request.comments.len(), 20);
}

#[tokio::test]
async fn test_mutations_in_flight_are_deferred() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    dom.append_numbered(25);
    let first = session.on_mutation().await.expect("首批");
    let scans = dom.scan_count();

    dom.append_numbered(30);
    assert!(session.on_mutation().await.is_none());
    assert!(session.on_mutation().await.is_none());
    assert_eq!(dom.scan_count(), scans);
    assert_eq!(dom.hidden_texts().len(), 20);

    session.on_classified(flagged(&[])).await;
    let second = session.on_mutation().await.expect("第二批");

    assert_eq!(second.comments, numbered(20..40));
    let first: HashSet<_> = first.comments.into_iter().collect();
    assert!(second.comments.iter().all(|text| !first.contains(text)));
    assert_eq!(
        session.phase(),
        SessionPhase::Processing { first_batch: false }
    );
}

#[tokio::test]
async fn test_count_report_is_cumulative() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    dom.append_numbered(20);
    session.on_mutation().await.expect("首批");
    session.on_classified(flagged(&[0, 5, 40])).await;

    dom.append_numbered(20);
    session.on_mutation().await.expect("第二批");
    session.on_classified(flagged(&[19])).await;

    assert_eq!(gateway.counts(), vec![2, 3]);
    assert_eq!(session.total_flagged(), 3);
    assert_eq!(
        dom.hidden_texts(),
        vec!["comment 0", "comment 5", "comment 39"]
    );
}

#[tokio::test]
async fn test_removed_comment_is_ignored_on_reveal() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    dom.append_numbered(20);
    session.on_mutation().await.expect("首批");
    dom.remove_comment(4);
    session.on_classified(flagged(&[])).await;

    assert!(dom.hidden_texts().is_empty());
    assert_eq!(dom.comment_count(), 19);
    assert_eq!(session.tracker().processed_count(), 20);
}

#[tokio::test]
async fn test_batches_across_cycles_never_share_items() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    let mut seen_ids = HashSet::new();
    let mut seen_texts = HashSet::new();
    dom.append_numbered(23);
    for round in 0..5 {
        let request = session.on_mutation().await.expect("应放出批次");
        let batch_ids = hidden_identities(&dom);
        assert_eq!(batch_ids.len(), 20);
        for id in batch_ids {
            assert!(seen_ids.insert(id.clone()), "{id} 出现在两个批次中");
        }
        for text in request.comments {
            assert!(seen_texts.insert(text.clone()), "{text} 被重复提交");
        }

        // 周期进行中页面继续加载，并在顶部插入新评论
        dom.append_numbered(13);
        dom.insert_native(0, &format!("pinned-{round}"), &format!("pinned {round}"));
        assert!(session.on_mutation().await.is_none());
        dom.append_numbered(6);
        assert!(session.on_mutation().await.is_none());

        session.on_classified(flagged(&[])).await;
        assert!(dom.hidden_texts().is_empty());
    }

    assert_eq!(seen_ids.len(), 100);
    assert_eq!(session.tracker().processed_count(), 100);
    assert!(seen_texts.contains("pinned 0"));
}

#[tokio::test]
async fn test_failed_reveal_is_retried_on_next_mutation() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    dom.append_numbered(20);
    session.on_mutation().await.expect("首批");
    dom.fail_on(FailPoint::RevealItems);
    session.on_classified(flagged(&[3])).await;

    assert_eq!(dom.hidden_texts(), numbered(0..20));
    assert_eq!(session.pending_reveal_count(), 20);
    assert_eq!(session.phase(), SessionPhase::Observing);
    assert!(dom.container_visible());
    assert!(gateway.counts().is_empty());
    assert!(matches!(
        dom.notices().as_slice(),
        [Notice::Error { message, .. }] if message.starts_with("Unexpected error")
    ));

    // 仍然失败：继续保留
    assert!(session.on_mutation().await.is_none());
    assert_eq!(session.pending_reveal_count(), 20);

    dom.clear_failures();
    assert!(session.on_mutation().await.is_none());
    assert!(dom.hidden_texts().is_empty());
    assert_eq!(session.pending_reveal_count(), 0);
}

#[tokio::test]
async fn test_title_falls_back_to_document_title() {
    let dom = MemoryDom::new();
    dom.set_document_title("Match Replay - YouTube");
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    dom.append_numbered(20);
    let request = session.on_mutation().await.expect("首批");
    assert_eq!(request.title, "Match Replay - YouTube");
}

#[tokio::test]
async fn test_gateway_failure_reveals_whole_batch() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    dom.append_numbered(20);
    session.on_mutation().await.expect("首批");
    session
        .on_classified(ClassificationOutcome::failed(ClassifyError::TransportFailure(
            "communication error".to_string(),
        )))
        .await;

    assert!(dom.hidden_texts().is_empty());
    assert!(dom.container_visible());
    assert!(!session.is_cycle_in_flight());
    assert_eq!(gateway.counts(), vec![0]);
    assert_eq!(
        dom.notices(),
        vec![Notice::Error {
            message: "Failed to check spoilers (communication error).".to_string(),
            duration: Duration::from_millis(5000),
        }]
    );
}

#[tokio::test]
async fn test_unreadable_settings_get_their_own_notice() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    dom.append_numbered(20);
    session.on_mutation().await.expect("首批");
    session
        .on_classified(ClassificationOutcome::failed(
            ClassifyError::SettingsUnavailable("设置错误".to_string()),
        ))
        .await;

    assert!(dom.hidden_texts().is_empty());
    assert_eq!(
        dom.notices(),
        vec![Notice::Error {
            message: "Failed to read settings; comments were not checked.".to_string(),
            duration: Duration::from_millis(5000),
        }]
    );
}

#[tokio::test]
async fn test_hide_failure_recovers_and_keeps_observing() {
    let dom = MemoryDom::new();
    dom.fail_on(FailPoint::HideItems);
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    dom.append_numbered(20);
    assert!(session.on_mutation().await.is_none());

    assert!(!session.is_cycle_in_flight());
    assert!(!session.is_first_batch());
    assert_eq!(session.phase(), SessionPhase::Observing);
    assert!(dom.container_visible());
    assert!(!dom.loading());
    assert!(dom.hidden_texts().is_empty());
    assert!(matches!(
        dom.notices().as_slice(),
        [Notice::Error { message, .. }] if message.starts_with("Unexpected error")
    ));

    // 出错的批次不会再次放出
    dom.clear_failures();
    dom.append_numbered(20);
    let next = session.on_mutation().await.expect("第二批");
    assert_eq!(next.comments, numbered(20..40));
}

#[tokio::test]
async fn test_title_failure_reveals_hidden_batch() {
    let dom = MemoryDom::new();
    dom.fail_on(FailPoint::Title);
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    dom.append_numbered(20);
    assert!(session.on_mutation().await.is_none());

    assert!(dom.hidden_texts().is_empty());
    assert!(dom.container_visible());
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn test_scan_failure_waits_for_next_mutation() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    dom.append_numbered(20);
    dom.fail_on(FailPoint::Scan);
    assert!(session.on_mutation().await.is_none());
    assert_eq!(session.phase(), SessionPhase::WaitingForInitialBatch);

    dom.clear_failures();
    assert!(session.on_mutation().await.is_some());
}

#[tokio::test]
async fn test_result_without_cycle_is_ignored() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway::default());
    let mut session = session(&dom, &gateway);
    session.start().await.unwrap();

    session.on_classified(flagged(&[0])).await;

    assert_eq!(session.phase(), SessionPhase::WaitingForInitialBatch);
    assert!(gateway.counts().is_empty());
    assert!(dom.notices().is_empty());
}

#[tokio::test]
async fn test_run_completes_cycle_then_closes() {
    let dom = MemoryDom::new();
    let (count_tx, mut count_rx) = mpsc::unbounded_channel();
    let gateway = Arc::new(ScriptedGateway {
        count_tx: Some(count_tx),
        ..ScriptedGateway::replying(vec![flagged(&[2])])
    });
    let session = session(&dom, &gateway);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move { session.run(&mut rx).await });

    dom.append_numbered(20);
    tx.send(DomEvent::Mutated).unwrap();
    assert_eq!(count_rx.recv().await, Some(1));

    tx.send(DomEvent::Closed).unwrap();
    let end = task.await.unwrap().unwrap();

    assert_eq!(end, SessionEnd::Closed);
    assert_eq!(dom.hidden_texts(), vec!["comment 2"]);
    assert!(!dom.observing());
    assert_eq!(gateway.requests().len(), 1);
}

#[tokio::test]
async fn test_navigation_discards_pending_reply() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway {
        never_reply: true,
        ..ScriptedGateway::default()
    });
    let session = session(&dom, &gateway);
    let (tx, mut rx) = mpsc::unbounded_channel();

    dom.append_numbered(20);
    tx.send(DomEvent::Mutated).unwrap();
    tx.send(DomEvent::Navigated {
        url: "https://www.youtube.com/watch?v=next".to_string(),
    })
    .unwrap();

    let end = tokio::time::timeout(Duration::from_secs(5), session.run(&mut rx))
        .await
        .expect("导航后会话应立即结束")
        .unwrap();

    assert_eq!(
        end,
        SessionEnd::Navigated {
            url: "https://www.youtube.com/watch?v=next".to_string()
        }
    );
    assert!(!dom.observing());
    assert!(gateway.counts().is_empty());
}

#[tokio::test]
async fn test_closed_channel_ends_session() {
    let dom = MemoryDom::new();
    let gateway = Arc::new(ScriptedGateway::default());
    let session = session(&dom, &gateway);
    let (tx, mut rx) = mpsc::unbounded_channel::<DomEvent>();
    drop(tx);

    let end = session.run(&mut rx).await.unwrap();
    assert_eq!(end, SessionEnd::Closed);
}
