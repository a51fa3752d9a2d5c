//! 后台上下文
//!
//! 持有分类客户端和徽标计数，通过消息与各页面会话通信。
//! 分类请求各自在独立任务中完成，互不阻塞；徽标更新按到达顺序处理。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::ClassifyError;
use crate::models::{
    CheckSpoilersPayload, CheckSpoilersResponse, ClassificationOutcome, ClassificationResult,
    ContentMessage, PageInstanceId, UpdateSpoilerCountPayload,
};
use crate::orchestrator::session::SpoilerGateway;
use crate::services::{BadgeBoard, BadgeUpdate, ClassificationClient, CompletionTransport};

/// 后台收到的事件
#[derive(Debug)]
pub enum BackgroundEvent {
    /// 页面发来的消息；`checkSpoilers` 需要附带回复通道
    Message {
        page: PageInstanceId,
        message: ContentMessage,
        reply: Option<oneshot::Sender<CheckSpoilersResponse>>,
    },
    PageClosed(PageInstanceId),
    PageNavigated { page: PageInstanceId, url: String },
}

/// 后台工作者
pub struct BackgroundWorker<T> {
    client: Arc<ClassificationClient<T>>,
    badges: BadgeBoard,
}

impl<T> BackgroundWorker<T>
where
    T: CompletionTransport + 'static,
{
    pub fn new(client: ClassificationClient<T>) -> Self {
        Self {
            client: Arc::new(client),
            badges: BadgeBoard::new(),
        }
    }

    pub fn badges(&self) -> &BadgeBoard {
        &self.badges
    }

    /// 处理一个事件，返回徽标变化（如果有）
    pub fn handle_event(&mut self, event: BackgroundEvent) -> Option<BadgeUpdate> {
        match event {
            BackgroundEvent::Message {
                page,
                message: ContentMessage::CheckSpoilers(payload),
                reply,
            } => {
                self.spawn_classification(page, payload, reply);
                None
            }
            BackgroundEvent::Message {
                page,
                message: ContentMessage::UpdateSpoilerCount(UpdateSpoilerCountPayload { count }),
                ..
            } => Some(self.badges.set_count(page, count)),
            BackgroundEvent::PageClosed(page) => {
                debug!("页面 {} 已关闭，清除计数", page);
                self.badges.page_closed(&page);
                None
            }
            BackgroundEvent::PageNavigated { page, url } => self.badges.page_navigated(page, &url),
        }
    }

    fn spawn_classification(
        &self,
        page: PageInstanceId,
        payload: CheckSpoilersPayload,
        reply: Option<oneshot::Sender<CheckSpoilersResponse>>,
    ) {
        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            debug!("页面 {} 请求分类 {} 条评论", page, payload.comments.len());
            let outcome = client.classify(&payload.title, &payload.comments).await;
            let response = CheckSpoilersResponse {
                spoiler_indices: outcome.result.spoiler_indices.into_iter().collect(),
                error: outcome.failure,
            };
            match reply {
                Some(reply) => {
                    if reply.send(response).is_err() {
                        debug!("页面 {} 已不再等待分类结果", page);
                    }
                }
                None => warn!("⚠️ checkSpoilers 消息没有回复通道，结果被丢弃"),
            }
        });
    }

    /// 处理事件直到所有发送端关闭
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<BackgroundEvent>) {
        info!("🧰 后台已启动");
        while let Some(event) = events.recv().await {
            if let Some(update) = self.handle_event(event) {
                if update.text.is_empty() {
                    info!("🏷️ 页面 {} 徽标清空", update.page);
                } else {
                    info!("🏷️ 页面 {} 徽标: {}", update.page, update.text);
                }
            }
        }
        info!("后台已停止");
    }
}

/// 页面会话持有的后台句柄
#[derive(Debug, Clone)]
pub struct BackgroundHandle {
    page: PageInstanceId,
    tx: mpsc::UnboundedSender<BackgroundEvent>,
}

impl BackgroundHandle {
    pub fn new(page: PageInstanceId, tx: mpsc::UnboundedSender<BackgroundEvent>) -> Self {
        Self { page, tx }
    }

    /// 通知后台页面已导航
    pub fn page_navigated(&self, url: &str) {
        let event = BackgroundEvent::PageNavigated {
            page: self.page.clone(),
            url: url.to_string(),
        };
        if self.tx.send(event).is_err() {
            debug!("后台已停止，忽略导航通知");
        }
    }

    /// 通知后台页面已关闭
    pub fn page_closed(&self) {
        if self.tx.send(BackgroundEvent::PageClosed(self.page.clone())).is_err() {
            debug!("后台已停止，忽略关闭通知");
        }
    }
}

fn communication_error() -> ClassificationOutcome {
    ClassificationOutcome::failed(ClassifyError::TransportFailure(
        "communication error".to_string(),
    ))
}

#[async_trait]
impl SpoilerGateway for BackgroundHandle {
    async fn check_spoilers(&self, title: String, comments: Vec<String>) -> ClassificationOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        let event = BackgroundEvent::Message {
            page: self.page.clone(),
            message: ContentMessage::CheckSpoilers(CheckSpoilersPayload { title, comments }),
            reply: Some(reply_tx),
        };

        if self.tx.send(event).is_err() {
            warn!("⚠️ 无法发送分类请求：后台已停止");
            return communication_error();
        }

        match reply_rx.await {
            Ok(CheckSpoilersResponse {
                error: Some(failure),
                ..
            }) => ClassificationOutcome::failed(failure),
            Ok(response) => ClassificationOutcome::success(ClassificationResult::with_indices(
                response.spoiler_indices,
            )),
            Err(_) => {
                warn!("⚠️ 后台未返回分类结果");
                communication_error()
            }
        }
    }

    fn update_spoiler_count(&self, count: u32) {
        let event = BackgroundEvent::Message {
            page: self.page.clone(),
            message: ContentMessage::UpdateSpoilerCount(UpdateSpoilerCountPayload { count }),
            reply: None,
        };
        if self.tx.send(event).is_err() {
            debug!("后台已停止，忽略计数更新");
        }
    }
}
