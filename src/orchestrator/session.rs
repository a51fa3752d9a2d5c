//! 会话编排器 - 编排层
//!
//! ## 职责
//!
//! 驱动一个页面从就绪到关闭的完整生命周期：
//!
//! ```text
//! Idle → WaitingForInitialBatch → Processing(首批) → Observing ⇄ Processing → Closed
//! ```
//!
//! ## 设计特点
//!
//! - **单任务**：页面事件和分类回复在同一个任务里用 `select!` 交替处理，没有锁
//! - **同一时刻最多一个周期**：`is_cycle_in_flight` 期间的页面变化被推迟，不排队
//! - **失败兜底**：周期内任何错误都会显示提示、恢复评论区、显示整批评论并清除标志
//! - **显示重试**：兜底显示本身失败的批次会在下一次页面变化时重试，直到成功

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ClassifyError};
use crate::infrastructure::{CommentDom, DomEvent, Notice};
use crate::models::{Batch, BatchEntry, ClassificationOutcome, Item};
use crate::services::{BatchCollector, ItemTracker, ScanOutcome, VisibilityController};
use crate::utils::logging::{log_cycle_complete, log_cycle_start};

/// 会话与分类服务之间的通道
///
/// 后台句柄通过消息实现它，测试里可以直接替换。
#[async_trait]
pub trait SpoilerGateway: Send + Sync {
    /// 请求分类；失败时返回空结果并附带原因
    async fn check_spoilers(&self, title: String, comments: Vec<String>) -> ClassificationOutcome;

    /// 上报当前页面累计隐藏的剧透数（绝对值，无需响应）
    fn update_spoiler_count(&self, count: u32);
}

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    WaitingForInitialBatch,
    Processing { first_batch: bool },
    Observing,
    Closed,
}

/// 会话结束原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Navigated { url: String },
    Closed,
}

/// 待发送的分类请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyRequest {
    pub title: String,
    pub comments: Vec<String>,
}

/// 会话参数
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub batch_threshold: usize,
    pub error_notice: Duration,
    pub spoiler_notice: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_threshold: config.batch_threshold,
            error_notice: config.error_notice,
            spoiler_notice: config.spoiler_notice,
        }
    }
}

/// 正在等待分类结果的周期
#[derive(Debug)]
struct InFlightCycle {
    number: usize,
    first_batch: bool,
    batch: Batch,
}

/// 会话编排器
pub struct Session<D, G> {
    dom: D,
    gateway: Arc<G>,
    options: SessionOptions,
    tracker: ItemTracker,
    collector: BatchCollector,
    visibility: VisibilityController,
    phase: SessionPhase,
    is_first_batch: bool,
    is_cycle_in_flight: bool,
    container_hidden: bool,
    current: Option<InFlightCycle>,
    /// 兜底显示失败、仍被隐藏的批次
    pending_reveal: Vec<Batch>,
    cycles: usize,
    total_flagged: u32,
}

impl<D, G> Session<D, G>
where
    D: CommentDom,
    G: SpoilerGateway + 'static,
{
    pub fn new(dom: D, gateway: Arc<G>, options: SessionOptions) -> Self {
        Self {
            dom,
            gateway,
            collector: BatchCollector::new(options.batch_threshold),
            options,
            tracker: ItemTracker::new(),
            visibility: VisibilityController::new(),
            phase: SessionPhase::Idle,
            is_first_batch: true,
            is_cycle_in_flight: false,
            container_hidden: false,
            current: None,
            pending_reveal: Vec::new(),
            cycles: 0,
            total_flagged: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_first_batch(&self) -> bool {
        self.is_first_batch
    }

    pub fn is_cycle_in_flight(&self) -> bool {
        self.is_cycle_in_flight
    }

    pub fn total_flagged(&self) -> u32 {
        self.total_flagged
    }

    pub fn tracker(&self) -> &ItemTracker {
        &self.tracker
    }

    /// 等待重试显示的评论数
    pub fn pending_reveal_count(&self) -> usize {
        self.pending_reveal.iter().map(Batch::len).sum()
    }

    /// 注入样式、开始观察页面，进入等待首批状态
    pub async fn start(&mut self) -> AppResult<()> {
        if self.phase != SessionPhase::Idle {
            return Ok(());
        }

        if let Err(e) = self.dom.inject_styles().await {
            warn!("⚠️ 样式注入失败，提示框将没有样式: {}", e);
        }
        self.dom.observe().await?;
        self.phase = SessionPhase::WaitingForInitialBatch;
        info!("👀 等待评论加载...");
        Ok(())
    }

    /// 处理一次页面结构变化
    ///
    /// 放出批次时完成隐藏并返回需要发送的分类请求；
    /// 周期进行中、数量不足或出错时返回 None。
    pub async fn on_mutation(&mut self) -> Option<ClassifyRequest> {
        match self.phase {
            SessionPhase::Idle | SessionPhase::Closed => return None,
            SessionPhase::WaitingForInitialBatch
            | SessionPhase::Observing
            | SessionPhase::Processing { .. } => {}
        }

        self.retry_pending_reveals().await;

        let outcome = match self
            .collector
            .scan(&self.dom, &mut self.tracker, self.is_cycle_in_flight)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("⚠️ 扫描评论失败，等待下一次变化: {}", e);
                return None;
            }
        };

        match outcome {
            ScanOutcome::Deferred => {
                debug!("周期进行中，推迟处理新评论");
                None
            }
            ScanOutcome::Pending {
                present,
                unprocessed,
            } => {
                if self.phase == SessionPhase::WaitingForInitialBatch && present > 0 {
                    self.hide_container_early().await;
                }
                debug!("未处理评论 {} 条，继续等待", unprocessed);
                None
            }
            ScanOutcome::Ready(items) => self.begin_cycle(items).await,
        }
    }

    /// 首条评论出现时整体隐藏，避免未分类内容闪现
    async fn hide_container_early(&mut self) {
        if self.container_hidden {
            return;
        }
        info!("首条评论出现，整体隐藏评论区");
        match self.visibility.toggle_container_visibility(&self.dom, false).await {
            Ok(()) => self.container_hidden = true,
            Err(e) => warn!("⚠️ 隐藏评论区失败: {}", e),
        }
    }

    async fn begin_cycle(&mut self, items: Vec<Item>) -> Option<ClassifyRequest> {
        let first_batch = self.is_first_batch;
        self.is_cycle_in_flight = true;
        self.phase = SessionPhase::Processing { first_batch };
        self.cycles += 1;
        let number = self.cycles;
        log_cycle_start(number, items.len(), first_batch);

        // 收集器放出的评论都已经有标识；隐藏失败时用它兜底显示
        let fallback = Batch::new(
            items
                .iter()
                .filter_map(|item| {
                    item.identity.clone().map(|identity| BatchEntry {
                        identity,
                        text: item.text.clone(),
                    })
                })
                .collect(),
        );

        match self.prepare_cycle(items, first_batch).await {
            Ok((batch, title)) => {
                let request = ClassifyRequest {
                    title,
                    comments: batch.texts(),
                };
                self.current = Some(InFlightCycle {
                    number,
                    first_batch,
                    batch,
                });
                Some(request)
            }
            Err(e) => {
                self.abort_cycle(fallback, first_batch, e).await;
                None
            }
        }
    }

    async fn prepare_cycle(
        &mut self,
        items: Vec<Item>,
        first_batch: bool,
    ) -> AppResult<(Batch, String)> {
        if first_batch {
            self.visibility
                .toggle_container_visibility(&self.dom, false)
                .await?;
            self.container_hidden = true;
            self.dom.show_loading().await?;
        }

        let batch = self
            .visibility
            .hide(&self.dom, &mut self.tracker, items)
            .await?;
        let title = self.dom.video_title().await?;
        debug!("视频标题: {}", title);
        Ok((batch, title))
    }

    /// 处理分类结果，完成当前周期
    pub async fn on_classified(&mut self, outcome: ClassificationOutcome) {
        if self.phase == SessionPhase::Closed {
            debug!("会话已关闭，忽略分类结果");
            return;
        }
        let Some(cycle) = self.current.take() else {
            warn!("⚠️ 收到分类结果但没有进行中的周期，忽略");
            return;
        };

        if let Some(failure) = &outcome.failure {
            self.notify_error(failure_notice(failure)).await;
        }

        match self
            .visibility
            .reveal_non_flagged(&self.dom, &cycle.batch, &outcome.result.spoiler_indices)
            .await
        {
            Ok(summary) => {
                let flagged = u32::try_from(summary.kept_hidden).unwrap_or(u32::MAX);
                self.total_flagged = self.total_flagged.saturating_add(flagged);
                self.gateway.update_spoiler_count(self.total_flagged);

                if summary.kept_hidden > 0 {
                    let notice = Notice::SpoilersHidden {
                        count: summary.kept_hidden,
                        duration: self.options.spoiler_notice,
                    };
                    if let Err(e) = self.dom.show_notice(notice).await {
                        warn!("⚠️ 显示剧透提示失败: {}", e);
                    }
                }
                if cycle.first_batch {
                    self.release_container().await;
                }
                log_cycle_complete(
                    cycle.number,
                    summary.kept_hidden,
                    summary.revealed,
                    self.total_flagged as usize,
                );
                self.finish_cycle();
            }
            Err(e) => {
                self.abort_cycle(cycle.batch, cycle.first_batch, e).await;
            }
        }
    }

    /// 周期内出现意外错误：提示、恢复评论区、显示整批评论
    async fn abort_cycle(&mut self, batch: Batch, first_batch: bool, e: AppError) {
        error!("❌ 处理周期出错，本批评论全部显示: {}", e);
        self.notify_error(format!("Unexpected error: {e}")).await;

        if first_batch {
            self.release_container().await;
        }
        if let Err(e) = self.visibility.reveal_all(&self.dom, &batch).await {
            warn!("⚠️ 恢复评论可见性失败，下次页面变化时重试 {} 条: {}", batch.len(), e);
            self.pending_reveal.push(batch);
        }
        self.finish_cycle();
    }

    /// 重试之前显示失败的批次
    async fn retry_pending_reveals(&mut self) {
        if self.pending_reveal.is_empty() {
            return;
        }
        let mut still_hidden = Vec::new();
        for batch in std::mem::take(&mut self.pending_reveal) {
            match self.visibility.reveal_all(&self.dom, &batch).await {
                Ok(summary) => {
                    info!("🔁 重新显示 {} 条评论", summary.revealed);
                }
                Err(e) => {
                    debug!("重试显示仍然失败: {}", e);
                    still_hidden.push(batch);
                }
            }
        }
        self.pending_reveal = still_hidden;
    }

    /// 首批结束后移除加载提示并整体显示评论区（无论结果如何，只做一次）
    async fn release_container(&mut self) {
        if let Err(e) = self.dom.hide_loading().await {
            warn!("⚠️ 移除加载提示失败: {}", e);
        }
        if let Err(e) = self
            .visibility
            .toggle_container_visibility(&self.dom, true)
            .await
        {
            warn!("⚠️ 显示评论区失败: {}", e);
        }
        self.container_hidden = false;
        self.is_first_batch = false;
    }

    fn finish_cycle(&mut self) {
        self.is_cycle_in_flight = false;
        self.phase = SessionPhase::Observing;
    }

    async fn notify_error(&self, message: String) {
        let notice = Notice::Error {
            message,
            duration: self.options.error_notice,
        };
        if let Err(e) = self.dom.show_notice(notice).await {
            warn!("⚠️ 显示错误提示失败: {}", e);
        }
    }

    /// 停止观察，进入终止状态
    pub async fn teardown(&mut self, end: SessionEnd) -> SessionEnd {
        if self.phase == SessionPhase::Closed {
            return end;
        }
        if let Err(e) = self.dom.disconnect().await {
            debug!("断开观察失败（页面可能已关闭）: {}", e);
        }
        if self.current.take().is_some() {
            debug!("丢弃进行中的分类结果");
        }
        self.phase = SessionPhase::Closed;
        info!("🔚 会话结束: {:?}", end);
        end
    }

    fn dispatch(&self, request: ClassifyRequest) -> BoxFuture<'static, ClassificationOutcome> {
        let gateway = Arc::clone(&self.gateway);
        Box::pin(async move {
            gateway
                .check_spoilers(request.title, request.comments)
                .await
        })
    }

    /// 运行会话直到页面关闭或导航离开
    ///
    /// 事件通道由调用方持有，导航后可以交给下一个会话继续使用。
    pub async fn run(mut self, events: &mut mpsc::UnboundedReceiver<DomEvent>) -> AppResult<SessionEnd> {
        self.start().await?;

        let mut pending: Option<BoxFuture<'static, ClassificationOutcome>> = None;
        loop {
            tokio::select! {
                outcome = async {
                    match pending.as_mut() {
                        Some(reply) => reply.await,
                        None => std::future::pending().await,
                    }
                }, if pending.is_some() => {
                    pending = None;
                    self.on_classified(outcome).await;
                }
                event = events.recv() => match event {
                    Some(DomEvent::Mutated) => {
                        if let Some(request) = self.on_mutation().await {
                            pending = Some(self.dispatch(request));
                        }
                    }
                    Some(DomEvent::Navigated { url }) => {
                        return Ok(self.teardown(SessionEnd::Navigated { url }).await);
                    }
                    Some(DomEvent::Closed) | None => {
                        return Ok(self.teardown(SessionEnd::Closed).await);
                    }
                },
            }
        }
    }
}

fn failure_notice(failure: &ClassifyError) -> String {
    match failure {
        ClassifyError::MissingCredential => {
            "No API key configured; comments were not checked.".to_string()
        }
        ClassifyError::SettingsUnavailable(_) => {
            "Failed to read settings; comments were not checked.".to_string()
        }
        ClassifyError::TransportFailure(_) => {
            "Failed to check spoilers (communication error).".to_string()
        }
        ClassifyError::MalformedReply(_) | ClassifyError::MissingIndices => {
            "Failed to retrieve spoiler data.".to_string()
        }
    }
}
