//! 批次收集
//!
//! 每次页面结构变化都重新扫描评论区，过滤掉已处理的评论；
//! 未处理数量达到阈值时按文档顺序取前 `threshold` 条作为一个批次放出。
//! 处理周期进行中时直接推迟，不读页面。

use tracing::{debug, trace};

use crate::error::AppResult;
use crate::infrastructure::CommentDom;
use crate::models::Item;
use crate::services::ItemTracker;

/// 默认批次阈值
pub const DEFAULT_BATCH_THRESHOLD: usize = 20;

/// 一次扫描的结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// 有处理周期在进行，本次不评估
    Deferred,
    /// 未达到阈值
    Pending {
        /// 容器中当前评论总数
        present: usize,
        /// 其中未处理的数量
        unprocessed: usize,
    },
    /// 放出一个批次（文档顺序的前 `threshold` 条未处理评论）
    Ready(Vec<Item>),
}

/// 批次收集器
#[derive(Debug, Clone)]
pub struct BatchCollector {
    threshold: usize,
}

impl Default for BatchCollector {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_THRESHOLD)
    }
}

impl BatchCollector {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    /// 扫描页面并判断是否可以放出批次
    pub async fn scan<D: CommentDom + ?Sized>(
        &self,
        dom: &D,
        tracker: &mut ItemTracker,
        in_flight: bool,
    ) -> AppResult<ScanOutcome> {
        if in_flight {
            trace!("处理周期进行中，推迟本次扫描");
            return Ok(ScanOutcome::Deferred);
        }

        let scan = dom.scan().await?;
        if !scan.container_present {
            return Ok(ScanOutcome::Pending {
                present: 0,
                unprocessed: 0,
            });
        }

        let present = scan.items.len();
        let mut unprocessed = Vec::new();
        for mut item in scan.items {
            let id = tracker.identify(&mut item);
            if !tracker.is_processed(&id) {
                unprocessed.push(item);
            }
        }

        let attachments = tracker.take_pending_attachments();
        if !attachments.is_empty() {
            dom.attach_identities(&attachments).await?;
        }

        let unprocessed_count = unprocessed.len();
        if unprocessed_count < self.threshold {
            trace!(
                "未处理 {}/{} 条，未达到阈值 {}",
                unprocessed_count,
                present,
                self.threshold
            );
            return Ok(ScanOutcome::Pending {
                present,
                unprocessed: unprocessed_count,
            });
        }

        unprocessed.truncate(self.threshold);
        debug!(
            "放出批次: {} 条（未处理共 {} 条，页面共 {} 条）",
            unprocessed.len(),
            unprocessed_count,
            present
        );
        Ok(ScanOutcome::Ready(unprocessed))
    }
}
