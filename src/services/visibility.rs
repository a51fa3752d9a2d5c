//! 可见性控制
//!
//! - `hide`：立即隐藏批次中的评论并标记为已处理
//! - `reveal_non_flagged`：只显示未被判定为剧透的评论，剧透保持隐藏
//! - `reveal_all`：周期出错时显示整个批次
//! - `toggle_container_visibility`：首批期间整体隐藏/显示评论列表

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::CommentDom;
use crate::models::{Batch, BatchEntry, Item, ItemId};
use crate::services::ItemTracker;
use crate::utils::truncate_text;

/// 一次显示操作的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevealSummary {
    /// 被显示的评论数
    pub revealed: usize,
    /// 保持隐藏的剧透数（只计批次范围内的索引）
    pub kept_hidden: usize,
    /// 超出批次范围而被忽略的索引数
    pub ignored: usize,
    /// 元素已不在页面上的评论数
    pub missing: usize,
}

/// 可见性控制器
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityController;

impl VisibilityController {
    pub fn new() -> Self {
        Self
    }

    /// 隐藏一组评论并标记为已处理，返回批次
    pub async fn hide<D: CommentDom + ?Sized>(
        &self,
        dom: &D,
        tracker: &mut ItemTracker,
        items: Vec<Item>,
    ) -> AppResult<Batch> {
        let mut entries = Vec::with_capacity(items.len());
        for mut item in items {
            let identity = tracker.identify(&mut item);
            entries.push(BatchEntry {
                identity,
                text: item.text,
            });
        }
        let batch = Batch::new(entries);

        // 先标记再隐藏：即使隐藏失败，这些评论也不会再进入别的批次
        for id in batch.identities() {
            tracker.mark_processed(id);
        }

        let found = dom.set_items_visible(&batch.identities(), false).await?;
        for (index, (entry, present)) in batch.entries().iter().zip(found).enumerate() {
            if present {
                debug!("隐藏评论 {}: {}", index, truncate_text(&entry.text, 60));
            } else {
                debug!("评论 {} 已不在页面上", index);
            }
        }

        Ok(batch)
    }

    /// 显示批次中未被判定为剧透的评论
    ///
    /// 超出范围的索引被忽略；找不到的元素视为无操作。
    pub async fn reveal_non_flagged<D: CommentDom + ?Sized>(
        &self,
        dom: &D,
        batch: &Batch,
        spoiler_indices: &BTreeSet<usize>,
    ) -> AppResult<RevealSummary> {
        let mut summary = RevealSummary {
            ignored: spoiler_indices
                .iter()
                .filter(|index| **index >= batch.len())
                .count(),
            ..RevealSummary::default()
        };

        let mut to_reveal: Vec<ItemId> = Vec::new();
        for index in 0..batch.len() {
            let Some(identity) = batch.identity_at(index) else {
                continue;
            };
            if spoiler_indices.contains(&index) {
                debug!("评论 {} 保持隐藏（剧透）: {}", index, identity);
                summary.kept_hidden += 1;
            } else {
                to_reveal.push(identity.clone());
            }
        }

        let found = dom.set_items_visible(&to_reveal, true).await?;
        for present in found {
            if present {
                summary.revealed += 1;
            } else {
                summary.missing += 1;
            }
        }

        if summary.ignored > 0 {
            debug!("忽略 {} 个超出批次范围的索引", summary.ignored);
        }
        Ok(summary)
    }

    /// 显示整个批次（失败兜底）
    pub async fn reveal_all<D: CommentDom + ?Sized>(
        &self,
        dom: &D,
        batch: &Batch,
    ) -> AppResult<RevealSummary> {
        self.reveal_non_flagged(dom, batch, &BTreeSet::new()).await
    }

    pub async fn toggle_container_visibility<D: CommentDom + ?Sized>(
        &self,
        dom: &D,
        visible: bool,
    ) -> AppResult<()> {
        debug!("评论列表整体{}", if visible { "显示" } else { "隐藏" });
        dom.set_container_visible(visible).await
    }
}
