//! 评论标识追踪
//!
//! 给每条评论分配稳定标识，并记录哪些标识已经进入过批次。
//! 已处理集合只增不减，是去重的唯一依据。

use std::collections::HashSet;

use tracing::trace;
use uuid::Uuid;

use crate::models::{Item, ItemId};

/// 评论标识追踪器
#[derive(Debug, Default)]
pub struct ItemTracker {
    processed: HashSet<ItemId>,
    /// 本次扫描新分配、尚未写回页面的评论
    pending_attachments: Vec<Item>,
}

impl ItemTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回评论的标识，没有则新分配一个
    ///
    /// 已有标识永远不会被替换。
    pub fn identify(&mut self, item: &mut Item) -> ItemId {
        if let Some(existing) = &item.identity {
            return existing.clone();
        }

        let minted = ItemId::new(format!("shield-{}", Uuid::new_v4()));
        trace!("分配新标识 {} (位置 {})", minted, item.element.slot);
        item.identity = Some(minted.clone());
        self.pending_attachments.push(item.clone());
        minted
    }

    pub fn is_processed(&self, id: &ItemId) -> bool {
        self.processed.contains(id)
    }

    /// 标记为已处理（幂等）
    pub fn mark_processed(&mut self, id: ItemId) {
        self.processed.insert(id);
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// 取出待写回页面的新标识
    pub fn take_pending_attachments(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.pending_attachments)
    }
}
