//! 内存页面
//!
//! 与 `PageDom` 行为一致的纯内存实现，供测试和离线演练使用。
//! 克隆出的句柄共享同一个页面状态。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{AppResult, DomError};
use crate::infrastructure::dom::{CommentDom, Notice, PageScan};
use crate::models::{Item, ItemId};

/// 页面中的一条评论
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryComment {
    /// 写回的标识（`data-spoiler-shield-id`）
    pub shield_id: Option<String>,
    /// 页面自带的标识（`data-comment-id`）
    pub native_id: Option<String>,
    pub text: String,
    pub visible: bool,
}

/// 可注入故障的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Observe,
    Scan,
    HideItems,
    RevealItems,
    Title,
    ContainerVisibility,
}

#[derive(Debug, Default)]
struct PageState {
    container_present: bool,
    container_visible: bool,
    comments: Vec<MemoryComment>,
    title: Option<String>,
    document_title: String,
    styles_injected: usize,
    observing: bool,
    loading: bool,
    notices: Vec<Notice>,
    failures: HashSet<FailPoint>,
    scans: usize,
}

/// 内存页面句柄
#[derive(Clone, Default)]
pub struct MemoryDom {
    state: Arc<Mutex<PageState>>,
}

impl MemoryDom {
    /// 尚无评论区容器的空白页面
    pub fn new() -> Self {
        let dom = Self::default();
        {
            let mut state = dom.lock();
            state.container_visible = true;
            state.document_title = "YouTube".to_string();
        }
        dom
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        // 测试中 panic 过的锁仍然可读
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, point: FailPoint) -> AppResult<()> {
        if self.lock().failures.contains(&point) {
            return Err(DomError::Injected(format!("{point:?}")).into());
        }
        Ok(())
    }

    /// 渲染评论区容器
    pub fn render_container(&self) {
        self.lock().container_present = true;
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.lock().title = Some(title.into());
    }

    pub fn set_document_title(&self, title: impl Into<String>) {
        self.lock().document_title = title.into();
    }

    /// 在末尾追加评论，返回它们的位置
    pub fn append_comments<I, S>(&self, texts: I) -> Vec<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.lock();
        state.container_present = true;
        texts
            .into_iter()
            .map(|text| {
                state.comments.push(MemoryComment {
                    shield_id: None,
                    native_id: None,
                    text: text.into(),
                    visible: true,
                });
                state.comments.len() - 1
            })
            .collect()
    }

    /// 追加 `count` 条编号评论 `comment {n}`，编号从当前总数开始
    pub fn append_numbered(&self, count: usize) -> Vec<usize> {
        let start = self.comment_count();
        self.append_comments((start..start + count).map(|n| format!("comment {n}")))
    }

    /// 在指定位置插入一条带页面自带标识的评论
    pub fn insert_native(&self, slot: usize, native_id: &str, text: &str) {
        let mut state = self.lock();
        state.container_present = true;
        let slot = slot.min(state.comments.len());
        state.comments.insert(
            slot,
            MemoryComment {
                shield_id: None,
                native_id: Some(native_id.to_string()),
                text: text.to_string(),
                visible: true,
            },
        );
    }

    /// 删除指定位置的评论
    pub fn remove_comment(&self, slot: usize) -> Option<MemoryComment> {
        let mut state = self.lock();
        (slot < state.comments.len()).then(|| state.comments.remove(slot))
    }

    pub fn fail_on(&self, point: FailPoint) {
        self.lock().failures.insert(point);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn comments(&self) -> Vec<MemoryComment> {
        self.lock().comments.clone()
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }

    /// 当前隐藏的评论正文，按文档顺序
    pub fn hidden_texts(&self) -> Vec<String> {
        self.lock()
            .comments
            .iter()
            .filter(|comment| !comment.visible)
            .map(|comment| comment.text.clone())
            .collect()
    }

    pub fn is_comment_visible(&self, slot: usize) -> Option<bool> {
        self.lock().comments.get(slot).map(|comment| comment.visible)
    }

    pub fn container_visible(&self) -> bool {
        self.lock().container_visible
    }

    pub fn loading(&self) -> bool {
        self.lock().loading
    }

    pub fn observing(&self) -> bool {
        self.lock().observing
    }

    pub fn styles_injected(&self) -> usize {
        self.lock().styles_injected
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.lock().notices.clone()
    }

    pub fn scan_count(&self) -> usize {
        self.lock().scans
    }
}

impl MemoryComment {
    fn identity(&self) -> Option<&str> {
        self.shield_id.as_deref().or(self.native_id.as_deref())
    }
}

#[async_trait]
impl CommentDom for MemoryDom {
    async fn inject_styles(&self) -> AppResult<()> {
        self.lock().styles_injected += 1;
        Ok(())
    }

    async fn observe(&self) -> AppResult<()> {
        self.check(FailPoint::Observe)?;
        self.lock().observing = true;
        Ok(())
    }

    async fn disconnect(&self) -> AppResult<()> {
        self.lock().observing = false;
        Ok(())
    }

    async fn scan(&self) -> AppResult<PageScan> {
        self.check(FailPoint::Scan)?;
        let mut state = self.lock();
        state.scans += 1;
        if !state.container_present {
            return Ok(PageScan::default());
        }
        let items = state
            .comments
            .iter()
            .enumerate()
            .map(|(slot, comment)| {
                Item::new(slot, comment.identity().map(ItemId::new), comment.text.clone())
            })
            .collect();
        Ok(PageScan {
            container_present: true,
            items,
        })
    }

    async fn attach_identities(&self, items: &[Item]) -> AppResult<()> {
        let mut state = self.lock();
        for item in items {
            let Some(id) = &item.identity else { continue };
            let Some(comment) = state.comments.get_mut(item.element.slot) else {
                continue;
            };
            if comment.identity().is_some() || comment.text != item.text {
                continue;
            }
            comment.shield_id = Some(id.as_str().to_string());
        }
        Ok(())
    }

    async fn set_items_visible(&self, ids: &[ItemId], visible: bool) -> AppResult<Vec<bool>> {
        self.check(if visible {
            FailPoint::RevealItems
        } else {
            FailPoint::HideItems
        })?;
        let mut state = self.lock();
        Ok(ids
            .iter()
            .map(|id| {
                match state
                    .comments
                    .iter_mut()
                    .find(|comment| comment.identity() == Some(id.as_str()))
                {
                    Some(comment) => {
                        comment.visible = visible;
                        true
                    }
                    None => false,
                }
            })
            .collect())
    }

    async fn set_container_visible(&self, visible: bool) -> AppResult<()> {
        self.check(FailPoint::ContainerVisibility)?;
        let mut state = self.lock();
        if state.container_present {
            state.container_visible = visible;
        }
        Ok(())
    }

    async fn video_title(&self) -> AppResult<String> {
        self.check(FailPoint::Title)?;
        let state = self.lock();
        Ok(state
            .title
            .clone()
            .unwrap_or_else(|| state.document_title.clone()))
    }

    async fn show_loading(&self) -> AppResult<()> {
        self.lock().loading = true;
        Ok(())
    }

    async fn hide_loading(&self) -> AppResult<()> {
        self.lock().loading = false;
        Ok(())
    }

    async fn show_notice(&self, notice: Notice) -> AppResult<()> {
        self.lock().notices.push(notice);
        Ok(())
    }
}
