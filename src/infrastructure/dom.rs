//! 页面 DOM 协作方接口
//!
//! 核心逻辑只通过 `CommentDom` 读写页面，不持有任何元素。
//! 页面结构随时可能变化，按标识找不到元素时一律视为无操作。

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{Item, ItemId};

/// 一次扫描的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScan {
    /// 评论区容器是否存在
    pub container_present: bool,
    /// 容器中当前所有评论，按文档顺序
    pub items: Vec<Item>,
}

/// 页面上的临时提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// 错误提示
    Error { message: String, duration: Duration },
    /// "N spoilers hidden" 提示
    SpoilersHidden { count: usize, duration: Duration },
}

impl Notice {
    /// 提示正文
    pub fn text(&self) -> String {
        match self {
            Notice::Error { message, .. } => format!("Error: {message}"),
            Notice::SpoilersHidden { count, .. } => {
                let plural = if *count > 1 { "s" } else { "" };
                format!("{count} spoiler{plural} hidden")
            }
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Notice::Error { duration, .. } | Notice::SpoilersHidden { duration, .. } => *duration,
        }
    }
}

/// 页面结构变化事件源发出的事件
///
/// `Navigated` 与 `Closed` 都会终止当前会话。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomEvent {
    /// 页面插入了新的结构
    Mutated,
    /// 页面导航到了新地址
    Navigated { url: String },
    /// 页面关闭或失去连接
    Closed,
}

/// 评论页面的读写能力
#[async_trait]
pub trait CommentDom: Send + Sync {
    /// 注入提示框样式（每个会话一次）
    async fn inject_styles(&self) -> AppResult<()>;

    /// 开始观察页面结构变化
    async fn observe(&self) -> AppResult<()>;

    /// 断开结构观察
    async fn disconnect(&self) -> AppResult<()>;

    /// 扫描评论区中当前存在的全部评论
    async fn scan(&self) -> AppResult<PageScan>;

    /// 把新分配的标识写回对应元素
    ///
    /// 元素已有标识或位置上的元素已变化时跳过。
    async fn attach_identities(&self, items: &[Item]) -> AppResult<()>;

    /// 按标识设置评论可见性，返回每个标识对应的元素是否仍存在
    async fn set_items_visible(&self, ids: &[ItemId], visible: bool) -> AppResult<Vec<bool>>;

    /// 整体隐藏/显示评论列表
    async fn set_container_visible(&self, visible: bool) -> AppResult<()>;

    /// 视频标题，找不到标题元素时退回文档标题
    async fn video_title(&self) -> AppResult<String>;

    async fn show_loading(&self) -> AppResult<()>;

    async fn hide_loading(&self) -> AppResult<()>;

    /// 显示一条自动消失的提示
    async fn show_notice(&self, notice: Notice) -> AppResult<()>;
}
