use std::fmt;

use serde::{Deserialize, Serialize};

/// 评论的稳定标识
///
/// 首次发现时分配，之后整个会话内不再改变。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 页面元素的非拥有句柄
///
/// 只记录扫描时元素在评论区中的文档顺序位置。元素归页面所有，
/// 之后的可见性操作一律按标识查找，找不到视为无操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub slot: usize,
}

/// 一条被发现的评论
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// 页面上已有的标识；未分配时为 None
    pub identity: Option<ItemId>,
    /// 评论正文，可能为空
    pub text: String,
    pub element: ElementRef,
}

impl Item {
    pub fn new(slot: usize, identity: Option<ItemId>, text: impl Into<String>) -> Self {
        Self {
            identity,
            text: text.into(),
            element: ElementRef { slot },
        }
    }
}
