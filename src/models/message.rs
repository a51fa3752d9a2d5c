//! 页面上下文与后台之间的消息格式
//!
//! ```text
//! {"type":"checkSpoilers","payload":{"title":"...","comments":["..."]}}  →  {"spoilerIndices":[1,3]}
//!                                                                         →  {"spoilerIndices":[],"error":{"kind":"missingCredential"}}
//! {"type":"updateSpoilerCount","payload":{"count":4}}                      （无响应）
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;

/// 页面实例标识（对应一个浏览器标签页 / CDP target）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageInstanceId(String);

impl PageInstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PageInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpoilersPayload {
    pub title: String,
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSpoilerCountPayload {
    pub count: u32,
}

/// 页面 → 后台的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ContentMessage {
    CheckSpoilers(CheckSpoilersPayload),
    /// 设置绝对计数，无需响应
    UpdateSpoilerCount(UpdateSpoilerCountPayload),
}

/// `checkSpoilers` 的响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSpoilersResponse {
    pub spoiler_indices: Vec<usize>,
    /// 分类失败的原因；失败时 `spoiler_indices` 为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ClassifyError>,
}
