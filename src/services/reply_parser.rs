//! 解析模型返回的分类结果
//!
//! 优先取第一个 ```` ```json ```` 代码块；没有代码块时把整段回复当作 JSON。
//! 代码块存在但内容不是合法 JSON 时直接报错，不再回退。

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::ClassifyError;
use crate::models::ClassificationResult;

fn fenced_json() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| {
        Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("内置正则有效")
    })
}

/// 提取回复中的 JSON 文档
pub fn extract_json(reply: &str) -> Result<JsonValue, ClassifyError> {
    if let Some(block) = fenced_json().captures(reply).and_then(|caps| caps.get(1)) {
        return serde_json::from_str(block.as_str()).map_err(|e| {
            ClassifyError::MalformedReply(format!("代码块中的内容不是合法 JSON: {e}"))
        });
    }

    serde_json::from_str(reply.trim())
        .map_err(|e| ClassifyError::MalformedReply(format!("回复不是合法 JSON: {e}")))
}

/// 把回复解析为分类结果
///
/// `spoilerIndices` 必须是数组；数组中不是非负整数的元素被丢弃。
pub fn parse_reply(reply: &str) -> Result<ClassificationResult, ClassifyError> {
    let document = extract_json(reply)?;

    let indices = document
        .get("spoilerIndices")
        .and_then(JsonValue::as_array)
        .ok_or(ClassifyError::MissingIndices)?;

    let mut spoiler_indices = BTreeSet::new();
    for value in indices {
        match value.as_u64().and_then(|n| usize::try_from(n).ok()) {
            Some(index) => {
                spoiler_indices.insert(index);
            }
            None => debug!("丢弃无效索引: {}", value),
        }
    }

    let reasoning = document
        .get("reasoning")
        .and_then(JsonValue::as_str)
        .map(str::to_string);

    Ok(ClassificationResult {
        spoiler_indices,
        reasoning,
    })
}
