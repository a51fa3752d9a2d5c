use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;

/// 分类结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// 被判定为剧透的批次索引
    pub spoiler_indices: BTreeSet<usize>,
    /// 模型给出的简短理由，仅用于日志
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ClassificationResult {
    pub fn with_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            spoiler_indices: indices.into_iter().collect(),
            reasoning: None,
        }
    }

    /// 空结果：全部视为非剧透
    pub fn empty() -> Self {
        Self::default()
    }
}

/// 分类结果加上失败原因（如果有）
///
/// 失败时 `result` 总是空结果，评论全部显示。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationOutcome {
    pub result: ClassificationResult,
    pub failure: Option<ClassifyError>,
}

impl ClassificationOutcome {
    pub fn success(result: ClassificationResult) -> Self {
        Self {
            result,
            failure: None,
        }
    }

    pub fn failed(failure: ClassifyError) -> Self {
        Self {
            result: ClassificationResult::empty(),
            failure: Some(failure),
        }
    }
}

impl From<Result<ClassificationResult, ClassifyError>> for ClassificationOutcome {
    fn from(value: Result<ClassificationResult, ClassifyError>) -> Self {
        match value {
            Ok(result) => Self::success(result),
            Err(failure) => Self::failed(failure),
        }
    }
}
