//! 剧透分类客户端 - 业务能力层
//!
//! 把一个批次（标题 + 评论正文）打包成一次请求，交给远端模型，
//! 解析返回结果。所有失败都降级为"没有剧透"（fail-open），
//! 失败原因单独保留用于日志。不重试，也不额外设置超时。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::error::ClassifyError;
use crate::models::{ClassificationOutcome, ClassificationResult};
use crate::services::reply_parser::parse_reply;
use crate::settings::SettingsStore;

/// 系统指令
pub const SYSTEM_INSTRUCTION: &str = "You detect spoilers in YouTube comments.";

/// 一次对话补全请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
}

/// 远端补全服务
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// 发送请求并返回第一条回复的文本
    ///
    /// 传输失败返回 `TransportFailure`；回复中没有文本返回 `MalformedReply`。
    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<String, ClassifyError>;
}

/// 剧透分类客户端
pub struct ClassificationClient<T> {
    transport: T,
    settings: Arc<SettingsStore>,
    model_name: String,
}

impl<T: CompletionTransport> ClassificationClient<T> {
    pub fn new(transport: T, settings: Arc<SettingsStore>, model_name: impl Into<String>) -> Self {
        Self {
            transport,
            settings,
            model_name: model_name.into(),
        }
    }

    /// 分类，失败时返回空结果并附带失败原因
    pub async fn classify(&self, title: &str, texts: &[String]) -> ClassificationOutcome {
        let outcome = ClassificationOutcome::from(self.try_classify(title, texts).await);
        match &outcome.failure {
            None => info!(
                "✓ 分类完成: {} 条中有 {} 条剧透",
                texts.len(),
                outcome.result.spoiler_indices.len()
            ),
            Some(ClassifyError::MissingCredential) => {
                warn!("⚠️ 未配置 API Key，跳过分类，全部显示")
            }
            Some(failure @ ClassifyError::SettingsUnavailable(_)) => {
                error!("❌ {}，跳过分类，全部显示", failure)
            }
            Some(failure) => warn!("⚠️ 分类失败，全部显示: {}", failure),
        }
        outcome
    }

    /// 分类，失败原因以错误返回
    pub async fn try_classify(
        &self,
        title: &str,
        texts: &[String],
    ) -> Result<ClassificationResult, ClassifyError> {
        let settings = self
            .settings
            .load()
            .map_err(|e| ClassifyError::SettingsUnavailable(e.to_string()))?;
        let api_key = settings
            .credential()
            .ok_or(ClassifyError::MissingCredential)?;

        let request = self.build_request(title, texts);
        debug!(
            "发送分类请求，模型: {}，评论数: {}",
            request.model,
            texts.len()
        );

        let reply = self.transport.complete(api_key, &request).await?;
        debug!("模型回复: {}", reply);

        let result = parse_reply(&reply)?;
        if let Some(reasoning) = &result.reasoning {
            debug!("模型理由: {}", reasoning);
        }
        Ok(result)
    }

    /// 构建请求，评论按原顺序编号，编号即 `spoilerIndices` 的索引基准
    pub fn build_request(&self, title: &str, texts: &[String]) -> CompletionRequest {
        CompletionRequest {
            model: self.model_name.clone(),
            system: SYSTEM_INSTRUCTION.to_string(),
            user: build_user_prompt(title, texts),
        }
    }
}

fn build_user_prompt(title: &str, texts: &[String]) -> String {
    let listing = texts
        .iter()
        .enumerate()
        .map(|(idx, text)| format!("{idx}: {text}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a spoiler detection assistant. Your job is to identify which comments under a YouTube video contain spoilers that imply a team may have won the game or competition.

Please return a JSON object with:
- "spoilerIndices": An array of integers representing the indices of comments that contain spoilers.
- "reasoning": A short explanation (1-2 sentences) explaining how you determined which comments were spoilers.

Example response:
{{
    "spoilerIndices": [1, 3, 7],
    "reasoning": "Comments 1, 3, and 7 revealed key plot twists mentioned directly in the comments."
}}

Video Title: {title}

Comments:
{listing}
"#
    )
}
