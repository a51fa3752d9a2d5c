//! OpenRouter 传输层
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（OpenRouter、Azure 等）都可以通过 `api_base` 切换

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ClassifyError;
use crate::services::classification_client::{CompletionRequest, CompletionTransport};

/// OpenAI 兼容接口的传输层
///
/// API Key 每次请求时传入（设置可能随时被修改），所以客户端按请求构建。
pub struct OpenRouterTransport {
    api_base_url: String,
}

impl OpenRouterTransport {
    pub fn new(config: &Config) -> Self {
        Self {
            api_base_url: config.llm_api_base_url.clone(),
        }
    }

    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
        }
    }

    fn client(&self, api_key: &str) -> Client<OpenAIConfig> {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&self.api_base_url);
        Client::with_config(openai_config)
    }
}

fn transport_failure(e: impl std::fmt::Display) -> ClassifyError {
    ClassifyError::TransportFailure(e.to_string())
}

#[async_trait]
impl CompletionTransport for OpenRouterTransport {
    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<String, ClassifyError> {
        debug!("调用 LLM API，模型: {}", request.model);
        debug!("用户消息长度: {} 字符", request.user.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system.as_str())
            .build()
            .map_err(transport_failure)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user.as_str())
            .build()
            .map_err(transport_failure)?;

        let messages = vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .build()
            .map_err(transport_failure)?;

        let response = self
            .client(api_key)
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                transport_failure(e)
            })?;

        debug!("LLM API 调用成功");

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ClassifyError::MalformedReply("LLM 返回内容为空".to_string()))
    }
}
