use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppResult, ConfigError};

/// 评论区在页面中的选择器
#[derive(Clone, Debug)]
pub struct DomSelectors {
    /// 评论区外层容器
    pub section: String,
    /// 容器内承载评论列表的节点（整体隐藏/显示的对象）
    pub contents: String,
    /// 单条评论
    pub item: String,
    /// 评论正文
    pub item_text: String,
    /// 视频标题
    pub title: String,
}

impl Default for DomSelectors {
    fn default() -> Self {
        Self {
            section: "#sections.ytd-comments".to_string(),
            contents: "#contents".to_string(),
            item: "ytd-comment-thread-renderer".to_string(),
            item_text: "#content-text".to_string(),
            title: "div#title h1".to_string(),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 要附着的页面 URL（找不到时新开页面导航过去）
    pub target_url: Option<String>,
    /// 按标题查找已打开的页面
    pub target_title: Option<String>,
    /// 设置文件路径（apiKey / debugMode）
    pub settings_path: String,
    // --- LLM 配置 ---
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 批处理 ---
    /// 未处理评论达到该数量才发出一个批次
    pub batch_threshold: usize,
    /// 错误提示停留时间
    pub error_notice: Duration,
    /// "已隐藏 N 条剧透"提示停留时间
    pub spoiler_notice: Duration,
    /// 页面 MutationObserver 回调使用的 CDP binding 名称
    pub mutation_binding: String,
    pub selectors: DomSelectors,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            target_url: None,
            target_title: None,
            settings_path: "settings.toml".to_string(),
            llm_api_base_url: "https://openrouter.ai/api/v1".to_string(),
            llm_model_name: "google/gemini-2.0-flash-001".to_string(),
            batch_threshold: 20,
            error_notice: Duration::from_millis(5000),
            spoiler_notice: Duration::from_millis(10000),
            mutation_binding: "__spoilerShieldMutation".to_string(),
            selectors: DomSelectors::default(),
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> AppResult<Self> {
        let default = Self::default();
        let config = Self {
            browser_debug_port: parse_env("BROWSER_DEBUG_PORT", "u16")?
                .unwrap_or(default.browser_debug_port),
            target_url: std::env::var("TARGET_URL").ok().or(default.target_url),
            target_title: std::env::var("TARGET_TITLE").ok().or(default.target_title),
            settings_path: std::env::var("SETTINGS_PATH").unwrap_or(default.settings_path),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            batch_threshold: parse_env("BATCH_THRESHOLD", "usize")?
                .unwrap_or(default.batch_threshold),
            error_notice: parse_env::<u64>("ERROR_NOTICE_MS", "u64")?
                .map(Duration::from_millis)
                .unwrap_or(default.error_notice),
            spoiler_notice: parse_env::<u64>("SPOILER_NOTICE_MS", "u64")?
                .map(Duration::from_millis)
                .unwrap_or(default.spoiler_notice),
            mutation_binding: std::env::var("MUTATION_BINDING").unwrap_or(default.mutation_binding),
            selectors: default.selectors,
        };
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> AppResult<()> {
        if self.batch_threshold == 0 {
            return Err(ConfigError::Invalid {
                name: "BATCH_THRESHOLD".to_string(),
                reason: "批次阈值必须大于 0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(var_name: &str, expected_type: &str) -> AppResult<Option<T>> {
    let Ok(value) = std::env::var(var_name) else {
        return Ok(None);
    };
    let parsed = value.trim().parse::<T>();
    match parsed {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value,
            expected_type: expected_type.to_string(),
        }
        .into()),
    }
}
