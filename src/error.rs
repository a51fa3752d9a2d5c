use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序错误类型
///
/// 处理周期内出现的任何 `AppError` 都会被编排层当作"意外运行时错误"兜底，
/// 不会让评论区永久隐藏。
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 页面 DOM 读写错误
    #[error("DOM错误: {0}")]
    Dom(#[from] DomError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 设置存储错误
    #[error("设置错误: {0}")]
    Settings(#[from] SettingsError),
    /// JSON 解析失败
    #[error("JSON解析失败: {0}")]
    Json(#[from] serde_json::Error),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed {
        url: String,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 执行脚本失败
    #[error("执行脚本失败: {0}")]
    ScriptExecutionFailed(#[from] chromiumoxide::error::CdpError),
}

/// DOM 读写错误
#[derive(Debug, Error)]
pub enum DomError {
    /// 脚本返回了意料之外的结构
    #[error("脚本返回值无法识别 ({operation}): {source}")]
    UnexpectedShape {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// 模拟页面注入的故障（测试用）
    #[error("注入故障: {0}")]
    Injected(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 数值不合法
    #[error("配置项 {name} 不合法: {reason}")]
    Invalid { name: String, reason: String },
}

/// 设置存储错误
#[derive(Debug, Error)]
pub enum SettingsError {
    /// 读取设置文件失败
    #[error("读取设置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入设置文件失败
    #[error("写入设置文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// TOML 序列化失败
    #[error("TOML序列化失败: {0}")]
    TomlSerializeFailed(#[from] toml::ser::Error),
}

/// 分类失败的具体原因
///
/// 所有变体都在分类客户端内部被恢复为空结果（fail-open），
/// 原因随响应带回页面，只用于提示和日志。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum ClassifyError {
    /// 未配置 API Key，不发起网络请求
    #[error("未配置 API Key")]
    MissingCredential,
    /// 设置存储读取失败，无法确定 API Key
    #[error("设置读取失败: {0}")]
    SettingsUnavailable(String),
    /// 网络或传输层失败
    #[error("请求未能完成: {0}")]
    TransportFailure(String),
    /// 返回内容不是可解析的 JSON
    #[error("返回内容无法解析: {0}")]
    MalformedReply(String),
    /// JSON 中缺少 spoilerIndices 整数数组
    #[error("返回内容缺少 spoilerIndices 数组")]
    MissingIndices,
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed(err))
    }
}

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(port: u16, source: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed { port, source })
    }

    /// 创建脚本返回值结构错误
    pub fn unexpected_shape(operation: &'static str, source: serde_json::Error) -> Self {
        AppError::Dom(DomError::UnexpectedShape { operation, source })
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
