//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::trace;

use crate::error::{AppError, AppResult};

/// JS 执行器
///
/// 职责：
/// - 持有 Page 资源
/// - 暴露 eval() 能力
/// - 不认识评论 / 批次
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于订阅事件等其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let js_code = js_code.into();
        trace!("执行脚本: {} 字节", js_code.len());
        let result = self.page.evaluate(js_code).await?;
        // 脚本没有返回值时 CDP 不带 value 字段
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    /// 执行 JS 代码并反序列化为指定类型
    ///
    /// # 参数
    /// - `operation`: 操作名称，只用于错误信息
    /// - `js_code`: 要执行的 JavaScript 代码
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        js_code: impl Into<String>,
    ) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).map_err(|e| AppError::unexpected_shape(operation, e))
    }
}
