//! # Comment Spoiler Shield
//!
//! 在动态加载的视频评论区中，按批把新评论交给 LLM 判断是否剧透，
//! 剧透评论保持隐藏，其余评论恢复显示。分类失败时一律显示（fail-open）。
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `CommentDom` - 评论页面读写接口；`PageDom` 走 CDP，`MemoryDom` 纯内存
//!
//! ### ② 客户端层（Clients）
//! - `clients/` - 外部服务的传输实现
//! - `OpenRouterTransport` - OpenAI 兼容的对话补全接口
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `ItemTracker` - 评论标识与已处理集合
//! - `BatchCollector` - 累积未处理评论，达到阈值放出批次
//! - `VisibilityController` - 隐藏 / 按结果显示
//! - `ClassificationClient` - 构建请求、解析回复、失败兜底
//! - `BadgeBoard` - 每个页面的剧透计数
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session` - 单个页面的处理周期状态机
//! - `orchestrator/background` - 后台消息处理
//! - `orchestrator/app` - 浏览器连接与会话循环
//!
//! ## 模块结构

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod settings;
pub mod utils;

// 重新导出常用类型
pub use browser::connect_to_browser_and_page;
pub use config::Config;
pub use error::{AppError, AppResult, ClassifyError};
pub use infrastructure::{CommentDom, DomEvent, JsExecutor, MemoryDom, PageDom};
pub use orchestrator::{App, Session, SessionEnd, SessionOptions, SessionPhase, SpoilerGateway};
pub use settings::{Settings, SettingsStore};
