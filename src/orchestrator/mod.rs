//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责页面生命周期和跨上下文调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 连接浏览器，持有 Browser 和 Page
//! - 启动后台工作者
//! - 每次进入视频页创建一个新会话
//!
//! ### `session` - 页面会话
//! - 等待首批、隐藏、分类、显示的状态机
//! - 保证同一时刻最多一个处理周期
//!
//! ### `background` - 后台上下文
//! - 处理 `checkSpoilers` / `updateSpoilerCount` 消息
//! - 维护每个页面的剧透计数徽标
//!
//! ## 层次关系
//!
//! ```text
//! app (浏览器 + 页面导航)
//!     ↓
//! session (单个页面的处理周期)  ⇄  background (分类 + 徽标)
//!     ↓                               ↓
//! services (收集 / 隐藏 / 显示)      services (分类客户端)
//!     ↓                               ↓
//! infrastructure (CommentDom)        clients (OpenRouter)
//! ```

pub mod app;
pub mod background;
pub mod session;

pub use app::{run_sessions, App};
pub use background::{BackgroundEvent, BackgroundHandle, BackgroundWorker};
pub use session::{
    ClassifyRequest, Session, SessionEnd, SessionOptions, SessionPhase, SpoilerGateway,
};
