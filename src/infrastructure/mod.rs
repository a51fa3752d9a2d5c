//! 基础设施层：持有页面资源，只暴露读写能力

pub mod dom;
pub mod js_executor;
pub mod memory_dom;
pub mod page_dom;

pub use dom::{CommentDom, DomEvent, Notice, PageScan};
pub use js_executor::JsExecutor;
pub use memory_dom::{FailPoint, MemoryDom};
pub use page_dom::PageDom;
