//! 业务能力层
//!
//! 每个服务只描述"我能做什么"，流程顺序交给编排层。

pub mod badge;
pub mod batch_collector;
pub mod classification_client;
pub mod item_tracker;
pub mod reply_parser;
pub mod visibility;

pub use badge::{BadgeBoard, BadgeUpdate};
pub use batch_collector::{BatchCollector, ScanOutcome, DEFAULT_BATCH_THRESHOLD};
pub use classification_client::{ClassificationClient, CompletionRequest, CompletionTransport};
pub use item_tracker::ItemTracker;
pub use visibility::{RevealSummary, VisibilityController};
