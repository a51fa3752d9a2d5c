//! 日志工具模块
//!
//! 提供日志初始化和输出格式化的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则 `debug_mode` 打开时输出 debug 级别，关闭时只输出 info。
/// debug 开关只影响日志详细程度，不影响任何行为。
pub fn init(debug_mode: bool) {
    let default_level = if debug_mode { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("comment_spoiler_shield={default_level},warn")));

    // 测试里可能被初始化多次，忽略重复初始化
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(port: u16, threshold: usize, debug_mode: bool) {
    info!("{}", "=".repeat(60));
    info!("🛡️ 评论剧透屏蔽启动");
    info!("🔌 浏览器调试端口: {}", port);
    info!("📦 批次阈值: {} 条评论", threshold);
    if debug_mode {
        info!("🐞 调试模式已开启");
    }
    info!("{}", "=".repeat(60));
}

/// 记录处理周期开始
pub fn log_cycle_start(cycle: usize, batch_len: usize, first_batch: bool) {
    info!("\n{}", "─".repeat(60));
    if first_batch {
        info!("📦 第 {} 轮（首批）: {} 条评论", cycle, batch_len);
    } else {
        info!("📦 第 {} 轮: {} 条评论", cycle, batch_len);
    }
}

/// 记录处理周期完成
pub fn log_cycle_complete(cycle: usize, flagged: usize, revealed: usize, total_flagged: usize) {
    info!(
        "✓ 第 {} 轮完成: 隐藏 {} 条剧透, 显示 {} 条, 累计隐藏 {}",
        cycle, flagged, revealed, total_flagged
    );
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_text("剧透警告剧透警告", 4), "剧透警告...");
        assert_eq!(truncate_text("short", 10), "short");
    }
}
