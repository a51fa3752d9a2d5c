//! 剧透计数徽标
//!
//! 每个页面实例一个绝对计数。页面关闭时删除，导航到新的视频页时清零。

use std::collections::HashMap;

use tracing::debug;
use url::Url;

use crate::models::PageInstanceId;

/// 徽标显示变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeUpdate {
    pub page: PageInstanceId,
    /// 徽标文本，空字符串表示不显示
    pub text: String,
}

/// 各页面实例的剧透计数
#[derive(Debug, Default)]
pub struct BadgeBoard {
    counts: HashMap<PageInstanceId, u32>,
}

/// 是否是需要过滤的视频页（`youtube.com/watch`，忽略大小写、端口和 `www.`/`m.` 前缀）
pub fn is_qualifying_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(&host);
    host == "youtube.com" && parsed.path() == "/watch"
}

fn badge_text(count: u32) -> String {
    if count == 0 {
        String::new()
    } else {
        count.to_string()
    }
}

impl BadgeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, page: &PageInstanceId) -> u32 {
        self.counts.get(page).copied().unwrap_or(0)
    }

    /// 设置绝对计数
    pub fn set_count(&mut self, page: PageInstanceId, count: u32) -> BadgeUpdate {
        debug!("页面 {} 剧透计数: {}", page, count);
        self.counts.insert(page.clone(), count);
        BadgeUpdate {
            page,
            text: badge_text(count),
        }
    }

    /// 页面关闭
    pub fn page_closed(&mut self, page: &PageInstanceId) {
        self.counts.remove(page);
    }

    /// 页面导航；新地址是视频页时清零
    pub fn page_navigated(&mut self, page: PageInstanceId, url: &str) -> Option<BadgeUpdate> {
        if is_qualifying_url(url) {
            Some(self.set_count(page, 0))
        } else {
            None
        }
    }
}
