//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **资源管理**：连接浏览器，唯一持有 Browser 和 Page
//! 2. **后台启动**：创建分类客户端和后台工作者
//! 3. **会话循环**：每次进入视频页开始一个新会话，导航离开或页面关闭时结束

use std::sync::Arc;

use chromiumoxide::{Browser, Page};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::browser;
use crate::clients::OpenRouterTransport;
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{CommentDom, DomEvent, JsExecutor, PageDom};
use crate::models::PageInstanceId;
use crate::orchestrator::background::{BackgroundHandle, BackgroundWorker};
use crate::orchestrator::session::{Session, SessionEnd, SessionOptions};
use crate::services::badge::is_qualifying_url;
use crate::services::ClassificationClient;
use crate::settings::SettingsStore;

/// 应用主结构
pub struct App {
    config: Config,
    settings: Arc<SettingsStore>,
    _browser: Browser,
    page: Page,
}

impl App {
    /// 连接浏览器并定位目标页面
    pub async fn initialize(config: Config, settings: Arc<SettingsStore>) -> AppResult<Self> {
        let (browser, page) = browser::connect_to_browser_and_page(
            config.browser_debug_port,
            config.target_url.as_deref(),
            config.target_title.as_deref(),
        )
        .await?;

        Ok(Self {
            config,
            settings,
            _browser: browser,
            page,
        })
    }

    /// 运行直到页面关闭
    pub async fn run(&self) -> AppResult<()> {
        let (background_tx, background_rx) = mpsc::unbounded_channel();
        let client = ClassificationClient::new(
            OpenRouterTransport::new(&self.config),
            Arc::clone(&self.settings),
            self.config.llm_model_name.clone(),
        );
        let background = tokio::spawn(BackgroundWorker::new(client).run(background_rx));

        let page_id = PageInstanceId::new(self.page.target_id().inner().clone());
        let handle = Arc::new(BackgroundHandle::new(page_id, background_tx));

        let dom = PageDom::new(JsExecutor::new(self.page.clone()), &self.config);
        let mut events = dom.subscribe().await?;

        let url = self.page.url().await?.unwrap_or_default();
        run_sessions(
            dom,
            Arc::clone(&handle),
            SessionOptions::from_config(&self.config),
            &mut events,
            url,
        )
        .await;

        drop(handle);
        if let Err(e) = background.await {
            warn!("⚠️ 后台任务异常结束: {}", e);
        }
        info!("页面已关闭，程序结束");
        Ok(())
    }
}

/// 在同一个页面上依次运行会话，直到页面关闭
///
/// 会话启动失败（例如页面还没准备好）不会结束程序，只等待下一次导航。
pub async fn run_sessions<D>(
    dom: D,
    handle: Arc<BackgroundHandle>,
    options: SessionOptions,
    events: &mut mpsc::UnboundedReceiver<DomEvent>,
    mut url: String,
) where
    D: CommentDom + Clone,
{
    loop {
        let next = if is_qualifying_url(&url) {
            info!("🎬 开始处理视频页: {}", url);
            let session = Session::new(dom.clone(), Arc::clone(&handle), options.clone());
            match session.run(events).await {
                Ok(SessionEnd::Navigated { url }) => Some(url),
                Ok(SessionEnd::Closed) => None,
                Err(e) => {
                    warn!("⚠️ 会话启动失败，等待下一次导航: {}", e);
                    wait_for_navigation(events).await
                }
            }
        } else {
            info!("当前页面不是视频页，等待导航: {}", url);
            wait_for_navigation(events).await
        };

        match next {
            Some(next) => {
                handle.page_navigated(&next);
                url = next;
            }
            None => break,
        }
    }
    handle.page_closed();
}

/// 丢弃结构变化，直到下一次导航；页面关闭时返回 None
async fn wait_for_navigation(events: &mut mpsc::UnboundedReceiver<DomEvent>) -> Option<String> {
    while let Some(event) = events.recv().await {
        match event {
            DomEvent::Mutated => continue,
            DomEvent::Navigated { url } => return Some(url),
            DomEvent::Closed => return None,
        }
    }
    None
}
