//! 基于 CDP 的页面实现
//!
//! 所有读写都通过 `JsExecutor` 在页面里执行一段脚本完成；
//! 结构变化由页面内的 MutationObserver 调用 CDP binding 通知回来。

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{EventFrameNavigated, EventNavigatedWithinDocument};
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::{Config, DomSelectors};
use crate::error::{AppError, AppResult};
use crate::infrastructure::dom::{CommentDom, DomEvent, Notice, PageScan};
use crate::infrastructure::JsExecutor;
use crate::models::{Item, ItemId};

const IDENTITY_ATTR: &str = "data-spoiler-shield-id";
const NATIVE_IDENTITY_ATTR: &str = "data-comment-id";
const OVERLAY_CSS: &str = include_str!("overlay.css");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScan {
    container_present: bool,
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    slot: usize,
    identity: Option<String>,
    text: String,
}

/// CDP 页面
#[derive(Clone)]
pub struct PageDom {
    executor: JsExecutor,
    selectors: DomSelectors,
    binding: String,
}

impl PageDom {
    pub fn new(executor: JsExecutor, config: &Config) -> Self {
        Self {
            executor,
            selectors: config.selectors.clone(),
            binding: config.mutation_binding.clone(),
        }
    }

    /// 订阅页面事件
    ///
    /// 注册 binding 后把 binding 回调、导航和页面关闭转换成 `DomEvent` 送入通道。
    /// 需在 `observe()` 之前调用，否则第一次变化会丢失。
    pub async fn subscribe(&self) -> AppResult<mpsc::UnboundedReceiver<DomEvent>> {
        let page = self.executor.page();
        page.execute(AddBindingParams::new(self.binding.clone()))
            .await?;

        let main_frame = page.mainframe().await?;
        let mut bindings = page.event_listener::<EventBindingCalled>().await?;
        let mut navigations = page.event_listener::<EventFrameNavigated>().await?;
        let mut soft_navigations = page.event_listener::<EventNavigatedWithinDocument>().await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let binding = self.binding.clone();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    called = bindings.next() => match called {
                        Some(called) if called.name == binding => DomEvent::Mutated,
                        Some(_) => continue,
                        None => DomEvent::Closed,
                    },
                    navigated = navigations.next() => match navigated {
                        Some(navigated) if navigated.frame.parent_id.is_none() => DomEvent::Navigated {
                            url: navigated.frame.url.clone(),
                        },
                        Some(_) => continue,
                        None => DomEvent::Closed,
                    },
                    navigated = soft_navigations.next() => match navigated {
                        Some(navigated) if Some(&navigated.frame_id) == main_frame.as_ref() => {
                            DomEvent::Navigated { url: navigated.url.clone() }
                        }
                        Some(_) => continue,
                        None => DomEvent::Closed,
                    },
                };

                let terminal = matches!(event, DomEvent::Closed);
                if tx.send(event).is_err() || terminal {
                    break;
                }
            }
            debug!("页面事件转发结束");
        });

        Ok(rx)
    }

    /// 把字符串转成 JS 字面量
    fn js_str(value: &str) -> AppResult<String> {
        Ok(serde_json::to_string(value)?)
    }

    async fn run_void(&self, js_code: String) -> AppResult<()> {
        self.executor.eval(js_code).await?;
        Ok(())
    }
}

#[async_trait]
impl CommentDom for PageDom {
    async fn inject_styles(&self) -> AppResult<()> {
        let js_code = format!(
            r#"
            (() => {{
                if (document.getElementById('spoiler-shield-styles')) return false;
                const styleEl = document.createElement('style');
                styleEl.id = 'spoiler-shield-styles';
                styleEl.textContent = {css};
                (document.head || document.documentElement).appendChild(styleEl);
                return true;
            }})()
            "#,
            css = Self::js_str(OVERLAY_CSS)?,
        );
        self.run_void(js_code).await
    }

    async fn observe(&self) -> AppResult<()> {
        let js_code = format!(
            r#"
            (() => {{
                if (window.__spoilerShieldObserver) return false;
                const notify = window[{binding}];
                let queued = false;
                const observer = new MutationObserver(() => {{
                    if (queued) return;
                    queued = true;
                    setTimeout(() => {{
                        queued = false;
                        notify('mutation');
                    }}, 0);
                }});
                window.__spoilerShieldObserver = observer;
                const attach = () => {{
                    if (window.__spoilerShieldObserver !== observer) return;
                    observer.observe(document.body, {{ childList: true, subtree: true }});
                    notify('initial');
                }};
                // 导航后 body 可能还没创建
                if (document.body) {{
                    attach();
                }} else {{
                    document.addEventListener('DOMContentLoaded', attach, {{ once: true }});
                }}
                return true;
            }})()
            "#,
            binding = Self::js_str(&self.binding)?,
        );
        self.run_void(js_code).await
    }

    async fn disconnect(&self) -> AppResult<()> {
        self.run_void(
            r#"
            (() => {
                if (!window.__spoilerShieldObserver) return false;
                window.__spoilerShieldObserver.disconnect();
                delete window.__spoilerShieldObserver;
                return true;
            })()
            "#
            .to_string(),
        )
        .await
    }

    async fn scan(&self) -> AppResult<PageScan> {
        let js_code = format!(
            r#"
            (() => {{
                const section = document.querySelector({section});
                if (!section) return {{ containerPresent: false, items: [] }};
                const items = Array.from(section.querySelectorAll({item})).map((el, slot) => {{
                    const textEl = el.querySelector({item_text});
                    return {{
                        slot,
                        identity: el.getAttribute({attr}) || el.getAttribute({native_attr}) || null,
                        text: textEl ? textEl.innerText : ''
                    }};
                }});
                return {{ containerPresent: true, items }};
            }})()
            "#,
            section = Self::js_str(&self.selectors.section)?,
            item = Self::js_str(&self.selectors.item)?,
            item_text = Self::js_str(&self.selectors.item_text)?,
            attr = Self::js_str(IDENTITY_ATTR)?,
            native_attr = Self::js_str(NATIVE_IDENTITY_ATTR)?,
        );

        let raw: RawScan = self.executor.eval_as("scan", js_code).await?;
        Ok(PageScan {
            container_present: raw.container_present,
            items: raw
                .items
                .into_iter()
                .map(|raw| Item::new(raw.slot, raw.identity.map(ItemId::new), raw.text))
                .collect(),
        })
    }

    async fn attach_identities(&self, items: &[Item]) -> AppResult<()> {
        let entries: Vec<(usize, &str, &str)> = items
            .iter()
            .filter_map(|item| {
                item.identity
                    .as_ref()
                    .map(|id| (item.element.slot, id.as_str(), item.text.as_str()))
            })
            .collect();
        if entries.is_empty() {
            return Ok(());
        }

        let js_code = format!(
            r#"
            ((entries) => {{
                const section = document.querySelector({section});
                if (!section) return 0;
                const nodes = section.querySelectorAll({item});
                let attached = 0;
                for (const [slot, id, expected] of entries) {{
                    const el = nodes[slot];
                    if (!el || el.getAttribute({attr}) || el.getAttribute({native_attr})) continue;
                    const textEl = el.querySelector({item_text});
                    if ((textEl ? textEl.innerText : '') !== expected) continue;
                    el.setAttribute({attr}, id);
                    attached++;
                }}
                return attached;
            }})({entries})
            "#,
            section = Self::js_str(&self.selectors.section)?,
            item = Self::js_str(&self.selectors.item)?,
            item_text = Self::js_str(&self.selectors.item_text)?,
            attr = Self::js_str(IDENTITY_ATTR)?,
            native_attr = Self::js_str(NATIVE_IDENTITY_ATTR)?,
            entries = serde_json::to_string(&entries)?,
        );

        let attached: usize = self.executor.eval_as("attach_identities", js_code).await?;
        if attached < entries.len() {
            debug!(
                "{} 条标识未写回（元素已变化）",
                entries.len() - attached
            );
        }
        Ok(())
    }

    async fn set_items_visible(&self, ids: &[ItemId], visible: bool) -> AppResult<Vec<bool>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let js_code = format!(
            r#"
            ((ids, visible) => ids.map((id) => {{
                const escaped = CSS.escape(id);
                const el = document.querySelector('[' + {attr} + '="' + escaped + '"]')
                    || document.querySelector('[' + {native_attr} + '="' + escaped + '"]');
                if (!el) return false;
                el.style.display = visible ? '' : 'none';
                return true;
            }}))({ids}, {visible})
            "#,
            attr = Self::js_str(IDENTITY_ATTR)?,
            native_attr = Self::js_str(NATIVE_IDENTITY_ATTR)?,
            ids = serde_json::to_string(ids)?,
            visible = visible,
        );

        let found: Vec<bool> = self.executor.eval_as("set_items_visible", js_code).await?;
        if found.len() != ids.len() {
            return Err(AppError::Other(format!(
                "可见性脚本返回 {} 项，期望 {} 项",
                found.len(),
                ids.len()
            )));
        }
        Ok(found)
    }

    async fn set_container_visible(&self, visible: bool) -> AppResult<()> {
        let js_code = format!(
            r#"
            (() => {{
                const section = document.querySelector({section});
                if (!section) return false;
                const contents = section.querySelector({contents});
                if (!contents) return false;
                contents.style.visibility = {visibility};
                return true;
            }})()
            "#,
            section = Self::js_str(&self.selectors.section)?,
            contents = Self::js_str(&self.selectors.contents)?,
            visibility = Self::js_str(if visible { "visible" } else { "hidden" })?,
        );

        let applied: bool = self.executor.eval_as("set_container_visible", js_code).await?;
        if !applied {
            warn!("⚠️ 未找到评论列表节点，无法设置整体可见性");
        }
        Ok(())
    }

    async fn video_title(&self) -> AppResult<String> {
        let js_code = format!(
            r#"
            (() => {{
                const titleEl = document.querySelector({title});
                return titleEl ? titleEl.innerText : document.title;
            }})()
            "#,
            title = Self::js_str(&self.selectors.title)?,
        );
        self.executor.eval_as("video_title", js_code).await
    }

    async fn show_loading(&self) -> AppResult<()> {
        let js_code = format!(
            r#"
            (() => {{
                if (document.getElementById('spoiler-overlay')) return false;
                const overlay = document.createElement('div');
                overlay.id = 'spoiler-overlay';
                overlay.className = 'spoiler-overlay';

                const spinner = document.createElement('div');
                spinner.className = 'spoiler-spinner';
                const message = document.createElement('div');
                message.className = 'spoiler-message';
                message.textContent = 'Checking for spoilers...';
                const submessage = document.createElement('div');
                submessage.className = 'spoiler-submessage';
                submessage.textContent = 'Analyzing comments to keep your viewing experience spoiler-free';
                overlay.append(spinner, message, submessage);

                const section = document.querySelector({section});
                if (section) {{
                    const contents = section.querySelector({contents});
                    if (contents) section.insertBefore(overlay, contents);
                    else section.appendChild(overlay);
                }} else {{
                    document.body.appendChild(overlay);
                }}
                return true;
            }})()
            "#,
            section = Self::js_str(&self.selectors.section)?,
            contents = Self::js_str(&self.selectors.contents)?,
        );
        self.run_void(js_code).await
    }

    async fn hide_loading(&self) -> AppResult<()> {
        self.run_void(
            r#"
            (() => {
                const overlay = document.getElementById('spoiler-overlay');
                if (overlay) overlay.remove();
                return true;
            })()
            "#
            .to_string(),
        )
        .await
    }

    async fn show_notice(&self, notice: Notice) -> AppResult<()> {
        let (class_name, at_section) = match &notice {
            Notice::Error { .. } => ("spoiler-overlay spoiler-error", false),
            Notice::SpoilersHidden { .. } => ("spoiler-overlay spoiler-summary", true),
        };

        let js_code = format!(
            r#"
            (() => {{
                const box = document.createElement('div');
                box.className = {class_name};
                const message = document.createElement('div');
                message.className = 'spoiler-message';
                message.textContent = {text};
                box.appendChild(message);

                const section = {at_section} ? document.querySelector({section}) : null;
                if (section) section.insertBefore(box, section.firstChild);
                else document.body.appendChild(box);

                setTimeout(() => {{ if (box.parentNode) box.remove(); }}, {millis});
                return true;
            }})()
            "#,
            class_name = Self::js_str(class_name)?,
            text = Self::js_str(&notice.text())?,
            at_section = at_section,
            section = Self::js_str(&self.selectors.section)?,
            millis = duration_millis(notice.duration()),
        );
        self.run_void(js_code).await
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
