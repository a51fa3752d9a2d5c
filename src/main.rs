use std::sync::Arc;

use anyhow::{Context, Result};
use comment_spoiler_shield::orchestrator::App;
use comment_spoiler_shield::utils::logging;
use comment_spoiler_shield::{Config, SettingsStore};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env().context("读取配置失败")?;

    // 设置里的调试开关决定日志级别
    let settings = Arc::new(SettingsStore::file(&config.settings_path));
    let debug_mode = settings.load().map(|s| s.debug_mode).unwrap_or(false);
    logging::init(debug_mode);
    logging::log_startup(config.browser_debug_port, config.batch_threshold, debug_mode);

    // 初始化并运行应用
    let app = App::initialize(config, settings)
        .await
        .context("初始化失败")?;
    app.run().await.context("运行失败")?;

    Ok(())
}
