//! 设置存储
//!
//! 只保存两项：`apiKey`（可缺省）和 `debugMode`。每次分类都重新读取，
//! 这样在设置编辑后无需重启就能生效。

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult, SettingsError};

/// 用户设置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub debug_mode: bool,
}

impl Settings {
    /// 已配置且非空的 API Key
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

enum Backing {
    File(PathBuf),
    Memory(RwLock<Settings>),
}

/// 键值设置存储
pub struct SettingsStore {
    backing: Backing,
}

impl SettingsStore {
    /// 以 TOML 文件为后端
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backing: Backing::File(path.into()),
        }
    }

    /// 纯内存存储
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            backing: Backing::Memory(RwLock::new(settings)),
        }
    }

    /// 读取当前设置；文件不存在时返回默认值
    pub fn load(&self) -> AppResult<Settings> {
        match &self.backing {
            Backing::File(path) => load_file(path),
            Backing::Memory(lock) => lock
                .read()
                .map(|settings| settings.clone())
                .map_err(|_| AppError::Other("设置存储锁已中毒".to_string())),
        }
    }

    /// 保存设置
    ///
    /// 与设置表单一致：API Key 去掉首尾空白，空字符串视为未配置。
    pub fn save(&self, settings: &Settings) -> AppResult<()> {
        let normalized = Settings {
            api_key: settings
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            debug_mode: settings.debug_mode,
        };

        match &self.backing {
            Backing::File(path) => save_file(path, &normalized),
            Backing::Memory(lock) => {
                let mut guard = lock
                    .write()
                    .map_err(|_| AppError::Other("设置存储锁已中毒".to_string()))?;
                *guard = normalized;
                Ok(())
            }
        }
    }
}

fn load_file(path: &Path) -> AppResult<Settings> {
    if !path.exists() {
        debug!("设置文件不存在，使用默认设置: {}", path.display());
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::ReadFailed {
        path: path.display().to_string(),
        source,
    })?;

    let settings = toml::from_str(&content).map_err(|source| SettingsError::TomlParseFailed {
        path: path.display().to_string(),
        source,
    })?;

    Ok(settings)
}

fn save_file(path: &Path, settings: &Settings) -> AppResult<()> {
    let content = toml::to_string(settings).map_err(SettingsError::from)?;
    std::fs::write(path, content).map_err(|source| SettingsError::WriteFailed {
        path: path.display().to_string(),
        source,
    })?;
    debug!("设置已保存: {}", path.display());
    Ok(())
}
