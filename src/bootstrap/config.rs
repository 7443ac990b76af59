//! # Configuration Loader / 配置加载器
//!
//! ## Responsibilities / 职责
//!
//! - Read the TOML configuration file / 读取 TOML 配置文件
//! - Parse TOML into the `AppConfig` DTO / 将 TOML 解析为 AppConfig DTO
//! - Report I/O and parsing errors with context / 报告带上下文的 I/O 和解析错误
//!
//! Defaults are applied by the use cases, never here.
//! 默认值由用例层负责，此处不处理。

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;
use uc_core::config::AppConfig;

const CONFIG_DIR_NAME: &str = "uniclipboard";
const CONFIG_FILE_NAME: &str = "pairing.toml";

/// Load configuration from a TOML file
/// 从 TOML 文件加载配置
///
/// # Errors / 错误
///
/// Returns error if the file cannot be read or is not valid TOML.
/// 文件无法读取或不是有效 TOML 时返回错误。
pub fn load_config(config_path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    let toml_value: toml::Value =
        toml::from_str(&content).context("Failed to parse config as TOML")?;
    AppConfig::from_toml(&toml_value)
}

/// `<config_dir>/uniclipboard/pairing.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Resolve the configuration for this run.
/// 解析本次运行的配置。
///
/// An explicit path must exist. Without one, the default location is used
/// and a missing file yields an empty config.
pub fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => load_config(&path),
        Some(path) => {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(AppConfig::empty())
        }
        None => Ok(AppConfig::empty()),
    }
}
