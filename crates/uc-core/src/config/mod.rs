//! # Pure Data Module - Data Transfer Objects Only
//!
//! Maps the TOML configuration file onto plain data. Absent keys stay
//! `None`; defaults and clamping belong to the use cases that consume the
//! values (see `uc-app`'s `PairingCoordinatorConfig`).
//!
//! > **This module contains data only: no policy, no validation, no defaults.**

use std::path::PathBuf;

/// Application configuration DTO (pure data, no logic)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// `[general] device_name`
    pub device_name: Option<String>,
    pub pairing: PairingSection,
    /// `[logging] directory`
    pub log_directory: Option<PathBuf>,
    /// `[setup] status_file`
    pub setup_status_file: Option<PathBuf>,
}

/// `[pairing]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingSection {
    pub success_display_ms: Option<u64>,
    pub failure_display_ms: Option<u64>,
    pub mailbox_capacity: Option<u64>,
    pub signal_capacity: Option<u64>,
    pub verification_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Create AppConfig from TOML value
    ///
    /// **Prohibited**: no validation or default value logic here. Negative
    /// integers are dropped because they cannot be represented, nothing else
    /// is interpreted.
    pub fn from_toml(toml_value: &toml::Value) -> anyhow::Result<Self> {
        let pairing = toml_value.get("pairing");
        let pairing_u64 = |key: &str| {
            pairing
                .and_then(|p| p.get(key))
                .and_then(|v| v.as_integer())
                .and_then(|v| u64::try_from(v).ok())
        };

        Ok(Self {
            device_name: toml_value
                .get("general")
                .and_then(|g| g.get("device_name"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            pairing: PairingSection {
                success_display_ms: pairing_u64("success_display_ms"),
                failure_display_ms: pairing_u64("failure_display_ms"),
                mailbox_capacity: pairing_u64("mailbox_capacity"),
                signal_capacity: pairing_u64("signal_capacity"),
                verification_timeout_secs: pairing_u64("verification_timeout_secs"),
            },
            log_directory: toml_value
                .get("logging")
                .and_then(|l| l.get("directory"))
                .and_then(|v| v.as_str())
                .map(PathBuf::from),
            setup_status_file: toml_value
                .get("setup")
                .and_then(|s| s.get("status_file"))
                .and_then(|v| v.as_str())
                .map(PathBuf::from),
        })
    }

    /// Create empty AppConfig (every value absent)
    pub fn empty() -> Self {
        Self::default()
    }
}
