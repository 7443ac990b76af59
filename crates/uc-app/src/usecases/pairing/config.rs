use std::time::Duration;

use uc_core::config::AppConfig;

const DEFAULT_SUCCESS_DISPLAY_MS: u64 = 1_500;
const DEFAULT_FAILURE_DISPLAY_MS: u64 = 3_000;
const DEFAULT_MAILBOX_CAPACITY: usize = 64;
const DEFAULT_SIGNAL_CAPACITY: usize = 16;

/// Runtime settings for [`super::PairingCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingCoordinatorConfig {
    /// How long `Complete` stays on display before returning to `Idle`.
    pub success_display: Duration,
    /// How long `Failed` stays on display before returning to `Idle`.
    pub failure_display: Duration,
    pub mailbox_capacity: usize,
    pub signal_capacity: usize,
    /// Local fallback while waiting in `PinVerifying`. Off when `None`.
    pub verification_timeout: Option<Duration>,
}

impl Default for PairingCoordinatorConfig {
    fn default() -> Self {
        Self {
            success_display: Duration::from_millis(DEFAULT_SUCCESS_DISPLAY_MS),
            failure_display: Duration::from_millis(DEFAULT_FAILURE_DISPLAY_MS),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
            verification_timeout: None,
        }
    }
}

impl PairingCoordinatorConfig {
    /// Apply defaults and clamp raw configuration values.
    pub fn from_app_config(config: &AppConfig) -> Self {
        let pairing = &config.pairing;
        let to_usize = |value: u64| usize::try_from(value).unwrap_or(usize::MAX);

        Self {
            success_display: Duration::from_millis(
                pairing
                    .success_display_ms
                    .unwrap_or(DEFAULT_SUCCESS_DISPLAY_MS)
                    .max(1),
            ),
            failure_display: Duration::from_millis(
                pairing
                    .failure_display_ms
                    .unwrap_or(DEFAULT_FAILURE_DISPLAY_MS)
                    .max(1),
            ),
            mailbox_capacity: pairing
                .mailbox_capacity
                .map(to_usize)
                .unwrap_or(DEFAULT_MAILBOX_CAPACITY)
                .max(1),
            signal_capacity: pairing
                .signal_capacity
                .map(to_usize)
                .unwrap_or(DEFAULT_SIGNAL_CAPACITY)
                .max(1),
            verification_timeout: pairing
                .verification_timeout_secs
                .map(|secs| Duration::from_secs(secs.max(1))),
        }
    }
}
