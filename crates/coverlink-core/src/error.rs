// ── Core error types ──
//
// User-facing errors from coverlink-core. Consumers never match on raw
// transport failures; the `From<coverlink_api::Error>` impl translates
// them into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    /// Every attempt of one logical operation failed with a connectivity
    /// error.
    #[error("Device {device_id} unreachable: {operation} failed after {attempts} attempts ({last_error})")]
    RetriesExhausted {
        device_id: String,
        operation: &'static str,
        attempts: u32,
        last_error: String,
    },

    #[error("Cannot connect to device at {host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("Device connection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Socket or framing failure below the data-point layer.
    #[error("Device transport error: {message}")]
    Transport { message: String },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Operation rejected by device: {message}")]
    Rejected { message: String },

    #[error("Data point {index} not found on device")]
    DataPointNotFound { index: u32 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` if the failure came from not reaching the device,
    /// as opposed to the device refusing or the caller misusing the API.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::RetriesExhausted { .. }
                | Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::Transport { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<coverlink_api::Error> for CoreError {
    fn from(err: coverlink_api::Error) -> Self {
        match err {
            coverlink_api::Error::Connection { host, reason } => {
                CoreError::ConnectionFailed { host, reason }
            }
            coverlink_api::Error::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            coverlink_api::Error::Io(e) => CoreError::Transport {
                message: e.to_string(),
            },
            coverlink_api::Error::Protocol { message } => CoreError::Transport {
                message: format!("protocol error: {message}"),
            },
            coverlink_api::Error::Rejected { message } => CoreError::Rejected { message },
            coverlink_api::Error::UnknownDataPoint { index } => {
                CoreError::DataPointNotFound { index }
            }
            coverlink_api::Error::InvalidValue { index, reason } => CoreError::ValidationFailed {
                message: format!("data point {index}: {reason}"),
            },
        }
    }
}
