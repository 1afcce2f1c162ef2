//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use coverlink_config::ConfigError;
use coverlink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device ───────────────────────────────────────────────────────
    #[error("Device {device} did not respond")]
    #[diagnostic(
        code(coverlink::unreachable),
        help(
            "Check that the device is powered and reachable on the local network.\n\
             Raise `retries` or `attempt_timeout_ms` in the configuration if it is slow."
        )
    )]
    Unreachable {
        device: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Device timed out after {timeout_ms}ms")]
    #[diagnostic(code(coverlink::timeout))]
    Timeout { timeout_ms: u64 },

    #[error("Device transport failed: {message}")]
    #[diagnostic(
        code(coverlink::transport),
        help("Check the device's protocol_version and local key.")
    )]
    Transport { message: String },

    #[error("Device rejected the request: {message}")]
    #[diagnostic(code(coverlink::rejected))]
    Rejected { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(coverlink::not_found),
        help("Run: coverlink {list_command} to see what is configured")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("No devices configured")]
    #[diagnostic(
        code(coverlink::no_devices),
        help(
            "Create a starter file with: coverlink config init\n\
             Expected at: {path}"
        )
    )]
    NoDevices { path: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(coverlink::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(coverlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(coverlink::config),
        help("Inspect the resolved configuration with: coverlink config show")
    )]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } | Self::Transport { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::NoDevices { .. } | Self::Config { .. } | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::RetriesExhausted {
                device_id,
                operation,
                attempts,
                last_error,
            } => CliError::Unreachable {
                device: device_id,
                source: format!("{operation} failed after {attempts} attempts: {last_error}")
                    .into(),
            },

            CoreError::ConnectionFailed { host, reason } => CliError::Unreachable {
                device: host,
                source: reason.into(),
            },

            CoreError::Timeout { timeout_ms } => CliError::Timeout { timeout_ms },

            CoreError::Transport { message } => CliError::Transport { message },

            CoreError::Rejected { message } => CliError::Rejected { message },

            CoreError::DataPointNotFound { index } => CliError::NotFound {
                resource_type: "data point".into(),
                identifier: index.to_string(),
                list_command: "covers list".into(),
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownDevice { name } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: name,
                list_command: "covers list".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
