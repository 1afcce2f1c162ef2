use thiserror::Error;

/// Top-level error type for the `coverlink-api` crate.
///
/// Covers every failure mode a device client can report. Only the
/// connectivity family is worth retrying; `coverlink-core` maps the rest
/// into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connectivity ────────────────────────────────────────────────
    /// The device could not be reached (refused, unreachable, reset).
    #[error("Cannot reach device at {host}: {reason}")]
    Connection { host: String, reason: String },

    /// A single exchange with the device took too long.
    #[error("Device did not answer within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Socket-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device answered with a frame that could not be decoded
    /// (bad checksum, wrong key, truncated payload).
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ── Device-side rejections ──────────────────────────────────────
    /// The device understood the request and refused it.
    #[error("Device rejected the request: {message}")]
    Rejected { message: String },

    /// The requested data point does not exist on this device.
    #[error("Unknown data point {index}")]
    UnknownDataPoint { index: u32 },

    /// The value cannot be written to the data point.
    #[error("Invalid value for data point {index}: {reason}")]
    InvalidValue { index: u32, reason: String },
}

impl Error {
    /// Returns `true` for transport and protocol failures reaching the
    /// device. These are the only errors a caller should retry.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::Io(_) | Self::Protocol { .. }
        )
    }

    /// Returns `true` if the error names a data point the device lacks.
    pub fn is_unknown_data_point(&self) -> bool {
        matches!(self, Self::UnknownDataPoint { .. })
    }
}
