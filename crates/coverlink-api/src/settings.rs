use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Default TCP port devices listen on for local control.
pub const DEFAULT_PORT: u16 = 6668;

/// Local protocol revision spoken by the device.
///
/// Determines frame layout and whether status replies are encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ProtocolVersion {
    /// Plain-text status replies, encrypted commands.
    #[serde(rename = "3.1")]
    #[strum(serialize = "3.1")]
    V31,
    /// Everything encrypted, version header on every frame.
    #[default]
    #[serde(rename = "3.3")]
    #[strum(serialize = "3.3")]
    V33,
}

/// Everything needed to open a connection to one device.
///
/// The local key is secret material; `Debug` output redacts it.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    /// IP address or hostname on the local network.
    pub host: String,
    /// TCP port (defaults to [`DEFAULT_PORT`]).
    pub port: u16,
    /// Vendor device identifier.
    pub device_id: String,
    /// Symmetric key negotiated when the device was paired.
    pub local_key: SecretString,
    pub protocol_version: ProtocolVersion,
}

impl DeviceSettings {
    pub fn new(
        host: impl Into<String>,
        device_id: impl Into<String>,
        local_key: SecretString,
        protocol_version: ProtocolVersion,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            device_id: device_id.into(),
            local_key,
            protocol_version,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `host:port` form used in log lines and connection errors.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
