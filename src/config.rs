use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use log::debug;
use mac_address::MacAddress;
use serde_derive::Deserialize;
use uuid::Uuid;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "govee.toml";

const DEFAULT_ADDRESS: [u8; 6] = [0xA4, 0xC1, 0x38, 0xD3, 0x81, 0x44];

/// Control characteristic of the H613E/H6159 family.
pub const CONTROL_CHARACTERISTIC: Uuid = Uuid::from_u128(0x00010203_0405_0607_0809_0a0b0c0d2b11);

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    pub device: Option<DeviceConfig>,
    pub transport: Option<TransportConfig>,
    pub scan: Option<ScanConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct DeviceConfig {
    pub address: Option<MacAddress>,
    pub characteristic: Option<Uuid>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct TransportConfig {
    pub discovery_timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
    pub write_with_response: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ScanConfig {
    pub duration_seconds: Option<u64>,
    pub named_only: Option<bool>,
}

impl AppConfig {
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::de::from_str(contents)?)
    }

    /// Reads `path` if given, otherwise `govee.toml` when it exists, otherwise
    /// falls back to built-in defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
                    return Ok(AppConfig::default());
                }
                default
            }
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn address(&self) -> MacAddress {
        self.device
            .as_ref()
            .and_then(|d| d.address)
            .unwrap_or_else(|| MacAddress::new(DEFAULT_ADDRESS))
    }

    pub fn characteristic(&self) -> Uuid {
        self.device
            .as_ref()
            .and_then(|d| d.characteristic)
            .unwrap_or(CONTROL_CHARACTERISTIC)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(
            self.transport
                .as_ref()
                .and_then(|t| t.discovery_timeout_seconds)
                .unwrap_or(10),
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.transport
                .as_ref()
                .and_then(|t| t.connect_timeout_seconds)
                .unwrap_or(10),
        )
    }

    pub fn write_with_response(&self) -> bool {
        self.transport
            .as_ref()
            .and_then(|t| t.write_with_response)
            .unwrap_or(false)
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(
            self.scan
                .as_ref()
                .and_then(|s| s.duration_seconds)
                .unwrap_or(5),
        )
    }

    pub fn scan_named_only(&self) -> bool {
        self.scan
            .as_ref()
            .and_then(|s| s.named_only)
            .unwrap_or(false)
    }
}
