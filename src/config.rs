//! YAML configuration for the client, conventionally installed at
//! `/etc/nabaztag/nabaztagconfig.yaml`.

use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Describes configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Read(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,

    /// Network interface whose MAC address identifies this device to the
    /// server, e.g. `wlan0`.
    pub interface: String,

    pub serial: SerialConfig,
    pub urls: UrlConfig,

    #[serde(default)]
    pub logs: LogConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub hostname: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct SerialConfig {
    /// Serial device path, e.g. `/dev/ttyO1`.
    pub port: String,
    pub rate: u32,
}

#[derive(Debug, Deserialize)]
pub struct UrlConfig {
    /// Websocket URL template with `{host}`, `{port}` and `{identifier}`
    /// placeholders.
    pub wsurl: String,

    /// Base POST URL template for device updates, same placeholders.
    pub posturl: String,

    #[serde(default = "default_location_url")]
    pub locationurl: String,
}

fn default_location_url() -> String {
    "http://localhost/nabaztag/api/location".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct LogConfig {
    /// Log file path. When unset the log goes to stderr.
    #[serde(default)]
    pub client: Option<String>,
}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&contents)?)
}

/// Expands a URL template's `{host}`, `{port}` and `{identifier}`
/// placeholders.
pub fn expand_url(template: &str, host: &str, port: u16, identifier: &str) -> String {
    template
        .replace("{host}", host)
        .replace("{port}", &port.to_string())
        .replace("{identifier}", identifier)
}

/// Returns the MAC address of the given network interface, read from sysfs.
pub fn device_identifier(interface: &str) -> io::Result<String> {
    let address = fs::read_to_string(format!("/sys/class/net/{}/address", interface))?;
    Ok(address.trim().to_string())
}
