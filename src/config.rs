//! TOML settings file
//!
//! All keys are optional; anything left out keeps its default.
//!
//! ```toml
//! [serial]
//! poll_interval_ms = 10
//! max_stalls = 100
//! send_timeout_ms = 1000
//! block_timeout_ms = "0x1388"
//! flush_window_ms = 50
//!
//! [port]
//! retries = 5
//! retry_interval_ms = 200
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use p2kflash_flash::{JobOptions, LeasePolicy};
use p2kflash_serial::ChannelConfig;
use thiserror::Error;

/// Errors loading a settings file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    /// File is not valid TOML or has bad values
    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    #[serde(default)]
    serial: TomlSerial,
    #[serde(default)]
    port: TomlPort,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlSerial {
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    poll_interval_ms: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    max_stalls: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    send_timeout_ms: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    block_timeout_ms: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    flush_window_ms: Option<u32>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlPort {
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    retries: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    retry_interval_ms: Option<u32>,
}

fn deserialize_opt_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    // Accept a plain integer or a "0x.." / decimal string
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(Some(n)),
        HexOrInt::Str(s) => parse_number(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

fn millis(value: Option<u32>, default: Duration) -> Duration {
    value.map_or(default, |ms| Duration::from_millis(u64::from(ms)))
}

/// Parse settings from a TOML string
pub fn parse_config(content: &str) -> Result<JobOptions, ConfigError> {
    let file: TomlConfig = toml::from_str(content)?;
    let channel_default = ChannelConfig::default();
    let lease_default = LeasePolicy::default();

    let channel = ChannelConfig {
        poll_interval: millis(file.serial.poll_interval_ms, channel_default.poll_interval),
        max_stalls: file.serial.max_stalls.unwrap_or(channel_default.max_stalls),
        send_timeout: millis(file.serial.send_timeout_ms, channel_default.send_timeout),
        block_timeout: millis(file.serial.block_timeout_ms, channel_default.block_timeout),
        flush_window: millis(file.serial.flush_window_ms, channel_default.flush_window),
    };
    let lease = LeasePolicy {
        retries: file.port.retries.unwrap_or(lease_default.retries),
        retry_interval: millis(file.port.retry_interval_ms, lease_default.retry_interval),
    };

    Ok(JobOptions { channel, lease })
}

/// Load settings, or the defaults when no file is given
pub fn load_config(path: Option<&Path>) -> Result<JobOptions, ConfigError> {
    let Some(path) = path else {
        return Ok(JobOptions::default());
    };
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let options = parse_config(&content)?;
    log::debug!("Loaded settings from {}: {:?}", path.display(), options);
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        assert_eq!(parse_config("").unwrap(), JobOptions::default());
    }

    #[test]
    fn test_partial_override() {
        let options = parse_config(
            r#"
            [serial]
            max_stalls = 250
            block_timeout_ms = "0x1388"

            [port]
            retries = "0"
            "#,
        )
        .unwrap();

        assert_eq!(options.channel.max_stalls, 250);
        assert_eq!(options.channel.block_timeout, Duration::from_millis(5000));
        assert_eq!(
            options.channel.poll_interval,
            ChannelConfig::default().poll_interval
        );
        assert_eq!(options.lease.retries, 0);
        assert_eq!(
            options.lease.retry_interval,
            LeasePolicy::default().retry_interval
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse_config("[serial]\nmax_stalls = \"0xZZ\"").is_err());
        assert!(parse_config("[serial]\nbaud = 9600").is_err());
        assert!(parse_config("[serial]\nmax_stalls = -1").is_err());
    }

    #[test]
    fn test_no_file() {
        assert_eq!(load_config(None).unwrap(), JobOptions::default());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x10"), Ok(16));
        assert_eq!(parse_number(" 42 "), Ok(42));
        assert!(parse_number("").is_err());
    }
}
