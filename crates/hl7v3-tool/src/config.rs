//! Tool configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HL7V3_VERSION` | 2011 | Protocol version (2006 or 2011) |
//! | `HL7V3_SENDER` | Sender | Sender device id extension |
//! | `HL7V3_RECEIVER` | Receiver | Default receiver device id extension |
//! | `HL7V3_DEVICE_ROOT` | 2.16.840.1.113883.19.2 | Device id root OID |
//! | `HL7V3_MESSAGE_ID_ROOT` | 2.16.840.1.113883.19.1 | Message id root OID |
//! | `HL7V3_LOG_LEVEL` | info | Log level |

use clap::Args;
use helios_hl7v3::datatypes::{DEFAULT_DEVICE_ID_ROOT, DEFAULT_MESSAGE_ID_ROOT};
use helios_hl7v3::{Device, DeviceRole, FormatterConfig, Hl7Version, IdentificationId};

/// Settings shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct ToolConfig {
    /// Protocol version written on generated envelopes (2006 or 2011).
    #[arg(long, env = "HL7V3_VERSION", default_value = "2011", global = true)]
    pub version: Hl7Version,

    /// Id extension of the local (sending) device.
    #[arg(long, env = "HL7V3_SENDER", default_value = "Sender", global = true)]
    pub sender: String,

    /// Id extension of the receiver used when the peer is unknown.
    #[arg(long, env = "HL7V3_RECEIVER", default_value = "Receiver", global = true)]
    pub receiver: String,

    /// Root OID of device ids.
    #[arg(
        long,
        env = "HL7V3_DEVICE_ROOT",
        default_value = DEFAULT_DEVICE_ID_ROOT,
        global = true
    )]
    pub device_root: String,

    /// Root OID of generated message ids.
    #[arg(
        long,
        env = "HL7V3_MESSAGE_ID_ROOT",
        default_value = DEFAULT_MESSAGE_ID_ROOT,
        global = true
    )]
    pub message_id_root: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "HL7V3_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            version: Hl7Version::V2011,
            sender: "Sender".to_string(),
            receiver: "Receiver".to_string(),
            device_root: DEFAULT_DEVICE_ID_ROOT.to_string(),
            message_id_root: DEFAULT_MESSAGE_ID_ROOT.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ToolConfig {
    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.sender.trim().is_empty() {
            errors.push("Sender device extension cannot be empty".to_string());
        }

        if self.receiver.trim().is_empty() {
            errors.push("Receiver device extension cannot be empty".to_string());
        }

        if !is_oid(&self.device_root) {
            errors.push(format!("Device root is not an OID: '{}'", self.device_root));
        }

        if !is_oid(&self.message_id_root) {
            errors.push(format!(
                "Message id root is not an OID: '{}'",
                self.message_id_root
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The formatter settings this configuration describes.
    pub fn formatter_config(&self) -> FormatterConfig {
        FormatterConfig {
            version: self.version,
            sender: Device::new(
                DeviceRole::Sender,
                IdentificationId::new(self.device_root.clone(), self.sender.clone()),
            ),
            default_receiver: Device::new(
                DeviceRole::Receiver,
                IdentificationId::new(self.device_root.clone(), self.receiver.clone()),
            ),
            message_id_root: self.message_id_root.clone(),
            indent: true,
            ..Default::default()
        }
    }
}

/// Dotted numeric form, e.g. `2.16.840.1`.
fn is_oid(value: &str) -> bool {
    !value.is_empty()
        && value
            .split('.')
            .all(|arc| !arc.is_empty() && arc.bytes().all(|b| b.is_ascii_digit()))
}

/// Initializes the tracing subscriber; `RUST_LOG` takes precedence.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("helios_hl7v3_tool={},helios_hl7v3={}", level, level))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ToolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.version, Hl7Version::V2011);
    }

    #[test]
    fn test_validate_rejects_empty_extensions_and_bad_oids() {
        let config = ToolConfig {
            sender: " ".to_string(),
            receiver: String::new(),
            device_root: "2.16..1".to_string(),
            message_id_root: String::new(),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors[2].contains("2.16..1"));
    }

    #[test]
    fn test_formatter_config_uses_device_root() {
        let config = ToolConfig {
            device_root: "1.2.3".to_string(),
            sender: "EHR".to_string(),
            ..Default::default()
        };
        let formatter = config.formatter_config();
        assert_eq!(formatter.sender.id().root(), "1.2.3");
        assert_eq!(formatter.sender.extension(), Some("EHR"));
        assert_eq!(formatter.default_receiver.role(), DeviceRole::Receiver);
        assert!(formatter.validate().is_ok());
    }
}
