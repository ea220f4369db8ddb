//! Sender configuration loaded from a JSON file
//!
//! Key names follow the AES67 config file format shared with the other
//! tools in the deployment (`deviceMode`, `ptpDomain`, ...), hence the
//! camelCase renames.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::ConfigError;

/// Immutable process-wide sender configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderConfig {
    /// Must be "sender"; the same config file format also describes receivers
    pub device_mode: String,

    /// PTP clock domain to join
    #[serde(default)]
    pub ptp_domain: u8,

    /// Total number of source channels to transmit
    pub channel_count: u32,

    /// Maximum channels carried by one stream; the last stream may carry fewer
    pub channels_per_receiver: u32,

    /// Multicast group of stream 0; the last octet is incremented per stream
    pub base_multicast_address: Ipv4Addr,

    /// UDP port of stream 0; incremented per stream
    pub rtp_destination_port: u16,

    /// Output sample rate in Hz
    pub sampling_rate: u32,

    /// Local audio source endpoint name prefix; stream N reads from
    /// "{jack_client_name}_stream{N}"
    pub jack_client_name: String,
}

impl SenderConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SenderConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that the JSON schema alone cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_mode != "sender" {
            return Err(ConfigError::WrongDeviceMode(self.device_mode.clone()));
        }
        if self.channel_count == 0 {
            return Err(ConfigError::InvalidChannelCount);
        }
        if self.channels_per_receiver == 0 {
            return Err(ConfigError::InvalidChannelsPerReceiver);
        }
        if self.sampling_rate == 0 {
            return Err(ConfigError::InvalidSamplingRate);
        }
        if !self.base_multicast_address.is_multicast() {
            return Err(ConfigError::NotMulticast(self.base_multicast_address));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> String {
        r#"{
            "deviceMode": "sender",
            "channelCount": 16,
            "channelsPerReceiver": 8,
            "baseMulticastAddress": "239.1.1.0",
            "rtpDestinationPort": 5004,
            "samplingRate": 48000,
            "jackClientName": "aes67"
        }"#
        .to_string()
    }

    fn parse(json: &str) -> Result<SenderConfig, ConfigError> {
        let config: SenderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_valid_config() {
        let config = parse(&sample_json()).unwrap();
        assert_eq!(config.channel_count, 16);
        assert_eq!(config.channels_per_receiver, 8);
        assert_eq!(config.rtp_destination_port, 5004);
        assert_eq!(config.jack_client_name, "aes67");
    }

    #[test]
    fn test_ptp_domain_defaults_to_zero() {
        let config = parse(&sample_json()).unwrap();
        assert_eq!(config.ptp_domain, 0);
    }

    #[test]
    fn test_explicit_ptp_domain() {
        let json = sample_json().replace("\"deviceMode\"", "\"ptpDomain\": 7, \"deviceMode\"");
        let config = parse(&json).unwrap();
        assert_eq!(config.ptp_domain, 7);
    }

    #[test]
    fn test_receiver_mode_rejected() {
        let json = sample_json().replace("\"sender\"", "\"receiver\"");
        assert!(matches!(
            parse(&json),
            Err(ConfigError::WrongDeviceMode(mode)) if mode == "receiver"
        ));
    }

    #[test]
    fn test_zero_channel_count_rejected() {
        let json = sample_json().replace("\"channelCount\": 16", "\"channelCount\": 0");
        assert!(matches!(parse(&json), Err(ConfigError::InvalidChannelCount)));
    }

    #[test]
    fn test_zero_channels_per_receiver_rejected() {
        let json =
            sample_json().replace("\"channelsPerReceiver\": 8", "\"channelsPerReceiver\": 0");
        assert!(matches!(
            parse(&json),
            Err(ConfigError::InvalidChannelsPerReceiver)
        ));
    }

    #[test]
    fn test_unicast_base_address_rejected() {
        let json = sample_json().replace("239.1.1.0", "192.168.1.10");
        assert!(matches!(parse(&json), Err(ConfigError::NotMulticast(_))));
    }

    #[test]
    fn test_missing_key_is_parse_error() {
        let json = sample_json().replace("\"samplingRate\": 48000,", "");
        assert!(matches!(parse(&json), Err(ConfigError::Parse(_))));
    }
}
