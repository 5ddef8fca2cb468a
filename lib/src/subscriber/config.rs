// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides the configuration of a subscriber - the connection it opens, the cadence
//! of its polling loop and the limits it decodes incoming messages under.

use crate::core::config::Config;
use crate::transport::{
    NetworkAddressUrl, PubSubConnectionConfig, TransportProfile, PROFILE_URI_UDP_UADP,
};
use crate::types::{constants, DecodingOptions};

/// The url subscribed to when none is supplied, from the PubSub tutorials
pub const DEFAULT_NETWORK_ADDRESS_URL: &str = "opc.udp://224.0.0.22:4840/";

/// Interval between polls of the connection, in milliseconds
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 100;

/// How long a single receive may block, in milliseconds
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 5;

/// Size of the buffer a datagram is received into. Anything longer is truncated by the
/// socket, so this bounds the size of NetworkMessage the subscriber accepts.
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 512;

/// Limits applied to incoming messages, settable from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingLimits {
    pub max_message_size: usize,
    pub max_string_length: usize,
    pub max_byte_string_length: usize,
    pub max_array_length: usize,
}

impl Default for DecodingLimits {
    fn default() -> Self {
        DecodingLimits {
            max_message_size: constants::MAX_MESSAGE_SIZE,
            max_string_length: constants::MAX_STRING_LENGTH,
            max_byte_string_length: constants::MAX_BYTE_STRING_LENGTH,
            max_array_length: constants::MAX_ARRAY_LENGTH,
        }
    }
}

impl DecodingLimits {
    pub fn decoding_options(&self) -> DecodingOptions {
        DecodingOptions {
            max_message_size: self.max_message_size,
            max_string_length: self.max_string_length,
            max_byte_string_length: self.max_byte_string_length,
            max_array_length: self.max_array_length,
        }
    }
}

/// The configuration of a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// Name given to the PubSub connection
    pub connection_name: String,
    /// Transport profile uri, one of the UADP profiles
    pub transport_profile: String,
    /// The `opc.udp://` (or `opc.eth://`) url messages are published on
    pub url: String,
    /// Optional local network interface to receive on
    pub network_interface: Option<String>,
    /// Interval of the polling loop in milliseconds
    pub polling_interval_ms: u64,
    /// Bound on a single receive in milliseconds
    pub receive_timeout_ms: u64,
    /// Size of the receive buffer in bytes
    pub receive_buffer_size: usize,
    pub decoding_limits: DecodingLimits,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        SubscriberConfig::new(DEFAULT_NETWORK_ADDRESS_URL)
    }
}

impl Config for SubscriberConfig {
    fn is_valid(&self) -> bool {
        let mut valid = true;
        if self.connection_name.is_empty() {
            error!("Config is invalid - connection name is empty");
            valid = false;
        }
        if TransportProfile::from_uri(&self.transport_profile).is_err() {
            error!(
                "Config is invalid - transport profile \"{}\" is not a UADP profile",
                self.transport_profile
            );
            valid = false;
        }
        if self.polling_interval_ms == 0 {
            error!("Config is invalid - polling interval must be at least 1ms");
            valid = false;
        }
        if self.receive_timeout_ms == 0 || self.receive_timeout_ms > self.polling_interval_ms {
            error!("Config is invalid - receive timeout must be between 1ms and the polling interval");
            valid = false;
        }
        if self.receive_buffer_size < 16 {
            error!("Config is invalid - receive buffer is too small to hold any message");
            valid = false;
        }
        valid
    }
}

impl SubscriberConfig {
    pub fn new(url: &str) -> SubscriberConfig {
        SubscriberConfig {
            connection_name: "UADP Connection 1".to_string(),
            transport_profile: PROFILE_URI_UDP_UADP.to_string(),
            url: url.to_string(),
            network_interface: None,
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            decoding_limits: DecodingLimits::default(),
        }
    }

    /// The connection this configuration describes. Fails when the transport profile
    /// uri is not one of the UADP profiles.
    pub fn connection_config(&self) -> Result<PubSubConnectionConfig, crate::types::StatusCode> {
        let transport_profile = TransportProfile::from_uri(&self.transport_profile)?;
        let address = match self.network_interface {
            Some(ref interface) => NetworkAddressUrl::new_with_interface(&self.url, interface),
            None => NetworkAddressUrl::new(&self.url),
        };
        Ok(PubSubConnectionConfig::new(
            &self.connection_name,
            transport_profile,
            address,
        ))
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SubscriberConfig::default().is_valid());
    }

    #[test]
    fn invalid_configs() {
        let mut config = SubscriberConfig::default();
        config.transport_profile = "http://opcfoundation.org/UA-Profile/Transport/pubsub-amqp-json".to_string();
        assert!(!config.is_valid());

        let mut config = SubscriberConfig::default();
        config.receive_timeout_ms = config.polling_interval_ms + 1;
        assert!(!config.is_valid());

        let mut config = SubscriberConfig::default();
        config.polling_interval_ms = 0;
        assert!(!config.is_valid());
    }

    #[test]
    fn save_and_load() {
        let tmp_dir = TempDir::new("subscriber_config").unwrap();
        let path = tmp_dir.path().join("subscriber.conf");

        let mut config = SubscriberConfig::new("opc.udp://239.0.0.1:14840/");
        config.network_interface = Some("192.168.1.2".to_string());
        config.save(&path).unwrap();

        let config2: SubscriberConfig = SubscriberConfig::load(&path).unwrap();
        assert_eq!(config, config2);
    }
}
