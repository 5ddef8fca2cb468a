// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides the PubSub connection layer - the transport profiles, the network address
//! url they apply to, and the UDP implementation that receives and sends datagrams.

use url::Url;

use crate::types::status_code::StatusCode;

mod udp;

pub use self::udp::UdpPubSubConnection;

/// Transport profile URI for UADP over UDP, from OPC UA Part 7
pub const PROFILE_URI_UDP_UADP: &str =
    "http://opcfoundation.org/UA-Profile/Transport/pubsub-udp-uadp";
/// Transport profile URI for UADP over raw Ethernet, from OPC UA Part 7
pub const PROFILE_URI_ETH_UADP: &str =
    "http://opcfoundation.org/UA-Profile/Transport/pubsub-eth-uadp";

pub const OPC_UDP_SCHEME: &str = "opc.udp";
pub const OPC_ETH_SCHEME: &str = "opc.eth";

/// If no port is supplied in an `opc.udp://` url, this is the port that is used
pub const DEFAULT_UADP_PORT: u16 = 4840;

/// The transport a PubSub connection runs over.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransportProfile {
    /// UADP NetworkMessages in UDP datagrams, typically multicast
    UdpUadp,
    /// UADP NetworkMessages in raw Ethernet frames. Recognized but not implemented
    /// by this stack - opening a connection with this profile fails.
    EthUadp,
}

impl TransportProfile {
    pub fn from_uri(uri: &str) -> Result<TransportProfile, StatusCode> {
        match uri {
            PROFILE_URI_UDP_UADP => Ok(TransportProfile::UdpUadp),
            PROFILE_URI_ETH_UADP => Ok(TransportProfile::EthUadp),
            uri => {
                error!("Transport profile uri \"{}\" is not recognized", uri);
                Err(StatusCode::BadInvalidArgument)
            }
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            TransportProfile::UdpUadp => PROFILE_URI_UDP_UADP,
            TransportProfile::EthUadp => PROFILE_URI_ETH_UADP,
        }
    }
}

/// The address a PubSub connection attaches to - an `opc.udp://host:port/` or
/// `opc.eth://interface` url, plus the optional name of the local network interface
/// to receive on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAddressUrl {
    /// Name or address of the local interface to use, empty / None for any
    pub network_interface: Option<String>,
    /// The address url
    pub url: String,
}

impl NetworkAddressUrl {
    pub fn new(url: &str) -> NetworkAddressUrl {
        NetworkAddressUrl {
            network_interface: None,
            url: url.to_string(),
        }
    }

    pub fn new_with_interface(url: &str, network_interface: &str) -> NetworkAddressUrl {
        NetworkAddressUrl {
            network_interface: Some(network_interface.to_string()),
            url: url.to_string(),
        }
    }

    /// Validates and splits an `opc.udp://` url into its host and port, supplying the
    /// default port if the url doesn't name one.
    pub fn host_and_port(&self) -> Result<(String, u16), StatusCode> {
        let url = Url::parse(&self.url).map_err(|err| {
            error!("Cannot parse url \"{}\", error = {:?}", self.url, err);
            StatusCode::BadInvalidArgument
        })?;
        if url.scheme() != OPC_UDP_SCHEME || !url.has_host() {
            error!("Url \"{}\" is not a valid opc.udp url", self.url);
            Err(StatusCode::BadInvalidArgument)
        } else {
            let host = url.host_str().unwrap();
            let port = url.port().unwrap_or(DEFAULT_UADP_PORT);
            Ok((host.to_string(), port))
        }
    }

    pub fn is_opc_udp(&self) -> bool {
        matches!(Url::parse(&self.url), Ok(url) if url.scheme() == OPC_UDP_SCHEME)
    }
}

/// Everything needed to open a PubSub connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubSubConnectionConfig {
    /// A name for the connection, used in log output
    pub name: String,
    pub transport_profile: TransportProfile,
    pub address: NetworkAddressUrl,
}

impl PubSubConnectionConfig {
    pub fn new(name: &str, transport_profile: TransportProfile, address: NetworkAddressUrl) -> Self {
        PubSubConnectionConfig {
            name: name.to_string(),
            transport_profile,
            address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_host_and_port() {
        let address = NetworkAddressUrl::new("opc.udp://224.0.0.22:4840/");
        assert_eq!(
            address.host_and_port().unwrap(),
            ("224.0.0.22".to_string(), 4840)
        );

        // Default port is supplied when the url omits it
        let address = NetworkAddressUrl::new("opc.udp://224.0.0.22/");
        assert_eq!(
            address.host_and_port().unwrap(),
            ("224.0.0.22".to_string(), 4840)
        );

        let address = NetworkAddressUrl::new("opc.udp://localhost:14840/");
        assert_eq!(
            address.host_and_port().unwrap(),
            ("localhost".to_string(), 14840)
        );
    }

    #[test]
    fn url_invalid() {
        assert_eq!(
            NetworkAddressUrl::new("http://224.0.0.22:4840/")
                .host_and_port()
                .unwrap_err(),
            StatusCode::BadInvalidArgument
        );
        assert_eq!(
            NetworkAddressUrl::new("not a url at all")
                .host_and_port()
                .unwrap_err(),
            StatusCode::BadInvalidArgument
        );
    }

    #[test]
    fn url_scheme() {
        assert!(NetworkAddressUrl::new("opc.udp://224.0.0.22:4840/").is_opc_udp());
        assert!(!NetworkAddressUrl::new("opc.eth://eth0").is_opc_udp());
    }

    #[test]
    fn transport_profile_uri() {
        assert_eq!(
            TransportProfile::from_uri(PROFILE_URI_UDP_UADP).unwrap(),
            TransportProfile::UdpUadp
        );
        assert_eq!(
            TransportProfile::from_uri(PROFILE_URI_ETH_UADP).unwrap(),
            TransportProfile::EthUadp
        );
        assert!(TransportProfile::from_uri("http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary").is_err());
    }
}
