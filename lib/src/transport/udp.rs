// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! UDP implementation of the PubSub connection. A reader connection binds the port
//! named in the address url and joins the multicast group so that published
//! NetworkMessages arrive on it; a writer connection binds an ephemeral port and
//! sends to the group.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time;

use crate::transport::{NetworkAddressUrl, PubSubConnectionConfig, TransportProfile};
use crate::types::status_code::StatusCode;

#[derive(Debug)]
pub struct UdpPubSubConnection {
    /// Name of the connection, from its config
    name: String,
    socket: UdpSocket,
    /// The address NetworkMessages are published on
    group_address: SocketAddr,
}

impl UdpPubSubConnection {
    /// Creates the receiving side of a connection. The socket is bound to the port in the
    /// address url with SO_REUSEADDR set, so that publisher and subscriber tutorials can
    /// run on the same host, and is joined to the multicast group when the address is a
    /// multicast address.
    pub async fn reader(config: &PubSubConnectionConfig) -> Result<UdpPubSubConnection, StatusCode> {
        let group_address = Self::resolve_address(config)?;
        let bind_address = match group_address {
            SocketAddr::V4(addr) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), addr.port()),
            SocketAddr::V6(addr) => {
                SocketAddr::new(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), addr.port())
            }
        };
        let socket = Self::new_socket(&bind_address)?;
        socket.set_reuse_address(true).map_err(|err| {
            error!("Cannot set SO_REUSEADDR, error = {:?}", err);
            StatusCode::BadCommunicationError
        })?;
        socket.bind(&bind_address.into()).map_err(|err| {
            error!("Cannot bind socket to {}, error = {:?}", bind_address, err);
            StatusCode::BadCommunicationError
        })?;
        match group_address.ip() {
            IpAddr::V4(group) if group.is_multicast() => {
                let interface = Self::interface_v4(&config.address);
                socket.join_multicast_v4(&group, &interface).map_err(|err| {
                    error!("Cannot join multicast group {}, error = {:?}", group, err);
                    StatusCode::BadCommunicationError
                })?;
            }
            IpAddr::V6(group) if group.is_multicast() => {
                socket.join_multicast_v6(&group, 0).map_err(|err| {
                    error!("Cannot join multicast group {}, error = {:?}", group, err);
                    StatusCode::BadCommunicationError
                })?;
            }
            // A unicast address needs no registration, datagrams sent to the port just arrive
            _ => {}
        }
        let socket = Self::into_tokio_socket(socket)?;
        debug!(
            "Connection \"{}\" is listening for messages on {}",
            config.name, group_address
        );
        Ok(UdpPubSubConnection {
            name: config.name.clone(),
            socket,
            group_address,
        })
    }

    /// Creates the sending side of a connection. The socket is bound to an ephemeral port
    /// and datagrams are sent to the address in the url.
    pub async fn writer(config: &PubSubConnectionConfig) -> Result<UdpPubSubConnection, StatusCode> {
        let group_address = Self::resolve_address(config)?;
        let bind_address = match group_address {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => {
                SocketAddr::new(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), 0)
            }
        };
        let socket = Self::new_socket(&bind_address)?;
        socket.bind(&bind_address.into()).map_err(|err| {
            error!("Cannot bind socket to {}, error = {:?}", bind_address, err);
            StatusCode::BadCommunicationError
        })?;
        let socket = Self::into_tokio_socket(socket)?;
        debug!(
            "Connection \"{}\" will publish messages to {}",
            config.name, group_address
        );
        Ok(UdpPubSubConnection {
            name: config.name.clone(),
            socket,
            group_address,
        })
    }

    /// Performs a bounded-time receive of one datagram. Returns the number of bytes
    /// received, which may be 0 for an empty datagram, or `BadTimeout` when nothing
    /// arrived within the timeout.
    pub async fn receive(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, StatusCode> {
        match time::timeout(timeout, self.socket.recv_from(buf)).await {
            Err(_) => Err(StatusCode::BadTimeout),
            Ok(Err(err)) => {
                error!(
                    "Connection \"{}\" receive failed, error = {:?}",
                    self.name, err
                );
                Err(StatusCode::BadCommunicationError)
            }
            Ok(Ok((size, _))) => Ok(size),
        }
    }

    /// Sends one datagram to the group address
    pub async fn send(&self, bytes: &[u8]) -> Result<usize, StatusCode> {
        self.socket
            .send_to(bytes, &self.group_address)
            .await
            .map_err(|err| {
                error!("Connection \"{}\" send failed, error = {:?}", self.name, err);
                StatusCode::BadCommunicationError
            })
    }

    /// Resolves the address the connection receives on / publishes to
    pub fn resolve_address(config: &PubSubConnectionConfig) -> Result<SocketAddr, StatusCode> {
        match config.transport_profile {
            TransportProfile::UdpUadp => {}
            TransportProfile::EthUadp => {
                error!("Ethernet UADP transport is not supported by this stack");
                return Err(StatusCode::BadNotSupported);
            }
        }
        let (host, port) = config.address.host_and_port()?;
        // Resolve this host / port to an address (or not)
        let address = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|err| {
                error!("Cannot resolve host \"{}\", error = {:?}", host, err);
                StatusCode::BadCommunicationError
            })?
            .next();
        address.ok_or_else(|| {
            error!("Host \"{}\" did not resolve to any address", host);
            StatusCode::BadCommunicationError
        })
    }

    fn new_socket(bind_address: &SocketAddr) -> Result<Socket, StatusCode> {
        let domain = match bind_address {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };
        Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)).map_err(|err| {
            error!("Cannot create a UDP socket, error = {:?}", err);
            StatusCode::BadResourceUnavailable
        })
    }

    fn into_tokio_socket(socket: Socket) -> Result<UdpSocket, StatusCode> {
        socket.set_nonblocking(true).map_err(|err| {
            error!("Cannot set socket to non-blocking, error = {:?}", err);
            StatusCode::BadCommunicationError
        })?;
        UdpSocket::from_std(socket.into()).map_err(|err| {
            error!("Cannot register socket with the runtime, error = {:?}", err);
            StatusCode::BadCommunicationError
        })
    }

    /// The local interface to join the multicast group on. The tutorial-style urls name an
    /// interface by address; anything else falls back to letting the routing table choose.
    fn interface_v4(address: &NetworkAddressUrl) -> Ipv4Addr {
        match address.network_interface {
            Some(ref interface) => interface.parse().unwrap_or_else(|_| {
                warn!(
                    "Network interface \"{}\" is not an IPv4 address, using the default interface",
                    interface
                );
                Ipv4Addr::UNSPECIFIED
            }),
            None => Ipv4Addr::UNSPECIFIED,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::transport::*;
    use crate::types::StatusCode;

    fn test_config(url: &str) -> PubSubConnectionConfig {
        PubSubConnectionConfig::new(
            "test connection",
            TransportProfile::UdpUadp,
            NetworkAddressUrl::new(url),
        )
    }

    #[tokio::test]
    async fn receive_loopback() {
        // A reader on a loopback url receives whatever is sent to the port
        let config = test_config("opc.udp://127.0.0.1:48401/");
        let reader = UdpPubSubConnection::reader(&config).await.unwrap();
        let writer = UdpPubSubConnection::writer(&config).await.unwrap();

        let sent = writer.send(&[0x01, 0x02, 0x03]).await.unwrap();
        assert_eq!(sent, 3);

        let mut buf = [0u8; 512];
        let received = reader
            .receive(&mut buf, Duration::from_millis(1000))
            .await
            .unwrap();
        assert_eq!(received, 3);
        assert_eq!(&buf[..received], &[0x01, 0x02, 0x03]);
    }

    #[tokio::test]
    async fn receive_timeout() {
        let config = test_config("opc.udp://127.0.0.1:48402/");
        let reader = UdpPubSubConnection::reader(&config).await.unwrap();
        let mut buf = [0u8; 512];
        assert_eq!(
            reader
                .receive(&mut buf, Duration::from_millis(5))
                .await
                .unwrap_err(),
            StatusCode::BadTimeout
        );
    }

    #[tokio::test]
    async fn ethernet_is_not_supported() {
        let config = PubSubConnectionConfig::new(
            "test connection",
            TransportProfile::EthUadp,
            NetworkAddressUrl::new_with_interface("opc.eth://eth0", "eth0"),
        );
        assert_eq!(
            UdpPubSubConnection::reader(&config).await.unwrap_err(),
            StatusCode::BadNotSupported
        );
    }
}
