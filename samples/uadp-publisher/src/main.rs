// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! This is a sample publisher that sends a key-frame DataSetMessage onto a UADP PubSub
//! connection every 100ms - the sending half of the PubSub tutorial pair. The dataset
//! holds a Byte counter and the current time, which is exactly what `uadp-subscriber`
//! prints.
use std::process;
use std::time::Duration;

use log::{info, warn};

use opcua_pubsub::prelude::*;

/// The ids the tutorial publisher is known by
const PUBLISHER_ID: u16 = 2234;
const WRITER_GROUP_ID: u16 = 100;
const DATA_SET_WRITER_ID: u16 = 62541;

/// Interval between published messages
const PUBLISHING_INTERVAL_MS: u64 = 100;

struct Args {
    help: bool,
    uri: Option<String>,
    device: Option<String>,
}

impl Args {
    pub fn parse_args() -> Result<Args, Box<dyn std::error::Error>> {
        let mut args = pico_args::Arguments::from_env();
        Ok(Args {
            help: args.contains(["-h", "--help"]),
            uri: args.opt_free_from_str()?,
            device: args.opt_free_from_str()?,
        })
    }

    pub fn usage() {
        println!(
            r#"UADP publisher
Usage: uadp-publisher [uri] [device]
  -h, --help   Show help
  uri          opc.udp://host:port/ multicast url or opc.eth://interface (default: {})
  device       Interface name, required with an opc.eth:// uri"#,
            DEFAULT_NETWORK_ADDRESS_URL
        );
    }
}

#[tokio::main]
async fn main() {
    let args = match Args::parse_args() {
        Ok(args) => args,
        Err(_) => {
            Args::usage();
            process::exit(1);
        }
    };
    if args.help {
        Args::usage();
        return;
    }
    let (transport_profile, url, network_interface) = match transport_from_args(&args) {
        Ok(address) => address,
        Err(message) => {
            eprintln!("{}", message);
            process::exit(1);
        }
    };

    // Optional - enable OPC UA logging
    opcua_pubsub::console_logging::init();

    let address = match network_interface {
        Some(ref interface) => NetworkAddressUrl::new_with_interface(&url, interface),
        None => NetworkAddressUrl::new(&url),
    };
    let config = PubSubConnectionConfig::new("UADP Connection 1", transport_profile, address);
    let connection = match UdpPubSubConnection::writer(&config).await {
        Ok(connection) => connection,
        Err(status) => {
            eprintln!("Error: cannot create the connection, status {}", status);
            process::exit(1);
        }
    };
    info!("The PubSub connection \"{}\" was created successfully", config.name);

    publish_loop(connection).await;
}

/// Publishes one key frame per interval until ctrl-c arrives
async fn publish_loop(connection: UdpPubSubConnection) {
    let mut timer = tokio::time::interval(Duration::from_millis(PUBLISHING_INTERVAL_MS));
    let mut counter = 0u8;
    let mut sequence_number = 0u16;
    loop {
        tokio::select! {
            _ = timer.tick() => {
                let message = next_message(counter, sequence_number);
                match connection.send(&message.encode_to_vec()).await {
                    Ok(_) => info!("Published message {} with counter {}", sequence_number, counter),
                    Err(status) => warn!("Publish failed with {}", status),
                }
                counter = counter.wrapping_add(1);
                sequence_number = sequence_number.wrapping_add(1);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Publisher is stopping on a quit signal");
                break;
            }
        }
    }
}

/// The message the subscriber tutorial documents itself against - publisher 2234,
/// writer group 100, dataset writer 62541, a Byte counter and the current DateTime
fn next_message(counter: u8, sequence_number: u16) -> UadpNetworkMessage {
    UadpNetworkMessage {
        publisher_id: Some(PublisherId::UInt16(PUBLISHER_ID)),
        group_header: Some(GroupHeader {
            writer_group_id: Some(WRITER_GROUP_ID),
            sequence_number: Some(sequence_number),
            ..Default::default()
        }),
        data_set_writer_ids: Some(vec![DATA_SET_WRITER_ID]),
        messages: vec![DataSetMessage {
            sequence_number: Some(sequence_number),
            ..DataSetMessage::key_frame(vec![
                Variant::Byte(counter),
                Variant::from(DateTime::now()),
            ])
        }],
        ..Default::default()
    }
}

/// Selects the transport from the uri the same way the tutorials do - `opc.udp://` urls
/// ride the UDP profile, `opc.eth://` urls the Ethernet profile and need an interface name.
fn transport_from_args(
    args: &Args,
) -> Result<(TransportProfile, String, Option<String>), String> {
    match args.uri {
        None => Ok((
            TransportProfile::UdpUadp,
            DEFAULT_NETWORK_ADDRESS_URL.to_string(),
            None,
        )),
        Some(ref uri) if uri.starts_with("opc.udp://") => {
            Ok((TransportProfile::UdpUadp, uri.clone(), None))
        }
        Some(ref uri) if uri.starts_with("opc.eth://") => match args.device {
            Some(ref device) => Ok((TransportProfile::EthUadp, uri.clone(), Some(device.clone()))),
            None => Err("Error: UADP/ETH needs an interface name".to_string()),
        },
        Some(_) => Err("Error: unknown URI".to_string()),
    }
}
