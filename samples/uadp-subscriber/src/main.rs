// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! This is a sample subscriber that listens on a UADP PubSub connection, decodes the
//! NetworkMessages that arrive on it and prints the well-known field kinds out of every
//! key frame - the receiving half of the PubSub tutorial pair. Run `uadp-publisher`
//! alongside it to see values flow.
use std::process;

use log::info;

use opcua_pubsub::prelude::*;

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
            r#"UADP subscriber
Usage: uadp-subscriber [uri] [device]
  -h, --help   Show help
  uri          opc.udp://host:port/ multicast url or opc.eth://interface (default: {})
  device       Interface name, required with an opc.eth:// uri"#,
            DEFAULT_NETWORK_ADDRESS_URL
        );
    }
}

fn main() {
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

    let mut config = SubscriberConfig::new(&url);
    config.transport_profile = transport_profile.uri().to_string();
    config.network_interface = network_interface;

    // A reader with no filters takes every dataset message that arrives on the connection
    let mut reader_group = ReaderGroup::new("Subscriber ReaderGroup");
    reader_group.add(DataSetReader::new("UADP tutorial reader"));

    let subscriber = SubscriberBuilder::new()
        .config(config)
        .add_reader_group(reader_group)
        .data_set_callback(print_data_set)
        .subscriber();

    if let Err(status) = subscriber.run() {
        eprintln!("Error: subscriber stopped with {}", status);
        process::exit(1);
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

/// Prints the two field kinds the tutorial publisher sends - a Byte and a DateTime
fn print_data_set(_reader: &DataSetReader, data_set: DataSet) {
    // Only the full values in key frames are of interest
    if data_set.message_type != DataSetMessageType::KeyFrame {
        return;
    }
    for field in &data_set.fields {
        match field.value.value {
            Some(Variant::Byte(value)) => {
                info!("Message content: [Byte] Received data: {}", value);
            }
            Some(Variant::DateTime(ref value)) => {
                info!("Message content: [DateTime] Received date/time: {}", value);
            }
            _ => {}
        }
    }
}
