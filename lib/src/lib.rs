// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! An OPC UA PubSub stack for the UADP message mapping. The crate provides the
//! built-in types and binary encoding that UADP dataset fields are expressed in,
//! a codec for the UADP NetworkMessage / DataSetMessage framing, a UDP multicast
//! transport, and a polling subscriber runtime that receives, decodes and
//! dispatches dataset messages to readers.

// Status codes carry their standard names
#![allow(non_upper_case_globals)]
#![allow(clippy::len_without_is_empty)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate serde_derive;

/// Tracing macro for obtaining a lock on a `Mutex`. Sometimes deadlocks can happen in code,
/// and if they do, this macro is useful for finding out where they happened.
#[macro_export]
macro_rules! trace_lock {
    ( $x:expr ) => {{
        let v = $x.lock();
        v
    }};
}

/// Tracing macro for obtaining a read lock on a `RwLock`.
#[macro_export]
macro_rules! trace_read_lock {
    ( $x:expr ) => {{
        let v = $x.read();
        v
    }};
}

/// Tracing macro for obtaining a write lock on a `RwLock`.
#[macro_export]
macro_rules! trace_write_lock {
    ( $x:expr ) => {{
        let v = $x.write();
        v
    }};
}

#[cfg(feature = "console-logging")]
pub mod console_logging;
pub mod core;
pub mod message;
pub mod subscriber;
pub mod sync;
pub mod transport;
pub mod types;

pub mod prelude {
    pub use crate::core::config::Config;
    pub use crate::message::*;
    pub use crate::subscriber::*;
    pub use crate::transport::*;
    pub use crate::types::*;
}
