// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the OPC UA built-in types that UADP dataset fields are expressed in,
//! and the OPC UA Binary encoding (little-endian, OPC UA Part 6) they are
//! serialized with.

pub mod array;
pub mod basic_types;
pub mod byte_string;
pub mod data_value;
pub mod date_time;
pub mod encoding;
pub mod guid;
pub mod status_code;
pub mod string;
pub mod variant;

#[cfg(test)]
pub mod tests;

pub use self::{
    array::*, byte_string::ByteString, data_value::DataValue, date_time::*, encoding::*, guid::Guid,
    status_code::StatusCode, string::*, variant::*,
};

pub mod constants {
    /// Default maximum size in bytes of a decoded message
    pub const MAX_MESSAGE_SIZE: usize = 327_675;
    /// Default maximum length in bytes of a string
    pub const MAX_STRING_LENGTH: usize = 65_535;
    /// Default maximum length in bytes of a byte string
    pub const MAX_BYTE_STRING_LENGTH: usize = 65_535;
    /// Default maximum number of array elements
    pub const MAX_ARRAY_LENGTH: usize = 1000;
}
