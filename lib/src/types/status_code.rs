// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the `StatusCode` type. OPC UA defines many hundreds of codes; this is the
//! hand-curated subset that the PubSub stack can actually raise or receive, together
//! with the severity / info bits every code carries.

use std::{
    error::Error,
    fmt,
    fmt::Formatter,
    io::{self, Read, Write},
};

use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::types::encoding::*;

bitflags! {
    pub struct StatusCode: u32 {
        // Severity bits
        const IS_ERROR     = 0x8000_0000;
        const IS_UNCERTAIN = 0x4000_0000;

        // Mask for the status code section
        const STATUS_MASK = 0xffff_0000;
        // Mask for the bits section
        const BIT_MASK = 0x0000_ffff;

        // Overflow bit 7
        const OVERFLOW       = 0b0000_0000_1000_0000;
        // Limit bits 8:9
        const LIMIT_LOW      = 0b0000_0001_0000_0000;
        const LIMIT_HIGH     = 0b0000_0010_0000_0000;
        const LIMIT_CONSTANT = 0b0000_0011_0000_0000;

        // The codes themselves. Values are from the OPC UA status code registry.
        const Good = 0x0000_0000;
        const UncertainLastUsableValue = 0x4090_0000;
        const BadUnexpectedError = 0x8001_0000;
        const BadInternalError = 0x8002_0000;
        const BadOutOfMemory = 0x8003_0000;
        const BadResourceUnavailable = 0x8004_0000;
        const BadCommunicationError = 0x8005_0000;
        const BadEncodingError = 0x8006_0000;
        const BadDecodingError = 0x8007_0000;
        const BadEncodingLimitsExceeded = 0x8008_0000;
        const BadTimeout = 0x800a_0000;
        const BadShutdown = 0x800c_0000;
        const BadSecurityChecksFailed = 0x8013_0000;
        const BadNoCommunication = 0x8031_0000;
        const BadNotSupported = 0x803d_0000;
        const BadConfigurationError = 0x8089_0000;
        const BadDataLost = 0x809d_0000;
        const BadInvalidArgument = 0x80ab_0000;
        const BadConnectionClosed = 0x80ae_0000;
        const BadInvalidState = 0x80af_0000;
    }
}

impl StatusCode {
    /// Returns the bit flags of the status code, i.e. it masks out the actual status code value
    pub fn bitflags(&self) -> StatusCode {
        *self & StatusCode::BIT_MASK
    }

    /// Returns the status only, i.e. it masks out any bit flags that come with the status code
    pub fn status(&self) -> StatusCode {
        *self & StatusCode::STATUS_MASK
    }

    /// Tests if the status code is bad
    pub fn is_bad(&self) -> bool {
        self.contains(StatusCode::IS_ERROR)
    }

    /// Tests if the status code is uncertain
    pub fn is_uncertain(&self) -> bool {
        self.contains(StatusCode::IS_UNCERTAIN)
    }

    /// Tests if the status code is good (i.e. not bad or uncertain)
    pub fn is_good(&self) -> bool {
        !self.is_bad() && !self.is_uncertain()
    }

    /// Returns the name of the status code
    pub fn name(&self) -> &'static str {
        let status = self.status();
        if status == StatusCode::Good {
            "Good"
        } else if status == StatusCode::UncertainLastUsableValue {
            "UncertainLastUsableValue"
        } else if status == StatusCode::BadUnexpectedError {
            "BadUnexpectedError"
        } else if status == StatusCode::BadInternalError {
            "BadInternalError"
        } else if status == StatusCode::BadOutOfMemory {
            "BadOutOfMemory"
        } else if status == StatusCode::BadResourceUnavailable {
            "BadResourceUnavailable"
        } else if status == StatusCode::BadCommunicationError {
            "BadCommunicationError"
        } else if status == StatusCode::BadEncodingError {
            "BadEncodingError"
        } else if status == StatusCode::BadDecodingError {
            "BadDecodingError"
        } else if status == StatusCode::BadEncodingLimitsExceeded {
            "BadEncodingLimitsExceeded"
        } else if status == StatusCode::BadTimeout {
            "BadTimeout"
        } else if status == StatusCode::BadShutdown {
            "BadShutdown"
        } else if status == StatusCode::BadSecurityChecksFailed {
            "BadSecurityChecksFailed"
        } else if status == StatusCode::BadNoCommunication {
            "BadNoCommunication"
        } else if status == StatusCode::BadNotSupported {
            "BadNotSupported"
        } else if status == StatusCode::BadConfigurationError {
            "BadConfigurationError"
        } else if status == StatusCode::BadDataLost {
            "BadDataLost"
        } else if status == StatusCode::BadInvalidArgument {
            "BadInvalidArgument"
        } else if status == StatusCode::BadConnectionClosed {
            "BadConnectionClosed"
        } else if status == StatusCode::BadInvalidState {
            "BadInvalidState"
        } else {
            "UnknownStatusCode"
        }
    }

    /// Returns a description of the status code
    pub fn description(&self) -> &'static str {
        let status = self.status();
        if status == StatusCode::Good {
            "The operation succeeded"
        } else if status == StatusCode::UncertainLastUsableValue {
            "Whatever was updating this value has stopped doing so"
        } else if status == StatusCode::BadUnexpectedError {
            "An unexpected error occurred"
        } else if status == StatusCode::BadInternalError {
            "An internal error occurred as a result of a programming or configuration error"
        } else if status == StatusCode::BadOutOfMemory {
            "Not enough memory to complete the operation"
        } else if status == StatusCode::BadResourceUnavailable {
            "An operating system resource is not available"
        } else if status == StatusCode::BadCommunicationError {
            "A low level communication error occurred"
        } else if status == StatusCode::BadEncodingError {
            "Encoding halted because of invalid data in the objects being serialized"
        } else if status == StatusCode::BadDecodingError {
            "Decoding halted because of invalid data in the stream"
        } else if status == StatusCode::BadEncodingLimitsExceeded {
            "The message encoding/decoding limits imposed by the stack have been exceeded"
        } else if status == StatusCode::BadTimeout {
            "The operation timed out"
        } else if status == StatusCode::BadShutdown {
            "The operation was cancelled because the application is shutting down"
        } else if status == StatusCode::BadSecurityChecksFailed {
            "An error occurred verifying security"
        } else if status == StatusCode::BadNoCommunication {
            "Communication with the data source is defined, but not established, and there is no last known value available"
        } else if status == StatusCode::BadNotSupported {
            "The requested operation is not supported"
        } else if status == StatusCode::BadConfigurationError {
            "There is a problem with the configuration that affects the usefulness of the value"
        } else if status == StatusCode::BadDataLost {
            "Data is missing due to collection started/stopped/lost"
        } else if status == StatusCode::BadInvalidArgument {
            "One or more arguments are invalid"
        } else if status == StatusCode::BadConnectionClosed {
            "The network connection has been closed"
        } else if status == StatusCode::BadInvalidState {
            "The operation cannot be completed because the object is closed, uninitialized or in some other invalid state"
        } else {
            "Unknown status code"
        }
    }
}

// The bitflags! macro implements Debug for StatusCode but it fouls the display because status
// codes are a combination of bits and unique values.

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        // Displays the StatusCode as it's name, or its name+bitflags
        let bits = self.bitflags();
        if bits.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}+{:?}", self.name(), bits)
        }
    }
}

impl Error for StatusCode {}

impl BinaryEncoder<StatusCode> for StatusCode {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u32(stream, self.bits())
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(StatusCode::from_bits_truncate(read_u32(stream)?))
    }
}

impl From<StatusCode> for io::Error {
    fn from(e: StatusCode) -> io::Error {
        io::Error::new(io::ErrorKind::Other, format!("StatusCode {}", e))
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::Good
    }
}

// Serialize / Deserialize are manually implemented because bitflags! doesn't do it.

impl Serialize for StatusCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

struct StatusCodeVisitor;

impl<'de> Visitor<'de> for StatusCodeVisitor {
    type Value = u32;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an unsigned 32-bit integer")
    }

    fn visit_u32<E>(self, value: u32) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value)
    }

    // Formats such as JSON / YAML hand integers over as u64
    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        u32::try_from(value)
            .map_err(|_| E::custom(format!("Status code {} is out of range", value)))
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(StatusCode::from_bits_truncate(
            deserializer.deserialize_u32(StatusCodeVisitor)?,
        ))
    }
}

#[test]
fn status_code() {
    assert!(StatusCode::Good.is_good());
    assert!(!StatusCode::Good.is_bad());
    assert!(!StatusCode::Good.is_uncertain());

    assert!(StatusCode::UncertainLastUsableValue.is_uncertain());
    assert!(!StatusCode::UncertainLastUsableValue.is_bad());
    assert!(!StatusCode::UncertainLastUsableValue.is_good());

    assert!(StatusCode::BadDecodingError.is_bad());
    assert!(!StatusCode::BadDecodingError.is_uncertain());
    assert!(!StatusCode::BadDecodingError.is_good());

    assert_eq!(
        (StatusCode::BadDecodingError | StatusCode::OVERFLOW).status(),
        StatusCode::BadDecodingError
    );
    assert_eq!(
        (StatusCode::BadDecodingError | StatusCode::OVERFLOW).bitflags(),
        StatusCode::OVERFLOW
    );
    assert_eq!(StatusCode::BadTimeout.name(), "BadTimeout");
}
