// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DataSetMessage`, the payload unit of a UADP
//! NetworkMessage. Each dataset message is a header of individually optional fields
//! followed by a key frame, delta frame, event or keep-alive body.

use std::io::{Read, Write};

use crate::types::{
    encoding::*, DataValue, DateTime, StatusCode, Variant,
};

bitflags! {
    struct DataSetFlags1: u8 {
        /// Set when the message is valid at the time of publishing
        const MESSAGE_IS_VALID = 0x01;
        /// Bits 1-2 select how field values are encoded in the body
        const FIELD_ENCODING_MASK = 0x06;
        /// DataSetMessageSequenceNumber is present
        const SEQUENCE_NUMBER = 0x08;
        /// Status is present
        const STATUS = 0x10;
        /// ConfigurationVersion major version is present
        const CONFIGURATION_VERSION_MAJOR = 0x20;
        /// ConfigurationVersion minor version is present
        const CONFIGURATION_VERSION_MINOR = 0x40;
        /// DataSetFlags2 byte follows
        const FLAGS_2 = 0x80;
    }
}

bitflags! {
    struct DataSetFlags2: u8 {
        /// Bits 0-3 are the dataset message type
        const MESSAGE_TYPE_MASK = 0x0f;
        /// Timestamp is present
        const TIMESTAMP = 0x10;
        /// PicoSeconds is present
        const PICO_SECONDS = 0x20;
    }
}

/// How the field values in the message body are encoded on the wire.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DataSetFieldEncoding {
    /// Fields are Variants
    Variant,
    /// Fields are raw values laid out according to the dataset metadata. Decoding raw
    /// fields requires that metadata, which this stack does not exchange, so messages
    /// in this encoding are rejected.
    RawData,
    /// Fields are DataValues
    DataValue,
}

impl DataSetFieldEncoding {
    fn from_bits(bits: u8) -> EncodingResult<Self> {
        match bits {
            0b00 => Ok(DataSetFieldEncoding::Variant),
            0b01 => Ok(DataSetFieldEncoding::RawData),
            0b10 => Ok(DataSetFieldEncoding::DataValue),
            value => {
                error!("Data set field encoding {} is reserved / invalid", value);
                Err(StatusCode::BadDecodingError)
            }
        }
    }

    fn bits(&self) -> u8 {
        match self {
            DataSetFieldEncoding::Variant => 0b00,
            DataSetFieldEncoding::RawData => 0b01,
            DataSetFieldEncoding::DataValue => 0b10,
        }
    }
}

/// The frame type of a dataset message.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DataSetMessageType {
    /// Carries the current value of every field in the dataset
    KeyFrame,
    /// Carries only the fields that changed, each with its index in the dataset
    DeltaFrame,
    /// Carries the fields of an event
    Event,
    /// Carries no fields; lets subscribers know the publisher is still alive
    KeepAlive,
}

impl DataSetMessageType {
    fn from_bits(bits: u8) -> EncodingResult<Self> {
        match bits {
            0b0000 => Ok(DataSetMessageType::KeyFrame),
            0b0001 => Ok(DataSetMessageType::DeltaFrame),
            0b0010 => Ok(DataSetMessageType::Event),
            0b0011 => Ok(DataSetMessageType::KeepAlive),
            value => {
                error!("Data set message type {} is reserved / invalid", value);
                Err(StatusCode::BadDecodingError)
            }
        }
    }

    fn bits(&self) -> u8 {
        match self {
            DataSetMessageType::KeyFrame => 0b0000,
            DataSetMessageType::DeltaFrame => 0b0001,
            DataSetMessageType::Event => 0b0010,
            DataSetMessageType::KeepAlive => 0b0011,
        }
    }
}

/// A single field value in whichever wire form the message's field encoding selected.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSetFieldValue {
    Variant(Variant),
    DataValue(DataValue),
}

impl DataSetFieldValue {
    /// Normalizes the field to a `DataValue` regardless of the wire form it arrived in
    pub fn into_data_value(self) -> DataValue {
        match self {
            DataSetFieldValue::Variant(v) => DataValue::from(v),
            DataSetFieldValue::DataValue(v) => v,
        }
    }

    /// The value as a variant, disregarding any status / timestamps a DataValue carried
    pub fn value(&self) -> Option<&Variant> {
        match self {
            DataSetFieldValue::Variant(v) => Some(v),
            DataSetFieldValue::DataValue(v) => v.value.as_ref(),
        }
    }

    fn byte_len(&self) -> usize {
        match self {
            DataSetFieldValue::Variant(v) => v.byte_len(),
            DataSetFieldValue::DataValue(v) => v.byte_len(),
        }
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        match self {
            DataSetFieldValue::Variant(v) => v.encode(stream),
            DataSetFieldValue::DataValue(v) => v.encode(stream),
        }
    }

    fn decode<S: Read>(
        stream: &mut S,
        field_encoding: DataSetFieldEncoding,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        match field_encoding {
            DataSetFieldEncoding::Variant => Ok(DataSetFieldValue::Variant(Variant::decode(
                stream,
                decoding_options,
            )?)),
            DataSetFieldEncoding::DataValue => Ok(DataSetFieldValue::DataValue(DataValue::decode(
                stream,
                decoding_options,
            )?)),
            DataSetFieldEncoding::RawData => {
                error!("Raw data set fields cannot be decoded without dataset metadata");
                Err(StatusCode::BadNotSupported)
            }
        }
    }
}

/// The body of a dataset message.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSetMessagePayload {
    KeyFrame(Vec<DataSetFieldValue>),
    DeltaFrame(Vec<(u16, DataSetFieldValue)>),
    Event(Vec<DataSetFieldValue>),
    KeepAlive,
}

/// A dataset message. Optional header fields are determined by the DataSetFlags1 and
/// DataSetFlags2 bytes on the wire; here their presence is simply whether the option is set,
/// and the flag bytes are synthesized during encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSetMessage {
    /// Clear when the publisher knew the content to be stale / invalid at publishing time
    pub valid: bool,
    /// How field values are encoded in the body
    pub field_encoding: DataSetFieldEncoding,
    /// Sequence number incremented per dataset message by the writer
    pub sequence_number: Option<u16>,
    /// Time the dataset was sampled
    pub timestamp: Option<DateTime>,
    /// 10 picosecond resolution for the timestamp
    pub picoseconds: Option<u16>,
    /// Status the publisher assigned to the whole dataset. Only the severity half of a
    /// status code travels on the wire.
    pub status: Option<StatusCode>,
    /// Major version of the dataset configuration the message was produced from
    pub config_version_major: Option<u32>,
    /// Minor version of the dataset configuration the message was produced from
    pub config_version_minor: Option<u32>,
    pub payload: DataSetMessagePayload,
}

impl Default for DataSetMessage {
    fn default() -> Self {
        Self {
            valid: true,
            field_encoding: DataSetFieldEncoding::Variant,
            sequence_number: None,
            timestamp: None,
            picoseconds: None,
            status: None,
            config_version_major: None,
            config_version_minor: None,
            payload: DataSetMessagePayload::KeyFrame(Vec::new()),
        }
    }
}

impl BinaryEncoder<DataSetMessage> for DataSetMessage {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if self.requires_flags_2() {
            size += 1;
        }
        if let Some(ref v) = self.sequence_number {
            size += v.byte_len();
        }
        if let Some(ref v) = self.timestamp {
            size += v.byte_len();
        }
        if let Some(ref v) = self.picoseconds {
            size += v.byte_len();
        }
        if self.status.is_some() {
            // u16 on the wire
            size += 2;
        }
        if let Some(ref v) = self.config_version_major {
            size += v.byte_len();
        }
        if let Some(ref v) = self.config_version_minor {
            size += v.byte_len();
        }
        size += match self.payload {
            DataSetMessagePayload::KeyFrame(ref fields)
            | DataSetMessagePayload::Event(ref fields) => {
                2 + fields.iter().map(|f| f.byte_len()).sum::<usize>()
            }
            DataSetMessagePayload::DeltaFrame(ref fields) => {
                2 + fields
                    .iter()
                    .map(|(_, f)| 2 + f.byte_len())
                    .sum::<usize>()
            }
            DataSetMessagePayload::KeepAlive => 0,
        };
        size
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        if self.field_encoding == DataSetFieldEncoding::RawData {
            error!("Raw data set fields cannot be encoded without dataset metadata");
            return Err(StatusCode::BadNotSupported);
        }
        let mut size = write_u8(stream, self.flags_1().bits())?;
        if self.requires_flags_2() {
            size += write_u8(stream, self.flags_2().bits())?;
        }
        if let Some(ref v) = self.sequence_number {
            size += v.encode(stream)?;
        }
        if let Some(ref v) = self.timestamp {
            size += v.encode(stream)?;
        }
        if let Some(ref v) = self.picoseconds {
            size += v.encode(stream)?;
        }
        if let Some(ref v) = self.status {
            // Only the most significant 16 bits of the status code travel on the wire
            size += write_u16(stream, (v.bits() >> 16) as u16)?;
        }
        if let Some(ref v) = self.config_version_major {
            size += v.encode(stream)?;
        }
        if let Some(ref v) = self.config_version_minor {
            size += v.encode(stream)?;
        }
        match self.payload {
            DataSetMessagePayload::KeyFrame(ref fields)
            | DataSetMessagePayload::Event(ref fields) => {
                size += write_u16(stream, fields.len() as u16)?;
                for field in fields {
                    size += field.encode(stream)?;
                }
            }
            DataSetMessagePayload::DeltaFrame(ref fields) => {
                size += write_u16(stream, fields.len() as u16)?;
                for (index, field) in fields {
                    size += write_u16(stream, *index)?;
                    size += field.encode(stream)?;
                }
            }
            DataSetMessagePayload::KeepAlive => {}
        }
        assert_eq!(size, self.byte_len());
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let flags_1 = DataSetFlags1::from_bits_truncate(read_u8(stream)?);
        let field_encoding = DataSetFieldEncoding::from_bits(
            (flags_1 & DataSetFlags1::FIELD_ENCODING_MASK).bits() >> 1,
        )?;
        let (message_type, flags_2) = if flags_1.contains(DataSetFlags1::FLAGS_2) {
            let flags_2 = DataSetFlags2::from_bits_truncate(read_u8(stream)?);
            let message_type = DataSetMessageType::from_bits(
                (flags_2 & DataSetFlags2::MESSAGE_TYPE_MASK).bits(),
            )?;
            (message_type, flags_2)
        } else {
            // Without a second flag byte, the message is a key frame with no timestamp
            (DataSetMessageType::KeyFrame, DataSetFlags2::empty())
        };

        let sequence_number = if flags_1.contains(DataSetFlags1::SEQUENCE_NUMBER) {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let timestamp = if flags_2.contains(DataSetFlags2::TIMESTAMP) {
            Some(DateTime::decode(stream, decoding_options)?)
        } else {
            None
        };
        let picoseconds = if flags_2.contains(DataSetFlags2::PICO_SECONDS) {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let status = if flags_1.contains(DataSetFlags1::STATUS) {
            Some(StatusCode::from_bits_truncate(
                (read_u16(stream)? as u32) << 16,
            ))
        } else {
            None
        };
        let config_version_major = if flags_1.contains(DataSetFlags1::CONFIGURATION_VERSION_MAJOR) {
            Some(read_u32(stream)?)
        } else {
            None
        };
        let config_version_minor = if flags_1.contains(DataSetFlags1::CONFIGURATION_VERSION_MINOR) {
            Some(read_u32(stream)?)
        } else {
            None
        };

        let payload = match message_type {
            DataSetMessageType::KeyFrame => DataSetMessagePayload::KeyFrame(Self::decode_fields(
                stream,
                field_encoding,
                decoding_options,
            )?),
            DataSetMessageType::Event => DataSetMessagePayload::Event(Self::decode_fields(
                stream,
                field_encoding,
                decoding_options,
            )?),
            DataSetMessageType::DeltaFrame => {
                let field_count = read_u16(stream)? as usize;
                if field_count > decoding_options.max_array_length {
                    error!(
                        "Delta frame field count {} exceeds decoding limit {}",
                        field_count, decoding_options.max_array_length
                    );
                    return Err(StatusCode::BadEncodingLimitsExceeded);
                }
                let mut fields = Vec::with_capacity(field_count);
                for _ in 0..field_count {
                    let index = read_u16(stream)?;
                    let value = DataSetFieldValue::decode(stream, field_encoding, decoding_options)?;
                    fields.push((index, value));
                }
                DataSetMessagePayload::DeltaFrame(fields)
            }
            DataSetMessageType::KeepAlive => DataSetMessagePayload::KeepAlive,
        };

        Ok(DataSetMessage {
            valid: flags_1.contains(DataSetFlags1::MESSAGE_IS_VALID),
            field_encoding,
            sequence_number,
            timestamp,
            picoseconds,
            status,
            config_version_major,
            config_version_minor,
            payload,
        })
    }
}

impl DataSetMessage {
    /// Creates a valid key frame message over the supplied variant field values
    pub fn key_frame<V>(fields: V) -> DataSetMessage
    where
        V: Into<Vec<Variant>>,
    {
        DataSetMessage {
            payload: DataSetMessagePayload::KeyFrame(
                fields
                    .into()
                    .into_iter()
                    .map(DataSetFieldValue::Variant)
                    .collect(),
            ),
            ..Default::default()
        }
    }

    /// The frame type of the message
    pub fn message_type(&self) -> DataSetMessageType {
        match self.payload {
            DataSetMessagePayload::KeyFrame(_) => DataSetMessageType::KeyFrame,
            DataSetMessagePayload::DeltaFrame(_) => DataSetMessageType::DeltaFrame,
            DataSetMessagePayload::Event(_) => DataSetMessageType::Event,
            DataSetMessagePayload::KeepAlive => DataSetMessageType::KeepAlive,
        }
    }

    fn decode_fields<S: Read>(
        stream: &mut S,
        field_encoding: DataSetFieldEncoding,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Vec<DataSetFieldValue>> {
        let field_count = read_u16(stream)? as usize;
        if field_count > decoding_options.max_array_length {
            error!(
                "Data set field count {} exceeds decoding limit {}",
                field_count, decoding_options.max_array_length
            );
            return Err(StatusCode::BadEncodingLimitsExceeded);
        }
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(DataSetFieldValue::decode(
                stream,
                field_encoding,
                decoding_options,
            )?);
        }
        Ok(fields)
    }

    /// The second flag byte is only written when something in it would be set
    fn requires_flags_2(&self) -> bool {
        self.message_type() != DataSetMessageType::KeyFrame
            || self.timestamp.is_some()
            || self.picoseconds.is_some()
    }

    fn flags_1(&self) -> DataSetFlags1 {
        let mut flags = DataSetFlags1::from_bits_truncate(self.field_encoding.bits() << 1);
        if self.valid {
            flags |= DataSetFlags1::MESSAGE_IS_VALID;
        }
        if self.sequence_number.is_some() {
            flags |= DataSetFlags1::SEQUENCE_NUMBER;
        }
        if self.status.is_some() {
            flags |= DataSetFlags1::STATUS;
        }
        if self.config_version_major.is_some() {
            flags |= DataSetFlags1::CONFIGURATION_VERSION_MAJOR;
        }
        if self.config_version_minor.is_some() {
            flags |= DataSetFlags1::CONFIGURATION_VERSION_MINOR;
        }
        if self.requires_flags_2() {
            flags |= DataSetFlags1::FLAGS_2;
        }
        flags
    }

    fn flags_2(&self) -> DataSetFlags2 {
        let mut flags = DataSetFlags2::from_bits_truncate(self.message_type().bits());
        if self.timestamp.is_some() {
            flags |= DataSetFlags2::TIMESTAMP;
        }
        if self.picoseconds.is_some() {
            flags |= DataSetFlags2::PICO_SECONDS;
        }
        flags
    }
}
