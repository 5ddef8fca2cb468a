// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `UadpNetworkMessage`, the envelope that UADP
//! publishers put on the wire. The envelope begins with up to three flag bytes which
//! determine which of the remaining header fields are present, followed by the
//! headers themselves and then one or more DataSetMessages.

use std::io::{Cursor, Read, Write};

use crate::message::{DataSetMessage, UADP_VERSION};
use crate::types::{encoding::*, DateTime, Guid, StatusCode, UAString};

bitflags! {
    struct UadpFlags: u8 {
        /// Bits 0-3 hold the UADP version
        const VERSION_MASK = 0x0f;
        /// PublisherId is present
        const PUBLISHER_ID = 0x10;
        /// GroupHeader is present
        const GROUP_HEADER = 0x20;
        /// PayloadHeader is present
        const PAYLOAD_HEADER = 0x40;
        /// ExtendedFlags1 byte follows
        const EXTENDED_FLAGS_1 = 0x80;
    }
}

bitflags! {
    struct ExtendedFlags1: u8 {
        /// Bits 0-2 hold the PublisherId type
        const PUBLISHER_ID_TYPE_MASK = 0x07;
        /// DataSetClassId is present
        const DATA_SET_CLASS_ID = 0x08;
        /// SecurityHeader is present
        const SECURITY = 0x10;
        /// Timestamp is present
        const TIMESTAMP = 0x20;
        /// PicoSeconds is present
        const PICO_SECONDS = 0x40;
        /// ExtendedFlags2 byte follows
        const EXTENDED_FLAGS_2 = 0x80;
    }
}

bitflags! {
    struct ExtendedFlags2: u8 {
        /// The message is one chunk of a larger NetworkMessage
        const CHUNK = 0x01;
        /// PromotedFields are present
        const PROMOTED_FIELDS = 0x02;
        /// Bits 2-4 hold the NetworkMessage type
        const NETWORK_MESSAGE_TYPE_MASK = 0x1c;
    }
}

bitflags! {
    struct GroupFlags: u8 {
        /// WriterGroupId is present
        const WRITER_GROUP_ID = 0x01;
        /// GroupVersion is present
        const GROUP_VERSION = 0x02;
        /// NetworkMessageNumber is present
        const NETWORK_MESSAGE_NUMBER = 0x04;
        /// SequenceNumber is present
        const SEQUENCE_NUMBER = 0x08;
    }
}

bitflags! {
    struct SecurityFlags: u8 {
        /// The NetworkMessage is signed
        const NETWORK_MESSAGE_SIGNED = 0x01;
        /// The NetworkMessage is encrypted
        const NETWORK_MESSAGE_ENCRYPTED = 0x02;
        /// A security footer follows the payload
        const SECURITY_FOOTER = 0x04;
        /// The publisher demands a key reset
        const FORCE_KEY_RESET = 0x08;
    }
}

/// The id of the publisher that produced a NetworkMessage. The wire representation
/// depends on the type the publisher was configured with, carried in ExtendedFlags1.
#[derive(Debug, Clone, PartialEq)]
pub enum PublisherId {
    Byte(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    String(UAString),
}

impl std::fmt::Display for PublisherId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PublisherId::Byte(v) => write!(f, "{}", v),
            PublisherId::UInt16(v) => write!(f, "{}", v),
            PublisherId::UInt32(v) => write!(f, "{}", v),
            PublisherId::UInt64(v) => write!(f, "{}", v),
            PublisherId::String(v) => write!(f, "{}", v),
        }
    }
}

impl PublisherId {
    fn id_type_bits(&self) -> u8 {
        match self {
            PublisherId::Byte(_) => 0b000,
            PublisherId::UInt16(_) => 0b001,
            PublisherId::UInt32(_) => 0b010,
            PublisherId::UInt64(_) => 0b011,
            PublisherId::String(_) => 0b100,
        }
    }

    fn byte_len(&self) -> usize {
        match self {
            PublisherId::Byte(v) => v.byte_len(),
            PublisherId::UInt16(v) => v.byte_len(),
            PublisherId::UInt32(v) => v.byte_len(),
            PublisherId::UInt64(v) => v.byte_len(),
            PublisherId::String(v) => v.byte_len(),
        }
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        match self {
            PublisherId::Byte(v) => v.encode(stream),
            PublisherId::UInt16(v) => v.encode(stream),
            PublisherId::UInt32(v) => v.encode(stream),
            PublisherId::UInt64(v) => v.encode(stream),
            PublisherId::String(v) => v.encode(stream),
        }
    }

    fn decode<S: Read>(
        stream: &mut S,
        id_type_bits: u8,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        match id_type_bits {
            0b000 => Ok(PublisherId::Byte(read_u8(stream)?)),
            0b001 => Ok(PublisherId::UInt16(read_u16(stream)?)),
            0b010 => Ok(PublisherId::UInt32(read_u32(stream)?)),
            0b011 => Ok(PublisherId::UInt64(read_u64(stream)?)),
            0b100 => Ok(PublisherId::String(UAString::decode(
                stream,
                decoding_options,
            )?)),
            value => {
                error!("Publisher id type {} is reserved / invalid", value);
                Err(StatusCode::BadDecodingError)
            }
        }
    }
}

/// The kind of payload a NetworkMessage carries.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum NetworkMessageType {
    /// The payload is one or more DataSetMessages
    DataSetMessage,
    /// The payload is a discovery probe. Only the common header is decoded.
    DiscoveryRequest,
    /// The payload is a discovery answer. Only the common header is decoded.
    DiscoveryResponse,
}

impl NetworkMessageType {
    fn from_bits(bits: u8) -> EncodingResult<Self> {
        match bits {
            0b000 => Ok(NetworkMessageType::DataSetMessage),
            0b001 => Ok(NetworkMessageType::DiscoveryRequest),
            0b010 => Ok(NetworkMessageType::DiscoveryResponse),
            value => {
                error!("Network message type {} is reserved / invalid", value);
                Err(StatusCode::BadDecodingError)
            }
        }
    }

    fn bits(&self) -> u8 {
        match self {
            NetworkMessageType::DataSetMessage => 0b000,
            NetworkMessageType::DiscoveryRequest => 0b001,
            NetworkMessageType::DiscoveryResponse => 0b010,
        }
    }
}

/// Identifies the writer group a NetworkMessage came from and where it sits in that
/// group's sequence. Every field is individually optional behind the GroupFlags byte.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupHeader {
    pub writer_group_id: Option<u16>,
    pub group_version: Option<u32>,
    pub network_message_number: Option<u16>,
    pub sequence_number: Option<u16>,
}

impl BinaryEncoder<GroupHeader> for GroupHeader {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        size += self.writer_group_id.map_or(0, |_| 2);
        size += self.group_version.map_or(0, |_| 4);
        size += self.network_message_number.map_or(0, |_| 2);
        size += self.sequence_number.map_or(0, |_| 2);
        size
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut flags = GroupFlags::empty();
        if self.writer_group_id.is_some() {
            flags |= GroupFlags::WRITER_GROUP_ID;
        }
        if self.group_version.is_some() {
            flags |= GroupFlags::GROUP_VERSION;
        }
        if self.network_message_number.is_some() {
            flags |= GroupFlags::NETWORK_MESSAGE_NUMBER;
        }
        if self.sequence_number.is_some() {
            flags |= GroupFlags::SEQUENCE_NUMBER;
        }
        let mut size = write_u8(stream, flags.bits())?;
        if let Some(v) = self.writer_group_id {
            size += write_u16(stream, v)?;
        }
        if let Some(v) = self.group_version {
            size += write_u32(stream, v)?;
        }
        if let Some(v) = self.network_message_number {
            size += write_u16(stream, v)?;
        }
        if let Some(v) = self.sequence_number {
            size += write_u16(stream, v)?;
        }
        assert_eq!(size, self.byte_len());
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let flags = GroupFlags::from_bits_truncate(read_u8(stream)?);
        let writer_group_id = if flags.contains(GroupFlags::WRITER_GROUP_ID) {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let group_version = if flags.contains(GroupFlags::GROUP_VERSION) {
            Some(read_u32(stream)?)
        } else {
            None
        };
        let network_message_number = if flags.contains(GroupFlags::NETWORK_MESSAGE_NUMBER) {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let sequence_number = if flags.contains(GroupFlags::SEQUENCE_NUMBER) {
            Some(read_u16(stream)?)
        } else {
            None
        };
        Ok(GroupHeader {
            writer_group_id,
            group_version,
            network_message_number,
            sequence_number,
        })
    }
}

/// The security header of a NetworkMessage. The stack parses the header so it can step
/// over it, but it performs no verification or decryption - encrypted messages are
/// rejected outright.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SecurityHeader {
    pub signed: bool,
    pub encrypted: bool,
    pub force_key_reset: bool,
    pub token_id: u32,
    pub nonce: Vec<u8>,
    pub footer_size: Option<u16>,
}

impl BinaryEncoder<SecurityHeader> for SecurityHeader {
    fn byte_len(&self) -> usize {
        1 + 4 + 1 + self.nonce.len() + self.footer_size.map_or(0, |_| 2)
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        if self.nonce.len() > u8::MAX as usize {
            error!("Security nonce is too long to encode");
            return Err(StatusCode::BadEncodingError);
        }
        let mut flags = SecurityFlags::empty();
        if self.signed {
            flags |= SecurityFlags::NETWORK_MESSAGE_SIGNED;
        }
        if self.encrypted {
            flags |= SecurityFlags::NETWORK_MESSAGE_ENCRYPTED;
        }
        if self.footer_size.is_some() {
            flags |= SecurityFlags::SECURITY_FOOTER;
        }
        if self.force_key_reset {
            flags |= SecurityFlags::FORCE_KEY_RESET;
        }
        let mut size = write_u8(stream, flags.bits())?;
        size += write_u32(stream, self.token_id)?;
        size += write_u8(stream, self.nonce.len() as u8)?;
        size += process_encode_io_result(stream.write(&self.nonce))?;
        if let Some(v) = self.footer_size {
            size += write_u16(stream, v)?;
        }
        assert_eq!(size, self.byte_len());
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let flags = SecurityFlags::from_bits_truncate(read_u8(stream)?);
        let token_id = read_u32(stream)?;
        let nonce_length = read_u8(stream)? as usize;
        let mut nonce = vec![0u8; nonce_length];
        read_bytes(stream, &mut nonce)?;
        let footer_size = if flags.contains(SecurityFlags::SECURITY_FOOTER) {
            Some(read_u16(stream)?)
        } else {
            None
        };
        Ok(SecurityHeader {
            signed: flags.contains(SecurityFlags::NETWORK_MESSAGE_SIGNED),
            encrypted: flags.contains(SecurityFlags::NETWORK_MESSAGE_ENCRYPTED),
            force_key_reset: flags.contains(SecurityFlags::FORCE_KEY_RESET),
            token_id,
            nonce,
            footer_size,
        })
    }
}

/// A UADP NetworkMessage. Optional header fields are determined on the wire by the
/// flag bytes; here their presence is whether the option is set and the flag bytes
/// are synthesized during encoding.
///
/// When a payload header is present, `data_set_writer_ids` pairs element-for-element
/// with `messages`.
#[derive(Debug, Clone, PartialEq)]
pub struct UadpNetworkMessage {
    pub message_type: NetworkMessageType,
    pub publisher_id: Option<PublisherId>,
    pub data_set_class_id: Option<Guid>,
    pub group_header: Option<GroupHeader>,
    /// The payload header - the ids of the dataset writers that produced each message
    pub data_set_writer_ids: Option<Vec<u16>>,
    pub timestamp: Option<DateTime>,
    pub picoseconds: Option<u16>,
    /// Promoted fields are kept as the raw bytes they arrived in. Interpreting them
    /// requires the dataset metadata, which this stack does not exchange.
    pub promoted_fields: Option<Vec<u8>>,
    pub security_header: Option<SecurityHeader>,
    pub messages: Vec<DataSetMessage>,
}

impl Default for UadpNetworkMessage {
    fn default() -> Self {
        UadpNetworkMessage {
            message_type: NetworkMessageType::DataSetMessage,
            publisher_id: None,
            data_set_class_id: None,
            group_header: None,
            data_set_writer_ids: None,
            timestamp: None,
            picoseconds: None,
            promoted_fields: None,
            security_header: None,
            messages: Vec::new(),
        }
    }
}

impl BinaryEncoder<UadpNetworkMessage> for UadpNetworkMessage {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        let extended_flags_1 = self.extended_flags_1();
        let extended_flags_2 = self.extended_flags_2();
        if !extended_flags_1.is_empty() || !extended_flags_2.is_empty() {
            size += 1;
        }
        if !extended_flags_2.is_empty() {
            size += 1;
        }
        if let Some(ref v) = self.publisher_id {
            size += v.byte_len();
        }
        if let Some(ref v) = self.data_set_class_id {
            size += v.byte_len();
        }
        if let Some(ref v) = self.group_header {
            size += v.byte_len();
        }
        if let Some(ref v) = self.data_set_writer_ids {
            size += 1 + v.len() * 2;
        }
        if let Some(ref v) = self.timestamp {
            size += v.byte_len();
        }
        if self.picoseconds.is_some() {
            size += 2;
        }
        if let Some(ref v) = self.promoted_fields {
            size += 2 + v.len();
        }
        if let Some(ref v) = self.security_header {
            size += v.byte_len();
        }
        // Sizes array delimits the messages when the payload header advertises more than one
        if self.data_set_writer_ids.is_some() && self.messages.len() > 1 {
            size += self.messages.len() * 2;
        }
        size += self.messages.iter().map(|m| m.byte_len()).sum::<usize>();
        size
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        if self.message_type != NetworkMessageType::DataSetMessage {
            error!("Encoding of discovery network messages is not supported");
            return Err(StatusCode::BadNotSupported);
        }
        if let Some(ref ids) = self.data_set_writer_ids {
            if ids.len() != self.messages.len() {
                error!(
                    "Payload header advertises {} messages but {} are present",
                    ids.len(),
                    self.messages.len()
                );
                return Err(StatusCode::BadEncodingError);
            }
        }

        let mut flags = UadpFlags::from_bits_truncate(UADP_VERSION);
        if self.publisher_id.is_some() {
            flags |= UadpFlags::PUBLISHER_ID;
        }
        if self.group_header.is_some() {
            flags |= UadpFlags::GROUP_HEADER;
        }
        if self.data_set_writer_ids.is_some() {
            flags |= UadpFlags::PAYLOAD_HEADER;
        }
        let extended_flags_1 = self.extended_flags_1();
        let extended_flags_2 = self.extended_flags_2();
        let write_extended_flags_1 = !extended_flags_1.is_empty() || !extended_flags_2.is_empty();
        if write_extended_flags_1 {
            flags |= UadpFlags::EXTENDED_FLAGS_1;
        }

        let mut size = write_u8(stream, flags.bits())?;
        if write_extended_flags_1 {
            let mut extended_flags_1 = extended_flags_1;
            if !extended_flags_2.is_empty() {
                extended_flags_1 |= ExtendedFlags1::EXTENDED_FLAGS_2;
            }
            size += write_u8(stream, extended_flags_1.bits())?;
        }
        if !extended_flags_2.is_empty() {
            size += write_u8(stream, extended_flags_2.bits())?;
        }
        if let Some(ref v) = self.publisher_id {
            size += v.encode(stream)?;
        }
        if let Some(ref v) = self.data_set_class_id {
            size += v.encode(stream)?;
        }
        if let Some(ref v) = self.group_header {
            size += v.encode(stream)?;
        }
        if let Some(ref v) = self.data_set_writer_ids {
            size += write_u8(stream, v.len() as u8)?;
            for id in v {
                size += write_u16(stream, *id)?;
            }
        }
        if let Some(ref v) = self.timestamp {
            size += v.encode(stream)?;
        }
        if let Some(v) = self.picoseconds {
            size += write_u16(stream, v)?;
        }
        if let Some(ref v) = self.promoted_fields {
            size += write_u16(stream, v.len() as u16)?;
            size += process_encode_io_result(stream.write(v))?;
        }
        if let Some(ref v) = self.security_header {
            size += v.encode(stream)?;
        }

        // When the payload header advertises more than one message, each message is preceded
        // by a sizes array so a receiver can skip messages it has no reader for
        if self.data_set_writer_ids.is_some() && self.messages.len() > 1 {
            let chunks = self
                .messages
                .iter()
                .map(|m| m.encode_to_vec())
                .collect::<Vec<_>>();
            for chunk in &chunks {
                size += write_u16(stream, chunk.len() as u16)?;
            }
            for chunk in &chunks {
                size += process_encode_io_result(stream.write(chunk))?;
            }
        } else {
            for message in &self.messages {
                size += message.encode(stream)?;
            }
        }
        assert_eq!(size, self.byte_len());
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let flags = UadpFlags::from_bits_truncate(read_u8(stream)?);
        let version = (flags & UadpFlags::VERSION_MASK).bits();
        if version != UADP_VERSION {
            error!("UADP version {} is not supported", version);
            return Err(StatusCode::BadDecodingError);
        }

        let extended_flags_1 = if flags.contains(UadpFlags::EXTENDED_FLAGS_1) {
            ExtendedFlags1::from_bits_truncate(read_u8(stream)?)
        } else {
            ExtendedFlags1::empty()
        };
        let extended_flags_2 = if extended_flags_1.contains(ExtendedFlags1::EXTENDED_FLAGS_2) {
            ExtendedFlags2::from_bits_truncate(read_u8(stream)?)
        } else {
            ExtendedFlags2::empty()
        };
        if extended_flags_2.contains(ExtendedFlags2::CHUNK) {
            error!("Chunked network messages are not supported");
            return Err(StatusCode::BadNotSupported);
        }
        let message_type = NetworkMessageType::from_bits(
            (extended_flags_2 & ExtendedFlags2::NETWORK_MESSAGE_TYPE_MASK).bits() >> 2,
        )?;

        let publisher_id = if flags.contains(UadpFlags::PUBLISHER_ID) {
            let id_type_bits = (extended_flags_1 & ExtendedFlags1::PUBLISHER_ID_TYPE_MASK).bits();
            Some(PublisherId::decode(stream, id_type_bits, decoding_options)?)
        } else {
            None
        };
        let data_set_class_id = if extended_flags_1.contains(ExtendedFlags1::DATA_SET_CLASS_ID) {
            Some(Guid::decode(stream, decoding_options)?)
        } else {
            None
        };
        let group_header = if flags.contains(UadpFlags::GROUP_HEADER) {
            Some(GroupHeader::decode(stream, decoding_options)?)
        } else {
            None
        };
        let data_set_writer_ids = if flags.contains(UadpFlags::PAYLOAD_HEADER)
            && message_type == NetworkMessageType::DataSetMessage
        {
            let count = read_u8(stream)? as usize;
            let mut ids = Vec::with_capacity(count);
            for _ in 0..count {
                ids.push(read_u16(stream)?);
            }
            Some(ids)
        } else {
            None
        };
        let timestamp = if extended_flags_1.contains(ExtendedFlags1::TIMESTAMP) {
            Some(DateTime::decode(stream, decoding_options)?)
        } else {
            None
        };
        let picoseconds = if extended_flags_1.contains(ExtendedFlags1::PICO_SECONDS) {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let promoted_fields = if extended_flags_2.contains(ExtendedFlags2::PROMOTED_FIELDS) {
            let size = read_u16(stream)? as usize;
            let mut fields = vec![0u8; size];
            read_bytes(stream, &mut fields)?;
            Some(fields)
        } else {
            None
        };
        let security_header = if extended_flags_1.contains(ExtendedFlags1::SECURITY) {
            let header = SecurityHeader::decode(stream, decoding_options)?;
            if header.encrypted {
                error!("Encrypted network messages are not supported");
                return Err(StatusCode::BadNotSupported);
            }
            if header.signed {
                warn!("Network message is signed but signatures are not verified by this stack");
            }
            Some(header)
        } else {
            None
        };

        let messages = match message_type {
            NetworkMessageType::DataSetMessage => {
                let count = data_set_writer_ids.as_ref().map_or(1, |ids| ids.len());
                if count == 0 {
                    Vec::new()
                } else if count == 1 {
                    vec![DataSetMessage::decode(stream, decoding_options)?]
                } else {
                    // A sizes array delimits the messages so each one must decode from
                    // exactly its own slice
                    let mut sizes = Vec::with_capacity(count);
                    for _ in 0..count {
                        sizes.push(read_u16(stream)? as usize);
                    }
                    let mut messages = Vec::with_capacity(count);
                    for size in sizes {
                        let mut chunk = vec![0u8; size];
                        read_bytes(stream, &mut chunk)?;
                        let mut chunk_stream = Cursor::new(&chunk);
                        let message = DataSetMessage::decode(&mut chunk_stream, decoding_options)?;
                        if chunk_stream.position() != size as u64 {
                            error!(
                                "Data set message consumed {} bytes but its advertised size is {}",
                                chunk_stream.position(),
                                size
                            );
                            return Err(StatusCode::BadDecodingError);
                        }
                        messages.push(message);
                    }
                    messages
                }
            }
            NetworkMessageType::DiscoveryRequest | NetworkMessageType::DiscoveryResponse => {
                debug!("Discovery payload is not decoded by this stack");
                Vec::new()
            }
        };

        Ok(UadpNetworkMessage {
            message_type,
            publisher_id,
            data_set_class_id,
            group_header,
            data_set_writer_ids,
            timestamp,
            picoseconds,
            promoted_fields,
            security_header,
            messages,
        })
    }
}

impl UadpNetworkMessage {
    /// The writer group id from the group header, if there is one
    pub fn writer_group_id(&self) -> Option<u16> {
        self.group_header.as_ref().and_then(|h| h.writer_group_id)
    }

    fn extended_flags_1(&self) -> ExtendedFlags1 {
        let mut flags = ExtendedFlags1::empty();
        if let Some(ref publisher_id) = self.publisher_id {
            flags |= ExtendedFlags1::from_bits_truncate(publisher_id.id_type_bits());
        }
        if self.data_set_class_id.is_some() {
            flags |= ExtendedFlags1::DATA_SET_CLASS_ID;
        }
        if self.security_header.is_some() {
            flags |= ExtendedFlags1::SECURITY;
        }
        if self.timestamp.is_some() {
            flags |= ExtendedFlags1::TIMESTAMP;
        }
        if self.picoseconds.is_some() {
            flags |= ExtendedFlags1::PICO_SECONDS;
        }
        flags
    }

    fn extended_flags_2(&self) -> ExtendedFlags2 {
        let mut flags =
            ExtendedFlags2::from_bits_truncate(self.message_type.bits() << 2);
        if self.promoted_fields.is_some() {
            flags |= ExtendedFlags2::PROMOTED_FIELDS;
        }
        flags
    }
}
