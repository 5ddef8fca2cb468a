// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides the subscribing side of PubSub - dataset readers that pick the messages
//! they are interested in out of decoded NetworkMessages, and the [`Subscriber`]
//! runtime that owns the connection and runs the polling loop.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant};

use crate::core::config::Config;
use crate::message::{
    DataSetMessage, DataSetMessagePayload, DataSetMessageType, NetworkMessageType, PublisherId,
    UadpNetworkMessage,
};
use crate::sync::RwLock;
use crate::transport::UdpPubSubConnection;
use crate::types::{BinaryEncoder, DataValue, DateTime, DecodingOptions, StatusCode};

pub mod config;

pub use self::config::*;

/// One field extracted from a dataset message. For key frames and events the index is
/// the position of the field in the dataset; for delta frames it is the index the
/// publisher sent with the field.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSetField {
    pub index: u16,
    pub value: DataValue,
}

/// What a reader extracts from one dataset message. Field values are normalized to
/// [`DataValue`] regardless of the field encoding they travelled in.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    pub message_type: DataSetMessageType,
    pub sequence_number: Option<u16>,
    pub timestamp: Option<DateTime>,
    pub status: Option<StatusCode>,
    pub fields: Vec<DataSetField>,
}

/// An entity receiving DataSetMessages from the network. It selects the messages it is
/// interested in by publisher id, writer group id and dataset writer id - any filter
/// that is `None` matches everything, so a freshly created reader is a catch-all.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSetReader {
    /// Name of the reader, passed to the dataset callback
    pub name: String,
    pub publisher_id: Option<PublisherId>,
    pub writer_group_id: Option<u16>,
    pub data_set_writer_id: Option<u16>,
}

impl DataSetReader {
    /// Creates a reader that matches every dataset message
    pub fn new(name: &str) -> DataSetReader {
        DataSetReader {
            name: name.to_string(),
            publisher_id: None,
            writer_group_id: None,
            data_set_writer_id: None,
        }
    }

    pub fn publisher_id(mut self, publisher_id: PublisherId) -> Self {
        self.publisher_id = Some(publisher_id);
        self
    }

    pub fn writer_group_id(mut self, writer_group_id: u16) -> Self {
        self.writer_group_id = Some(writer_group_id);
        self
    }

    pub fn data_set_writer_id(mut self, data_set_writer_id: u16) -> Self {
        self.data_set_writer_id = Some(data_set_writer_id);
        self
    }

    /// Tests whether a dataset message out of the supplied network message is for this
    /// reader. `writer_id` is the id paired with the message by the payload header, when
    /// the publisher sent one.
    pub fn matches(&self, message: &UadpNetworkMessage, writer_id: Option<u16>) -> bool {
        if let Some(ref expected) = self.publisher_id {
            match message.publisher_id {
                Some(ref publisher_id) if publisher_id == expected => {}
                _ => return false,
            }
        }
        if let Some(expected) = self.writer_group_id {
            if message.writer_group_id() != Some(expected) {
                return false;
            }
        }
        if let Some(expected) = self.data_set_writer_id {
            if writer_id != Some(expected) {
                return false;
            }
        }
        true
    }

    /// Extracts a data set from a dataset message
    pub fn read(&self, message: &DataSetMessage) -> DataSet {
        let fields = match message.payload {
            DataSetMessagePayload::KeyFrame(ref fields)
            | DataSetMessagePayload::Event(ref fields) => fields
                .iter()
                .enumerate()
                .map(|(index, field)| DataSetField {
                    index: index as u16,
                    value: field.clone().into_data_value(),
                })
                .collect(),
            DataSetMessagePayload::DeltaFrame(ref fields) => fields
                .iter()
                .map(|(index, field)| DataSetField {
                    index: *index,
                    value: field.clone().into_data_value(),
                })
                .collect(),
            DataSetMessagePayload::KeepAlive => Vec::new(),
        };
        DataSet {
            message_type: message.message_type(),
            sequence_number: message.sequence_number,
            timestamp: message.timestamp,
            status: message.status,
            fields,
        }
    }
}

/// A named collection of dataset readers.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderGroup {
    pub name: String,
    pub readers: Vec<DataSetReader>,
}

impl ReaderGroup {
    pub fn new(name: &str) -> ReaderGroup {
        ReaderGroup {
            name: name.to_string(),
            readers: Vec::new(),
        }
    }

    pub fn add(&mut self, reader: DataSetReader) {
        self.readers.push(reader);
    }
}

/// The callback invoked with every data set a reader extracts.
pub struct DataSetCallback {
    cb: Box<dyn Fn(&DataSetReader, DataSet) + Send + Sync + 'static>,
}

impl DataSetCallback {
    pub fn new<F>(cb: F) -> DataSetCallback
    where
        F: Fn(&DataSetReader, DataSet) + Send + Sync + 'static,
    {
        DataSetCallback { cb: Box::new(cb) }
    }

    fn call(&self, reader: &DataSetReader, data_set: DataSet) {
        (self.cb)(reader, data_set);
    }
}

/// Counters the subscriber keeps while it runs. Logged when the subscriber stops.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubscriberMetrics {
    pub datagrams_received: u64,
    pub messages_decoded: u64,
    pub decode_failures: u64,
    pub data_sets_dispatched: u64,
}

/// State shared between the subscriber task and any handles to it.
pub struct SubscriberState {
    running: bool,
    abort: bool,
    metrics: SubscriberMetrics,
}

impl SubscriberState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_abort(&self) -> bool {
        self.abort
    }

    pub fn abort(&mut self) {
        self.abort = true;
    }
}

/// A handle onto a running subscriber, used to stop it programmatically or to read its
/// counters.
#[derive(Clone)]
pub struct SubscriberHandle {
    state: Arc<RwLock<SubscriberState>>,
}

impl SubscriberHandle {
    /// Tells the subscriber's polling loop to stop at its next tick
    pub fn abort(&self) {
        info!("Subscriber has been instructed to abort");
        let mut state = trace_write_lock!(self.state);
        state.abort();
    }

    pub fn is_running(&self) -> bool {
        let state = trace_read_lock!(self.state);
        state.is_running()
    }

    pub fn metrics(&self) -> SubscriberMetrics {
        let state = trace_read_lock!(self.state);
        state.metrics.clone()
    }
}

/// Builds a [`Subscriber`] from a configuration, reader groups and a callback.
pub struct SubscriberBuilder {
    config: SubscriberConfig,
    reader_groups: Vec<ReaderGroup>,
    callback: Option<DataSetCallback>,
}

impl Default for SubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberBuilder {
    pub fn new() -> SubscriberBuilder {
        SubscriberBuilder {
            config: SubscriberConfig::default(),
            reader_groups: Vec::new(),
            callback: None,
        }
    }

    pub fn config(mut self, config: SubscriberConfig) -> Self {
        self.config = config;
        self
    }

    pub fn add_reader_group(mut self, reader_group: ReaderGroup) -> Self {
        self.reader_groups.push(reader_group);
        self
    }

    pub fn data_set_callback<F>(mut self, cb: F) -> Self
    where
        F: Fn(&DataSetReader, DataSet) + Send + Sync + 'static,
    {
        self.callback = Some(DataSetCallback::new(cb));
        self
    }

    pub fn subscriber(self) -> Subscriber {
        let mut subscriber = Subscriber::new(self.config);
        subscriber.reader_groups = self.reader_groups;
        subscriber.callback = self.callback;
        subscriber
    }
}

/// A `Subscriber` opens a PubSub connection and polls it on a fixed interval. Each poll
/// performs one bounded-time receive; a received datagram is decoded into a
/// NetworkMessage whose dataset messages are offered to every reader, and whatever the
/// readers extract is handed to the dataset callback. A datagram that fails to decode
/// is dropped and the loop simply waits for the next poll.
///
/// The subscriber runs until it receives SIGINT / SIGTERM or a [`SubscriberHandle`]
/// aborts it.
pub struct Subscriber {
    config: SubscriberConfig,
    reader_groups: Vec<ReaderGroup>,
    callback: Option<DataSetCallback>,
    state: Arc<RwLock<SubscriberState>>,
}

impl Subscriber {
    /// Creates a new [`Subscriber`], initialising it from a [`SubscriberConfig`].
    pub fn new(config: SubscriberConfig) -> Subscriber {
        if !config.is_valid() {
            panic!("Cannot create a subscriber using an invalid configuration.");
        }
        Subscriber {
            config,
            reader_groups: Vec::new(),
            callback: None,
            state: Arc::new(RwLock::new(SubscriberState {
                running: false,
                abort: false,
                metrics: SubscriberMetrics::default(),
            })),
        }
    }

    pub fn add_reader_group(&mut self, reader_group: ReaderGroup) {
        self.reader_groups.push(reader_group);
    }

    pub fn set_data_set_callback<F>(&mut self, cb: F)
    where
        F: Fn(&DataSetReader, DataSet) + Send + Sync + 'static,
    {
        self.callback = Some(DataSetCallback::new(cb));
    }

    /// Returns a handle that can stop the subscriber or read its counters from another
    /// thread
    pub fn handle(&self) -> SubscriberHandle {
        SubscriberHandle {
            state: self.state.clone(),
        }
    }

    /// Runs the subscriber and blocks until it stops, either on a quit signal or
    /// through a [`SubscriberHandle`]. Calling this function consumes the subscriber.
    pub fn run(self) -> Result<(), StatusCode> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(Self::subscriber_task(self))
    }

    /// The main subscriber task - opens the connection then polls it until stopped.
    pub async fn subscriber_task(subscriber: Subscriber) -> Result<(), StatusCode> {
        let Subscriber {
            config,
            reader_groups,
            callback,
            state,
        } = subscriber;

        let connection_config = config.connection_config()?;
        let connection = UdpPubSubConnection::reader(&connection_config).await?;
        info!(
            "The PubSub connection \"{}\" was created successfully",
            connection_config.name
        );

        {
            let mut state = trace_write_lock!(state);
            state.running = true;
        }

        let decoding_options = config.decoding_limits.decoding_options();

        // Two async actions are going on, one of which has to complete - either the polling
        // loop breaks out on abort, or a quit signal arrives.
        tokio::select! {
            _ = Self::poll_loop(&connection, &config, &decoding_options, &reader_groups, &callback, &state) => {}
            _ = Self::wait_for_quit_signal() => {
                info!("Subscriber is stopping on a quit signal");
            }
        }

        let metrics = {
            let mut state = trace_write_lock!(state);
            state.running = false;
            state.metrics.clone()
        };
        info!(
            "Subscriber stopped. Received {} datagrams, decoded {} messages with {} failures, dispatched {} data sets",
            metrics.datagrams_received,
            metrics.messages_decoded,
            metrics.decode_failures,
            metrics.data_sets_dispatched
        );
        Ok(())
    }

    /// Resolves when the process receives a quit signal - SIGINT / ctrl-c, and SIGTERM
    /// where there is one.
    async fn wait_for_quit_signal() {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(err) => {
                    warn!("Cannot listen for SIGTERM, error = {:?}", err);
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
    }

    async fn poll_loop(
        connection: &UdpPubSubConnection,
        config: &SubscriberConfig,
        decoding_options: &DecodingOptions,
        reader_groups: &[ReaderGroup],
        callback: &Option<DataSetCallback>,
        state: &Arc<RwLock<SubscriberState>>,
    ) {
        let receive_timeout = Duration::from_millis(config.receive_timeout_ms);
        let mut buf = vec![0u8; config.receive_buffer_size];
        let mut timer = interval_at(
            Instant::now(),
            Duration::from_millis(config.polling_interval_ms),
        );
        loop {
            {
                let state = trace_read_lock!(state);
                if state.is_abort() {
                    debug!("Polling loop is stopping due to abort");
                    break;
                }
            }

            // Timer
            timer.tick().await;

            Self::poll_once(
                connection,
                &mut buf,
                receive_timeout,
                decoding_options,
                reader_groups,
                callback,
                state,
            )
            .await;
        }
    }

    /// One tick of the polling loop - a bounded-time receive, a decode and a dispatch.
    /// Every failure drops the datagram and returns; the next poll starts clean.
    async fn poll_once(
        connection: &UdpPubSubConnection,
        buf: &mut [u8],
        receive_timeout: Duration,
        decoding_options: &DecodingOptions,
        reader_groups: &[ReaderGroup],
        callback: &Option<DataSetCallback>,
        state: &Arc<RwLock<SubscriberState>>,
    ) {
        let size = match connection.receive(buf, receive_timeout).await {
            // Nothing arrived within this poll's receive window
            Err(err) if err == StatusCode::BadTimeout => return,
            Err(err) => {
                warn!("Receive failed with {}, dropping this poll", err);
                return;
            }
            Ok(0) => return,
            Ok(size) => size,
        };
        {
            let mut state = trace_write_lock!(state);
            state.metrics.datagrams_received += 1;
        }
        debug!("Received message of {} bytes", size);
        if size > decoding_options.max_message_size {
            warn!(
                "Message of {} bytes exceeds the max message size {} and is dropped",
                size, decoding_options.max_message_size
            );
            return;
        }

        let mut stream = Cursor::new(&buf[..size]);
        let message = match UadpNetworkMessage::decode(&mut stream, decoding_options) {
            Ok(message) => message,
            Err(err) => {
                let mut state = trace_write_lock!(state);
                state.metrics.decode_failures += 1;
                warn!("Received message failed to decode with {} and is dropped", err);
                return;
            }
        };
        {
            let mut state = trace_write_lock!(state);
            state.metrics.messages_decoded += 1;
        }

        let dispatched = Self::dispatch(&message, reader_groups, callback);
        {
            let mut state = trace_write_lock!(state);
            state.metrics.data_sets_dispatched += dispatched;
        }
    }

    /// Offers every dataset message in the network message to every reader, invoking
    /// the callback for each reader that takes it. Returns how many data sets were
    /// dispatched.
    fn dispatch(
        message: &UadpNetworkMessage,
        reader_groups: &[ReaderGroup],
        callback: &Option<DataSetCallback>,
    ) -> u64 {
        // Is this the correct message type?
        if message.message_type != NetworkMessageType::DataSetMessage {
            trace!("Skipping a network message that does not carry dataset messages");
            return 0;
        }
        // At least one DataSetMessage in the NetworkMessage?
        if let Some(ref writer_ids) = message.data_set_writer_ids {
            if writer_ids.is_empty() {
                trace!("Skipping a network message whose payload header is empty");
                return 0;
            }
        }
        let mut dispatched = 0;
        for (i, data_set_message) in message.messages.iter().enumerate() {
            let writer_id = message
                .data_set_writer_ids
                .as_ref()
                .and_then(|ids| ids.get(i))
                .copied();
            for group in reader_groups {
                for reader in &group.readers {
                    if reader.matches(message, writer_id) {
                        let data_set = reader.read(data_set_message);
                        if let Some(ref callback) = callback {
                            callback.call(reader, data_set);
                        }
                        dispatched += 1;
                    }
                }
            }
        }
        dispatched
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::message::{DataSetFieldValue, GroupHeader};
    use crate::sync::Mutex;
    use crate::types::Variant;

    use super::*;

    fn test_message() -> UadpNetworkMessage {
        UadpNetworkMessage {
            publisher_id: Some(PublisherId::UInt16(2234)),
            group_header: Some(GroupHeader {
                writer_group_id: Some(100),
                ..Default::default()
            }),
            data_set_writer_ids: Some(vec![62541]),
            messages: vec![DataSetMessage::key_frame(vec![
                Variant::Byte(42),
                Variant::from(DateTime::ymd_hms(2024, 1, 2, 3, 4, 5)),
            ])],
            ..Default::default()
        }
    }

    #[test]
    fn reader_matches() {
        let message = test_message();

        // A reader with no filters matches anything
        let reader = DataSetReader::new("catch all");
        assert!(reader.matches(&message, Some(62541)));
        assert!(reader.matches(&message, None));

        let reader = DataSetReader::new("filtered")
            .publisher_id(PublisherId::UInt16(2234))
            .writer_group_id(100)
            .data_set_writer_id(62541);
        assert!(reader.matches(&message, Some(62541)));
        // Wrong writer id
        assert!(!reader.matches(&message, Some(62542)));
        // No writer id paired with the message at all
        assert!(!reader.matches(&message, None));

        let reader = DataSetReader::new("wrong publisher").publisher_id(PublisherId::UInt16(1));
        assert!(!reader.matches(&message, Some(62541)));

        let reader = DataSetReader::new("wrong group").writer_group_id(101);
        assert!(!reader.matches(&message, Some(62541)));
    }

    #[test]
    fn reader_normalizes_fields() {
        let message = test_message();
        let reader = DataSetReader::new("reader");
        let data_set = reader.read(&message.messages[0]);
        assert_eq!(data_set.message_type, DataSetMessageType::KeyFrame);
        assert_eq!(data_set.fields.len(), 2);
        assert_eq!(data_set.fields[0].index, 0);
        assert_eq!(data_set.fields[0].value.value, Some(Variant::Byte(42)));
        assert_eq!(data_set.fields[1].index, 1);
    }

    #[test]
    fn reader_reads_delta_frame() {
        let message = DataSetMessage {
            payload: DataSetMessagePayload::DeltaFrame(vec![(
                3,
                DataSetFieldValue::Variant(Variant::Double(1.5)),
            )]),
            ..Default::default()
        };
        let reader = DataSetReader::new("reader");
        let data_set = reader.read(&message);
        assert_eq!(data_set.message_type, DataSetMessageType::DeltaFrame);
        assert_eq!(data_set.fields.len(), 1);
        assert_eq!(data_set.fields[0].index, 3);
        assert_eq!(data_set.fields[0].value.value, Some(Variant::Double(1.5)));
    }

    #[test]
    fn dispatch_to_matching_readers() {
        let message = test_message();

        let mut group = ReaderGroup::new("group");
        group.add(DataSetReader::new("catch all"));
        group.add(DataSetReader::new("other publisher").publisher_id(PublisherId::Byte(7)));

        let received = Arc::new(Mutex::new(Vec::new()));
        let callback = {
            let received = received.clone();
            Some(DataSetCallback::new(move |reader, data_set| {
                let mut received = trace_lock!(received);
                received.push((reader.name.clone(), data_set));
            }))
        };

        let dispatched = Subscriber::dispatch(&message, &[group], &callback);
        assert_eq!(dispatched, 1);
        let received = trace_lock!(received);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "catch all");
        assert_eq!(received[0].1.fields.len(), 2);
    }

    #[test]
    fn dispatch_skips_empty_payload_header() {
        let mut message = test_message();
        message.data_set_writer_ids = Some(Vec::new());
        message.messages.clear();

        let mut group = ReaderGroup::new("group");
        group.add(DataSetReader::new("catch all"));

        assert_eq!(Subscriber::dispatch(&message, &[group], &None), 0);
    }
}
