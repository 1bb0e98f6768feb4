/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Inbound side of a route: local and remote receivers.
//!
//! A receiver owns one broker consumer for its whole life. Repairing a dead
//! consumer means replacing the receiver, never swapping its handle.

use crate::data_plane::delivery::DeliveryMode;
use crate::model::message::Message;
use crate::model::route::{Receiver, RemoteReceiverKey};
use crate::observability::{events, fields};
use crate::transport::{
    BridgeProducer, BridgeTransport, BrokerConsumer, MessageListener, TransportError,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Level};

const COMPONENT: &str = "message_receiver";

/// Drains every immediately available message, acknowledging each one.
async fn drain(consumer: &dyn BrokerConsumer) -> Result<Vec<Message>, TransportError> {
    let mut messages = Vec::new();
    loop {
        match consumer.receive_immediate().await {
            Ok(Some(message)) => {
                if let Err(err) = consumer.acknowledge(&message).await {
                    warn!(
                        event = events::RECEIVER_ACK_FAILED,
                        component = COMPONENT,
                        channel = consumer.name(),
                        msg_id = message.id.as_str(),
                        err = %err,
                        "failed to acknowledge message"
                    );
                }
                messages.push(message);
            }
            Ok(None) => return Ok(messages),
            // Keep what was already taken off the queue.
            Err(err) if !messages.is_empty() => {
                warn!(
                    event = events::RECEIVER_POLL_FAILED,
                    component = COMPONENT,
                    channel = consumer.name(),
                    drained = messages.len(),
                    err = %err,
                    "poll interrupted; returning messages drained so far"
                );
                return Ok(messages);
            }
            Err(err) => return Err(err),
        }
    }
}

struct LocalReceiverState {
    mode: DeliveryMode,
    closed: bool,
}

/// Receiver for a microservice running on this node.
pub struct LocalMessageReceiver {
    microservice_id: String,
    consumer: Arc<dyn BrokerConsumer>,
    state: Mutex<LocalReceiverState>,
}

impl LocalMessageReceiver {
    pub fn new(microservice_id: &str, consumer: Arc<dyn BrokerConsumer>) -> Self {
        Self {
            microservice_id: microservice_id.to_string(),
            consumer,
            state: Mutex::new(LocalReceiverState {
                mode: DeliveryMode::Polling,
                closed: false,
            }),
        }
    }

    pub fn microservice_id(&self) -> &str {
        &self.microservice_id
    }

    /// Drains queued messages. Returns nothing while streaming.
    pub async fn get_messages(&self) -> Result<Vec<Message>, TransportError> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.mode.is_streaming() {
            return Ok(Vec::new());
        }
        drain(self.consumer.as_ref()).await
    }

    pub async fn enable_real_time_receiving(
        &self,
        listener: Arc<dyn MessageListener>,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::Closed);
        }

        match state.mode.stream_to(self.consumer.clone(), listener).await {
            Ok(()) => {
                info!(
                    event = events::RECEIVER_STREAMING_ENABLE,
                    component = COMPONENT,
                    receiver_id = self.microservice_id.as_str(),
                    "real-time receiving enabled"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    event = events::RECEIVER_STREAMING_ENABLE_FAILED,
                    component = COMPONENT,
                    receiver_id = self.microservice_id.as_str(),
                    err = %err,
                    "failed to enable real-time receiving"
                );
                Err(err)
            }
        }
    }

    pub async fn disable_real_time_receiving(&self) {
        let detached = self.state.lock().await.mode.poll().await;
        if detached.is_some() {
            info!(
                event = events::RECEIVER_STREAMING_DISABLE,
                component = COMPONENT,
                receiver_id = self.microservice_id.as_str(),
                "real-time receiving disabled"
            );
        }
    }

    pub async fn is_streaming(&self) -> bool {
        self.state.lock().await.mode.is_streaming()
    }

    /// The installed real-time listener, if any.
    pub async fn listener(&self) -> Option<Arc<dyn MessageListener>> {
        self.state.lock().await.mode.listener()
    }

    pub fn is_consumer_closed(&self) -> bool {
        self.consumer.is_closed()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.mode.poll().await;
        state.closed = true;
        self.consumer.close().await;

        debug!(
            event = events::RECEIVER_CLOSE,
            component = COMPONENT,
            receiver_id = self.microservice_id.as_str(),
            "local receiver closed"
        );
    }
}

/// Forwards every message delivered to a remote receiver onto its bridge.
struct BridgeRelayListener {
    key: RemoteReceiverKey,
    producer: Arc<dyn BridgeProducer>,
}

#[async_trait]
impl MessageListener for BridgeRelayListener {
    async fn on_receive(&self, message: Message) {
        if let Err(err) = self.producer.send(&message).await {
            warn!(
                event = events::RECEIVER_BRIDGE_RELAY_FAILED,
                component = COMPONENT,
                producer_id = self.key.producer_id.as_str(),
                receiver_id = self.key.microservice_id.as_str(),
                msg_id = fields::format_message_id(&message),
                err = %err,
                "failed to relay message onto bridge"
            );
        }
    }
}

struct RemoteReceiverState {
    receiver: Receiver,
    mode: DeliveryMode,
    bridge_producer: Option<Arc<dyn BridgeProducer>>,
    closed: bool,
}

/// Receiver for a microservice on another node, reached through a bridge.
///
/// While its bridge producer is up the receiver streams: every message the
/// broker delivers is relayed onto the bridge.
pub struct RemoteMessageReceiver {
    key: RemoteReceiverKey,
    consumer: Arc<dyn BrokerConsumer>,
    bridge: Arc<dyn BridgeTransport>,
    state: Mutex<RemoteReceiverState>,
}

impl RemoteMessageReceiver {
    pub fn new(
        key: RemoteReceiverKey,
        receiver: Receiver,
        consumer: Arc<dyn BrokerConsumer>,
        bridge: Arc<dyn BridgeTransport>,
    ) -> Self {
        Self {
            key,
            consumer,
            bridge,
            state: Mutex::new(RemoteReceiverState {
                receiver,
                mode: DeliveryMode::Polling,
                bridge_producer: None,
                closed: false,
            }),
        }
    }

    pub fn key(&self) -> &RemoteReceiverKey {
        &self.key
    }

    pub async fn receiver(&self) -> Receiver {
        self.state.lock().await.receiver.clone()
    }

    /// Drains queued messages. Returns nothing while relaying.
    pub async fn get_messages(&self) -> Result<Vec<Message>, TransportError> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.mode.is_streaming() {
            return Ok(Vec::new());
        }
        drain(self.consumer.as_ref()).await
    }

    /// Opens the bridge producer and starts relaying. A no-op while the
    /// current bridge producer is open.
    pub async fn enable_bridge_producing(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        self.enable_bridge_producing_locked(&mut state).await
    }

    /// Stops relaying and tears down the bridge producer.
    pub async fn disable_real_time_receiving(&self) {
        let mut state = self.state.lock().await;
        self.disable_locked(&mut state).await;
    }

    /// Rebuilds the bridge producer when the bridge config changed. The
    /// broker consumer is kept.
    pub async fn update(&self, receiver: Receiver) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.receiver.bridge_config() == receiver.bridge_config() {
            state.receiver = receiver;
            return Ok(());
        }

        info!(
            event = events::RECEIVER_UPDATE,
            component = COMPONENT,
            producer_id = self.key.producer_id.as_str(),
            receiver_id = self.key.microservice_id.as_str(),
            from = fields::format_receiver(&state.receiver),
            to = fields::format_receiver(&receiver),
            "remote receiver bridge config changed"
        );
        self.disable_locked(&mut state).await;
        state.receiver = receiver;
        self.enable_bridge_producing_locked(&mut state).await
    }

    /// `true` when a live receiver is not relaying through an open bridge
    /// producer.
    pub async fn needs_bridge_repair(&self) -> bool {
        let state = self.state.lock().await;
        let producer_down = state
            .bridge_producer
            .as_ref()
            .map_or(true, |producer| producer.is_closed());
        !state.closed && (producer_down || !state.mode.is_streaming())
    }

    pub async fn is_streaming(&self) -> bool {
        self.state.lock().await.mode.is_streaming()
    }

    pub fn is_consumer_closed(&self) -> bool {
        self.consumer.is_closed()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        self.disable_locked(&mut state).await;
        state.closed = true;
        self.consumer.close().await;

        debug!(
            event = events::RECEIVER_CLOSE,
            component = COMPONENT,
            producer_id = self.key.producer_id.as_str(),
            receiver_id = self.key.microservice_id.as_str(),
            "remote receiver closed"
        );
    }

    async fn enable_bridge_producing_locked(
        &self,
        state: &mut RemoteReceiverState,
    ) -> Result<(), TransportError> {
        if state.closed {
            return Err(TransportError::Closed);
        }
        let healthy = state
            .bridge_producer
            .as_ref()
            .is_some_and(|producer| !producer.is_closed());
        if healthy && state.mode.is_streaming() {
            return Ok(());
        }

        let Some(config) = state.receiver.bridge_config().cloned() else {
            return Err(TransportError::Rejected(format!(
                "receiver {} has no bridge config",
                self.key
            )));
        };

        self.disable_locked(state).await;
        let result = async {
            let producer = self
                .bridge
                .get_producer(&self.key.channel_name(), &config)
                .await?;
            let relay = Arc::new(BridgeRelayListener {
                key: self.key.clone(),
                producer: producer.clone(),
            });
            state.bridge_producer = Some(producer);
            state.mode.stream_to(self.consumer.clone(), relay).await
        }
        .await;

        match &result {
            Ok(()) => info!(
                event = events::RECEIVER_BRIDGE_ENABLE_OK,
                component = COMPONENT,
                producer_id = self.key.producer_id.as_str(),
                receiver_id = self.key.microservice_id.as_str(),
                bridge = fields::format_bridge(Some(&config)),
                "remote receiver relaying onto bridge"
            ),
            Err(err) => warn!(
                event = events::RECEIVER_BRIDGE_ENABLE_FAILED,
                component = COMPONENT,
                producer_id = self.key.producer_id.as_str(),
                receiver_id = self.key.microservice_id.as_str(),
                bridge = fields::format_bridge(Some(&config)),
                err = %err,
                "failed to enable bridge relay"
            ),
        }
        result
    }

    async fn disable_locked(&self, state: &mut RemoteReceiverState) {
        state.mode.poll().await;
        if let Some(producer) = state.bridge_producer.take() {
            producer.close().await;
            self.bridge.remove_producer(producer.name()).await;

            if tracing::enabled!(Level::DEBUG) {
                debug!(
                    event = events::RECEIVER_STREAMING_DISABLE,
                    component = COMPONENT,
                    producer_id = self.key.producer_id.as_str(),
                    receiver_id = self.key.microservice_id.as_str(),
                    bridge = fields::format_receiver(&state.receiver),
                    "bridge relay torn down"
                );
            }
        }
    }
}
