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

//! Outbound side of a route.

use crate::config::ArchiveConfig;
use crate::data_plane::archive::MessageArchive;
use crate::model::message::Message;
use crate::model::route::Route;
use crate::observability::{events, fields};
use crate::status::MessageBusStatus;
use crate::transport::{
    BridgeConsumer, BridgeTransport, BrokerProducer, MessageListener, TaggedMessage,
    TransportError,
};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Level};

const COMPONENT: &str = "message_publisher";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PublishError {
    Closed,
    UnknownProducer(String),
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Closed => write!(f, "publisher is closed"),
            PublishError::UnknownProducer(id) => write!(f, "no publisher for producer {id}"),
        }
    }
}

impl Error for PublishError {}

/// Republishes what arrives over the bridge for a non-local producer.
struct BridgeIngressListener {
    publisher: Weak<MessagePublisher>,
}

#[async_trait]
impl MessageListener for BridgeIngressListener {
    async fn on_receive(&self, message: Message) {
        let Some(publisher) = self.publisher.upgrade() else {
            return;
        };

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                event = events::PUBLISHER_BRIDGE_INGRESS,
                component = COMPONENT,
                producer_id = publisher.producer_id(),
                msg_id = fields::format_message_id(&message),
                "message arrived over bridge"
            );
        }
        // A closed publisher drops late bridge traffic.
        let _ = publisher.publish(message).await;
    }
}

struct PublisherState {
    route: Route,
    archive: MessageArchive,
    bridge_consumer: Option<Arc<dyn BridgeConsumer>>,
    closed: bool,
}

/// Owns one route's broker producer, archive and, for a non-local producer,
/// the bridge consumer feeding it.
///
/// The broker producer is fixed for the publisher's lifetime; a dead producer
/// is repaired by replacing the whole publisher.
pub struct MessagePublisher {
    producer_id: String,
    producer: Arc<dyn BrokerProducer>,
    bridge: Arc<dyn BridgeTransport>,
    status: Arc<MessageBusStatus>,
    weak_self: Weak<MessagePublisher>,
    state: Mutex<PublisherState>,
}

impl MessagePublisher {
    pub fn new(
        route: Route,
        producer: Arc<dyn BrokerProducer>,
        bridge: Arc<dyn BridgeTransport>,
        archive_config: ArchiveConfig,
        status: Arc<MessageBusStatus>,
    ) -> Arc<Self> {
        let producer_id = route.producer_id().to_string();
        let archive = MessageArchive::new(&producer_id, archive_config);

        Arc::new_cyclic(|weak_self| Self {
            producer_id,
            producer,
            bridge,
            status,
            weak_self: weak_self.clone(),
            state: Mutex::new(PublisherState {
                route,
                archive,
                bridge_consumer: None,
                closed: false,
            }),
        })
    }

    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    pub async fn route(&self) -> Route {
        self.state.lock().await.route.clone()
    }

    /// Archives the message, then sends one copy per receiver in route order.
    ///
    /// Archive and per-receiver send failures are logged and skipped; only a
    /// closed publisher is an error.
    pub async fn publish(&self, message: Message) -> Result<(), PublishError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(PublishError::Closed);
        }

        if let Err(err) = state.archive.save(&message) {
            warn!(
                event = events::PUBLISH_ARCHIVE_FAILED,
                component = COMPONENT,
                producer_id = self.producer_id.as_str(),
                msg_id = fields::format_message_id(&message),
                err = %err,
                "failed to archive message; delivering anyway"
            );
        }

        for (receiver, channel) in state.route.delivery_channels() {
            let tagged = TaggedMessage {
                channel,
                message: message.clone(),
            };
            match self.producer.send(tagged).await {
                Ok(()) => {
                    if tracing::enabled!(Level::DEBUG) {
                        debug!(
                            event = events::PUBLISH_SEND,
                            component = COMPONENT,
                            producer_id = self.producer_id.as_str(),
                            receiver_id = fields::format_receiver(receiver),
                            msg_id = message.id.as_str(),
                            "message sent to receiver"
                        );
                    }
                }
                Err(err) => warn!(
                    event = events::PUBLISH_SEND_FAILED,
                    component = COMPONENT,
                    producer_id = self.producer_id.as_str(),
                    receiver_id = fields::format_receiver(receiver),
                    msg_id = message.id.as_str(),
                    err = %err,
                    "failed to send message to receiver"
                ),
            }
        }

        self.status.record_published(&self.producer_id);
        Ok(())
    }

    /// Archived messages with `from <= timestamp <= to`, oldest first.
    pub async fn message_query(&self, from: i64, to: i64) -> Vec<Message> {
        self.state.lock().await.archive.query(from, to)
    }

    /// Swaps in a new route for the same producer.
    ///
    /// A bridge consumer is never left running against a stale config, and a
    /// new one only starts once the new route is in place.
    pub async fn update_route(&self, route: Route) {
        let mut state = self.state.lock().await;
        if state.closed || state.route == route {
            return;
        }

        let was_remote = !state.route.producer.is_local();
        let is_remote = !route.producer.is_local();
        let bridge_changed = state.route.producer.bridge_config() != route.producer.bridge_config();

        info!(
            event = events::PUBLISHER_ROUTE_UPDATE,
            component = COMPONENT,
            producer_id = self.producer_id.as_str(),
            from = fields::format_receivers(&state.route.receivers),
            to = fields::format_receivers(&route.receivers),
            bridge = fields::format_locality(&route.producer.locality),
            "publisher route updated"
        );

        match (was_remote, is_remote) {
            (true, false) => {
                self.disable_bridge_consuming_locked(&mut state).await;
                state.route = route;
            }
            (false, true) => {
                state.route = route;
                let _ = self.enable_bridge_consuming_locked(&mut state).await;
            }
            (true, true) if bridge_changed => {
                self.disable_bridge_consuming_locked(&mut state).await;
                state.route = route;
                let _ = self.enable_bridge_consuming_locked(&mut state).await;
            }
            _ => state.route = route,
        }
    }

    /// Subscribes to the bridge for a non-local producer. A no-op for local
    /// producers or while the current bridge consumer is open.
    pub async fn enable_bridge_consuming(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        self.enable_bridge_consuming_locked(&mut state).await
    }

    pub async fn disable_bridge_consuming(&self) {
        let mut state = self.state.lock().await;
        self.disable_bridge_consuming_locked(&mut state).await;
    }

    /// `true` when a live non-local publisher has no open bridge consumer.
    pub async fn needs_bridge_repair(&self) -> bool {
        let state = self.state.lock().await;
        !state.closed
            && !state.route.producer.is_local()
            && state
                .bridge_consumer
                .as_ref()
                .map_or(true, |consumer| consumer.is_closed())
    }

    pub fn is_producer_closed(&self) -> bool {
        self.producer.is_closed()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Closes the archive and the bridge path. The broker producer belongs to
    /// the engine and is removed there.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        state.archive.close();
        self.disable_bridge_consuming_locked(&mut state).await;

        debug!(
            event = events::PUBLISHER_CLOSE,
            component = COMPONENT,
            producer_id = self.producer_id.as_str(),
            "publisher closed"
        );
    }

    async fn enable_bridge_consuming_locked(
        &self,
        state: &mut PublisherState,
    ) -> Result<(), TransportError> {
        if state.closed {
            return Err(TransportError::Closed);
        }
        let Some(config) = state.route.producer.bridge_config().cloned() else {
            return Ok(());
        };
        if state
            .bridge_consumer
            .as_ref()
            .is_some_and(|consumer| !consumer.is_closed())
        {
            return Ok(());
        }

        self.disable_bridge_consuming_locked(state).await;
        let listener = Arc::new(BridgeIngressListener {
            publisher: self.weak_self.clone(),
        });
        let result = async {
            let consumer = self.bridge.get_consumer(&self.producer_id, &config).await?;
            consumer.set_listener(listener).await?;
            Ok::<_, TransportError>(consumer)
        }
        .await;

        match result {
            Ok(consumer) => {
                state.bridge_consumer = Some(consumer);
                info!(
                    event = events::PUBLISHER_BRIDGE_ENABLE_OK,
                    component = COMPONENT,
                    producer_id = self.producer_id.as_str(),
                    bridge = fields::format_bridge(Some(&config)),
                    "publisher consuming from bridge"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    event = events::PUBLISHER_BRIDGE_ENABLE_FAILED,
                    component = COMPONENT,
                    producer_id = self.producer_id.as_str(),
                    bridge = fields::format_bridge(Some(&config)),
                    err = %err,
                    "failed to consume from bridge"
                );
                Err(err)
            }
        }
    }

    async fn disable_bridge_consuming_locked(&self, state: &mut PublisherState) {
        if let Some(consumer) = state.bridge_consumer.take() {
            consumer.close().await;
            debug!(
                event = events::PUBLISHER_BRIDGE_DISABLE,
                component = COMPONENT,
                producer_id = self.producer_id.as_str(),
                "publisher stopped consuming from bridge"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MessagePublisher, PublishError};
    use crate::config::ArchiveConfig;
    use crate::model::bridge_config::BridgeConfig;
    use crate::model::message::Message;
    use crate::model::route::{Producer, Receiver, RemoteReceiverKey, Route};
    use crate::status::MessageBusStatus;
    use crate::transport::in_process::{InProcessBridge, InProcessBroker};
    use crate::transport::{BridgeTransport, BrokerTransport};
    use std::sync::Arc;

    struct Fixture {
        broker: InProcessBroker,
        bridge: InProcessBridge,
        status: Arc<MessageBusStatus>,
    }

    impl Fixture {
        async fn new() -> Self {
            let broker = InProcessBroker::new();
            broker.start_server().await.unwrap();
            Self {
                broker,
                bridge: InProcessBridge::new(),
                status: Arc::new(MessageBusStatus::new()),
            }
        }

        async fn publisher(&self, route: Route) -> Arc<MessagePublisher> {
            let producer = self
                .broker
                .create_producer(route.producer_id())
                .await
                .unwrap();
            MessagePublisher::new(
                route,
                producer,
                Arc::new(self.bridge.clone()),
                ArchiveConfig::default(),
                self.status.clone(),
            )
        }
    }

    fn message(id: &str, timestamp: i64) -> Message {
        Message::new(id, "tag", timestamp, b"payload".to_vec())
    }

    #[tokio::test]
    async fn publish_fans_out_to_every_receiver_channel() {
        let fixture = Fixture::new().await;
        let remote = BridgeConfig::new(1, "endpoint", "token");
        let publisher = fixture
            .publisher(Route::new(
                Producer::local("p"),
                vec![Receiver::local("r1"), Receiver::remote("r2", remote)],
            ))
            .await;

        publisher.publish(message("m1", 1)).await.unwrap();

        assert_eq!(fixture.broker.pending_messages("r1"), 1);
        assert_eq!(
            fixture
                .broker
                .pending_messages(&RemoteReceiverKey::new("p", "r2").channel_name()),
            1
        );
        assert_eq!(fixture.status.published_by("p"), Some(1));
    }

    #[tokio::test]
    async fn message_query_reads_archive_window() {
        let fixture = Fixture::new().await;
        let publisher = fixture
            .publisher(Route::new(Producer::local("p"), vec![Receiver::local("r")]))
            .await;

        publisher.publish(message("t1", 100)).await.unwrap();
        publisher.publish(message("t2", 200)).await.unwrap();
        publisher.publish(message("t3", 300)).await.unwrap();

        let ids: Vec<String> = publisher
            .message_query(100, 200)
            .await
            .into_iter()
            .map(|message| message.id)
            .collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn archive_failure_does_not_block_delivery() {
        let fixture = Fixture::new().await;
        let producer = fixture.broker.create_producer("p").await.unwrap();
        let publisher = MessagePublisher::new(
            Route::new(Producer::local("p"), vec![Receiver::local("r")]),
            producer,
            Arc::new(fixture.bridge.clone()),
            ArchiveConfig {
                max_bytes: 1,
                max_age_ms: None,
            },
            fixture.status.clone(),
        );

        publisher.publish(message("m1", 1)).await.unwrap();

        assert_eq!(fixture.broker.pending_messages("r"), 1);
        assert!(publisher.message_query(0, 10).await.is_empty());
    }

    #[tokio::test]
    async fn closed_publisher_rejects_publish_and_close_is_idempotent() {
        let fixture = Fixture::new().await;
        let publisher = fixture
            .publisher(Route::new(Producer::local("p"), vec![Receiver::local("r")]))
            .await;

        publisher.close().await;
        publisher.close().await;

        assert_eq!(
            publisher.publish(message("m1", 1)).await,
            Err(PublishError::Closed)
        );
    }

    #[tokio::test]
    async fn locality_flip_enables_then_disables_bridge_consumer() {
        let fixture = Fixture::new().await;
        let config = BridgeConfig::new(1, "endpoint", "token");
        let local_route = Route::new(Producer::local("p"), vec![Receiver::local("r")]);
        let remote_route = Route::new(
            Producer::remote("p", config.clone()),
            vec![Receiver::local("r")],
        );
        let publisher = fixture.publisher(local_route.clone()).await;

        publisher.update_route(remote_route.clone()).await;
        assert_eq!(publisher.route().await, remote_route);
        assert_eq!(fixture.bridge.open_consumer_names(), vec!["p".to_string()]);
        assert!(!publisher.needs_bridge_repair().await);

        publisher.update_route(local_route.clone()).await;
        assert_eq!(publisher.route().await, local_route);
        assert!(fixture.bridge.open_consumer_names().is_empty());
    }

    #[tokio::test]
    async fn bridge_traffic_is_republished_locally() {
        let fixture = Fixture::new().await;
        let config = BridgeConfig::new(1, "endpoint", "token");
        let publisher = fixture
            .publisher(Route::new(
                Producer::remote("p", config.clone()),
                vec![Receiver::local("r")],
            ))
            .await;
        publisher.enable_bridge_consuming().await.unwrap();

        fixture
            .bridge
            .get_producer("far-side", &config)
            .await
            .unwrap()
            .send(&message("m1", 1))
            .await
            .unwrap();

        for _ in 0..100 {
            if fixture.broker.pending_messages("r") == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(fixture.broker.pending_messages("r"), 1);
    }

    #[tokio::test]
    async fn severed_bridge_consumer_needs_repair() {
        let fixture = Fixture::new().await;
        let config = BridgeConfig::new(1, "endpoint", "token");
        let publisher = fixture
            .publisher(Route::new(
                Producer::remote("p", config),
                vec![Receiver::local("r")],
            ))
            .await;
        publisher.enable_bridge_consuming().await.unwrap();

        fixture.bridge.sever_consumer("p");

        assert!(publisher.needs_bridge_repair().await);
        publisher.enable_bridge_consuming().await.unwrap();
        assert!(!publisher.needs_bridge_repair().await);
    }
}
