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

//! Loopback bridge connecting engines that share one process.
//!
//! A message sent by a bridge producer reaches every open bridge consumer
//! attached to the same `(bridge_id, endpoint_id)` pair. The first handle on
//! an endpoint fixes its auth token; later handles presenting another token
//! are rejected.

use super::dispatch::ListenerDispatch;
use crate::model::bridge_config::BridgeConfig;
use crate::model::message::Message;
use crate::observability::events;
use crate::transport::{
    BridgeConsumer, BridgeProducer, BridgeTransport, MessageListener, TransportError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

const COMPONENT: &str = "in_process_bridge";

type EndpointKey = (i32, String);

fn endpoint_key(config: &BridgeConfig) -> EndpointKey {
    (config.bridge_id, config.endpoint_id.clone())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct BridgeState {
    tokens: HashMap<EndpointKey, String>,
    producers: HashMap<String, Arc<InProcessBridgeProducer>>,
    consumers: HashMap<String, Arc<InProcessBridgeConsumer>>,
}

struct BridgeCore {
    available: AtomicBool,
    state: Mutex<BridgeState>,
}

impl BridgeCore {
    fn authorize(&self, config: &BridgeConfig) -> Result<(), TransportError> {
        if !self.available.load(Ordering::Acquire) {
            return Err(TransportError::Unavailable(
                "bridge is not reachable".to_string(),
            ));
        }

        let mut state = lock(&self.state);
        let token = state
            .tokens
            .entry(endpoint_key(config))
            .or_insert_with(|| config.auth_token.clone());
        if *token != config.auth_token {
            return Err(TransportError::Rejected(format!(
                "auth token refused for bridge {} endpoint {}",
                config.bridge_id, config.endpoint_id
            )));
        }
        Ok(())
    }

    fn deliver(&self, key: &EndpointKey, message: &Message) -> usize {
        let consumers: Vec<Arc<InProcessBridgeConsumer>> = lock(&self.state)
            .consumers
            .values()
            .filter(|consumer| consumer.key == *key && !consumer.is_closed())
            .cloned()
            .collect();

        consumers
            .iter()
            .filter(|consumer| consumer.deliver(message.clone()))
            .count()
    }
}

/// Bridge producer handle returned by [`InProcessBridge`].
pub struct InProcessBridgeProducer {
    name: String,
    key: EndpointKey,
    core: Weak<BridgeCore>,
    closed: AtomicBool,
}

#[async_trait]
impl BridgeProducer for InProcessBridgeProducer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let core = self.core.upgrade().ok_or(TransportError::Closed)?;
        if !core.available.load(Ordering::Acquire) {
            return Err(TransportError::Unavailable(
                "bridge is not reachable".to_string(),
            ));
        }

        let delivered = core.deliver(&self.key, message);
        debug!(
            event = events::BRIDGE_RELAY,
            component = COMPONENT,
            producer = self.name.as_str(),
            bridge_id = self.key.0,
            delivered,
            "relayed message across bridge"
        );
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Bridge consumer handle returned by [`InProcessBridge`].
pub struct InProcessBridgeConsumer {
    name: String,
    key: EndpointKey,
    listener: Mutex<Option<ListenerDispatch>>,
    closed: AtomicBool,
}

impl InProcessBridgeConsumer {
    fn deliver(&self, message: Message) -> bool {
        let mut listener = lock(&self.listener);
        match listener.as_ref().map(|dispatch| dispatch.dispatch(message)) {
            Some(Ok(())) => true,
            Some(Err(_)) => {
                *listener = None;
                false
            }
            None => false,
        }
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
        lock(&self.listener).take();
    }
}

#[async_trait]
impl BridgeConsumer for InProcessBridgeConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set_listener(&self, listener: Arc<dyn MessageListener>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        *lock(&self.listener) = Some(ListenerDispatch::spawn(&self.name, listener));
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.mark_closed();
    }
}

/// Bridge transport shared by every engine in the process.
///
/// Clones share the same loopback.
#[derive(Clone)]
pub struct InProcessBridge {
    core: Arc<BridgeCore>,
}

impl Default for InProcessBridge {
    fn default() -> Self {
        Self {
            core: Arc::new(BridgeCore {
                available: AtomicBool::new(true),
                state: Mutex::new(BridgeState::default()),
            }),
        }
    }
}

impl InProcessBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable, handle creation and sends fail.
    pub fn set_available(&self, available: bool) {
        self.core.available.store(available, Ordering::Release);
    }

    /// Closes a producer without removing it, as a dropped connection would.
    pub fn sever_producer(&self, name: &str) -> bool {
        let producer = lock(&self.core.state).producers.get(name).cloned();
        match producer {
            Some(producer) => {
                producer.closed.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Closes a consumer without removing it, as a dropped connection would.
    pub fn sever_consumer(&self, name: &str) -> bool {
        let consumer = lock(&self.core.state).consumers.get(name).cloned();
        match consumer {
            Some(consumer) => {
                consumer.mark_closed();
                true
            }
            None => false,
        }
    }

    pub fn open_producer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.core.state)
            .producers
            .values()
            .filter(|producer| !producer.is_closed())
            .map(|producer| producer.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn open_consumer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.core.state)
            .consumers
            .values()
            .filter(|consumer| !consumer.is_closed())
            .map(|consumer| consumer.name.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl BridgeTransport for InProcessBridge {
    async fn get_consumer(
        &self,
        name: &str,
        config: &BridgeConfig,
    ) -> Result<Arc<dyn BridgeConsumer>, TransportError> {
        self.core.authorize(config)?;

        let consumer = Arc::new(InProcessBridgeConsumer {
            name: name.to_string(),
            key: endpoint_key(config),
            listener: Mutex::new(None),
            closed: AtomicBool::new(false),
        });
        let replaced = lock(&self.core.state)
            .consumers
            .insert(name.to_string(), consumer.clone());
        if let Some(replaced) = replaced {
            replaced.mark_closed();
        }

        Ok(consumer)
    }

    async fn get_producer(
        &self,
        name: &str,
        config: &BridgeConfig,
    ) -> Result<Arc<dyn BridgeProducer>, TransportError> {
        self.core.authorize(config)?;

        let producer = Arc::new(InProcessBridgeProducer {
            name: name.to_string(),
            key: endpoint_key(config),
            core: Arc::downgrade(&self.core),
            closed: AtomicBool::new(false),
        });
        let replaced = lock(&self.core.state)
            .producers
            .insert(name.to_string(), producer.clone());
        if let Some(replaced) = replaced {
            replaced.closed.store(true, Ordering::Release);
        }

        Ok(producer)
    }

    async fn remove_producer(&self, name: &str) {
        let removed = lock(&self.core.state).producers.remove(name);
        match removed {
            Some(producer) => producer.closed.store(true, Ordering::Release),
            None => warn!(
                event = events::BRIDGE_PRODUCER_MISSING,
                component = COMPONENT,
                producer = name,
                "bridge producer to remove was not registered"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::InProcessBridge;
    use crate::model::bridge_config::BridgeConfig;
    use crate::model::message::Message;
    use crate::transport::{BridgeTransport, MessageListener, TransportError};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingListener {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageListener for RecordingListener {
        async fn on_receive(&self, message: Message) {
            self.seen.lock().await.push(message.id);
        }
    }

    #[tokio::test]
    async fn producer_reaches_consumers_on_same_endpoint_only() {
        let bridge = InProcessBridge::new();
        let config = BridgeConfig::new(1, "endpoint", "token");
        let other = BridgeConfig::new(2, "endpoint", "token");

        let same = Arc::new(RecordingListener::default());
        let different = Arc::new(RecordingListener::default());
        bridge
            .get_consumer("c1", &config)
            .await
            .unwrap()
            .set_listener(same.clone())
            .await
            .unwrap();
        bridge
            .get_consumer("c2", &other)
            .await
            .unwrap()
            .set_listener(different.clone())
            .await
            .unwrap();

        let producer = bridge.get_producer("p", &config).await.unwrap();
        producer
            .send(&Message::new("m1", "tag", 0, Vec::new()))
            .await
            .unwrap();

        for _ in 0..50 {
            if !same.seen.lock().await.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(*same.seen.lock().await, vec!["m1"]);
        assert!(different.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn mismatched_token_is_rejected() {
        let bridge = InProcessBridge::new();
        bridge
            .get_producer("p", &BridgeConfig::new(1, "endpoint", "token"))
            .await
            .unwrap();

        let refused = bridge
            .get_consumer("c", &BridgeConfig::new(1, "endpoint", "other"))
            .await;

        assert!(matches!(refused, Err(TransportError::Rejected(_))));
    }

    #[tokio::test]
    async fn severed_producer_reports_closed() {
        let bridge = InProcessBridge::new();
        let producer = bridge
            .get_producer("p", &BridgeConfig::new(1, "endpoint", "token"))
            .await
            .unwrap();

        assert!(bridge.sever_producer("p"));

        assert!(producer.is_closed());
        assert!(bridge.open_producer_names().is_empty());
    }
}
