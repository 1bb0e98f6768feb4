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

//! In-process broker with named channels and fault injection.
//!
//! Channels are queues keyed by consumer name. A channel outlives the consumer
//! handles attached to it, so replacing a consumer keeps its backlog; only
//! [`BrokerTransport::remove_consumer`] discards it. Every consumer handle
//! carries a generation so a stale handle can never detach the listener of
//! its replacement.

use super::dispatch::ListenerDispatch;
use crate::model::message::Message;
use crate::observability::events;
use crate::transport::{
    BrokerConsumer, BrokerProducer, BrokerTransport, MessageListener, TaggedMessage,
    TransportError,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

const COMPONENT: &str = "in_process_broker";

#[derive(Default)]
struct ChannelQueue {
    pending: VecDeque<Message>,
    pending_bytes: u64,
    listener: Option<(u64, ListenerDispatch)>,
}

impl ChannelQueue {
    fn push(&mut self, message: Message) {
        self.pending_bytes += message.bytes.len() as u64;
        self.pending.push_back(message);
    }

    fn pop(&mut self) -> Option<Message> {
        let message = self.pending.pop_front()?;
        self.pending_bytes = self
            .pending_bytes
            .saturating_sub(message.bytes.len() as u64);
        Some(message)
    }

    fn detach_listener(&mut self, generation: u64) {
        if matches!(self.listener, Some((owner, _)) if owner == generation) {
            self.listener = None;
        }
    }
}

type SharedQueue = Arc<Mutex<ChannelQueue>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct BrokerState {
    producers: HashMap<String, Arc<InProcessProducer>>,
    consumers: HashMap<String, Arc<InProcessConsumer>>,
    channels: HashMap<String, SharedQueue>,
}

#[derive(Default)]
struct BrokerCore {
    active: AtomicBool,
    fail_creates: AtomicBool,
    memory_limit: Mutex<Option<u64>>,
    next_generation: AtomicU64,
    state: Mutex<BrokerState>,
}

impl BrokerCore {
    fn channel(&self, name: &str) -> SharedQueue {
        lock(&self.state)
            .channels
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    fn enqueue(&self, tagged: TaggedMessage) -> Result<(), TransportError> {
        if !self.active.load(Ordering::Acquire) {
            return Err(TransportError::Unavailable(
                "broker server is not active".to_string(),
            ));
        }

        let limit = *lock(&self.memory_limit);
        let queue = self.channel(&tagged.channel);
        let mut queue = lock(&queue);

        let mut message = tagged.message;
        if let Some((_, dispatch)) = queue.listener.as_ref() {
            match dispatch.dispatch(message) {
                Ok(()) => return Ok(()),
                Err(undelivered) => message = undelivered,
            }
            queue.listener = None;
        }

        if let Some(limit) = limit {
            if queue.pending_bytes + message.bytes.len() as u64 > limit {
                return Err(TransportError::Rejected(format!(
                    "channel {} exceeds memory limit of {limit} bytes",
                    tagged.channel
                )));
            }
        }
        queue.push(message);
        Ok(())
    }

    fn ensure_can_create(&self) -> Result<(), TransportError> {
        if self.fail_creates.load(Ordering::Acquire) {
            return Err(TransportError::Unavailable(
                "handle creation is failing".to_string(),
            ));
        }
        if !self.active.load(Ordering::Acquire) {
            return Err(TransportError::Unavailable(
                "broker server is not active".to_string(),
            ));
        }
        Ok(())
    }
}

/// Producer handle returned by [`InProcessBroker`].
pub struct InProcessProducer {
    name: String,
    core: Weak<BrokerCore>,
    closed: AtomicBool,
}

#[async_trait]
impl BrokerProducer for InProcessProducer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: TaggedMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let core = self.core.upgrade().ok_or(TransportError::Closed)?;
        core.enqueue(message)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Consumer handle returned by [`InProcessBroker`].
pub struct InProcessConsumer {
    name: String,
    generation: u64,
    queue: SharedQueue,
    closed: AtomicBool,
}

impl InProcessConsumer {
    fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
        lock(&self.queue).detach_listener(self.generation);
    }
}

#[async_trait]
impl BrokerConsumer for InProcessConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive_immediate(&self) -> Result<Option<Message>, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut queue = lock(&self.queue);
        if queue.listener.is_some() {
            return Ok(None);
        }
        Ok(queue.pop())
    }

    async fn acknowledge(&self, _message: &Message) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    async fn set_listener(&self, listener: Arc<dyn MessageListener>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut queue = lock(&self.queue);
        let dispatch = ListenerDispatch::spawn(&self.name, listener);
        // Backlog queued while polling is handed to the listener first.
        while let Some(message) = queue.pop() {
            if let Err(message) = dispatch.dispatch(message) {
                queue.pending_bytes += message.bytes.len() as u64;
                queue.pending.push_front(message);
                return Err(TransportError::Unavailable(
                    "listener dispatch stopped".to_string(),
                ));
            }
        }
        queue.listener = Some((self.generation, dispatch));
        Ok(())
    }

    async fn remove_listener(&self) {
        lock(&self.queue).detach_listener(self.generation);
    }

    fn has_listener(&self) -> bool {
        matches!(lock(&self.queue).listener, Some((owner, _)) if owner == self.generation)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.mark_closed();
    }
}

/// Broker transport living entirely inside the agent process.
///
/// Clones share the same broker.
#[derive(Clone, Default)]
pub struct InProcessBroker {
    core: Arc<BrokerCore>,
}

impl InProcessBroker {
    /// Creates a broker whose server is not yet started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a producer closed without removing it, as a transport crash would.
    pub fn crash_producer(&self, name: &str) -> bool {
        let producer = lock(&self.core.state).producers.get(name).cloned();
        match producer {
            Some(producer) => {
                producer.closed.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Marks a consumer closed without removing it, as a transport crash would.
    pub fn crash_consumer(&self, name: &str) -> bool {
        let consumer = lock(&self.core.state).consumers.get(name).cloned();
        match consumer {
            Some(consumer) => {
                consumer.mark_closed();
                true
            }
            None => false,
        }
    }

    /// Takes the server down without closing handles.
    pub fn crash_server(&self) {
        self.core.active.store(false, Ordering::Release);
    }

    /// Makes every producer/consumer creation fail until reset.
    pub fn set_fail_creates(&self, fail: bool) {
        self.core.fail_creates.store(fail, Ordering::Release);
    }

    /// Number of messages queued on a channel and not yet received.
    pub fn pending_messages(&self, channel: &str) -> usize {
        let queue = lock(&self.core.state).channels.get(channel).cloned();
        queue.map(|queue| lock(&queue).pending.len()).unwrap_or(0)
    }

    pub fn producer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.core.state).producers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn consumer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.core.state).consumers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl BrokerTransport for InProcessBroker {
    async fn start_server(&self) -> Result<(), TransportError> {
        self.core.active.store(true, Ordering::Release);
        info!(
            event = events::BROKER_SERVER_START,
            component = COMPONENT,
            "broker server started"
        );
        Ok(())
    }

    async fn stop_server(&self) -> Result<(), TransportError> {
        self.core.active.store(false, Ordering::Release);

        let (producers, consumers) = {
            let mut state = lock(&self.core.state);
            (
                std::mem::take(&mut state.producers),
                std::mem::take(&mut state.consumers),
            )
        };
        for producer in producers.values() {
            producer.closed.store(true, Ordering::Release);
        }
        for consumer in consumers.values() {
            consumer.mark_closed();
        }

        info!(
            event = events::BROKER_SERVER_STOP,
            component = COMPONENT,
            producers = producers.len(),
            consumers = consumers.len(),
            "broker server stopped"
        );
        Ok(())
    }

    fn is_server_active(&self) -> bool {
        self.core.active.load(Ordering::Acquire)
    }

    async fn set_memory_limit(&self, limit_bytes: Option<u64>) -> Result<(), TransportError> {
        *lock(&self.core.memory_limit) = limit_bytes;
        debug!(
            event = events::BROKER_MEMORY_LIMIT_SET,
            component = COMPONENT,
            limit_bytes = ?limit_bytes,
            "broker memory limit applied"
        );
        Ok(())
    }

    async fn create_producer(&self, name: &str) -> Result<Arc<dyn BrokerProducer>, TransportError> {
        self.core.ensure_can_create()?;

        let producer = Arc::new(InProcessProducer {
            name: name.to_string(),
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

    async fn create_consumer(&self, name: &str) -> Result<Arc<dyn BrokerConsumer>, TransportError> {
        self.core.ensure_can_create()?;

        let (consumer, replaced) = {
            let mut state = lock(&self.core.state);
            let queue = state.channels.entry(name.to_string()).or_default().clone();
            let consumer = Arc::new(InProcessConsumer {
                name: name.to_string(),
                generation: self.core.next_generation.fetch_add(1, Ordering::AcqRel),
                queue,
                closed: AtomicBool::new(false),
            });
            let replaced = state.consumers.insert(name.to_string(), consumer.clone());
            (consumer, replaced)
        };

        if let Some(replaced) = replaced {
            replaced.mark_closed();
        }

        Ok(consumer)
    }

    fn get_producer(&self, name: &str) -> Option<Arc<dyn BrokerProducer>> {
        lock(&self.core.state)
            .producers
            .get(name)
            .cloned()
            .map(|producer| producer as Arc<dyn BrokerProducer>)
    }

    fn get_consumer(&self, name: &str) -> Option<Arc<dyn BrokerConsumer>> {
        lock(&self.core.state)
            .consumers
            .get(name)
            .cloned()
            .map(|consumer| consumer as Arc<dyn BrokerConsumer>)
    }

    async fn remove_producer(&self, name: &str) {
        let removed = lock(&self.core.state).producers.remove(name);
        if let Some(producer) = removed {
            producer.closed.store(true, Ordering::Release);
        }
    }

    async fn remove_consumer(&self, name: &str) {
        let (consumer, queue) = {
            let mut state = lock(&self.core.state);
            (state.consumers.remove(name), state.channels.remove(name))
        };
        if let Some(consumer) = consumer {
            consumer.mark_closed();
        }
        if let Some(queue) = queue {
            let discarded = lock(&queue).pending.len();
            if discarded > 0 {
                warn!(
                    event = events::BROKER_CHANNEL_DISCARDED,
                    component = COMPONENT,
                    channel = name,
                    discarded,
                    "discarded queued messages of removed channel"
                );
            }
        }
    }

    fn is_producer_closed(&self, name: &str) -> bool {
        lock(&self.core.state)
            .producers
            .get(name)
            .map_or(true, |producer| producer.closed.load(Ordering::Acquire))
    }

    fn is_consumer_closed(&self, name: &str) -> bool {
        lock(&self.core.state)
            .consumers
            .get(name)
            .map_or(true, |consumer| consumer.closed.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::InProcessBroker;
    use crate::model::message::Message;
    use crate::transport::{BrokerTransport, MessageListener, TaggedMessage, TransportError};
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

    fn tagged(channel: &str, id: &str) -> TaggedMessage {
        TaggedMessage {
            channel: channel.to_string(),
            message: Message::new(id, "tag", 0, vec![1, 2, 3]),
        }
    }

    async fn started_broker() -> InProcessBroker {
        let broker = InProcessBroker::new();
        broker.start_server().await.unwrap();
        broker
    }

    #[tokio::test]
    async fn queued_messages_survive_consumer_replacement() {
        let broker = started_broker().await;
        let producer = broker.create_producer("p").await.unwrap();
        let first = broker.create_consumer("r").await.unwrap();

        producer.send(tagged("r", "m1")).await.unwrap();
        let second = broker.create_consumer("r").await.unwrap();

        assert!(first.is_closed());
        assert_eq!(
            second.receive_immediate().await.unwrap().map(|m| m.id),
            Some("m1".to_string())
        );
    }

    #[tokio::test]
    async fn remove_consumer_discards_channel() {
        let broker = started_broker().await;
        let producer = broker.create_producer("p").await.unwrap();
        broker.create_consumer("r").await.unwrap();
        producer.send(tagged("r", "m1")).await.unwrap();

        broker.remove_consumer("r").await;

        assert_eq!(broker.pending_messages("r"), 0);
        assert!(broker.is_consumer_closed("r"));
    }

    #[tokio::test]
    async fn listener_receives_backlog_then_live_messages() {
        let broker = started_broker().await;
        let producer = broker.create_producer("p").await.unwrap();
        let consumer = broker.create_consumer("r").await.unwrap();
        producer.send(tagged("r", "m1")).await.unwrap();

        let listener = Arc::new(RecordingListener::default());
        consumer.set_listener(listener.clone()).await.unwrap();
        producer.send(tagged("r", "m2")).await.unwrap();

        for _ in 0..50 {
            if listener.seen.lock().await.len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(*listener.seen.lock().await, vec!["m1", "m2"]);
        assert_eq!(consumer.receive_immediate().await.unwrap(), None);
    }

    #[tokio::test]
    async fn stale_consumer_cannot_detach_replacement_listener() {
        let broker = started_broker().await;
        let stale = broker.create_consumer("r").await.unwrap();
        let fresh = broker.create_consumer("r").await.unwrap();
        fresh
            .set_listener(Arc::new(RecordingListener::default()))
            .await
            .unwrap();

        stale.remove_listener().await;

        assert!(fresh.has_listener());
        assert!(!stale.has_listener());
    }

    #[tokio::test]
    async fn memory_limit_rejects_overflowing_send() {
        let broker = started_broker().await;
        broker.set_memory_limit(Some(4)).await.unwrap();
        let producer = broker.create_producer("p").await.unwrap();
        broker.create_consumer("r").await.unwrap();

        producer.send(tagged("r", "m1")).await.unwrap();
        let overflow = producer.send(tagged("r", "m2")).await;

        assert!(matches!(overflow, Err(TransportError::Rejected(_))));
        assert_eq!(broker.pending_messages("r"), 1);
    }

    #[tokio::test]
    async fn crashed_handles_report_closed_but_stay_registered() {
        let broker = started_broker().await;
        let producer = broker.create_producer("p").await.unwrap();
        broker.create_consumer("r").await.unwrap();

        assert!(broker.crash_producer("p"));
        assert!(broker.crash_consumer("r"));

        assert!(broker.is_producer_closed("p"));
        assert!(broker.is_consumer_closed("r"));
        assert!(broker.get_consumer("r").is_some());
        assert_eq!(
            producer.send(tagged("r", "m1")).await,
            Err(TransportError::Closed)
        );
    }

    #[tokio::test]
    async fn creation_fails_while_server_is_down() {
        let broker = InProcessBroker::new();

        assert!(broker.create_producer("p").await.is_err());

        broker.start_server().await.unwrap();
        broker.set_fail_creates(true);
        assert!(broker.create_consumer("r").await.is_err());
    }
}
