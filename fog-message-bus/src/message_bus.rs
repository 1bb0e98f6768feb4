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

//! The routing engine: owns live wiring, reconciles it against new route
//! tables and repairs it on every health-check tick.
//!
//! Lock ordering: the engine lock (`state`) may be held while taking a
//! publisher or receiver lock, never the other way round. Message flow only
//! takes per-object locks.

use crate::config::MessageBusConfig;
use crate::control_plane::reconciliation::{plan, LiveWiring, ReconciliationPlan};
use crate::control_plane::route_filter::filter_routes;
use crate::control_plane::route_provider::RouteProvider;
use crate::control_plane::route_table::{RouteTable, RouteTableError};
use crate::data_plane::publisher::{MessagePublisher, PublishError};
use crate::data_plane::receiver::{LocalMessageReceiver, RemoteMessageReceiver};
use crate::model::message::{Message, MessageIdGenerator};
use crate::model::route::{Receiver, RemoteReceiverKey, Route};
use crate::observability::{events, fields};
use crate::runtime::periodic_loop::{spawn_periodic_loop, PeriodicLoopHandle};
use crate::status::{MessageBusStatus, MessageBusStatusSnapshot, ModuleStatus};
use crate::transport::{BridgeTransport, BrokerTransport, MessageListener, TransportError};
use arc_swap::ArcSwap;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "message_bus";
const HEALTH_CHECK_LOOP: &str = "health-check";
const SPEED_CALCULATION_LOOP: &str = "speed-calculation";

/// Engine-level failures surfaced to the caller.
#[derive(Debug)]
pub enum MessageBusError {
    Transport(TransportError),
    RouteTable(RouteTableError),
    UnknownPublisher(String),
    UnknownReceiver(String),
}

impl Display for MessageBusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageBusError::Transport(err) => write!(f, "broker transport failure: {err}"),
            MessageBusError::RouteTable(err) => write!(f, "route table unavailable: {err}"),
            MessageBusError::UnknownPublisher(id) => write!(f, "no publisher for producer {id}"),
            MessageBusError::UnknownReceiver(id) => write!(f, "no receiver for microservice {id}"),
        }
    }
}

impl Error for MessageBusError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MessageBusError::Transport(err) => Some(err),
            MessageBusError::RouteTable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for MessageBusError {
    fn from(err: TransportError) -> Self {
        MessageBusError::Transport(err)
    }
}

impl From<RouteTableError> for MessageBusError {
    fn from(err: RouteTableError) -> Self {
        MessageBusError::RouteTable(err)
    }
}

/// Which objects are live, by identity.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WiringSnapshot {
    pub publishers: BTreeSet<String>,
    pub local_receivers: BTreeSet<String>,
    pub remote_receivers: BTreeSet<RemoteReceiverKey>,
}

#[derive(Default)]
struct RoutingState {
    /// Raw table from the last `update`, re-applied after a broker restart.
    /// `None` while the provider's table is authoritative.
    last_update: Option<RouteTable>,
    routes: RouteTable,
    publishers: BTreeMap<String, Arc<MessagePublisher>>,
    local_receivers: BTreeMap<String, Arc<LocalMessageReceiver>>,
    remote_receivers: BTreeMap<RemoteReceiverKey, Arc<RemoteMessageReceiver>>,
}

impl RoutingState {
    fn live_wiring(&self) -> LiveWiring<'_> {
        LiveWiring {
            routes: &self.routes,
            publishers: self.publishers.keys().cloned().collect(),
            local_receivers: self.local_receivers.keys().cloned().collect(),
            remote_receivers: self.remote_receivers.keys().cloned().collect(),
        }
    }
}

/// Message routing and self-healing engine for one node.
pub struct MessageBus {
    config: ArcSwap<MessageBusConfig>,
    broker: Arc<dyn BrokerTransport>,
    bridge: Arc<dyn BridgeTransport>,
    route_provider: Arc<dyn RouteProvider>,
    status: Arc<MessageBusStatus>,
    id_generator: MessageIdGenerator,
    routes: ArcSwap<RouteTable>,
    state: Mutex<RoutingState>,
    loops: Mutex<Vec<PeriodicLoopHandle>>,
    weak_self: Weak<MessageBus>,
}

impl MessageBus {
    pub fn new(
        config: MessageBusConfig,
        broker: Arc<dyn BrokerTransport>,
        bridge: Arc<dyn BridgeTransport>,
        route_provider: Arc<dyn RouteProvider>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            config: ArcSwap::from_pointee(config),
            broker,
            bridge,
            route_provider,
            status: Arc::new(MessageBusStatus::new()),
            id_generator: MessageIdGenerator::new(),
            routes: ArcSwap::from_pointee(RouteTable::new()),
            state: Mutex::new(RoutingState::default()),
            loops: Mutex::new(Vec::new()),
            weak_self: weak_self.clone(),
        })
    }

    /// Starts the broker, wires the provider's routes and spawns the
    /// health-check and speed loops.
    ///
    /// Only a broker that cannot start is an error. An unreadable route table
    /// leaves the engine running with no routes and a degraded status, so a
    /// later [`update`](Self::update) can recover it.
    pub async fn start(&self) -> Result<(), MessageBusError> {
        self.status.set_module_status(ModuleStatus::Starting);

        if let Err(err) = self.start_transport().await {
            self.status.set_module_status(ModuleStatus::Degraded);
            error!(
                event = events::MESSAGE_BUS_START_FAILED,
                component = COMPONENT,
                err = %err,
                "failed to start broker transport"
            );
            return Err(err.into());
        }

        let initialized = self.initialize().await.is_ok();
        self.spawn_loops().await;
        self.status.set_module_status(if initialized {
            ModuleStatus::Running
        } else {
            ModuleStatus::Degraded
        });

        info!(
            event = events::MESSAGE_BUS_START,
            component = COMPONENT,
            routes = self.routes().len(),
            "message bus started"
        );
        Ok(())
    }

    /// Stops the loops, closes every publisher and receiver, then stops the
    /// broker. Safe after a partial start.
    pub async fn stop(&self) {
        let loops = std::mem::take(&mut *self.loops.lock().await);
        for handle in loops {
            debug!(
                event = events::RUNTIME_LOOP_STOP,
                component = COMPONENT,
                loop_name = handle.name(),
                "stopping periodic loop"
            );
            handle.stop().await;
        }

        {
            let mut state = self.state.lock().await;
            self.close_all_locked(&mut state).await;
        }

        if let Err(err) = self.broker.stop_server().await {
            warn!(
                event = events::MESSAGE_BUS_STOP,
                component = COMPONENT,
                err = %err,
                "broker did not stop cleanly"
            );
        }
        self.status.set_module_status(ModuleStatus::Stopped);

        info!(
            event = events::MESSAGE_BUS_STOP,
            component = COMPONENT,
            "message bus stopped"
        );
    }

    /// Fetches the route table and wires it from scratch, closing whatever
    /// was live before.
    ///
    /// The provider's table becomes authoritative again: a table applied
    /// earlier through [`update`](Self::update) is forgotten.
    pub async fn initialize(&self) -> Result<(), MessageBusError> {
        let raw = match self.route_provider.fetch_routes().await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    event = events::ROUTE_TABLE_FETCH_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "failed to fetch route table"
                );
                self.status.set_module_status(ModuleStatus::Degraded);
                return Err(err.into());
            }
        };

        let mut state = self.state.lock().await;
        state.last_update = None;
        self.rewire_locked(&mut state, &raw).await;
        Ok(())
    }

    /// Reconciles live wiring against a freshly supplied raw route table.
    pub async fn update(&self, raw: &RouteTable) {
        let target = filter_routes(raw);
        let mut state = self.state.lock().await;
        state.last_update = Some(raw.clone());
        self.apply_locked(&mut state, target).await;
    }

    /// Wires the table last applied by `update`, or the provider's table when
    /// there has been none.
    async fn restore_routes(&self) -> Result<(), MessageBusError> {
        {
            let mut state = self.state.lock().await;
            if let Some(raw) = state.last_update.clone() {
                self.rewire_locked(&mut state, &raw).await;
                return Ok(());
            }
        }
        self.initialize().await
    }

    async fn rewire_locked(&self, state: &mut RoutingState, raw: &RouteTable) {
        self.close_all_locked(state).await;
        self.apply_locked(state, filter_routes(raw)).await;
    }

    /// One pass of self-healing. Dead handles are replaced, lost bridge paths
    /// re-enabled and anything the route table names but is not live is
    /// created. A down broker triggers a full restart.
    pub async fn health_check_tick(&self) {
        if self.status.module_status() == ModuleStatus::Stopped {
            return;
        }
        if !self.broker.is_server_active() {
            self.restart_transport().await;
            return;
        }

        let mut state = self.state.lock().await;
        let mut healthy = true;
        let mut routes_changed = false;

        let dead_publishers: Vec<String> = state
            .publishers
            .iter()
            .filter(|(_, publisher)| publisher.is_producer_closed())
            .map(|(id, _)| id.clone())
            .collect();
        for producer_id in dead_publishers {
            warn!(
                event = events::HEALTH_PUBLISHER_REPAIR,
                component = COMPONENT,
                producer_id = producer_id.as_str(),
                reason = fields::REASON_HANDLE_CLOSED,
                "replacing publisher with closed broker producer"
            );
            if let Some(publisher) = state.publishers.remove(&producer_id) {
                publisher.close().await;
            }
            self.broker.remove_producer(&producer_id).await;

            let route = state
                .routes
                .get(&producer_id)
                .filter(|route| !route.receivers.is_empty())
                .cloned();
            match route {
                Some(route) => healthy &= self.create_publisher(&mut state, route).await,
                None => {
                    state.routes.remove(&producer_id);
                    routes_changed = true;
                }
            }
        }

        let dead_local: Vec<String> = state
            .local_receivers
            .iter()
            .filter(|(_, receiver)| receiver.is_consumer_closed())
            .map(|(id, _)| id.clone())
            .collect();
        for microservice_id in dead_local {
            warn!(
                event = events::HEALTH_RECEIVER_REPAIR,
                component = COMPONENT,
                receiver_id = microservice_id.as_str(),
                reason = fields::REASON_HANDLE_CLOSED,
                "replacing local receiver with closed broker consumer"
            );
            let mut listener = None;
            if let Some(receiver) = state.local_receivers.remove(&microservice_id) {
                listener = receiver.listener().await;
                receiver.close().await;
            }
            healthy &= self
                .create_local_receiver(&mut state, &microservice_id, listener)
                .await;
        }

        let dead_remote: Vec<RemoteReceiverKey> = state
            .remote_receivers
            .iter()
            .filter(|(_, receiver)| receiver.is_consumer_closed())
            .map(|(key, _)| key.clone())
            .collect();
        for key in dead_remote {
            warn!(
                event = events::HEALTH_RECEIVER_REPAIR,
                component = COMPONENT,
                producer_id = key.producer_id.as_str(),
                receiver_id = key.microservice_id.as_str(),
                reason = fields::REASON_HANDLE_CLOSED,
                "replacing remote receiver with closed broker consumer"
            );
            if let Some(receiver) = state.remote_receivers.remove(&key) {
                let config = receiver.receiver().await;
                receiver.close().await;
                healthy &= self.create_remote_receiver(&mut state, key, config).await;
            }
        }

        for publisher in state.publishers.values() {
            if publisher.needs_bridge_repair().await {
                info!(
                    event = events::HEALTH_BRIDGE_REENABLE,
                    component = COMPONENT,
                    producer_id = publisher.producer_id(),
                    reason = fields::REASON_BRIDGE_MISSING,
                    "re-enabling bridge consumption"
                );
                healthy &= publisher.enable_bridge_consuming().await.is_ok();
            }
        }
        for receiver in state.remote_receivers.values() {
            if receiver.needs_bridge_repair().await {
                info!(
                    event = events::HEALTH_BRIDGE_REENABLE,
                    component = COMPONENT,
                    producer_id = receiver.key().producer_id.as_str(),
                    receiver_id = receiver.key().microservice_id.as_str(),
                    reason = fields::REASON_BRIDGE_MISSING,
                    "re-enabling bridge production"
                );
                healthy &= receiver.enable_bridge_producing().await.is_ok();
            }
        }

        let routes = state.routes.clone();
        let gaps = plan(&state.live_wiring(), &routes);
        if gaps.creations() > 0 {
            info!(
                event = events::HEALTH_GAP_FILL,
                component = COMPONENT,
                missing = gaps.creations(),
                reason = fields::REASON_NOT_LIVE,
                "creating wiring missing from the route table"
            );
            healthy &= self.create_missing_locked(&mut state, gaps).await;
        }

        if routes_changed {
            self.publish_routes(&state.routes);
        }
        self.status.set_module_status(if healthy {
            ModuleStatus::Running
        } else {
            ModuleStatus::Degraded
        });
    }

    /// Samples throughput since the previous tick into the speed gauge.
    pub async fn speed_tick(&self) {
        let speed = self.status.sample_speed();
        debug!(
            event = events::SPEED_SAMPLE,
            component = COMPONENT,
            messages_per_second = speed,
            processed = self.status.processed_messages(),
            "throughput sampled"
        );
    }

    /// Applies new tuning. The memory limit is pushed to the broker at once;
    /// changed intervals restart running loops. Archive bounds apply to
    /// publishers created from now on.
    pub async fn instance_config_updated(&self, config: MessageBusConfig) {
        let memory_limit = config.memory_limit_bytes;
        let previous = self.config.swap(Arc::new(config));
        let current = self.config.load_full();

        if let Err(err) = self.broker.set_memory_limit(memory_limit).await {
            warn!(
                event = events::MESSAGE_BUS_CONFIG_UPDATED,
                component = COMPONENT,
                err = %err,
                "failed to apply broker memory limit"
            );
        }

        let intervals_changed = previous.health_check_interval_ms
            != current.health_check_interval_ms
            || previous.speed_calculation_interval_ms != current.speed_calculation_interval_ms;
        let loops_running = !self.loops.lock().await.is_empty();
        if intervals_changed && loops_running {
            self.spawn_loops().await;
        }

        info!(
            event = events::MESSAGE_BUS_CONFIG_UPDATED,
            component = COMPONENT,
            memory_limit_bytes = ?memory_limit,
            intervals_changed,
            "message bus config updated"
        );
    }

    pub fn config(&self) -> Arc<MessageBusConfig> {
        self.config.load_full()
    }

    /// The filtered route table currently applied. Lock-free.
    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.load_full()
    }

    pub fn status(&self) -> MessageBusStatusSnapshot {
        self.status.snapshot()
    }

    pub async fn wiring(&self) -> WiringSnapshot {
        let state = self.state.lock().await;
        WiringSnapshot {
            publishers: state.publishers.keys().cloned().collect(),
            local_receivers: state.local_receivers.keys().cloned().collect(),
            remote_receivers: state.remote_receivers.keys().cloned().collect(),
        }
    }

    pub async fn publisher(&self, producer_id: &str) -> Option<Arc<MessagePublisher>> {
        self.state.lock().await.publishers.get(producer_id).cloned()
    }

    pub async fn local_receiver(&self, microservice_id: &str) -> Option<Arc<LocalMessageReceiver>> {
        self.state
            .lock()
            .await
            .local_receivers
            .get(microservice_id)
            .cloned()
    }

    pub async fn remote_receiver(
        &self,
        producer_id: &str,
        microservice_id: &str,
    ) -> Option<Arc<RemoteMessageReceiver>> {
        self.state
            .lock()
            .await
            .remote_receivers
            .get(&RemoteReceiverKey::new(producer_id, microservice_id))
            .cloned()
    }

    pub fn next_message_id(&self) -> String {
        self.id_generator.next_id()
    }

    /// Stamps a new message with a fresh ID and the current time.
    pub fn new_message(&self, tag: &str, bytes: Vec<u8>) -> Message {
        Message::new(
            self.next_message_id(),
            tag,
            chrono::Utc::now().timestamp_millis(),
            bytes,
        )
    }

    /// Publishes through the producer's publisher without holding the engine
    /// lock during delivery.
    pub async fn publish(&self, producer_id: &str, message: Message) -> Result<(), PublishError> {
        let publisher = self
            .publisher(producer_id)
            .await
            .ok_or_else(|| PublishError::UnknownProducer(producer_id.to_string()))?;
        publisher.publish(message).await
    }

    pub async fn get_messages(&self, microservice_id: &str) -> Result<Vec<Message>, MessageBusError> {
        let receiver = self
            .local_receiver(microservice_id)
            .await
            .ok_or_else(|| MessageBusError::UnknownReceiver(microservice_id.to_string()))?;
        Ok(receiver.get_messages().await?)
    }

    pub async fn message_query(
        &self,
        producer_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<Message>, MessageBusError> {
        let publisher = self
            .publisher(producer_id)
            .await
            .ok_or_else(|| MessageBusError::UnknownPublisher(producer_id.to_string()))?;
        Ok(publisher.message_query(from, to).await)
    }

    /// Switches a local receiver to push delivery. Held under the engine lock
    /// so a concurrent repair cannot drop the listener.
    pub async fn enable_real_time_receiving(
        &self,
        microservice_id: &str,
        listener: Arc<dyn MessageListener>,
    ) -> Result<(), MessageBusError> {
        let state = self.state.lock().await;
        let receiver = state
            .local_receivers
            .get(microservice_id)
            .ok_or_else(|| MessageBusError::UnknownReceiver(microservice_id.to_string()))?;
        Ok(receiver.enable_real_time_receiving(listener).await?)
    }

    pub async fn disable_real_time_receiving(
        &self,
        microservice_id: &str,
    ) -> Result<(), MessageBusError> {
        let state = self.state.lock().await;
        let receiver = state
            .local_receivers
            .get(microservice_id)
            .ok_or_else(|| MessageBusError::UnknownReceiver(microservice_id.to_string()))?;
        receiver.disable_real_time_receiving().await;
        Ok(())
    }

    async fn start_transport(&self) -> Result<(), TransportError> {
        self.broker.start_server().await?;
        let memory_limit = self.config.load().memory_limit_bytes;
        self.broker.set_memory_limit(memory_limit).await
    }

    async fn restart_transport(&self) {
        warn!(
            event = events::HEALTH_TRANSPORT_DOWN,
            component = COMPONENT,
            "broker server is down; restarting"
        );
        self.status.set_module_status(ModuleStatus::Degraded);

        {
            let mut state = self.state.lock().await;
            self.close_all_locked(&mut state).await;
        }
        if let Err(err) = self.broker.stop_server().await {
            warn!(
                event = events::HEALTH_TRANSPORT_DOWN,
                component = COMPONENT,
                err = %err,
                "broker did not stop cleanly before restart"
            );
        }

        if let Err(err) = self.start_transport().await {
            error!(
                event = events::HEALTH_RESTART_FAILED,
                component = COMPONENT,
                err = %err,
                "broker restart failed; retrying next tick"
            );
            return;
        }
        if let Err(err) = self.restore_routes().await {
            error!(
                event = events::HEALTH_RESTART_FAILED,
                component = COMPONENT,
                err = %err,
                "re-initialization after broker restart failed; retrying next tick"
            );
            return;
        }

        self.status.set_module_status(ModuleStatus::Running);
        info!(
            event = events::HEALTH_RESTART_OK,
            component = COMPONENT,
            routes = self.routes().len(),
            "broker restarted and routes re-wired"
        );
    }

    async fn spawn_loops(&self) {
        let config = self.config.load_full();
        let mut loops = self.loops.lock().await;
        for handle in loops.drain(..) {
            handle.stop().await;
        }

        loops.push(spawn_periodic_loop(
            HEALTH_CHECK_LOOP,
            config.health_check_interval(),
            self.weak_self.clone(),
            |bus: Arc<MessageBus>| async move { bus.health_check_tick().await },
        ));
        loops.push(spawn_periodic_loop(
            SPEED_CALCULATION_LOOP,
            config.speed_calculation_interval(),
            self.weak_self.clone(),
            |bus: Arc<MessageBus>| async move { bus.speed_tick().await },
        ));
    }

    async fn apply_locked(&self, state: &mut RoutingState, target: RouteTable) {
        let plan = plan(&state.live_wiring(), &target);
        if plan.is_empty() && state.routes == target {
            return;
        }

        info!(
            event = events::RECONCILE_START,
            component = COMPONENT,
            routes = target.len(),
            create = plan.creations(),
            update = plan.updates(),
            close = plan.closures(),
            "reconciling route table"
        );

        for producer_id in &plan.publishers_to_close {
            if let Some(publisher) = state.publishers.remove(producer_id) {
                publisher.close().await;
            }
            self.broker.remove_producer(producer_id).await;
        }
        for route in &plan.publishers_to_update {
            if let Some(publisher) = state.publishers.get(route.producer_id()) {
                publisher.update_route(route.clone()).await;
            }
        }

        for microservice_id in &plan.local_receivers_to_close {
            if let Some(receiver) = state.local_receivers.remove(microservice_id) {
                receiver.close().await;
            }
            self.broker.remove_consumer(microservice_id).await;
        }

        for key in &plan.remote_receivers_to_close {
            if let Some(receiver) = state.remote_receivers.remove(key) {
                receiver.close().await;
            }
            self.broker.remove_consumer(&key.channel_name()).await;
        }
        for (key, receiver) in &plan.remote_receivers_to_update {
            if let Some(live) = state.remote_receivers.get(key) {
                // Failures leave the receiver for the health check to repair.
                let _ = live.update(receiver.clone()).await;
            }
        }

        let complete = self.create_missing_locked(state, plan).await;

        self.status.retain_microservices(&target.producer_ids());
        state.routes = target;
        self.publish_routes(&state.routes);

        info!(
            event = events::RECONCILE_OK,
            component = COMPONENT,
            routes = state.routes.len(),
            complete,
            "route table reconciled"
        );
    }

    /// Runs the creation half of a plan. Returns `false` if anything failed.
    async fn create_missing_locked(
        &self,
        state: &mut RoutingState,
        plan: ReconciliationPlan,
    ) -> bool {
        let mut complete = true;
        for route in plan.publishers_to_create {
            complete &= self.create_publisher(state, route).await;
        }
        for microservice_id in plan.local_receivers_to_create {
            complete &= self
                .create_local_receiver(state, &microservice_id, None)
                .await;
        }
        for (key, receiver) in plan.remote_receivers_to_create {
            complete &= self.create_remote_receiver(state, key, receiver).await;
        }
        complete
    }

    async fn create_publisher(&self, state: &mut RoutingState, route: Route) -> bool {
        let producer_id = route.producer_id().to_string();
        let producer = match self.broker.create_producer(&producer_id).await {
            Ok(producer) => producer,
            Err(err) => {
                warn!(
                    event = events::PUBLISHER_CREATE_FAILED,
                    component = COMPONENT,
                    producer_id = producer_id.as_str(),
                    err = %err,
                    "failed to create broker producer; retrying next tick"
                );
                return false;
            }
        };

        let publisher = MessagePublisher::new(
            route,
            producer,
            self.bridge.clone(),
            self.config.load().archive.clone(),
            self.status.clone(),
        );
        // Bridge failures are logged by the publisher and repaired by the
        // health check.
        let _ = publisher.enable_bridge_consuming().await;
        state.publishers.insert(producer_id, publisher);
        true
    }

    async fn create_local_receiver(
        &self,
        state: &mut RoutingState,
        microservice_id: &str,
        listener: Option<Arc<dyn MessageListener>>,
    ) -> bool {
        let consumer = match self.broker.create_consumer(microservice_id).await {
            Ok(consumer) => consumer,
            Err(err) => {
                warn!(
                    event = events::RECEIVER_CREATE_FAILED,
                    component = COMPONENT,
                    receiver_id = microservice_id,
                    err = %err,
                    "failed to create broker consumer; retrying next tick"
                );
                return false;
            }
        };

        let receiver = Arc::new(LocalMessageReceiver::new(microservice_id, consumer));
        if let Some(listener) = listener {
            let _ = receiver.enable_real_time_receiving(listener).await;
        }
        state
            .local_receivers
            .insert(microservice_id.to_string(), receiver);
        true
    }

    async fn create_remote_receiver(
        &self,
        state: &mut RoutingState,
        key: RemoteReceiverKey,
        receiver: Receiver,
    ) -> bool {
        let consumer = match self.broker.create_consumer(&key.channel_name()).await {
            Ok(consumer) => consumer,
            Err(err) => {
                warn!(
                    event = events::RECEIVER_CREATE_FAILED,
                    component = COMPONENT,
                    producer_id = key.producer_id.as_str(),
                    receiver_id = key.microservice_id.as_str(),
                    err = %err,
                    "failed to create broker consumer; retrying next tick"
                );
                return false;
            }
        };

        let remote = Arc::new(RemoteMessageReceiver::new(
            key.clone(),
            receiver,
            consumer,
            self.bridge.clone(),
        ));
        let _ = remote.enable_bridge_producing().await;
        state.remote_receivers.insert(key, remote);
        true
    }

    async fn close_all_locked(&self, state: &mut RoutingState) {
        let publishers = std::mem::take(&mut state.publishers);
        let local_receivers = std::mem::take(&mut state.local_receivers);
        let remote_receivers = std::mem::take(&mut state.remote_receivers);

        join_all(publishers.values().map(|publisher| publisher.close())).await;
        join_all(local_receivers.values().map(|receiver| receiver.close())).await;
        join_all(remote_receivers.values().map(|receiver| receiver.close())).await;
        state.routes = RouteTable::new();
        self.publish_routes(&state.routes);
    }

    fn publish_routes(&self, routes: &RouteTable) {
        self.routes.store(Arc::new(routes.clone()));
    }
}
