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

#![allow(dead_code)]

use async_trait::async_trait;
use fog_message_bus::transport::in_process::{InProcessBridge, InProcessBroker};
use fog_message_bus::transport::MessageListener;
use fog_message_bus::{
    BridgeConfig, Message, MessageBus, MessageBusConfig, Producer, Receiver, Route, RouteTable,
    SharedRouteTable,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Long enough that the loops never fire during a test; ticks are driven by hand.
pub(crate) fn manual_tick_config() -> MessageBusConfig {
    MessageBusConfig {
        health_check_interval_ms: 3_600_000,
        speed_calculation_interval_ms: 3_600_000,
        ..MessageBusConfig::default()
    }
}

pub(crate) fn local_route(producer: &str, receivers: &[&str]) -> Route {
    Route::new(
        Producer::local(producer),
        receivers.iter().map(|id| Receiver::local(id)).collect(),
    )
}

pub(crate) fn bridge(bridge_id: i32) -> BridgeConfig {
    BridgeConfig::new(bridge_id, &format!("endpoint-{bridge_id}"), "pass")
}

pub(crate) fn table(routes: Vec<Route>) -> RouteTable {
    RouteTable::from_routes(routes).expect("test routes should not repeat producers")
}

pub(crate) struct Harness {
    pub(crate) bus: Arc<MessageBus>,
    pub(crate) broker: InProcessBroker,
    pub(crate) provider: Arc<SharedRouteTable>,
}

pub(crate) async fn start_bus(routes: RouteTable, bridge: InProcessBridge) -> Harness {
    let broker = InProcessBroker::new();
    let provider = Arc::new(SharedRouteTable::new(routes));
    let bus = MessageBus::new(
        manual_tick_config(),
        Arc::new(broker.clone()),
        Arc::new(bridge),
        provider.clone(),
    );
    bus.start().await.expect("in-process broker should start");

    Harness {
        bus,
        broker,
        provider,
    }
}

#[derive(Default)]
pub(crate) struct RecordingListener {
    seen: Mutex<Vec<Message>>,
}

impl RecordingListener {
    pub(crate) async fn ids(&self) -> Vec<String> {
        self.seen
            .lock()
            .await
            .iter()
            .map(|message| message.id.clone())
            .collect()
    }
}

#[async_trait]
impl MessageListener for RecordingListener {
    async fn on_receive(&self, message: Message) {
        self.seen.lock().await.push(message);
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub(crate) async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
