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

mod support;

use fog_message_bus::transport::in_process::InProcessBridge;
use fog_message_bus::{Message, MessageBus, ModuleStatus, Producer, Receiver, Route};
use std::sync::Arc;
use std::time::Duration;
use support::{bridge, init_logging, start_bus, table, Harness};

/// Node A produces `P` locally for `R` on node B; node B sees `P` as remote.
async fn two_nodes(shared: &InProcessBridge) -> (Harness, Harness) {
    let node_a = start_bus(
        table(vec![Route::new(
            Producer::local("P"),
            vec![Receiver::remote("R", bridge(1))],
        )]),
        shared.clone(),
    )
    .await;
    let node_b = start_bus(
        table(vec![Route::new(
            Producer::remote("P", bridge(1)),
            vec![Receiver::local("R")],
        )]),
        shared.clone(),
    )
    .await;
    (node_a, node_b)
}

async fn arrives(bus: &MessageBus, receiver: &str, expected: &Message) -> bool {
    for _ in 0..200 {
        let fetched = bus.get_messages(receiver).await.unwrap_or_default();
        if fetched.contains(expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread")]
async fn message_crosses_the_bridge_to_remote_receiver() {
    init_logging();
    let shared = InProcessBridge::new();
    let (node_a, node_b) = two_nodes(&shared).await;

    assert_eq!(shared.open_producer_names(), vec!["P:R"]);
    assert_eq!(shared.open_consumer_names(), vec!["P"]);

    let message = node_a.bus.new_message("reading", b"42".to_vec());
    node_a.bus.publish("P", message.clone()).await.unwrap();

    assert!(arrives(&node_b.bus, "R", &message).await);
    assert_eq!(node_a.bus.status().processed_messages, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn severed_bridge_handles_are_reopened_by_health_check() {
    init_logging();
    let shared = InProcessBridge::new();
    let (node_a, node_b) = two_nodes(&shared).await;

    assert!(shared.sever_producer("P:R"));
    assert!(shared.sever_consumer("P"));
    node_a.bus.health_check_tick().await;
    node_b.bus.health_check_tick().await;

    assert_eq!(shared.open_producer_names(), vec!["P:R"]);
    assert_eq!(shared.open_consumer_names(), vec!["P"]);

    let message = node_a.bus.new_message("reading", Vec::new());
    node_a.bus.publish("P", message.clone()).await.unwrap();
    assert!(arrives(&node_b.bus, "R", &message).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn crashed_remote_consumer_is_replaced_and_relays_again() {
    init_logging();
    let shared = InProcessBridge::new();
    let (node_a, node_b) = two_nodes(&shared).await;
    let before = node_a.bus.remote_receiver("P", "R").await.unwrap();

    assert!(node_a.broker.crash_consumer("P:R"));
    node_a.bus.health_check_tick().await;

    let after = node_a.bus.remote_receiver("P", "R").await.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(before.is_closed().await);
    assert!(after.is_streaming().await);
    assert!(!after.is_consumer_closed());
    assert_eq!(node_a.bus.status().module_status, ModuleStatus::Running);

    let message = node_a.bus.new_message("reading", b"7".to_vec());
    node_a.bus.publish("P", message.clone()).await.unwrap();
    assert!(arrives(&node_b.bus, "R", &message).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_bridge_degrades_until_it_returns() {
    init_logging();
    let shared = InProcessBridge::new();
    let (node_a, _node_b) = two_nodes(&shared).await;

    shared.set_available(false);
    shared.sever_producer("P:R");
    node_a.bus.health_check_tick().await;
    assert_eq!(node_a.bus.status().module_status, ModuleStatus::Degraded);

    shared.set_available(true);
    node_a.bus.health_check_tick().await;
    assert_eq!(node_a.bus.status().module_status, ModuleStatus::Running);
    assert_eq!(shared.open_producer_names(), vec!["P:R"]);
}
