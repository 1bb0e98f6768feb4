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
use fog_message_bus::{Producer, Receiver, RemoteReceiverKey, Route, RouteTable};
use std::collections::BTreeSet;
use std::sync::Arc;
use support::{bridge, init_logging, local_route, start_bus, table};

fn ids(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn receiver_swap_keeps_untouched_objects() {
    init_logging();
    let harness = start_bus(
        table(vec![local_route("P1", &["R1", "R2"])]),
        InProcessBridge::new(),
    )
    .await;
    let bus = &harness.bus;

    let publisher = bus.publisher("P1").await.unwrap();
    let r1 = bus.local_receiver("R1").await.unwrap();

    bus.update(&table(vec![local_route("P1", &["R1", "R3"])])).await;

    let wiring = bus.wiring().await;
    assert_eq!(wiring.publishers, ids(&["P1"]));
    assert_eq!(wiring.local_receivers, ids(&["R1", "R3"]));
    assert!(Arc::ptr_eq(&publisher, &bus.publisher("P1").await.unwrap()));
    assert!(Arc::ptr_eq(&r1, &bus.local_receiver("R1").await.unwrap()));
    assert_eq!(
        publisher.route().await,
        local_route("P1", &["R1", "R3"])
    );
    assert_eq!(harness.broker.consumer_names(), vec!["R1", "R3"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_update_changes_nothing() {
    init_logging();
    let routes = table(vec![local_route("P1", &["R1"]), local_route("P2", &["R1"])]);
    let harness = start_bus(routes.clone(), InProcessBridge::new()).await;
    let bus = &harness.bus;

    let p1 = bus.publisher("P1").await.unwrap();
    let r1 = bus.local_receiver("R1").await.unwrap();

    bus.update(&routes).await;

    assert!(Arc::ptr_eq(&p1, &bus.publisher("P1").await.unwrap()));
    assert!(Arc::ptr_eq(&r1, &bus.local_receiver("R1").await.unwrap()));
}

#[tokio::test(flavor = "multi_thread")]
async fn removed_producer_closes_publisher_and_orphaned_receivers() {
    init_logging();
    let harness = start_bus(
        table(vec![local_route("P1", &["R1"]), local_route("P2", &["R2"])]),
        InProcessBridge::new(),
    )
    .await;
    let bus = &harness.bus;
    let p1 = bus.publisher("P1").await.unwrap();

    bus.update(&table(vec![local_route("P2", &["R2"])])).await;

    assert!(p1.is_closed().await);
    assert!(bus.publisher("P1").await.is_none());
    assert!(bus.local_receiver("R1").await.is_none());
    assert_eq!(harness.broker.producer_names(), vec!["P2"]);
    assert!(!bus.routes().contains("P1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn route_without_receivers_gets_no_publisher() {
    init_logging();
    let harness = start_bus(
        table(vec![Route::new(Producer::local("P1"), Vec::new())]),
        InProcessBridge::new(),
    )
    .await;

    assert!(harness.bus.publisher("P1").await.is_none());
    assert!(harness.bus.routes().is_empty());
    assert!(harness.broker.producer_names().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_fan_out_is_reduced_before_wiring() {
    init_logging();
    let raw = table(vec![Route::new(
        Producer::local("P1"),
        vec![
            Receiver::remote("R9", bridge(7)),
            Receiver::remote("R3", bridge(7)),
            Receiver::local("R1"),
        ],
    )]);
    let harness = start_bus(raw, InProcessBridge::new()).await;

    let wiring = harness.bus.wiring().await;
    assert_eq!(wiring.local_receivers, ids(&["R1"]));
    assert_eq!(
        wiring.remote_receivers,
        [RemoteReceiverKey::new("P1", "R3")].into_iter().collect()
    );
    assert_eq!(
        harness.bus.routes().get("P1").unwrap().receivers,
        vec![Receiver::remote("R3", bridge(7)), Receiver::local("R1")]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn receiver_listed_behind_two_bridges_is_wired_once() {
    init_logging();
    let raw = table(vec![Route::new(
        Producer::local("P1"),
        vec![
            Receiver::remote("R1", bridge(2)),
            Receiver::remote("R1", bridge(1)),
        ],
    )]);
    let harness = start_bus(raw, InProcessBridge::new()).await;
    let bus = &harness.bus;

    assert_eq!(
        bus.routes().get("P1").unwrap().receivers,
        vec![Receiver::remote("R1", bridge(1))]
    );
    let remote = bus.remote_receiver("P1", "R1").await.unwrap();
    assert_eq!(remote.receiver().await, Receiver::remote("R1", bridge(1)));
}

#[tokio::test(flavor = "multi_thread")]
async fn moving_a_receiver_to_another_bridge_updates_it_in_place() {
    init_logging();
    let harness = start_bus(
        table(vec![Route::new(
            Producer::local("P1"),
            vec![Receiver::remote("R1", bridge(1))],
        )]),
        InProcessBridge::new(),
    )
    .await;
    let bus = &harness.bus;
    let remote = bus.remote_receiver("P1", "R1").await.unwrap();

    bus.update(&table(vec![Route::new(
        Producer::local("P1"),
        vec![Receiver::remote("R1", bridge(2))],
    )]))
    .await;

    let after = bus.remote_receiver("P1", "R1").await.unwrap();
    assert!(Arc::ptr_eq(&remote, &after));
    assert_eq!(after.receiver().await, Receiver::remote("R1", bridge(2)));
    assert!(after.is_streaming().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_updates_leave_one_consistent_table() {
    init_logging();
    let harness = start_bus(RouteTable::new(), InProcessBridge::new()).await;
    let bus = harness.bus.clone();

    let first = table(vec![local_route("A", &["RA"])]);
    let second = table(vec![local_route("B", &["RB"])]);
    let (left, right) = (bus.clone(), bus.clone());
    let (first_clone, second_clone) = (first.clone(), second.clone());
    let _ = tokio::join!(
        tokio::spawn(async move { left.update(&first_clone).await }),
        tokio::spawn(async move { right.update(&second_clone).await }),
    );

    let applied = bus.routes();
    assert!(*applied == first || *applied == second);
    let wiring = bus.wiring().await;
    assert_eq!(wiring.publishers, applied.producer_ids());
    assert_eq!(wiring.local_receivers, applied.local_receiver_ids());
}
