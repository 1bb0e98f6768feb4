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

//! # fog-message-bus
//!
//! `fog-message-bus` routes messages between microservices on an edge node and
//! keeps that routing alive while brokers, consumers and bridges fail.
//!
//! A [`MessageBus`] is built from a broker transport, a bridge transport and a
//! [`RouteProvider`]. It turns the provider's [`RouteTable`] into one
//! [`MessagePublisher`] per producer and one receiver per destination, then
//! reconciles that wiring whenever [`MessageBus::update`] is called and repairs
//! it on every health-check tick.
//!
//! ```
//! use std::sync::Arc;
//! use fog_message_bus::transport::in_process::{InProcessBridge, InProcessBroker};
//! use fog_message_bus::{MessageBus, MessageBusConfig, RouteTable, SharedRouteTable};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let routes = RouteTable::from_json(
//!     r#"[{ "microserviceUuid": "sensor", "isLocal": true,
//!           "receivers": [{ "microserviceUuid": "dashboard", "isLocal": true }] }]"#,
//! )
//! .unwrap();
//!
//! let bus = MessageBus::new(
//!     MessageBusConfig::default(),
//!     Arc::new(InProcessBroker::new()),
//!     Arc::new(InProcessBridge::new()),
//!     Arc::new(SharedRouteTable::new(routes)),
//! );
//! bus.start().await.unwrap();
//!
//! let message = bus.new_message("temperature", b"21.5".to_vec());
//! bus.publish("sensor", message.clone()).await.unwrap();
//!
//! assert_eq!(bus.get_messages("dashboard").await.unwrap(), vec![message]);
//! bus.stop().await;
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - Model: route, endpoint locality, bridge config and message value objects
//! - Control plane: route table parsing, remote fan-out filtering and reconciliation planning
//! - Data plane: publishers with their archives, local and remote receivers
//! - Transport: broker and bridge capability traits plus in-process implementations
//! - Runtime: the periodic health-check and speed-calculation loops
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events/spans and does not unconditionally initialize a global
//! subscriber. Binaries and tests are responsible for one-time
//! `tracing_subscriber` initialization at process boundaries.

mod config;
pub use config::{
    ArchiveConfig, MessageBusConfig, DEFAULT_ARCHIVE_MAX_AGE_MS, DEFAULT_ARCHIVE_MAX_BYTES,
    DEFAULT_HEALTH_CHECK_INTERVAL_MS, DEFAULT_SPEED_CALCULATION_INTERVAL_MS,
};

mod control_plane;
pub use control_plane::route_filter::{filter_route, filter_routes};
pub use control_plane::route_provider::{RouteProvider, SharedRouteTable, StaticRouteFile};
pub use control_plane::route_table::{RouteTable, RouteTableError};

mod data_plane;
pub use data_plane::archive::{ArchiveError, MessageArchive};
pub use data_plane::publisher::{MessagePublisher, PublishError};
pub use data_plane::receiver::{LocalMessageReceiver, RemoteMessageReceiver};

mod message_bus;
pub use message_bus::{MessageBus, MessageBusError, WiringSnapshot};

mod model;
pub use model::bridge_config::BridgeConfig;
pub use model::message::{Message, MessageIdGenerator};
pub use model::route::{delivery_channel, Locality, Producer, Receiver, RemoteReceiverKey, Route};

#[doc(hidden)]
pub mod observability;
mod runtime;

mod status;
pub use status::{MessageBusStatus, MessageBusStatusSnapshot, ModuleStatus};

pub mod transport;
