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

//! Route value objects: who publishes and who receives.

use crate::model::bridge_config::BridgeConfig;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Where an endpoint lives relative to this node.
///
/// A remote endpoint always carries the bridge config used to reach it, so a
/// "remote without bridge" state cannot be represented.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Locality {
    Local,
    Remote(BridgeConfig),
}

impl Locality {
    pub fn is_local(&self) -> bool {
        matches!(self, Locality::Local)
    }

    pub fn bridge_config(&self) -> Option<&BridgeConfig> {
        match self {
            Locality::Local => None,
            Locality::Remote(config) => Some(config),
        }
    }
}

/// Microservice producing messages on a route.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Producer {
    pub microservice_id: String,
    pub locality: Locality,
}

impl Producer {
    pub fn local(microservice_id: &str) -> Self {
        Self {
            microservice_id: microservice_id.to_string(),
            locality: Locality::Local,
        }
    }

    pub fn remote(microservice_id: &str, bridge_config: BridgeConfig) -> Self {
        Self {
            microservice_id: microservice_id.to_string(),
            locality: Locality::Remote(bridge_config),
        }
    }

    pub fn is_local(&self) -> bool {
        self.locality.is_local()
    }

    pub fn bridge_config(&self) -> Option<&BridgeConfig> {
        self.locality.bridge_config()
    }
}

/// Microservice consuming messages on a route.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Receiver {
    pub microservice_id: String,
    pub locality: Locality,
}

impl Receiver {
    pub fn local(microservice_id: &str) -> Self {
        Self {
            microservice_id: microservice_id.to_string(),
            locality: Locality::Local,
        }
    }

    pub fn remote(microservice_id: &str, bridge_config: BridgeConfig) -> Self {
        Self {
            microservice_id: microservice_id.to_string(),
            locality: Locality::Remote(bridge_config),
        }
    }

    pub fn is_local(&self) -> bool {
        self.locality.is_local()
    }

    pub fn bridge_config(&self) -> Option<&BridgeConfig> {
        self.locality.bridge_config()
    }
}

// Receivers order by microservice ID first. Locality only breaks ties between
// entries that share an ID, which keeps the order total.
impl Ord for Receiver {
    fn cmp(&self, other: &Self) -> Ordering {
        self.microservice_id
            .cmp(&other.microservice_id)
            .then_with(|| self.locality.cmp(&other.locality))
    }
}

impl PartialOrd for Receiver {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A producer and the ordered receivers it fans out to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Route {
    pub producer: Producer,
    pub receivers: Vec<Receiver>,
}

impl Route {
    pub fn new(producer: Producer, receivers: Vec<Receiver>) -> Self {
        Self {
            producer,
            receivers,
        }
    }

    pub fn producer_id(&self) -> &str {
        &self.producer.microservice_id
    }

    /// Broker channel names for every receiver, in receiver order.
    pub fn delivery_channels(&self) -> impl Iterator<Item = (&Receiver, String)> + '_ {
        self.receivers
            .iter()
            .map(move |receiver| (receiver, delivery_channel(self.producer_id(), receiver)))
    }
}

/// Joins producer and receiver IDs in a remote receiver's channel name.
/// Route tables reject microservice IDs containing it, so a local receiver's
/// channel never collides with a remote one.
pub const CHANNEL_SEPARATOR: char = ':';

/// Identity of one remote receiver: the same microservice may be a remote
/// receiver of several producers, each with its own bridge relay.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct RemoteReceiverKey {
    pub producer_id: String,
    pub microservice_id: String,
}

impl RemoteReceiverKey {
    pub fn new(producer_id: &str, microservice_id: &str) -> Self {
        Self {
            producer_id: producer_id.to_string(),
            microservice_id: microservice_id.to_string(),
        }
    }

    /// Broker channel dedicated to this remote receiver.
    pub fn channel_name(&self) -> String {
        format!(
            "{}{CHANNEL_SEPARATOR}{}",
            self.producer_id, self.microservice_id
        )
    }
}

impl Display for RemoteReceiverKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.producer_id, self.microservice_id)
    }
}

/// Broker channel a publisher tags a copy with for one receiver.
///
/// Local receivers share one channel per microservice across all producers;
/// remote receivers get a channel per (producer, receiver) pair.
pub fn delivery_channel(producer_id: &str, receiver: &Receiver) -> String {
    if receiver.is_local() {
        receiver.microservice_id.clone()
    } else {
        RemoteReceiverKey::new(producer_id, &receiver.microservice_id).channel_name()
    }
}
