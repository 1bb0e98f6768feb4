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

//! Diffing a filtered route table against live wiring.
//!
//! Planning is pure; the engine applies the plan under its update lock.

use crate::control_plane::route_table::RouteTable;
use crate::model::route::{Receiver, RemoteReceiverKey, Route};
use std::collections::BTreeSet;

/// What is live right now: the last applied table plus the objects that
/// actually exist. The two can disagree after a failed creation.
pub(crate) struct LiveWiring<'a> {
    pub(crate) routes: &'a RouteTable,
    pub(crate) publishers: BTreeSet<String>,
    pub(crate) local_receivers: BTreeSet<String>,
    pub(crate) remote_receivers: BTreeSet<RemoteReceiverKey>,
}

/// Minimal set of operations turning live wiring into a target table.
#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct ReconciliationPlan {
    pub(crate) publishers_to_close: Vec<String>,
    pub(crate) publishers_to_update: Vec<Route>,
    pub(crate) publishers_to_create: Vec<Route>,
    pub(crate) local_receivers_to_close: Vec<String>,
    pub(crate) local_receivers_to_create: Vec<String>,
    pub(crate) remote_receivers_to_close: Vec<RemoteReceiverKey>,
    pub(crate) remote_receivers_to_update: Vec<(RemoteReceiverKey, Receiver)>,
    pub(crate) remote_receivers_to_create: Vec<(RemoteReceiverKey, Receiver)>,
}

impl ReconciliationPlan {
    pub(crate) fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn creations(&self) -> usize {
        self.publishers_to_create.len()
            + self.local_receivers_to_create.len()
            + self.remote_receivers_to_create.len()
    }

    pub(crate) fn closures(&self) -> usize {
        self.publishers_to_close.len()
            + self.local_receivers_to_close.len()
            + self.remote_receivers_to_close.len()
    }

    pub(crate) fn updates(&self) -> usize {
        self.publishers_to_update.len() + self.remote_receivers_to_update.len()
    }
}

/// Plans the transition from `live` to the already filtered `target`.
pub(crate) fn plan(live: &LiveWiring<'_>, target: &RouteTable) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    plan.publishers_to_close = live
        .publishers
        .iter()
        .filter(|id| !target.contains(id))
        .cloned()
        .collect();
    for route in target.iter() {
        if !live.publishers.contains(route.producer_id()) {
            plan.publishers_to_create.push(route.clone());
        } else if live.routes.get(route.producer_id()) != Some(route) {
            plan.publishers_to_update.push(route.clone());
        }
    }

    let target_local = target.local_receiver_ids();
    plan.local_receivers_to_close = live
        .local_receivers
        .difference(&target_local)
        .cloned()
        .collect();
    plan.local_receivers_to_create = target_local
        .difference(&live.local_receivers)
        .cloned()
        .collect();

    let target_remote = target.remote_receivers();
    let applied_remote = live.routes.remote_receivers();
    plan.remote_receivers_to_close = live
        .remote_receivers
        .iter()
        .filter(|key| !target_remote.contains_key(key))
        .cloned()
        .collect();
    for (key, receiver) in target_remote {
        if !live.remote_receivers.contains(&key) {
            plan.remote_receivers_to_create.push((key, receiver));
        } else if applied_remote.get(&key).and_then(Receiver::bridge_config)
            != receiver.bridge_config()
        {
            plan.remote_receivers_to_update.push((key, receiver));
        }
    }

    plan
}
