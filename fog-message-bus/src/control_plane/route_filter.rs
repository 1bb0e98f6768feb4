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

//! Remote fan-out reduction applied to every raw route table.
//!
//! Several microservices behind one bridge are served by a single remote
//! subscription on that bridge, so each route keeps exactly one remote
//! receiver per bridge ID: the smallest under [`Receiver`]'s ordering
//! (ascending microservice ID). A microservice listed as a remote receiver
//! behind several bridges is reached through one of them only, the one
//! picked by the same ordering, since every remote copy of a route shares
//! the channel named after the (producer, receiver) pair. Local receivers
//! are kept, exact duplicates are dropped, and survivors keep their
//! original relative order.

use crate::control_plane::route_table::RouteTable;
use crate::model::route::{Receiver, Route};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

/// Filters one route. Returns `None` when no receivers survive, since a
/// route without receivers gets no publisher.
pub fn filter_route(route: &Route) -> Option<Route> {
    let mut by_microservice: BTreeMap<&str, &Receiver> = BTreeMap::new();
    for receiver in route.receivers.iter().filter(|r| !r.is_local()) {
        keep_smallest(
            by_microservice.entry(receiver.microservice_id.as_str()),
            receiver,
        );
    }

    let mut representatives: BTreeMap<i32, &Receiver> = BTreeMap::new();
    for receiver in by_microservice.values() {
        if let Some(config) = receiver.bridge_config() {
            keep_smallest(representatives.entry(config.bridge_id), *receiver);
        }
    }

    let mut seen = HashSet::new();
    let receivers: Vec<Receiver> = route
        .receivers
        .iter()
        .filter(|receiver| match receiver.bridge_config() {
            None => true,
            Some(config) => representatives
                .get(&config.bridge_id)
                .is_some_and(|chosen| std::ptr::eq(*chosen, *receiver)),
        })
        .filter(|receiver| seen.insert(*receiver))
        .cloned()
        .collect();

    if receivers.is_empty() {
        return None;
    }
    Some(Route::new(route.producer.clone(), receivers))
}

fn keep_smallest<'a, K: Ord>(entry: Entry<'_, K, &'a Receiver>, receiver: &'a Receiver) {
    entry
        .and_modify(|current| {
            if receiver < *current {
                *current = receiver;
            }
        })
        .or_insert(receiver);
}

/// Filters every route of a raw table, dropping routes left without receivers.
pub fn filter_routes(raw: &RouteTable) -> RouteTable {
    raw.iter().filter_map(filter_route).collect()
}
