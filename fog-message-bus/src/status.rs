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

//! Counters and health exposed to external status reporting.
//!
//! The engine only increments and exposes values here; rendering and
//! transmission belong to the caller.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Coarse health of the engine as a whole.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Starting,
    Running,
    Degraded,
    Stopped,
}

/// Point-in-time copy of [`MessageBusStatus`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MessageBusStatusSnapshot {
    pub module_status: ModuleStatus,
    pub processed_messages: u64,
    pub published_per_microservice: BTreeMap<String, u64>,
    /// Messages per second over the last sample window.
    pub average_speed: f64,
}

struct SpeedBaseline {
    processed: u64,
    taken_at: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MessageBusStatus {
    processed_messages: AtomicU64,
    average_speed_bits: AtomicU64,
    published_per_microservice: Mutex<BTreeMap<String, u64>>,
    module_status: Mutex<ModuleStatus>,
    baseline: Mutex<SpeedBaseline>,
}

impl Default for MessageBusStatus {
    fn default() -> Self {
        Self {
            processed_messages: AtomicU64::new(0),
            average_speed_bits: AtomicU64::new(0f64.to_bits()),
            published_per_microservice: Mutex::new(BTreeMap::new()),
            module_status: Mutex::new(ModuleStatus::Stopped),
            baseline: Mutex::new(SpeedBaseline {
                processed: 0,
                taken_at: Instant::now(),
            }),
        }
    }
}

impl MessageBusStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one message published by `microservice_id`.
    pub fn record_published(&self, microservice_id: &str) {
        self.processed_messages.fetch_add(1, Ordering::AcqRel);
        *lock(&self.published_per_microservice)
            .entry(microservice_id.to_string())
            .or_insert(0) += 1;
    }

    /// Keeps counters only for `microservice_ids`, starting new ones at zero.
    pub fn retain_microservices(&self, microservice_ids: &BTreeSet<String>) {
        let mut counters = lock(&self.published_per_microservice);
        counters.retain(|id, _| microservice_ids.contains(id));
        for id in microservice_ids {
            counters.entry(id.clone()).or_insert(0);
        }
    }

    pub fn processed_messages(&self) -> u64 {
        self.processed_messages.load(Ordering::Acquire)
    }

    pub fn published_by(&self, microservice_id: &str) -> Option<u64> {
        lock(&self.published_per_microservice)
            .get(microservice_id)
            .copied()
    }

    pub fn average_speed(&self) -> f64 {
        f64::from_bits(self.average_speed_bits.load(Ordering::Acquire))
    }

    pub fn module_status(&self) -> ModuleStatus {
        *lock(&self.module_status)
    }

    pub fn set_module_status(&self, status: ModuleStatus) {
        *lock(&self.module_status) = status;
    }

    /// Updates the speed gauge from the messages processed since the last
    /// sample and moves the baseline to now.
    pub fn sample_speed(&self) -> f64 {
        self.sample_speed_at(Instant::now())
    }

    pub(crate) fn sample_speed_at(&self, now: Instant) -> f64 {
        let processed = self.processed_messages();
        let mut baseline = lock(&self.baseline);

        let elapsed = now.saturating_duration_since(baseline.taken_at).as_secs_f64();
        let delta = processed.saturating_sub(baseline.processed) as f64;
        let speed = if elapsed > 0.0 { delta / elapsed } else { 0.0 };

        *baseline = SpeedBaseline {
            processed,
            taken_at: now,
        };
        self.average_speed_bits
            .store(speed.to_bits(), Ordering::Release);
        speed
    }

    pub fn snapshot(&self) -> MessageBusStatusSnapshot {
        MessageBusStatusSnapshot {
            module_status: self.module_status(),
            processed_messages: self.processed_messages(),
            published_per_microservice: lock(&self.published_per_microservice).clone(),
            average_speed: self.average_speed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MessageBusStatus, ModuleStatus};
    use std::collections::BTreeSet;
    use std::time::{Duration, Instant};

    #[test]
    fn retain_drops_stale_and_zeroes_new_counters() {
        let status = MessageBusStatus::new();
        status.record_published("old");
        status.record_published("kept");

        let ids: BTreeSet<String> = ["kept", "new"].iter().map(|id| id.to_string()).collect();
        status.retain_microservices(&ids);

        assert_eq!(status.published_by("old"), None);
        assert_eq!(status.published_by("kept"), Some(1));
        assert_eq!(status.published_by("new"), Some(0));
        assert_eq!(status.processed_messages(), 2);
    }

    #[test]
    fn speed_is_delta_over_elapsed_and_resets_baseline() {
        let status = MessageBusStatus::new();
        let start = Instant::now();
        status.sample_speed_at(start);

        for _ in 0..10 {
            status.record_published("p");
        }
        let speed = status.sample_speed_at(start + Duration::from_secs(2));
        assert!((speed - 5.0).abs() < f64::EPSILON);

        let idle = status.sample_speed_at(start + Duration::from_secs(4));
        assert_eq!(idle, 0.0);
        assert_eq!(status.average_speed(), 0.0);
    }

    #[test]
    fn snapshot_serializes_module_status_in_snake_case() {
        let status = MessageBusStatus::new();
        status.set_module_status(ModuleStatus::Degraded);

        let json = serde_json::to_value(status.snapshot()).unwrap();

        assert_eq!(json["module_status"], "degraded");
    }
}
