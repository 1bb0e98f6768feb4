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

//! Engine tuning knobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_SPEED_CALCULATION_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_ARCHIVE_MAX_BYTES: u64 = 64 * 1024 * 1024;
pub const DEFAULT_ARCHIVE_MAX_AGE_MS: u64 = 24 * 60 * 60 * 1_000;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct MessageBusConfig {
    pub health_check_interval_ms: u64,
    pub speed_calculation_interval_ms: u64,
    /// Upper bound on bytes queued per broker channel; `None` is unbounded.
    pub memory_limit_bytes: Option<u64>,
    pub archive: ArchiveConfig,
}

impl Default for MessageBusConfig {
    fn default() -> Self {
        Self {
            health_check_interval_ms: DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            speed_calculation_interval_ms: DEFAULT_SPEED_CALCULATION_INTERVAL_MS,
            memory_limit_bytes: None,
            archive: ArchiveConfig::default(),
        }
    }
}

impl MessageBusConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms.max(1))
    }

    pub fn speed_calculation_interval(&self) -> Duration {
        Duration::from_millis(self.speed_calculation_interval_ms.max(1))
    }
}

/// Bounds of each publisher's archive.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct ArchiveConfig {
    pub max_bytes: u64,
    /// Entries older than this, measured from the newest entry, are evicted.
    pub max_age_ms: Option<u64>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_ARCHIVE_MAX_BYTES,
            max_age_ms: Some(DEFAULT_ARCHIVE_MAX_AGE_MS),
        }
    }
}
