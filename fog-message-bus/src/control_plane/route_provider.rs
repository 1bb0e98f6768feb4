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

//! Sources of the raw route table handed to the engine.

use crate::control_plane::route_table::{RouteTable, RouteTableError};
use crate::observability::events;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

const COMPONENT: &str = "route_provider";

/// Supplies the raw, unfiltered route table on demand.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn fetch_routes(&self) -> Result<RouteTable, RouteTableError>;
}

/// Reads routes from a JSON file in the controller's wire format on every
/// fetch, so edits are picked up by the next fetch.
pub struct StaticRouteFile {
    path: PathBuf,
}

impl StaticRouteFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl RouteProvider for StaticRouteFile {
    async fn fetch_routes(&self) -> Result<RouteTable, RouteTableError> {
        debug!(
            event = events::ROUTE_TABLE_READ,
            component = COMPONENT,
            path = %self.path.display(),
            "reading route table"
        );
        let data = fs::read_to_string(&self.path).map_err(RouteTableError::Io)?;
        RouteTable::from_json(&data)
    }
}

/// In-memory route table that the owner can replace at any time.
pub struct SharedRouteTable {
    table: ArcSwap<RouteTable>,
}

impl SharedRouteTable {
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    pub fn replace(&self, table: RouteTable) {
        self.table.store(Arc::new(table));
    }

    pub fn current(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }
}

impl Default for SharedRouteTable {
    fn default() -> Self {
        Self::new(RouteTable::new())
    }
}

#[async_trait]
impl RouteProvider for SharedRouteTable {
    async fn fetch_routes(&self) -> Result<RouteTable, RouteTableError> {
        Ok(self.current().as_ref().clone())
    }
}
