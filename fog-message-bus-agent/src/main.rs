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

mod config;

use crate::config::AgentConfig;
use clap::Parser;
use fog_message_bus::transport::in_process::{InProcessBridge, InProcessBroker};
use fog_message_bus::{MessageBus, RouteProvider, StaticRouteFile};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command()]
struct AgentArgs {
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt::try_init();

    let args = AgentArgs::parse();
    let config = AgentConfig::load(&args.config)?;
    let instance_id = Uuid::new_v4();

    info!(
        node = config.node_name.as_str(),
        instance = %instance_id,
        routes_file = %config.routes_file.display(),
        "Started fog-message-bus-agent"
    );

    let route_file = Arc::new(StaticRouteFile::new(config.routes_file.clone()));
    let bus = MessageBus::new(
        config.message_bus.clone(),
        Arc::new(InProcessBroker::new()),
        Arc::new(InProcessBridge::new()),
        route_file.clone(),
    );
    bus.start().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            reload = reload_requested() => {
                if reload.is_none() {
                    break;
                }
                reload_config(&bus, &args.config, &route_file).await;
            }
        }
    }

    info!(node = config.node_name.as_str(), "Stopping fog-message-bus-agent");
    bus.stop().await;
    Ok(())
}

/// Applies a changed agent config and route file without restarting.
async fn reload_config(bus: &MessageBus, config_path: &Path, route_file: &StaticRouteFile) {
    match AgentConfig::load(config_path) {
        Ok(config) => {
            if config.routes_file != *route_file.path() {
                warn!(
                    routes_file = %config.routes_file.display(),
                    "routes_file changes take effect on restart"
                );
            }
            bus.instance_config_updated(config.message_bus).await;
        }
        Err(err) => warn!(err = %err, "keeping previous agent config"),
    }

    match route_file.fetch_routes().await {
        Ok(routes) => {
            bus.update(&routes).await;
            info!(routes = bus.routes().len(), "route table reloaded");
        }
        Err(err) => warn!(err = %err, "keeping previous route table"),
    }
}

/// Resolves on SIGHUP. `None` when reload signals are unavailable.
#[cfg(unix)]
async fn reload_requested() -> Option<()> {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::hangup()) {
        Ok(mut hangup) => hangup.recv().await,
        Err(err) => {
            warn!(err = %err, "SIGHUP reload unavailable");
            std::future::pending().await
        }
    }
}

#[cfg(not(unix))]
async fn reload_requested() -> Option<()> {
    std::future::pending().await
}
