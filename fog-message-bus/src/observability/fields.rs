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

//! Canonical structured field keys and value-format helpers.

use crate::model::bridge_config::BridgeConfig;
use crate::model::message::Message;
use crate::model::route::{Locality, Receiver};

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";

pub const PRODUCER_ID: &str = "producer_id";
pub const RECEIVER_ID: &str = "receiver_id";
pub const CHANNEL: &str = "channel";
pub const BRIDGE: &str = "bridge";
pub const MSG_ID: &str = "msg_id";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const NONE: &str = "none";
pub const LOCAL: &str = "local";
pub const REASON_HANDLE_CLOSED: &str = "handle_closed";
pub const REASON_BRIDGE_MISSING: &str = "bridge_missing";
pub const REASON_NOT_LIVE: &str = "not_live";

/// Bridge label that never includes the auth token.
pub fn format_bridge(config: Option<&BridgeConfig>) -> String {
    config
        .map(|config| format!("{}/{}", config.bridge_id, config.endpoint_id))
        .unwrap_or_else(|| LOCAL.to_string())
}

pub fn format_locality(locality: &Locality) -> String {
    format_bridge(locality.bridge_config())
}

pub fn format_receiver(receiver: &Receiver) -> String {
    format!(
        "{}@{}",
        receiver.microservice_id,
        format_locality(&receiver.locality)
    )
}

pub fn format_receivers(receivers: &[Receiver]) -> String {
    if receivers.is_empty() {
        return NONE.to_string();
    }
    receivers
        .iter()
        .map(format_receiver)
        .collect::<Vec<_>>()
        .join(",")
}

pub fn format_message_id(message: &Message) -> String {
    if message.id.is_empty() {
        NONE.to_string()
    } else {
        message.id.clone()
    }
}
