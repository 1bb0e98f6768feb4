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

//! Transport capabilities consumed by the engine.
//!
//! The local broker and the remote bridge (connector) are external
//! collaborators. The engine only sees the narrow traits below; the
//! [`in_process`] module provides implementations that run inside the
//! agent process.

pub mod in_process;

use crate::model::bridge_config::BridgeConfig;
use crate::model::message::Message;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Outcome of a transport operation that did not succeed.
///
/// `Closed` is an expected state during churn and is checked by callers, not
/// treated as exceptional.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportError {
    Closed,
    Unavailable(String),
    Rejected(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Closed => write!(f, "handle is closed"),
            TransportError::Unavailable(reason) => write!(f, "transport unavailable: {reason}"),
            TransportError::Rejected(reason) => write!(f, "transport rejected request: {reason}"),
        }
    }
}

impl Error for TransportError {}

/// One copy of a message addressed to a single broker channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaggedMessage {
    pub channel: String,
    pub message: Message,
}

/// Push-delivery callback installed on a consumer.
#[async_trait]
pub trait MessageListener: Send + Sync {
    async fn on_receive(&self, message: Message);
}

#[async_trait]
pub trait BrokerProducer: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: TaggedMessage) -> Result<(), TransportError>;

    fn is_closed(&self) -> bool;

    async fn close(&self);
}

#[async_trait]
pub trait BrokerConsumer: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the next queued message without waiting, or `None` when the
    /// queue is empty or a listener is installed.
    async fn receive_immediate(&self) -> Result<Option<Message>, TransportError>;

    async fn acknowledge(&self, message: &Message) -> Result<(), TransportError>;

    async fn set_listener(&self, listener: Arc<dyn MessageListener>) -> Result<(), TransportError>;

    async fn remove_listener(&self);

    fn has_listener(&self) -> bool;

    fn is_closed(&self) -> bool;

    async fn close(&self);
}

/// Local message broker.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn start_server(&self) -> Result<(), TransportError>;

    async fn stop_server(&self) -> Result<(), TransportError>;

    fn is_server_active(&self) -> bool;

    async fn set_memory_limit(&self, limit_bytes: Option<u64>) -> Result<(), TransportError>;

    /// Creates a producer, replacing any previous producer with the same name.
    async fn create_producer(&self, name: &str) -> Result<Arc<dyn BrokerProducer>, TransportError>;

    /// Creates a consumer, replacing any previous consumer with the same name.
    /// Messages already queued on the channel survive the replacement.
    async fn create_consumer(&self, name: &str) -> Result<Arc<dyn BrokerConsumer>, TransportError>;

    fn get_producer(&self, name: &str) -> Option<Arc<dyn BrokerProducer>>;

    fn get_consumer(&self, name: &str) -> Option<Arc<dyn BrokerConsumer>>;

    async fn remove_producer(&self, name: &str);

    /// Removes the consumer and discards its channel.
    async fn remove_consumer(&self, name: &str);

    /// `true` when the producer is closed or absent.
    fn is_producer_closed(&self, name: &str) -> bool;

    /// `true` when the consumer is closed or absent.
    fn is_consumer_closed(&self, name: &str) -> bool;
}

#[async_trait]
pub trait BridgeProducer: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: &Message) -> Result<(), TransportError>;

    fn is_closed(&self) -> bool;

    async fn close(&self);
}

#[async_trait]
pub trait BridgeConsumer: Send + Sync {
    fn name(&self) -> &str;

    async fn set_listener(&self, listener: Arc<dyn MessageListener>) -> Result<(), TransportError>;

    fn is_closed(&self) -> bool;

    async fn close(&self);
}

/// Remote relay transport used for non-local producers and receivers.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    async fn get_consumer(
        &self,
        name: &str,
        config: &BridgeConfig,
    ) -> Result<Arc<dyn BridgeConsumer>, TransportError>;

    async fn get_producer(
        &self,
        name: &str,
        config: &BridgeConfig,
    ) -> Result<Arc<dyn BridgeProducer>, TransportError>;

    async fn remove_producer(&self, name: &str);
}

#[cfg(test)]
mod tests {
    use super::TransportError;

    #[test]
    fn transport_error_display_is_stable() {
        assert_eq!(TransportError::Closed.to_string(), "handle is closed");
        assert_eq!(
            TransportError::Unavailable("server down".to_string()).to_string(),
            "transport unavailable: server down"
        );
    }
}
