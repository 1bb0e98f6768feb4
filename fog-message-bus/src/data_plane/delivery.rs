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

//! Poll/stream delivery-mode state shared by both receiver variants.

use crate::transport::{BrokerConsumer, MessageListener, TransportError};
use std::sync::Arc;

/// Handle on a listener installed on a broker consumer. Cancelling it
/// detaches the listener and returns it to the caller.
pub(crate) struct StreamingSubscription {
    consumer: Arc<dyn BrokerConsumer>,
    listener: Arc<dyn MessageListener>,
}

impl StreamingSubscription {
    async fn open(
        consumer: Arc<dyn BrokerConsumer>,
        listener: Arc<dyn MessageListener>,
    ) -> Result<Self, TransportError> {
        consumer.set_listener(listener.clone()).await?;
        Ok(Self { consumer, listener })
    }

    async fn cancel(self) -> Arc<dyn MessageListener> {
        self.consumer.remove_listener().await;
        self.listener
    }
}

/// How a receiver hands inbound messages over. `Polling` is the default.
pub(crate) enum DeliveryMode {
    Polling,
    Streaming(StreamingSubscription),
}

impl DeliveryMode {
    pub(crate) fn is_streaming(&self) -> bool {
        matches!(self, DeliveryMode::Streaming(_))
    }

    pub(crate) fn listener(&self) -> Option<Arc<dyn MessageListener>> {
        match self {
            DeliveryMode::Polling => None,
            DeliveryMode::Streaming(subscription) => Some(subscription.listener.clone()),
        }
    }

    /// Moves to `Streaming`, cancelling any previous subscription first. On
    /// failure the mode is left as `Polling`.
    pub(crate) async fn stream_to(
        &mut self,
        consumer: Arc<dyn BrokerConsumer>,
        listener: Arc<dyn MessageListener>,
    ) -> Result<(), TransportError> {
        self.poll().await;
        let subscription = StreamingSubscription::open(consumer, listener).await?;
        *self = DeliveryMode::Streaming(subscription);
        Ok(())
    }

    /// Moves to `Polling`, returning the listener that was detached.
    pub(crate) async fn poll(&mut self) -> Option<Arc<dyn MessageListener>> {
        match std::mem::replace(self, DeliveryMode::Polling) {
            DeliveryMode::Polling => None,
            DeliveryMode::Streaming(subscription) => Some(subscription.cancel().await),
        }
    }
}
