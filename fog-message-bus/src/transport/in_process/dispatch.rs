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

//! Ordered push delivery to one installed listener.

use crate::model::message::Message;
use crate::observability::events;
use crate::transport::MessageListener;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::debug;

const COMPONENT: &str = "listener_dispatch";

/// Feeds messages to a listener on a dedicated task, preserving send order.
///
/// Dropping the dispatch closes the queue; messages already handed over are
/// still delivered before the task exits.
pub(crate) struct ListenerDispatch {
    sender: UnboundedSender<Message>,
}

impl ListenerDispatch {
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(channel: &str, listener: Arc<dyn MessageListener>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Message>();
        let channel = channel.to_string();

        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                listener.on_receive(message).await;
            }
            debug!(
                event = events::LISTENER_DISPATCH_CLOSED,
                component = COMPONENT,
                channel = channel.as_str(),
                "listener dispatch drained; stopping"
            );
        });

        Self { sender }
    }

    /// Hands one message to the listener task. Gives the message back when
    /// the task is gone.
    pub(crate) fn dispatch(&self, message: Message) -> Result<(), Message> {
        self.sender.send(message).map_err(|err| err.0)
    }
}
