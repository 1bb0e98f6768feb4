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

//! Ticker-driven background loops with an explicit stop channel.

use crate::observability::events;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

const COMPONENT: &str = "periodic_loop";

/// Running loop. Dropping the handle without [`stop`](Self::stop) leaves the
/// loop running until its target is dropped.
pub(crate) struct PeriodicLoopHandle {
    name: &'static str,
    stop_sender: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PeriodicLoopHandle {
    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Signals the loop and waits for the current tick, if any, to finish.
    pub(crate) async fn stop(self) {
        let _ = self.stop_sender.send(true);
        let _ = self.task.await;
    }
}

/// Runs `tick` every `period`, first after one full period.
///
/// The loop only holds a weak reference to `target` and exits on its own
/// once the target is gone. Ticks never overlap; a slow tick delays the next.
pub(crate) fn spawn_periodic_loop<T, F, Fut>(
    name: &'static str,
    period: Duration,
    target: Weak<T>,
    tick: F,
) -> PeriodicLoopHandle
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (stop_sender, mut stop_receiver) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!(
            event = events::RUNTIME_LOOP_START,
            component = COMPONENT,
            loop_name = name,
            period_ms = period.as_millis() as u64,
            "periodic loop started"
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(target) = target.upgrade() else {
                        debug!(
                            event = events::RUNTIME_LOOP_STOP,
                            component = COMPONENT,
                            loop_name = name,
                            "loop target dropped"
                        );
                        break;
                    };
                    tick(target).await;
                }
                changed = stop_receiver.changed() => {
                    if changed.is_err() || *stop_receiver.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            event = events::RUNTIME_LOOP_STOP,
            component = COMPONENT,
            loop_name = name,
            "periodic loop stopped"
        );
    });

    PeriodicLoopHandle {
        name,
        stop_sender,
        task,
    }
}
