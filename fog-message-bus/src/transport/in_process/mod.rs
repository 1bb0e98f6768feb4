//! Transports that run inside the agent process.
//!
//! [`InProcessBroker`] stands in for the local broker and [`InProcessBridge`]
//! for the connector. Both expose fault-injection hooks used to exercise the
//! self-healing paths.

mod bridge;
mod broker;
mod dispatch;

pub use bridge::{InProcessBridge, InProcessBridgeConsumer, InProcessBridgeProducer};
pub use broker::{InProcessBroker, InProcessConsumer, InProcessProducer};
