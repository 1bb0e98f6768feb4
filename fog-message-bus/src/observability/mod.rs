//! Structured-logging vocabulary shared by every layer.

pub mod events;
pub mod fields;
