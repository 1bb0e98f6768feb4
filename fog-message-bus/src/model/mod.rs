//! Route model value objects and message types.
//!
//! Pure data with structural equality; nothing here owns a transport handle.

pub(crate) mod bridge_config;
pub(crate) mod message;
pub(crate) mod route;
