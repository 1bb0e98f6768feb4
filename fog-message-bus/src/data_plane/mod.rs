//! Data-plane layer.
//!
//! Owns message flow: publishers archive and fan out, receivers hand messages
//! to local consumers or relay them onto a bridge. Nothing here touches the
//! route table; the engine creates, updates and closes these objects.

pub(crate) mod archive;
pub(crate) mod delivery;
pub(crate) mod publisher;
pub(crate) mod receiver;
