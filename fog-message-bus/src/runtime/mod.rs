//! Runtime boundaries for the engine's background work.

pub(crate) mod periodic_loop;
