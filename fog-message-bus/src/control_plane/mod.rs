//! Control-plane layer.
//!
//! Owns the route table: parsing the controller's wire format, reducing
//! remote fan-out and planning the minimal set of create/update/close
//! operations needed to move live wiring onto a new table.

pub(crate) mod reconciliation;
pub(crate) mod route_filter;
pub(crate) mod route_provider;
pub(crate) mod route_table;
