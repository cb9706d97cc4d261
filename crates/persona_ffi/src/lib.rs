//! Flutter-facing bindings for the person sheet core.

pub mod api;
