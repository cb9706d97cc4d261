//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into person sheet use-cases.
//! - Keep host/FFI layers decoupled from storage and migration details.

pub mod drop;
pub mod names;
pub mod person_service;
pub mod reconcile;
