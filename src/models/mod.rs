//! Core data models for the replication-status engine.
//!
//! These types describe what the consistency-check backend reports about an
//! object across zones, and what the engine hands back to the UI layer. They
//! serialize naturally as JSON via `serde`.

pub mod consistency;
pub mod session;
pub mod status;
pub mod view;
