//! Replication-status engine and the collaborators it talks to.

pub mod capability;
pub mod consistency_client;
pub mod polling_controller;
pub mod scheduler;
pub mod session;
pub mod status_cache;
pub mod status_synchronizer;
