pub mod health_handlers;
pub mod status_handlers;
