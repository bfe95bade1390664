//! Conversio HTTP server.

pub mod api;
pub mod metrics;
pub mod state;
