//! REST API module for health and metrics
//!
//! Provides an HTTP endpoint for probes, Prometheus scraping and a read-only
//! view of the operator conditions.

mod dto;
mod handlers;
mod server;

pub use server::run_server;
