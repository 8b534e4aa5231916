//! N3 API server library.
//!
//! Exposes config, state, error handling, the coordination engine, routes
//! and WebSocket infrastructure so integration tests and the binary
//! entrypoint can both reach them.

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod query;
pub mod response;
pub mod routes;
pub mod state;
pub mod ws;
