//! HTTP server for capability discovery and invocation.
//!
//! Mirrors the framed TCP bridge for clients that prefer plain HTTP.
//!
//! # Endpoints
//!
//! - `GET  /health` — Liveness probe
//! - `GET  /schema` — Schema export
//! - `POST /invoke` — Run a command

pub mod routes;

pub use routes::{app_router, AppState};
