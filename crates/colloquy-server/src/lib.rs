//! # colloquy-server
//!
//! Axum HTTP transport for the agent execution service.
//!
//! - Session REST endpoints under `/apps/{app}/users/{user}/sessions`
//! - `POST /run` — batch delivery of one agent turn
//! - `POST /run_sse` — the same turn as a Server-Sent-Events stream
//! - `GET /health` — liveness plus live run/session counters
//! - Error-to-status mapping with a uniform JSON error body
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, ColloquyServer};
pub use shutdown::ShutdownCoordinator;
