//! # colloquy-runtime
//!
//! The run coordinator: drives one agent turn against a session.
//!
//! - **State machine per run**: `Received → Dispatched → (Streaming | Batch)
//!   → Completed | Failed`
//! - **Engine seam**: [`ReasoningEngine`] — an opaque producer of messages
//!   and state deltas, invoked with the session's state and full history
//! - **One pipeline, two consumers**: batch collects to completion, streaming
//!   forwards as produced; both consume the same channel in append order
//! - **Single-writer discipline**: at most one active run per session,
//!   enforced by a `DashMap` guard; collisions are rejected as `SessionBusy`
//! - **Cancellation**: dropping a streaming consumer cancels the engine
//!   without touching already-committed events

#![deny(unsafe_code)]

pub mod coordinator;
pub mod engine;
pub mod errors;

pub use coordinator::{RunCoordinator, RunPhase, RunRequest, RunStream};
pub use engine::{EchoEngine, EngineContext, EngineOutput, ReasoningEngine, ScriptedEngine};
pub use errors::{EngineError, RunError};
