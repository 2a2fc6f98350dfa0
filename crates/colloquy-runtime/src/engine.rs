//! The reasoning engine seam.
//!
//! The engine is an opaque collaborator: given the session's state, full
//! history, and the new user message, it produces a sequence of outputs over
//! a channel. The coordinator owns persistence and ordering; engines never
//! touch the store.

use async_trait::async_trait;
use colloquy_core::{Event, Message, SessionKey};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::EngineError;

/// Everything an engine sees about the run it is asked to produce.
#[derive(Clone, Debug)]
pub struct EngineContext {
    /// Session being run against.
    pub key: SessionKey,
    /// Session state at dispatch time.
    pub state: Map<String, Value>,
    /// Full committed history, including the triggering user event.
    pub history: Vec<Event>,
    /// The new user message that triggered this run.
    pub new_message: Message,
    /// Partial-output hint from the run request.
    pub streaming: bool,
}

/// One output item produced by an engine during a turn.
#[derive(Clone, Debug)]
pub enum EngineOutput {
    /// An agent message (text, tool call, or tool result) to append to the
    /// session's log.
    Message(Message),
    /// A state delta to merge into the session's state. Does not occupy an
    /// event sequence slot.
    StateDelta(Map<String, Value>),
}

/// An opaque producer of one agent turn.
///
/// Implementations send outputs through `output` as they are produced and
/// return when the turn is complete. Closing the channel (by returning) is
/// the end-of-turn marker. A cancelled token means the consumer is gone;
/// engines should stop producing promptly.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Produce one turn's outputs.
    async fn run(
        &self,
        ctx: EngineContext,
        output: mpsc::Sender<EngineOutput>,
        cancel: CancellationToken,
    ) -> Result<(), EngineError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in engines
// ─────────────────────────────────────────────────────────────────────────────

/// Trivial engine that answers every user message with a single text echo.
///
/// The binary's default when no real engine is wired in; useful for
/// exercising the service end to end.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoEngine;

#[async_trait]
impl ReasoningEngine for EchoEngine {
    async fn run(
        &self,
        ctx: EngineContext,
        output: mpsc::Sender<EngineOutput>,
        _cancel: CancellationToken,
    ) -> Result<(), EngineError> {
        let reply = Message::agent(format!("You said: {}", ctx.new_message.text()));
        output
            .send(EngineOutput::Message(reply))
            .await
            .map_err(|_| EngineError::Failure("output channel closed".into()))
    }
}

/// Engine that replays a fixed script of outputs, optionally failing at the
/// end. A test double, also handy for demos.
#[derive(Clone, Debug, Default)]
pub struct ScriptedEngine {
    outputs: Vec<EngineOutput>,
    fail_with: Option<String>,
}

impl ScriptedEngine {
    /// Engine that emits `outputs` and completes.
    #[must_use]
    pub fn new(outputs: Vec<EngineOutput>) -> Self {
        Self {
            outputs,
            fail_with: None,
        }
    }

    /// Engine that emits `outputs` and then errors with `message`.
    #[must_use]
    pub fn failing(outputs: Vec<EngineOutput>, message: impl Into<String>) -> Self {
        Self {
            outputs,
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn run(
        &self,
        _ctx: EngineContext,
        output: mpsc::Sender<EngineOutput>,
        cancel: CancellationToken,
    ) -> Result<(), EngineError> {
        for item in self.outputs.clone() {
            if cancel.is_cancelled() {
                return Ok(());
            }
            if output.send(item).await.is_err() {
                // Consumer gone; stop quietly.
                return Ok(());
            }
        }
        match &self.fail_with {
            Some(message) => Err(EngineError::Failure(message.clone())),
            None => Ok(()),
        }
    }
}
