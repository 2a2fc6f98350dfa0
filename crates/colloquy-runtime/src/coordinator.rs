//! The run coordinator.
//!
//! One run drives one agent turn: validate the session, append the user
//! message, hand state + history to the engine, and append every produced
//! message back to the log before forwarding it. Batch and streaming callers
//! consume the same pipeline; only the consumption strategy differs.

use std::sync::Arc;

use colloquy_core::{Event, Message, Role, RunId, SessionKey};
use colloquy_store::SessionStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::{EngineContext, EngineOutput, ReasoningEngine};
use crate::errors::{EngineError, RunError};

/// Buffered events between the driver and the consumer. Small on purpose:
/// streaming consumers see events as soon as transport allows, batch
/// consumers drain continuously.
const RUN_CHANNEL_CAPACITY: usize = 32;

/// A request to execute one agent turn against an existing session.
#[derive(Clone, Debug, Deserialize)]
pub struct RunRequest {
    /// Target session triple.
    #[serde(flatten)]
    pub key: SessionKey,
    /// The new user message.
    pub new_message: Message,
    /// Partial-output hint forwarded to the engine.
    #[serde(default)]
    pub streaming: bool,
}

/// Phase of one run's lifecycle, for logs and introspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    /// Request accepted, session being validated.
    Received,
    /// User event appended, engine invoked.
    Dispatched,
    /// Events being forwarded as produced.
    Streaming,
    /// Events being collected to completion.
    Batch,
    /// Turn finished, all events durably in the log.
    Completed,
    /// Engine or store failed; committed events remain.
    Failed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Dispatched => "dispatched",
            Self::Streaming => "streaming",
            Self::Batch => "batch",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Stream of a run's events in append order, ending at turn completion.
pub type RunStream = ReceiverStream<Result<Event, RunError>>;

/// Coordinates runs: many in parallel across sessions, at most one per
/// session.
pub struct RunCoordinator {
    store: Arc<SessionStore>,
    engine: Arc<dyn ReasoningEngine>,
    active: Arc<DashMap<SessionKey, RunId>>,
}

impl RunCoordinator {
    /// Create a coordinator over the given store and engine.
    pub fn new(store: Arc<SessionStore>, engine: Arc<dyn ReasoningEngine>) -> Self {
        Self {
            store,
            engine,
            active: Arc::new(DashMap::new()),
        }
    }

    /// Number of runs currently executing.
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.active.len()
    }

    /// The underlying session store.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Execute a run in batch mode: block until the turn completes, then
    /// return the full ordered event list (user event first).
    ///
    /// On failure, events appended before the failure stay committed and are
    /// queryable via the store's `history`.
    pub async fn run_batch(&self, request: RunRequest) -> Result<Vec<Event>, RunError> {
        let mut rx = self.start(request, RunPhase::Batch)?;
        let mut events = Vec::new();
        while let Some(item) = rx.recv().await {
            events.push(item?);
        }
        Ok(events)
    }

    /// Execute a run in streaming mode: events are yielded in strict append
    /// order as they are produced; the stream ends when the turn completes.
    ///
    /// Dropping the stream cancels the engine; already-committed events are
    /// untouched.
    pub fn run_stream(&self, request: RunRequest) -> Result<RunStream, RunError> {
        let rx = self.start(request, RunPhase::Streaming)?;
        Ok(ReceiverStream::new(rx))
    }

    /// Shared pipeline behind both delivery modes.
    ///
    /// Validates, acquires the session guard, appends the user event, then
    /// spawns the engine and a driver task that appends and forwards each
    /// produced output. Returns the consumer end of the pipeline.
    fn start(
        &self,
        request: RunRequest,
        mode: RunPhase,
    ) -> Result<mpsc::Receiver<Result<Event, RunError>>, RunError> {
        let run_id = RunId::new();
        let key = request.key.clone();
        debug!(run_id = %run_id, session = %key, phase = %RunPhase::Received, "run received");

        if request.new_message.role != Role::User {
            return Err(RunError::InvalidRequest(
                "new_message must have role 'user'".into(),
            ));
        }
        if request.new_message.is_empty() {
            return Err(RunError::InvalidRequest("new_message has no parts".into()));
        }

        let session = self.store.get(&key)?;
        let guard = self.acquire(&key, &run_id)?;

        // From here on the run is committed to producing events; the user
        // message goes into the log before the engine sees anything.
        let user_event = self.store.append(&key, &request.new_message)?;
        let history = self.store.history(&key)?;
        debug!(run_id = %run_id, session = %key, phase = %RunPhase::Dispatched, "user event appended, dispatching engine");

        let ctx = EngineContext {
            key: key.clone(),
            state: session.state,
            history,
            new_message: request.new_message,
            streaming: request.streaming,
        };

        let (out_tx, out_rx) = mpsc::channel(RUN_CHANNEL_CAPACITY);
        let (engine_tx, engine_rx) = mpsc::channel(RUN_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let engine = Arc::clone(&self.engine);
        let engine_cancel = cancel.child_token();
        let engine_handle =
            tokio::spawn(async move { engine.run(ctx, engine_tx, engine_cancel).await });

        let store = Arc::clone(&self.store);
        drop(tokio::spawn(drive_run(
            run_id,
            key,
            mode,
            store,
            guard,
            user_event,
            engine_rx,
            engine_handle,
            out_tx,
            cancel,
        )));

        Ok(out_rx)
    }

    fn acquire(&self, key: &SessionKey, run_id: &RunId) -> Result<RunGuard, RunError> {
        match self.active.entry(key.clone()) {
            Entry::Occupied(_) => Err(RunError::SessionBusy(key.to_string())),
            Entry::Vacant(entry) => {
                let _ = entry.insert(run_id.clone());
                Ok(RunGuard {
                    key: key.clone(),
                    active: Arc::clone(&self.active),
                })
            }
        }
    }
}

/// RAII release of the per-session run slot.
struct RunGuard {
    key: SessionKey,
    active: Arc<DashMap<SessionKey, RunId>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let _ = self.active.remove(&self.key);
    }
}

/// Driver task: append-then-forward every engine output, in order.
#[allow(clippy::too_many_arguments)]
async fn drive_run(
    run_id: RunId,
    key: SessionKey,
    mode: RunPhase,
    store: Arc<SessionStore>,
    guard: RunGuard,
    user_event: Event,
    mut engine_rx: mpsc::Receiver<EngineOutput>,
    engine_handle: tokio::task::JoinHandle<Result<(), EngineError>>,
    out_tx: mpsc::Sender<Result<Event, RunError>>,
    cancel: CancellationToken,
) {
    debug!(run_id = %run_id, session = %key, phase = %mode, "run driver started");
    let mut phase = RunPhase::Completed;

    // The triggering user event is the first thing every consumer sees.
    if out_tx.send(Ok(user_event)).await.is_err() {
        cancel.cancel();
        warn!(run_id = %run_id, session = %key, "consumer gone before first event, run cancelled");
        drop(guard);
        return;
    }

    loop {
        match engine_rx.recv().await {
            Some(EngineOutput::Message(message)) => match store.append(&key, &message) {
                Ok(event) => {
                    if out_tx.send(Ok(event)).await.is_err() {
                        // Consumer disconnected mid-turn. Stop production;
                        // committed events stay committed.
                        cancel.cancel();
                        phase = RunPhase::Failed;
                        warn!(run_id = %run_id, session = %key, "consumer disconnected, run cancelled");
                        break;
                    }
                }
                Err(err) => {
                    cancel.cancel();
                    phase = RunPhase::Failed;
                    let _ = out_tx.send(Err(err.into())).await;
                    break;
                }
            },
            Some(EngineOutput::StateDelta(delta)) => {
                if let Err(err) = store.merge_state(&key, delta) {
                    cancel.cancel();
                    phase = RunPhase::Failed;
                    let _ = out_tx.send(Err(err.into())).await;
                    break;
                }
            }
            None => {
                // Engine closed its channel: end of turn. Surface how it ended.
                match engine_handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        phase = RunPhase::Failed;
                        let _ = out_tx.send(Err(RunError::Engine(err))).await;
                    }
                    Err(join_err) => {
                        phase = RunPhase::Failed;
                        let _ = out_tx
                            .send(Err(RunError::Engine(EngineError::Failure(
                                join_err.to_string(),
                            ))))
                            .await;
                    }
                }
                break;
            }
        }
    }

    debug!(run_id = %run_id, session = %key, phase = %phase, "run finished");
    // Release the session slot before the consumer observes completion.
    drop(guard);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
