//! Execution-state gate.
//!
//! Tracks whether the engine can currently be inspected, and counts break
//! events. The count is the generation embedded in every reference, so a
//! reference from an earlier pause never resolves in a later one.

use std::sync::{PoisonError, RwLock};

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{CacheError, EngineStatus, object_id::Generation};

/// Default capacity of the gate event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Largest capacity the gate event channel is created with.
pub const MAX_EVENT_CAPACITY: usize = 1 << 16;

/// Whether references can be minted and resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Engine is executing (or not yet started, or gone).
    Running,
    /// Engine is paused at a break.
    Inspectable,
}

/// Notification published when references minted earlier may be invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GateEvent {
    /// A break was observed; references from older generations are stale.
    Paused { generation: Generation },
    /// The engine left the inspectable state.
    Resumed,
    /// The owning session was disposed.
    Detached,
}

#[derive(Debug)]
struct Inner {
    state: GateState,
    generation: Generation,
}

/// Two-state machine with a monotonic break counter.
#[derive(Debug)]
pub struct ExecutionGate {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<GateEvent>,
}

impl Default for ExecutionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionGate {
    /// Create a gate in the `Running` state at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a gate whose event channel buffers `capacity` events per
    /// subscriber, clamped to `1..=MAX_EVENT_CAPACITY`.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let clamped = capacity.clamp(1, MAX_EVENT_CAPACITY);
        if clamped != capacity {
            tracing::warn!(capacity, clamped, "gate event capacity out of range");
        }
        let (sender, _) = broadcast::channel(clamped);
        Self {
            inner: RwLock::new(Inner {
                state: GateState::Running,
                generation: 0,
            }),
            sender,
        }
    }

    /// Apply an engine status.
    ///
    /// Every break increments the generation, even one observed while
    /// already inspectable. Any other status makes the gate `Running`.
    pub fn observe(&self, status: EngineStatus) {
        let event = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            if status.is_break() {
                if inner.state == GateState::Inspectable {
                    tracing::debug!(
                        generation = inner.generation,
                        "break observed while already inspectable"
                    );
                }
                inner.state = GateState::Inspectable;
                inner.generation += 1;
                Some(GateEvent::Paused {
                    generation: inner.generation,
                })
            } else if inner.state == GateState::Inspectable {
                inner.state = GateState::Running;
                Some(GateEvent::Resumed)
            } else {
                None
            }
        };

        if let Some(event) = event {
            let _ = self.sender.send(event); // no subscribers is fine
        }
    }

    /// Number of break events observed so far.
    #[must_use]
    pub fn current_generation(&self) -> Generation {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Whether the engine is paused.
    #[must_use]
    pub fn is_inspectable(&self) -> bool {
        self.state() == GateState::Inspectable
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> GateState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Check the state and capture the generation in one read.
    ///
    /// # Errors
    /// Returns `NotPaused` if the gate is `Running`.
    pub fn require_inspectable(&self) -> Result<Generation, CacheError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match inner.state {
            GateState::Inspectable => Ok(inner.generation),
            GateState::Running => Err(CacheError::NotPaused),
        }
    }

    /// Publish `Detached` to subscribers. State is left untouched.
    pub fn detach(&self) {
        let _ = self.sender.send(GateEvent::Detached);
    }

    /// Get a receiver for gate events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.sender.subscribe()
    }

    /// Stream of gate events. Lagged events are skipped.
    #[must_use]
    pub fn event_stream(&self) -> futures::stream::BoxStream<'static, GateEvent> {
        BroadcastStream::new(self.subscribe())
            .filter_map(|res| async move { res.ok() })
            .boxed()
    }
}
