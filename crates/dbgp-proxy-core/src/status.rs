//! Engine execution status and listener fan-out.

use std::{
    str::FromStr,
    sync::{Arc, PoisonError, RwLock, Weak},
};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Execution status reported by the debug engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine is starting, before the first statement runs.
    Starting,
    /// Script is running.
    Running,
    /// Script is paused and can be inspected.
    Break,
    /// Script finished, engine still attached.
    Stopping,
    /// Engine detached.
    Stopped,
}

impl EngineStatus {
    /// Whether the engine can be inspected in this status.
    #[must_use]
    pub const fn is_break(self) -> bool {
        matches!(self, Self::Break)
    }

    /// Protocol spelling of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Break => "break",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

/// Status string not known to the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown engine status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for EngineStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "break" => Ok(Self::Break),
            "stopping" => Ok(Self::Stopping),
            "stopped" => Ok(Self::Stopped),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Callback invoked on every status change.
pub type StatusListener = Arc<dyn Fn(EngineStatus) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, StatusListener)>,
}

/// Fan-out of engine status notifications to registered listeners.
///
/// Protocol clients embed one of these to implement
/// [`ProtocolClient::on_status`](crate::ProtocolClient::on_status).
/// Listeners run synchronously on the emitting task, in subscription order.
#[derive(Default)]
pub struct StatusEmitter {
    listeners: Arc<RwLock<Listeners>>,
}

impl StatusEmitter {
    /// Create an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned
    /// subscription is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: StatusListener) -> Subscription {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, listener));

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Deliver a status to every listener.
    pub fn emit(&self, status: EngineStatus) {
        // Snapshot so listeners may subscribe or unsubscribe re-entrantly.
        let snapshot: Vec<StatusListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        tracing::debug!(status = status.as_str(), listeners = snapshot.len(), "engine status");
        for listener in snapshot {
            listener(status);
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Forward a stream of statuses, such as one parsed off the engine
    /// socket, into this emitter.
    pub fn spawn_forwarder<S, E>(self: Arc<Self>, stream: S) -> tokio::task::JoinHandle<()>
    where
        S: futures::Stream<Item = Result<EngineStatus, E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::pin!(stream);

            while let Some(next) = stream.next().await {
                match next {
                    Ok(status) => self.emit(status),
                    Err(e) => tracing::warn!("status stream error: {e}"),
                }
            }
        })
    }
}

/// Registration handle returned by [`StatusEmitter::subscribe`].
///
/// Dropping it removes the listener.
pub struct Subscription {
    id: u64,
    listeners: Weak<RwLock<Listeners>>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<EngineStatus>>>, StatusListener) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: StatusListener = Arc::new(move |status: EngineStatus| {
            sink.lock().unwrap().push(status);
        });
        (seen, listener)
    }

    #[test]
    fn test_parse_protocol_statuses() {
        assert_eq!("break".parse::<EngineStatus>().unwrap(), EngineStatus::Break);
        assert_eq!(
            "stopping".parse::<EngineStatus>().unwrap(),
            EngineStatus::Stopping
        );
        assert_eq!(
            "paused".parse::<EngineStatus>().unwrap_err(),
            UnknownStatus("paused".to_string())
        );
        assert_eq!(EngineStatus::Running.as_str(), "running");
    }

    #[test]
    fn test_emit_reaches_listeners_until_dropped() {
        let emitter = StatusEmitter::new();
        let (seen, listener) = recorder();
        let subscription = emitter.subscribe(listener);
        assert_eq!(emitter.listener_count(), 1);

        emitter.emit(EngineStatus::Break);
        emitter.emit(EngineStatus::Running);
        drop(subscription);
        emitter.emit(EngineStatus::Break);

        assert_eq!(emitter.listener_count(), 0);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![EngineStatus::Break, EngineStatus::Running]
        );
    }

    #[test]
    fn test_unsubscribe_only_removes_own_listener() {
        let emitter = StatusEmitter::new();
        let (first_seen, first) = recorder();
        let (second_seen, second) = recorder();
        let first_sub = emitter.subscribe(first);
        let _second_sub = emitter.subscribe(second);

        first_sub.unsubscribe();
        emitter.emit(EngineStatus::Stopped);

        assert!(first_seen.lock().unwrap().is_empty());
        assert_eq!(*second_seen.lock().unwrap(), vec![EngineStatus::Stopped]);
    }

    #[test]
    fn test_subscription_outliving_emitter() {
        let emitter = StatusEmitter::new();
        let (_, listener) = recorder();
        let subscription = emitter.subscribe(listener);
        drop(emitter);
        drop(subscription);
    }

    #[tokio::test]
    async fn test_forwarder_skips_errors() {
        let emitter = Arc::new(StatusEmitter::new());
        let (seen, listener) = recorder();
        let _subscription = emitter.subscribe(listener);

        let stream = futures::stream::iter(vec![
            Ok(EngineStatus::Starting),
            Err("bad frame".to_string()),
            Ok(EngineStatus::Break),
        ]);
        tokio_test::assert_ok!(Arc::clone(&emitter).spawn_forwarder(stream).await);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EngineStatus::Starting, EngineStatus::Break]
        );
    }
}
