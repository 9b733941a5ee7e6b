//! In-memory scripted engine.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use dbgp_proxy_core::{
    EngineError, EngineStatus, ProtocolClient, StatusEmitter, StatusListener, Subscription,
    types::{EngineContext, EvaluationResult, RawProperty, RawValue},
};

/// Context the engine falls back to when none is given (DBGp `-c` default).
pub const DEFAULT_CONTEXT_ID: &str = "0";

/// Number of calls made to each protocol operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub contexts: usize,
    pub context_properties: usize,
    pub pages: usize,
    pub evaluations: usize,
}

impl CallCounts {
    /// Calls across all operations.
    #[must_use]
    pub fn total(&self) -> usize {
        self.contexts + self.context_properties + self.pages + self.evaluations
    }
}

type PageKey = (u32, String, String, u32);

/// Protocol client answering from scripted data.
///
/// Useful for tests and demos. Lookups that have no scripted answer fail
/// with the error codes a DBGp engine would send.
pub struct ScriptedEngine {
    contexts: RwLock<HashMap<u32, Vec<EngineContext>>>,
    properties: RwLock<HashMap<(u32, String), Vec<RawProperty>>>,
    pages: RwLock<HashMap<PageKey, Vec<RawProperty>>>,
    evaluations: RwLock<HashMap<(u32, String), EvaluationResult>>,
    delays: RwLock<HashMap<String, Duration>>,
    calls: Mutex<CallCounts>,
    status: Arc<StatusEmitter>,
}

impl ScriptedEngine {
    /// Create an engine with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            properties: RwLock::new(HashMap::new()),
            pages: RwLock::new(HashMap::new()),
            evaluations: RwLock::new(HashMap::new()),
            delays: RwLock::new(HashMap::new()),
            calls: Mutex::new(CallCounts::default()),
            status: Arc::new(StatusEmitter::new()),
        }
    }

    /// Script the contexts of a frame.
    pub fn set_contexts(&self, frame_index: u32, contexts: Vec<EngineContext>) {
        write(&self.contexts).insert(frame_index, contexts);
    }

    /// Script the top-level properties of a context.
    pub fn set_context_properties(
        &self,
        frame_index: u32,
        context_id: &str,
        properties: Vec<RawProperty>,
    ) {
        write(&self.properties).insert((frame_index, context_id.to_string()), properties);
    }

    /// Script one page of the children of `fullname`.
    pub fn set_page(
        &self,
        frame_index: u32,
        context_id: &str,
        fullname: &str,
        page: u32,
        properties: Vec<RawProperty>,
    ) {
        write(&self.pages).insert(
            (frame_index, context_id.to_string(), fullname.to_string(), page),
            properties,
        );
    }

    /// Script the result of an expression.
    pub fn set_evaluation(&self, frame_index: u32, expression: &str, result: EvaluationResult) {
        write(&self.evaluations).insert((frame_index, expression.to_string()), result);
    }

    /// Delay every page fetch of `fullname`.
    pub fn set_delay(&self, fullname: &str, delay: Duration) {
        write(&self.delays).insert(fullname.to_string(), delay);
    }

    /// Notify status listeners.
    pub fn emit_status(&self, status: EngineStatus) {
        self.status.emit(status);
    }

    /// The emitter backing [`ProtocolClient::on_status`].
    #[must_use]
    pub fn status_emitter(&self) -> Arc<StatusEmitter> {
        Arc::clone(&self.status)
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, bump: impl FnOnce(&mut CallCounts)) {
        bump(&mut self.calls.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn engine_error(code: u32, message: &str) -> EngineError {
    EngineError::Response {
        code,
        message: message.to_string(),
    }
}

#[async_trait]
impl ProtocolClient for ScriptedEngine {
    async fn get_contexts_for_frame(
        &self,
        frame_index: u32,
    ) -> Result<Vec<EngineContext>, EngineError> {
        self.record(|calls| calls.contexts += 1);
        read(&self.contexts)
            .get(&frame_index)
            .cloned()
            .ok_or_else(|| engine_error(303, "stack depth invalid"))
    }

    async fn get_context_properties(
        &self,
        frame_index: u32,
        context_id: &str,
    ) -> Result<Vec<RawProperty>, EngineError> {
        self.record(|calls| calls.context_properties += 1);
        read(&self.properties)
            .get(&(frame_index, context_id.to_string()))
            .cloned()
            .ok_or_else(|| engine_error(302, "invalid context"))
    }

    async fn get_properties_by_fullname(
        &self,
        frame_index: u32,
        context_id: &str,
        fullname: &str,
        page: u32,
    ) -> Result<Vec<RawProperty>, EngineError> {
        self.record(|calls| calls.pages += 1);
        let delay = read(&self.delays).get(fullname).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let context_id = if context_id == dbgp_proxy_core::EVAL_CONTEXT_ID {
            DEFAULT_CONTEXT_ID
        } else {
            context_id
        };
        read(&self.pages)
            .get(&(
                frame_index,
                context_id.to_string(),
                fullname.to_string(),
                page,
            ))
            .cloned()
            .ok_or_else(|| engine_error(300, "can not get property"))
    }

    async fn evaluate_on_call_frame(
        &self,
        frame_index: u32,
        expression: &str,
    ) -> Result<EvaluationResult, EngineError> {
        self.record(|calls| calls.evaluations += 1);
        let scripted = read(&self.evaluations)
            .get(&(frame_index, expression.to_string()))
            .cloned();
        Ok(scripted.unwrap_or_else(|| EvaluationResult {
            result: RawValue::Error {
                code: 206,
                message: format!("error evaluating code: {expression}"),
            },
            was_thrown: true,
        }))
    }

    fn on_status(&self, listener: StatusListener) -> Subscription {
        self.status.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_data_uses_engine_error_codes() {
        let engine = ScriptedEngine::new();

        let err = engine.get_contexts_for_frame(0).await.unwrap_err();
        assert!(matches!(err, EngineError::Response { code: 303, .. }));

        let err = engine.get_context_properties(0, "0").await.unwrap_err();
        assert!(matches!(err, EngineError::Response { code: 302, .. }));

        let err = engine
            .get_properties_by_fullname(0, "0", "$x", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Response { code: 300, .. }));

        let evaluated = engine.evaluate_on_call_frame(0, "1 +").await.unwrap();
        assert!(evaluated.was_thrown);

        assert_eq!(engine.calls().total(), 4);
    }

    #[tokio::test]
    async fn test_eval_context_reads_default_context() {
        let engine = ScriptedEngine::new();
        let page = vec![RawProperty::scalar("0", "int", "1")];
        engine.set_page(0, DEFAULT_CONTEXT_ID, "$a", 0, page);

        let props = tokio_test::assert_ok!(
            engine
                .get_properties_by_fullname(0, dbgp_proxy_core::EVAL_CONTEXT_ID, "$a", 0)
                .await
        );
        assert_eq!(props.len(), 1);
    }
}
