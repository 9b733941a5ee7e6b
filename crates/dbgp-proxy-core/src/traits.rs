//! Collaborator traits: the engine protocol client and the value converter.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    ContextRef, ObjectId, PagedWindow, StatusListener, Subscription,
    types::{
        EngineContext, EvaluationResult, PropertyDescriptor, RawProperty, RawValue, RemoteValue,
    },
};

/// Engine or transport failure, passed through to the caller unchanged.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Engine error {code}: {message}")]
    Response { code: u32, message: String },
    #[error("Malformed engine response: {0}")]
    MalformedResponse(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client for the debug engine's line protocol.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// List the contexts (scopes) of a stack frame.
    async fn get_contexts_for_frame(
        &self,
        frame_index: u32,
    ) -> Result<Vec<EngineContext>, EngineError>;

    /// Fetch every top-level property of a context.
    async fn get_context_properties(
        &self,
        frame_index: u32,
        context_id: &str,
    ) -> Result<Vec<RawProperty>, EngineError>;

    /// Fetch one page of the children of `fullname`.
    async fn get_properties_by_fullname(
        &self,
        frame_index: u32,
        context_id: &str,
        fullname: &str,
        page: u32,
    ) -> Result<Vec<RawProperty>, EngineError>;

    /// Evaluate an expression in the scope of a frame.
    async fn evaluate_on_call_frame(
        &self,
        frame_index: u32,
        expression: &str,
    ) -> Result<EvaluationResult, EngineError>;

    /// Register for execution status changes. The listener is removed when
    /// the subscription is dropped.
    fn on_status(&self, listener: StatusListener) -> Subscription;
}

/// Conversion of raw engine records into front-end descriptors.
///
/// `owner` is the reference the records were fetched through; references
/// minted for children reuse its context.
pub trait PropertyConverter: Send + Sync {
    /// Convert fetched properties.
    fn convert_properties(&self, owner: &ObjectId, raw: Vec<RawProperty>)
    -> Vec<PropertyDescriptor>;

    /// Expand a paged window into child ranges without fetching.
    fn paged_properties(&self, context: &ContextRef, window: &PagedWindow)
    -> Vec<PropertyDescriptor>;

    /// Convert a single evaluated value.
    fn convert_value(&self, owner: &ObjectId, raw: RawValue) -> RemoteValue;
}
