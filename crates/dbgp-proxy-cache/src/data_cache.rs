//! Data cache for resolving front-end requests against the debug engine.

use std::sync::{Arc, Mutex, PoisonError};

use dbgp_proxy_core::{
    CacheConfig, CacheError, ContextRef, EngineStatus, ExecutionGate, GateEvent, Generation,
    ObjectId, PropertyConverter, ProtocolClient, RemoteObjectId, Subscription,
    types::{EvaluatedValue, PropertyDescriptor, ScopeDescriptor, ScopeKind},
};
use dbgp_proxy_values::DbgpConverter;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Context name classified as a local scope; every other context is global.
pub const LOCALS_CONTEXT_NAME: &str = "Locals";

/// Resolves scopes, properties and evaluations for one debug session.
///
/// Nothing fetched from the engine is kept: every request is a fresh round
/// trip. The only state is the execution gate, fed by the client's status
/// notifications, whose generation is embedded in every reference handed
/// out so references from an earlier pause are rejected.
pub struct DataCache<C, P = DbgpConverter>
where
    C: ProtocolClient,
    P: PropertyConverter,
{
    session_id: Uuid,
    client: Arc<C>,
    converter: P,
    gate: Arc<ExecutionGate>,
    subscription: Mutex<Option<Subscription>>,
}

impl<C> DataCache<C, DbgpConverter>
where
    C: ProtocolClient,
{
    /// Create a cache using the DBGp value converter.
    #[must_use]
    pub fn with_dbgp_converter(client: Arc<C>, config: &CacheConfig) -> Self {
        Self::new(client, DbgpConverter::new(config.clone()), config)
    }
}

impl<C, P> DataCache<C, P>
where
    C: ProtocolClient,
    P: PropertyConverter,
{
    /// Create a cache bound to `client`, subscribing to its status
    /// notifications.
    #[must_use]
    pub fn new(client: Arc<C>, converter: P, config: &CacheConfig) -> Self {
        let gate = Arc::new(ExecutionGate::with_capacity(config.event_capacity));
        let listener_gate = Arc::clone(&gate);
        let subscription = client.on_status(Arc::new(move |status: EngineStatus| {
            listener_gate.observe(status);
        }));

        let session_id = Uuid::new_v4();
        tracing::debug!(%session_id, "data cache attached");

        Self {
            session_id,
            client,
            converter,
            gate,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Identifier of this session, used in logs.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The execution gate.
    #[must_use]
    pub fn gate(&self) -> &ExecutionGate {
        &self.gate
    }

    /// The protocol client.
    #[must_use]
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Get a receiver for gate events.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<GateEvent> {
        self.gate.subscribe()
    }

    /// Stream of gate events.
    #[must_use]
    pub fn events(&self) -> futures::stream::BoxStream<'static, GateEvent> {
        self.gate.event_stream()
    }

    /// List the scopes of a frame.
    ///
    /// # Errors
    /// Returns `NotPaused` if the engine is running, or the engine's error.
    pub async fn get_scopes_for_frame(
        &self,
        frame_index: u32,
    ) -> Result<Vec<ScopeDescriptor>, CacheError> {
        let generation = self.gate.require_inspectable()?;
        tracing::debug!(session_id = %self.session_id, generation, frame_index, "get scopes");

        let contexts = self.client.get_contexts_for_frame(frame_index).await?;
        Ok(contexts
            .into_iter()
            .map(|context| {
                let kind = if context.name == LOCALS_CONTEXT_NAME {
                    ScopeKind::Local
                } else {
                    ScopeKind::Global
                };
                let id = ObjectId::Context(ContextRef::new(generation, frame_index, context.id));
                ScopeDescriptor {
                    name: context.name,
                    object_id: id.encode(),
                    kind,
                }
            })
            .collect())
    }

    /// Fetch the properties behind a reference.
    ///
    /// Scopes and single pages are fetched from the engine; paged windows
    /// are split locally into sub-ranges.
    ///
    /// # Errors
    /// Returns `NotPaused` if the engine is running, `MalformedReference` if
    /// the reference does not decode, `StaleReference` if it was minted
    /// before the current pause, or the engine's error.
    pub async fn get_properties(
        &self,
        remote_id: &RemoteObjectId,
    ) -> Result<Vec<PropertyDescriptor>, CacheError> {
        let generation = self.gate.require_inspectable()?;
        let id = self.resolve(remote_id, generation)?;
        tracing::debug!(session_id = %self.session_id, %id, "get properties");

        match &id {
            ObjectId::Context(context) => {
                let raw = self
                    .client
                    .get_context_properties(context.frame_index, &context.context_id)
                    .await?;
                Ok(self.converter.convert_properties(&id, raw))
            }
            ObjectId::Paged { context, window } => {
                Ok(self.converter.paged_properties(context, window))
            }
            ObjectId::SinglePage { context, page } => {
                let raw = self
                    .client
                    .get_properties_by_fullname(
                        context.frame_index,
                        &context.context_id,
                        &page.fullname,
                        page.index,
                    )
                    .await?;
                Ok(self.converter.convert_properties(&id, raw))
            }
        }
    }

    /// Evaluate an expression on a frame.
    ///
    /// References inside the result point at a synthetic evaluation context
    /// and resolve through [`DataCache::get_properties`] like any other.
    ///
    /// # Errors
    /// Returns `NotPaused` if the engine is running, or the engine's error.
    pub async fn evaluate_on_call_frame(
        &self,
        frame_index: u32,
        expression: &str,
    ) -> Result<EvaluatedValue, CacheError> {
        let generation = self.gate.require_inspectable()?;
        tracing::debug!(
            session_id = %self.session_id,
            generation,
            frame_index,
            expression,
            "evaluate"
        );

        let evaluated = self
            .client
            .evaluate_on_call_frame(frame_index, expression)
            .await?;
        let owner = ObjectId::Context(ContextRef::evaluation(generation, frame_index));
        Ok(EvaluatedValue {
            result: self.converter.convert_value(&owner, evaluated.result),
            was_thrown: evaluated.was_thrown,
        })
    }

    /// Unsubscribe from status notifications and publish `Detached`.
    ///
    /// Requests already in flight settle normally. Calling this twice is a
    /// no-op.
    pub fn dispose(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            self.gate.detach();
            tracing::debug!(session_id = %self.session_id, "data cache disposed");
        }
    }

    /// Whether [`DataCache::dispose`] has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn resolve(
        &self,
        remote_id: &RemoteObjectId,
        generation: Generation,
    ) -> Result<ObjectId, CacheError> {
        let id = ObjectId::decode(remote_id).inspect_err(|e| {
            tracing::error!(session_id = %self.session_id, "rejecting reference: {e}");
        })?;
        if id.generation() != generation {
            return Err(CacheError::StaleReference {
                found: id.generation(),
                current: generation,
            });
        }
        Ok(id)
    }
}
