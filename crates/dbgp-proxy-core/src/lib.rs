//! Core abstractions for the debugger proxy's reference subsystem.
//!
//! This crate provides the fundamental building blocks:
//! - `ObjectId` / `RemoteObjectId` - Self-describing references to remote values
//! - `ExecutionGate` - Break counter that invalidates stale references
//! - `StatusEmitter` - Fan-out of engine status notifications
//! - `ProtocolClient` and `PropertyConverter` traits

pub mod config;
pub mod error;
pub mod gate;
pub mod object_id;
pub mod status;
pub mod traits;
pub mod types;

pub use config::CacheConfig;
pub use error::CacheError;
pub use gate::{ExecutionGate, GateEvent, GateState, MAX_EVENT_CAPACITY};
pub use object_id::{
    ContextRef, EVAL_CONTEXT_ID, Generation, MalformedReference, ObjectId, PageRef, PagedWindow,
    RemoteObjectId,
};
pub use status::{EngineStatus, StatusEmitter, StatusListener, Subscription};
pub use traits::{EngineError, PropertyConverter, ProtocolClient};
