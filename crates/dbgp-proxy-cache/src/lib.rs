//! Scope, property and evaluation orchestration for the debugger proxy.
//!
//! Provides:
//! - `DataCache` - Resolve front-end requests against the debug engine
//! - Engine implementations (in-memory scripted engine)

pub mod data_cache;
pub mod engine;

pub use data_cache::DataCache;
