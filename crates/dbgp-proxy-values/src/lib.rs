//! Conversion of DBGp property records into front-end values.
//!
//! Provides:
//! - `DbgpConverter` - The default `PropertyConverter`
//! - Window paging for large collections

pub mod convert;
pub mod paging;

pub use convert::DbgpConverter;
pub use paging::{ChildRange, split_window};
