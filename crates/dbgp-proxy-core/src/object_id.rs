//! Opaque value references handed to the front-end.
//!
//! An `ObjectId` carries everything needed to re-fetch a value later: the
//! generation it was minted under, the stack frame, the engine context, and
//! for collections the variable path plus the page or window being viewed.
//! The front-end only ever sees the encoded `RemoteObjectId` string.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Context id reserved for values produced by evaluating an expression on a
/// call frame.
///
/// Engine-issued context ids are small decimal integers ("0", "1", "2"), so
/// this value can never name a real context.
pub const EVAL_CONTEXT_ID: &str = "$eval";

/// Number of break events observed when a reference was minted.
pub type Generation = u64;

/// Payload shared by every reference variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextRef {
    /// Generation the reference was minted under.
    pub generation: Generation,
    /// Stack depth of the frame, 0 being the innermost.
    pub frame_index: u32,
    /// Engine context id, or [`EVAL_CONTEXT_ID`].
    pub context_id: String,
}

impl ContextRef {
    /// Create a reference to an engine context.
    #[must_use]
    pub fn new(generation: Generation, frame_index: u32, context_id: impl Into<String>) -> Self {
        Self {
            generation,
            frame_index,
            context_id: context_id.into(),
        }
    }

    /// Create the synthetic context used for evaluation results.
    #[must_use]
    pub fn evaluation(generation: Generation, frame_index: u32) -> Self {
        Self::new(generation, frame_index, EVAL_CONTEXT_ID)
    }

    /// Whether this context was synthesized for an evaluation result.
    #[must_use]
    pub fn is_evaluation(&self) -> bool {
        self.context_id == EVAL_CONTEXT_ID
    }
}

/// A window of children inside a collection-valued variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PagedWindow {
    /// Full engine path of the collection.
    pub fullname: String,
    /// Children per engine page. Never zero.
    pub page_size: u32,
    /// Index of the first child in the window.
    pub start_index: u32,
    /// Number of children in the window.
    pub count: u32,
}

impl PagedWindow {
    /// One past the last child index of the window.
    #[must_use]
    pub fn end_index(&self) -> u64 {
        u64::from(self.start_index) + u64::from(self.count)
    }
}

/// One engine page of a collection-valued variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRef {
    /// Full engine path of the collection.
    pub fullname: String,
    /// Engine page number.
    pub index: u32,
}

/// A reference to a remote value, valid for a single generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectId {
    /// A whole scope of a frame, such as Locals.
    Context(ContextRef),
    /// A window into a collection, expanded locally into sub-ranges.
    Paged {
        context: ContextRef,
        window: PagedWindow,
    },
    /// A single page of a collection, fetched from the engine.
    SinglePage { context: ContextRef, page: PageRef },
}

/// Error returned when a string does not decode to an `ObjectId`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed object reference {reference:?}: {reason}")]
pub struct MalformedReference {
    /// The offending handle.
    pub reference: String,
    /// Why it was rejected.
    pub reason: String,
}

impl ObjectId {
    /// Common payload of the reference.
    #[must_use]
    pub fn context(&self) -> &ContextRef {
        match self {
            Self::Context(context)
            | Self::Paged { context, .. }
            | Self::SinglePage { context, .. } => context,
        }
    }

    /// Generation the reference was minted under.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.context().generation
    }

    /// Encode into the opaque handle given to the front-end.
    #[must_use]
    pub fn encode(&self) -> RemoteObjectId {
        RemoteObjectId(Value::from(WireObjectId::from(self)).to_string())
    }

    /// Decode a handle previously produced by [`ObjectId::encode`].
    ///
    /// # Errors
    /// Returns `MalformedReference` if the handle is not valid JSON, has
    /// unknown or missing fields, combines fields of different variants,
    /// or describes a window with a zero page size or an unaligned start.
    pub fn decode(remote: &RemoteObjectId) -> Result<Self, MalformedReference> {
        let malformed = |reason: String| MalformedReference {
            reference: remote.0.clone(),
            reason,
        };
        let wire: WireObjectId =
            serde_json::from_str(&remote.0).map_err(|e| malformed(e.to_string()))?;
        Self::try_from(wire).map_err(|reason| malformed(reason.to_string()))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ContextRef {
            generation,
            frame_index,
            context_id,
        } = self.context();
        write!(f, "g{generation}/f{frame_index}/c{context_id}")?;
        match self {
            Self::Context(_) => Ok(()),
            Self::Paged { window, .. } => write!(
                f,
                "/{}[{}+{}]",
                window.fullname, window.start_index, window.count
            ),
            Self::SinglePage { page, .. } => write!(f, "/{}@{}", page.fullname, page.index),
        }
    }
}

/// Wire form of an `ObjectId`, as seen by the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteObjectId(String);

impl RemoteObjectId {
    /// Wrap a handle received from the front-end.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The handle text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RemoteObjectId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for RemoteObjectId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Flat serialized layout; the variant is implied by which fields are set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WireObjectId {
    generation: Generation,
    frame_index: u32,
    context_id: String,
    #[serde(default)]
    fullname: Option<String>,
    #[serde(default)]
    page_size: Option<u32>,
    #[serde(default)]
    start_index: Option<u32>,
    #[serde(default)]
    count: Option<u32>,
    #[serde(default)]
    index: Option<u32>,
}

// Built by hand so encoding cannot fail. Keys match the camelCase names
// `WireObjectId` deserializes.
impl From<WireObjectId> for Value {
    fn from(wire: WireObjectId) -> Self {
        let mut map = Map::new();
        map.insert("generation".to_string(), wire.generation.into());
        map.insert("frameIndex".to_string(), wire.frame_index.into());
        map.insert("contextId".to_string(), wire.context_id.into());
        if let Some(fullname) = wire.fullname {
            map.insert("fullname".to_string(), fullname.into());
        }
        for (key, field) in [
            ("pageSize", wire.page_size),
            ("startIndex", wire.start_index),
            ("count", wire.count),
            ("index", wire.index),
        ] {
            if let Some(field) = field {
                map.insert(key.to_string(), field.into());
            }
        }
        Self::Object(map)
    }
}

impl From<&ObjectId> for WireObjectId {
    fn from(id: &ObjectId) -> Self {
        let context = id.context();
        let mut wire = Self {
            generation: context.generation,
            frame_index: context.frame_index,
            context_id: context.context_id.clone(),
            fullname: None,
            page_size: None,
            start_index: None,
            count: None,
            index: None,
        };
        match id {
            ObjectId::Context(_) => {}
            ObjectId::Paged { window, .. } => {
                wire.fullname = Some(window.fullname.clone());
                wire.page_size = Some(window.page_size);
                wire.start_index = Some(window.start_index);
                wire.count = Some(window.count);
            }
            ObjectId::SinglePage { page, .. } => {
                wire.fullname = Some(page.fullname.clone());
                wire.index = Some(page.index);
            }
        }
        wire
    }
}

impl TryFrom<WireObjectId> for ObjectId {
    type Error = &'static str;

    fn try_from(wire: WireObjectId) -> Result<Self, Self::Error> {
        let WireObjectId {
            generation,
            frame_index,
            context_id,
            fullname,
            page_size,
            start_index,
            count,
            index,
        } = wire;
        let context = ContextRef {
            generation,
            frame_index,
            context_id,
        };

        match (fullname, (page_size, start_index, count), index) {
            (None, (None, None, None), None) => Ok(Self::Context(context)),
            (Some(fullname), (Some(page_size), Some(start_index), Some(count)), None) => {
                if page_size == 0 {
                    return Err("paged window has a zero page size");
                }
                if start_index % page_size != 0 {
                    return Err("paged window does not start on a page boundary");
                }
                Ok(Self::Paged {
                    context,
                    window: PagedWindow {
                        fullname,
                        page_size,
                        start_index,
                        count,
                    },
                })
            }
            (Some(fullname), (None, None, None), Some(index)) => Ok(Self::SinglePage {
                context,
                page: PageRef { fullname, index },
            }),
            (None, _, _) => Err("paging fields require a fullname"),
            (Some(_), (None, None, None), None) => Err("fullname without a page or window"),
            (Some(_), _, Some(_)) => Err("mixes paged window and single page fields"),
            (Some(_), _, None) => Err("incomplete paged window"),
        }
    }
}
