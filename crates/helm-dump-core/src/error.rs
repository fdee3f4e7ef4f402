//! Error taxonomy for the extraction engine.
//!
//! Every failure below the run level is one of these variants. The
//! orchestrator ([`crate::extract`]) catches them per document or per rule,
//! records a [`crate::report::Diagnostic`] and carries on.

/// A failure while decoding, extracting, storing or patching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// Malformed input document. Document-level: the document is skipped.
    #[error("cannot decode document: {0}")]
    Decode(String),

    /// The document decodes but its syntax tree cannot be built, so no
    /// byte range can be located in it.
    #[error("cannot index document for rewriting: {0}")]
    Syntax(String),

    /// The source path could not be parsed or does not resolve.
    #[error("cannot resolve path {path:?}: {reason}")]
    PathResolution { path: String, reason: String },

    /// The key template could not be parsed or executed.
    #[error("key template error: {0}")]
    Template(String),

    /// A dotted key collides with an existing leaf or branch.
    #[error("values key {key:?} conflicts with the existing value at {at:?}")]
    StructuralConflict { key: String, at: String },

    /// An earlier document of the run already stored a different value
    /// under this key.
    #[error("values key {key:?} already holds {existing:?} from {owner}, refusing {new:?}")]
    ValueConflict {
        key: String,
        existing: String,
        new: String,
        owner: String,
    },

    /// A rendered key is empty or has an empty segment.
    #[error("invalid values key {0:?}")]
    InvalidKey(String),

    /// No mapping entry in the syntax tree has the target path.
    #[error("no mapping entry found at {path}")]
    PatchNotFound { path: String },

    /// The target path exists but its node cannot be rewritten in place.
    #[error("node at {path} cannot be rewritten: {reason}")]
    UnpatchableNode { path: String, reason: String },

    /// The patch span intersects a patch already planned for the document.
    #[error("patch for {path} overlaps the patch planned for {other}")]
    PatchOverlap { path: String, other: String },

    /// The values document could not be produced.
    #[error("cannot serialize values: {0}")]
    Serialize(String),
}

impl ExtractError {
    pub(crate) fn path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ExtractError::PathResolution {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn template(msg: impl Into<String>) -> Self {
        ExtractError::Template(msg.into())
    }
}

impl From<serde_yaml::Error> for ExtractError {
    fn from(error: serde_yaml::Error) -> Self {
        ExtractError::Decode(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
