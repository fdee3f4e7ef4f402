//! Documents and their decoded views.

use std::cell::OnceCell;
use std::fmt;

use serde_json::Value;

use crate::error::{ExtractError, Result};
use crate::syntax::SyntaxTree;

/// The `(apiVersion, kind)` pair rules are matched on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeSelector {
    pub api_version: String,
    pub kind: String,
}

impl TypeSelector {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for TypeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// One input file: a chart-relative name and its immutable bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    name: String,
    raw: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            raw: raw.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }

    /// File name without directories.
    pub fn base_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Helper templates (`_helpers.tpl`, `_common.yaml`) are never rewritten.
    pub fn is_internal(&self) -> bool {
        self.base_name().starts_with('_')
    }

    pub fn is_yaml(&self) -> bool {
        self.name.ends_with(".yaml") || self.name.ends_with(".yml")
    }

    /// A new document with the same name and different bytes.
    pub fn with_bytes(&self, raw: Vec<u8>) -> Self {
        Self {
            name: self.name.clone(),
            raw,
        }
    }

    pub fn decode(&self) -> Result<DecodedDocument<'_>> {
        DecodedDocument::new(self)
    }
}

/// A document's decoded object, plus its syntax tree on first use.
///
/// Both views borrow the bytes they were produced from, so they can never be
/// used against rewritten bytes.
#[derive(Debug)]
pub struct DecodedDocument<'d> {
    document: &'d Document,
    text: &'d str,
    object: Value,
    selector: TypeSelector,
    tree: OnceCell<Result<SyntaxTree>>,
}

impl<'d> DecodedDocument<'d> {
    fn new(document: &'d Document) -> Result<Self> {
        let text = std::str::from_utf8(document.raw())
            .map_err(|e| ExtractError::Decode(format!("not UTF-8: {}", e)))?;
        let object = decode_first(text)?;

        let selector = match (
            object.get("apiVersion").and_then(Value::as_str),
            object.get("kind").and_then(Value::as_str),
        ) {
            (Some(api_version), Some(kind)) => TypeSelector::new(api_version, kind),
            _ => {
                return Err(ExtractError::Decode(
                    "document has no string apiVersion and kind".to_string(),
                ))
            }
        };

        Ok(Self {
            document,
            text,
            object,
            selector,
            tree: OnceCell::new(),
        })
    }

    pub fn document(&self) -> &'d Document {
        self.document
    }

    pub fn object(&self) -> &Value {
        &self.object
    }

    pub fn selector(&self) -> &TypeSelector {
        &self.selector
    }

    /// The syntax tree, parsed on first call.
    pub fn tree(&self) -> Result<&SyntaxTree> {
        self.tree
            .get_or_init(|| SyntaxTree::parse(self.text))
            .as_ref()
            .map_err(Clone::clone)
    }
}

/// Decode the first YAML document of `text`.
fn decode_first(text: &str) -> Result<Value> {
    use serde::Deserialize;

    let first = serde_yaml::Deserializer::from_str(text)
        .next()
        .ok_or_else(|| ExtractError::Decode("empty document".to_string()))?;
    let value = Value::deserialize(first)?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Err(ExtractError::Decode("empty document".to_string())),
        _ => Err(ExtractError::Decode(
            "top level of a manifest must be a mapping".to_string(),
        )),
    }
}
