//! The values tree.
//!
//! Extracted values accumulate here under dotted keys (`nginx.replicas`
//! becomes `{nginx: {replicas: ...}}`). Dotted keys form a strict tree: a
//! key can never be both a leaf and a branch.

use serde_json::{Map, Value};

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValuesTree {
    root: Map<String, Value>,
}

impl ValuesTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tree from an existing values document. `Null` yields an
    /// empty tree; anything other than a mapping is rejected.
    pub fn with_base(base: Value) -> Result<Self> {
        match base {
            Value::Object(root) => Ok(Self { root }),
            Value::Null => Ok(Self::new()),
            other => Err(ExtractError::Decode(format!(
                "values document must be a mapping, found {}",
                crate::value_reader::kind_name(&other)
            ))),
        }
    }

    /// Insert `value` at `dotted_key`, creating intermediate mappings.
    ///
    /// Returns the leaf previously stored at that key, if any.
    pub fn insert(&mut self, dotted_key: &str, value: impl Into<Value>) -> Result<Option<Value>> {
        let segments: Vec<&str> = dotted_key.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ExtractError::InvalidKey(dotted_key.to_string()));
        }
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| ExtractError::InvalidKey(dotted_key.to_string()))?;

        let mut current = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match slot {
                Value::Object(map) => map,
                _ => {
                    return Err(ExtractError::StructuralConflict {
                        key: dotted_key.to_string(),
                        at: segments[..=depth].join("."),
                    })
                }
            };
        }

        if let Some(Value::Object(_)) = current.get(*leaf) {
            return Err(ExtractError::StructuralConflict {
                key: dotted_key.to_string(),
                at: dotted_key.to_string(),
            });
        }
        Ok(current.insert(leaf.to_string(), value.into()))
    }

    /// Look up a dotted key (leaf or branch).
    pub fn get(&self, dotted_key: &str) -> Option<&Value> {
        let mut segments = dotted_key.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        fn count(map: &Map<String, Value>) -> usize {
            map.values()
                .map(|v| match v {
                    Value::Object(inner) => count(inner),
                    _ => 1,
                })
                .sum()
        }
        count(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// Serialize as a YAML mapping. Keys come out sorted, so the result does
    /// not depend on insertion order.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.root).map_err(|e| ExtractError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inserts_nested_keys() {
        let mut values = ValuesTree::new();
        values.insert("nginx.replicas", "3").unwrap();
        values.insert("nginx.image.tag", "1.25").unwrap();
        values.insert("redis.replicas", "1").unwrap();

        assert_eq!(
            values.as_value(),
            json!({
                "nginx": { "replicas": "3", "image": { "tag": "1.25" } },
                "redis": { "replicas": "1" }
            })
        );
        assert_eq!(values.len(), 3);
        assert_eq!(values.get("nginx.image.tag"), Some(&json!("1.25")));
        assert_eq!(values.get("nginx.missing"), None);
    }

    #[test]
    fn leaf_then_branch_conflicts() {
        let mut values = ValuesTree::new();
        values.insert("a", "x").unwrap();
        let err = values.insert("a.replicas", "3").unwrap_err();
        assert_eq!(
            err,
            ExtractError::StructuralConflict {
                key: "a.replicas".to_string(),
                at: "a".to_string()
            }
        );
        assert_eq!(values.as_value(), json!({ "a": "x" }));
    }

    #[test]
    fn branch_then_leaf_conflicts() {
        let mut values = ValuesTree::new();
        values.insert("a.replicas", "3").unwrap();
        let err = values.insert("a", "x").unwrap_err();
        assert!(matches!(err, ExtractError::StructuralConflict { .. }));
        assert_eq!(values.as_value(), json!({ "a": { "replicas": "3" } }));
    }

    #[test]
    fn reinserting_a_leaf_returns_previous() {
        let mut values = ValuesTree::new();
        assert_eq!(values.insert("a.b", "1").unwrap(), None);
        assert_eq!(values.insert("a.b", "2").unwrap(), Some(json!("1")));
        assert_eq!(values.get("a.b"), Some(&json!("2")));
    }

    #[test]
    fn rejects_empty_segments() {
        let mut values = ValuesTree::new();
        for key in ["", "a..b", ".a", "a."] {
            assert_eq!(
                values.insert(key, "x").unwrap_err(),
                ExtractError::InvalidKey(key.to_string())
            );
        }
        assert!(values.is_empty());
    }

    #[test]
    fn serialization_is_order_independent() {
        let mut first = ValuesTree::new();
        first.insert("b.x", "1").unwrap();
        first.insert("a.y", "2").unwrap();

        let mut second = ValuesTree::new();
        second.insert("a.y", "2").unwrap();
        second.insert("b.x", "1").unwrap();

        assert_eq!(first.to_yaml().unwrap(), second.to_yaml().unwrap());
        let round: Value = serde_yaml::from_str(&first.to_yaml().unwrap()).unwrap();
        assert_eq!(round, json!({ "a": { "y": "2" }, "b": { "x": "1" } }));
    }

    #[test]
    fn seeds_from_existing_values() {
        let mut values = ValuesTree::with_base(json!({ "image": { "tag": "latest" } })).unwrap();
        values.insert("nginx.replicas", "3").unwrap();
        assert_eq!(values.len(), 2);
        assert!(ValuesTree::with_base(Value::Null).unwrap().is_empty());
        assert!(ValuesTree::with_base(json!([1, 2])).is_err());
    }
}
