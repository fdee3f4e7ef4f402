//! Extraction rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::TypeSelector;
use crate::error::Result;
use crate::key_template::KeyTemplate;
use crate::path::FieldPath;

/// Move the value at `source_path` of every `api_version`/`kind` document
/// into the values key rendered from `key_template`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    pub api_version: String,
    pub kind: String,
    pub source_path: String,
    pub key_template: String,
}

impl ExtractionRule {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        source_path: impl Into<String>,
        key_template: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            source_path: source_path.into(),
            key_template: key_template.into(),
        }
    }

    /// Exact match on both fields.
    pub fn matches(&self, selector: &TypeSelector) -> bool {
        self.api_version == selector.api_version && self.kind == selector.kind
    }

    /// Parse the path and template once for the whole run.
    pub fn compile(&self) -> Result<CompiledRule> {
        Ok(CompiledRule {
            path: FieldPath::parse(&self.source_path)?,
            template: KeyTemplate::parse(&self.key_template)?,
            rule: self.clone(),
        })
    }
}

impl fmt::Display for ExtractionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} -> {}",
            self.api_version, self.kind, self.source_path, self.key_template
        )
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: ExtractionRule,
    pub path: FieldPath,
    pub template: KeyTemplate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;

    #[test]
    fn matches_exactly() {
        let rule = ExtractionRule::new("apps/v1", "Deployment", ".spec.replicas", "x");
        assert!(rule.matches(&TypeSelector::new("apps/v1", "Deployment")));
        assert!(!rule.matches(&TypeSelector::new("apps/v1beta1", "Deployment")));
        assert!(!rule.matches(&TypeSelector::new("apps/v1", "deployment")));
    }

    #[test]
    fn compile_reports_the_failing_part() {
        let bad_path = ExtractionRule::new("v1", "Service", ".spec..ports", "x");
        assert!(matches!(
            bad_path.compile().unwrap_err(),
            ExtractError::PathResolution { .. }
        ));
        let bad_template = ExtractionRule::new("v1", "Service", ".spec.ports", "{{ nope . }}");
        assert!(matches!(
            bad_template.compile().unwrap_err(),
            ExtractError::Template(_)
        ));
        let good = ExtractionRule::new("v1", "Service", "{.spec.type}", "{{ resourceName . }}.type");
        assert_eq!(good.compile().unwrap().path.canonical(), "$.spec.type");
    }

    #[test]
    fn deserializes_from_toml_style_fields() {
        let rule: ExtractionRule = serde_json::from_value(serde_json::json!({
            "api_version": "apps/v1",
            "kind": "Deployment",
            "source_path": ".spec.replicas",
            "key_template": "{{ resourceName . }}.replicas"
        }))
        .unwrap();
        assert_eq!(rule.kind, "Deployment");
    }
}
