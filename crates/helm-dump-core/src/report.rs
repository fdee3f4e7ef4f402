//! Run report: what happened to each document and every failure on the way.

use serde::{Serialize, Serializer};

use crate::error::ExtractError;

/// Pipeline stage a diagnostic was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Compile,
    Decode,
    Parse,
    Read,
    Render,
    Store,
    Match,
    Plan,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Compile => "compile",
            Stage::Decode => "decode",
            Stage::Parse => "parse",
            Stage::Read => "read",
            Stage::Render => "render",
            Stage::Store => "store",
            Stage::Match => "match",
            Stage::Plan => "plan",
        }
    }
}

/// A failure recorded instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    /// Document name; `None` for run-level (rule compilation) failures.
    pub document: Option<String>,
    /// Rule identity; `None` for document-level failures.
    pub rule: Option<String>,
    #[serde(serialize_with = "error_message")]
    pub error: ExtractError,
    /// Key stored in the values tree that the document does not reference.
    pub orphaned_value: Option<String>,
}

fn error_message<S: Serializer>(error: &ExtractError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.stage.as_str())?;
        if let Some(document) = &self.document {
            write!(f, " {}", document)?;
        }
        if let Some(rule) = &self.rule {
            write!(f, " ({})", rule)?;
        }
        write!(f, ": {}", self.error)?;
        if let Some(key) = &self.orphaned_value {
            write!(f, " [values key {} is not referenced]", key)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// File name starts with `_`.
    Internal,
    /// Not a `.yaml`/`.yml` file.
    NotYaml,
    /// Could not be decoded as a typed manifest.
    Undecodable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentState {
    Skipped { reason: SkipReason },
    /// Decoded, but no rule selects its type.
    Unmatched,
    /// Rules applied; `applied` patches written, `failed` rules recorded.
    Rewritten { applied: usize, failed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReport {
    pub name: String,
    #[serde(flatten)]
    pub state: DocumentState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    documents: Vec<DocumentReport>,
    diagnostics: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn document(&mut self, name: &str, state: DocumentState) {
        self.documents.push(DocumentReport {
            name: name.to_string(),
            state,
        });
    }

    pub(crate) fn diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn warning(&mut self, diagnostic: Diagnostic) {
        self.warnings.push(diagnostic);
    }

    pub fn documents(&self) -> &[DocumentReport] {
        &self.documents
    }

    pub fn state_of(&self, name: &str) -> Option<&DocumentState> {
        self.documents
            .iter()
            .find(|d| d.name == name)
            .map(|d| &d.state)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Failures downgraded by the lenient option.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn diagnostics_for<'a>(&'a self, document: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.document.as_deref() == Some(document))
    }

    pub fn skip_count(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.state, DocumentState::Skipped { .. }))
            .count()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.documents
            .iter()
            .filter(|d| d.state == DocumentState::Skipped { reason })
            .count()
    }

    pub fn rewritten_count(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.state, DocumentState::Rewritten { applied, .. } if applied > 0))
            .count()
    }

    pub fn patch_count(&self) -> usize {
        self.documents
            .iter()
            .map(|d| match d.state {
                DocumentState::Rewritten { applied, .. } => applied,
                _ => 0,
            })
            .sum()
    }

    /// Keys stored without a referencing patch.
    pub fn orphaned_values(&self) -> impl Iterator<Item = &str> {
        self.diagnostics
            .iter()
            .chain(&self.warnings)
            .filter_map(|d| d.orphaned_value.as_deref())
    }

    /// No diagnostics. Skipped internal and non-YAML files do not count.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic(document: &str, orphan: Option<&str>) -> Diagnostic {
        Diagnostic {
            stage: Stage::Match,
            document: Some(document.to_string()),
            rule: Some("apps/v1/Deployment .spec.x -> x".to_string()),
            error: ExtractError::PatchNotFound {
                path: "$.spec.x".to_string(),
            },
            orphaned_value: orphan.map(str::to_string),
        }
    }

    #[test]
    fn counts_states() {
        let mut report = Report::new();
        report.document("templates/_helpers.tpl", DocumentState::Skipped { reason: SkipReason::Internal });
        report.document("templates/NOTES.txt", DocumentState::Skipped { reason: SkipReason::NotYaml });
        report.document("templates/svc.yaml", DocumentState::Unmatched);
        report.document("templates/web.yaml", DocumentState::Rewritten { applied: 2, failed: 0 });

        assert_eq!(report.skip_count(), 2);
        assert_eq!(report.skipped_for(SkipReason::Internal), 1);
        assert_eq!(report.rewritten_count(), 1);
        assert_eq!(report.patch_count(), 2);
        assert_eq!(report.state_of("templates/svc.yaml"), Some(&DocumentState::Unmatched));
        assert!(report.is_clean());
    }

    #[test]
    fn diagnostics_make_the_report_unclean() {
        let mut report = Report::new();
        report.warning(diagnostic("a.yaml", Some("a.x")));
        assert!(report.is_clean());
        report.diagnostic(diagnostic("b.yaml", Some("b.x")));
        assert!(!report.is_clean());
        assert_eq!(report.diagnostics_for("b.yaml").count(), 1);
        assert_eq!(report.orphaned_values().collect::<Vec<_>>(), vec!["b.x", "a.x"]);
    }

    #[test]
    fn diagnostic_display_and_json() {
        let d = diagnostic("templates/web.yaml", Some("web.x"));
        let text = d.to_string();
        assert!(text.starts_with("[match] templates/web.yaml"));
        assert!(text.contains("web.x"));

        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["stage"], "match");
        assert_eq!(json["error"], "no mapping entry found at $.spec.x");
    }
}
