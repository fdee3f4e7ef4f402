//! The move-to-values pipeline.
//!
//! For every document: classify, decode, then for each rule whose selector
//! matches run read → render → store → match → plan. All of a document's
//! patches are planned against its original bytes and applied once at the
//! end. A failing rule is recorded in the [`Report`] and skipped; the rest
//! of the document and the run carry on.

use std::collections::HashMap;

use crate::document::{DecodedDocument, Document};
use crate::error::{ExtractError, Result};
use crate::patch::{PatchCollector, PatchPlan};
use crate::report::{Diagnostic, DocumentState, Report, SkipReason, Stage};
use crate::rule::{CompiledRule, ExtractionRule};
use crate::syntax::SyntaxTree;
use crate::value_reader::{locate, render_value};
use crate::values::ValuesTree;
use crate::visitor::PathMatcher;

/// Name of the document the values tree is written to.
pub const VALUES_DOCUMENT: &str = "values.yaml";

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Downgrade "no entry at the source path" to a warning.
    pub lenient: bool,
    pub values_name: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            lenient: false,
            values_name: VALUES_DOCUMENT.to_string(),
        }
    }
}

/// Result of a run.
#[derive(Debug)]
pub struct Outcome {
    /// Every input document, rewritten or untouched, in input order.
    pub documents: Vec<Document>,
    /// The serialized values tree.
    pub values_document: Document,
    pub values: ValuesTree,
    pub report: Report,
}

impl Outcome {
    pub fn document(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name() == name)
    }
}

pub struct Extractor {
    rules: Vec<CompiledRule>,
    rejected: Vec<Diagnostic>,
    options: ExtractOptions,
}

/// The values tree, plus which document stored each key during this run.
///
/// A key stored by the run is never silently replaced: a later rule that
/// renders the same key with a different value fails. Keys seeded from the
/// existing values document may be replaced.
struct Accumulator {
    values: ValuesTree,
    owners: HashMap<String, String>,
}

impl Accumulator {
    fn store(&mut self, key: &str, literal: &str, document: &str) -> Result<()> {
        if let (Some(owner), Some(existing)) = (self.owners.get(key), self.values.get(key)) {
            if existing.as_str() != Some(literal) {
                return Err(ExtractError::ValueConflict {
                    key: key.to_string(),
                    existing: render_value(existing),
                    new: literal.to_string(),
                    owner: owner.clone(),
                });
            }
        }

        if let Some(previous) = self.values.insert(key, literal)? {
            if previous.as_str() != Some(literal) {
                log::warn!(
                    target: "helm_dump::extract",
                    "{}: values key {} replaced ({} -> {:?})",
                    document,
                    key,
                    previous,
                    literal
                );
            }
        }
        self.owners
            .entry(key.to_string())
            .or_insert_with(|| document.to_string());
        Ok(())
    }
}

struct RuleFailure {
    stage: Stage,
    error: ExtractError,
    orphaned_value: Option<String>,
}

impl RuleFailure {
    fn at(stage: Stage) -> impl FnOnce(ExtractError) -> RuleFailure {
        move |error| RuleFailure {
            stage,
            error,
            orphaned_value: None,
        }
    }

    fn orphaning(stage: Stage, key: &str) -> impl FnOnce(ExtractError) -> RuleFailure + '_ {
        move |error| RuleFailure {
            stage,
            error,
            orphaned_value: Some(key.to_string()),
        }
    }
}

impl Extractor {
    /// Compile `rules`. Rules whose path or template does not parse are
    /// left out of every document and reported once per run.
    pub fn new(rules: &[ExtractionRule], options: ExtractOptions) -> Self {
        let mut compiled = Vec::new();
        let mut rejected = Vec::new();
        for rule in rules {
            match rule.compile() {
                Ok(c) => compiled.push(c),
                Err(error) => {
                    log::warn!(target: "helm_dump::extract", "rule {} rejected: {}", rule, error);
                    rejected.push(Diagnostic {
                        stage: Stage::Compile,
                        document: None,
                        rule: Some(rule.to_string()),
                        error,
                        orphaned_value: None,
                    });
                }
            }
        }
        Self {
            rules: compiled,
            rejected,
            options,
        }
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Process `documents` in order, accumulating into `values`.
    ///
    /// Only serializing the values tree can fail the run.
    pub fn run(&self, documents: Vec<Document>, values: ValuesTree) -> Result<Outcome> {
        let mut store = Accumulator {
            values,
            owners: HashMap::new(),
        };
        let mut report = Report::new();
        for diagnostic in &self.rejected {
            report.diagnostic(diagnostic.clone());
        }

        let documents = documents
            .into_iter()
            .map(|document| self.process(document, &mut store, &mut report))
            .collect();
        let values = store.values;

        let values_document = Document::new(self.options.values_name.clone(), values.to_yaml()?);
        log::info!(
            target: "helm_dump::extract",
            "{} values extracted, {} documents rewritten",
            values.len(),
            report.rewritten_count()
        );

        Ok(Outcome {
            documents,
            values_document,
            values,
            report,
        })
    }

    fn process(&self, document: Document, store: &mut Accumulator, report: &mut Report) -> Document {
        let skip = if document.is_internal() {
            Some(SkipReason::Internal)
        } else if !document.is_yaml() {
            Some(SkipReason::NotYaml)
        } else {
            None
        };
        if let Some(reason) = skip {
            log::debug!(target: "helm_dump::extract", "{}: skipped ({:?})", document.name(), reason);
            report.document(document.name(), DocumentState::Skipped { reason });
            return document;
        }

        match self.plan(&document, store, report) {
            Some(plan) if !plan.is_empty() => {
                log::debug!(
                    target: "helm_dump::extract",
                    "{}: applying {} patches",
                    document.name(),
                    plan.len()
                );
                let rewritten = plan.apply(document.raw());
                document.with_bytes(rewritten)
            }
            _ => document,
        }
    }

    /// Decode `document` and plan the patches of every matching rule.
    fn plan(&self, document: &Document, store: &mut Accumulator, report: &mut Report) -> Option<PatchPlan> {
        let name = document.name();
        let decoded = match document.decode() {
            Ok(decoded) => decoded,
            Err(error) => {
                log::warn!(target: "helm_dump::extract", "{}: {}", name, error);
                report.diagnostic(Diagnostic {
                    stage: Stage::Decode,
                    document: Some(name.to_string()),
                    rule: None,
                    error,
                    orphaned_value: None,
                });
                report.document(
                    name,
                    DocumentState::Skipped {
                        reason: SkipReason::Undecodable,
                    },
                );
                return None;
            }
        };

        let matching: Vec<&CompiledRule> = self
            .rules
            .iter()
            .filter(|r| r.rule.matches(decoded.selector()))
            .collect();
        if matching.is_empty() {
            report.document(name, DocumentState::Unmatched);
            return None;
        }

        let tree = match decoded.tree() {
            Ok(tree) => tree,
            Err(error) => {
                log::warn!(target: "helm_dump::extract", "{}: {}", name, error);
                report.diagnostic(Diagnostic {
                    stage: Stage::Parse,
                    document: Some(name.to_string()),
                    rule: None,
                    error,
                    orphaned_value: None,
                });
                report.document(
                    name,
                    DocumentState::Skipped {
                        reason: SkipReason::Undecodable,
                    },
                );
                return None;
            }
        };

        let mut plan = PatchPlan::new();
        let mut failed = 0;
        for rule in matching {
            let Err(failure) = self.apply_rule(&decoded, tree, rule, store, &mut plan) else {
                continue;
            };
            let diagnostic = Diagnostic {
                stage: failure.stage,
                document: Some(name.to_string()),
                rule: Some(rule.rule.to_string()),
                error: failure.error,
                orphaned_value: failure.orphaned_value,
            };
            if self.options.lenient && matches!(diagnostic.error, ExtractError::PatchNotFound { .. }) {
                log::warn!(target: "helm_dump::extract", "{}", diagnostic);
                report.warning(diagnostic);
            } else {
                log::error!(target: "helm_dump::extract", "{}", diagnostic);
                report.diagnostic(diagnostic);
                failed += 1;
            }
        }

        report.document(
            name,
            DocumentState::Rewritten {
                applied: plan.len(),
                failed,
            },
        );
        Some(plan)
    }

    fn apply_rule(
        &self,
        decoded: &DecodedDocument<'_>,
        tree: &SyntaxTree,
        rule: &CompiledRule,
        store: &mut Accumulator,
        plan: &mut PatchPlan,
    ) -> std::result::Result<(), RuleFailure> {
        let object = decoded.object();
        let (concrete, value) = locate(object, &rule.path).map_err(RuleFailure::at(Stage::Read))?;
        let literal = render_value(value);
        let key = rule
            .template
            .render(object)
            .map_err(RuleFailure::at(Stage::Render))?;

        store
            .store(&key, &literal, decoded.document().name())
            .map_err(RuleFailure::at(Stage::Store))?;

        let mut collector = PatchCollector::new();
        PathMatcher::new(&concrete, decoded.document().raw(), &mut collector)
            .run(tree)
            .map_err(RuleFailure::orphaning(Stage::Match, &key))?;
        plan.add(collector.take(), &key)
            .map_err(RuleFailure::orphaning(Stage::Plan, &key))?;

        log::debug!(
            target: "helm_dump::extract",
            "{}: {} -> {}",
            decoded.document().name(),
            concrete,
            key
        );
        Ok(())
    }
}
