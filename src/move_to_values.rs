//! `helm-dump move-to-values`.
//!
//! Loads the chart, swaps every template for its cached pristine copy,
//! runs the extractor over the templates and writes the chart back out with
//! the rewritten templates and the new `values.yaml`. In place, only the
//! changed files are written; with an output directory the whole chart is
//! written to `<output>/<chart name>/`.

use anyhow::{bail, Context, Result};
use helm_dump_core::report::SkipReason;
use helm_dump_core::{Document, ExtractOptions, Extractor, Outcome, ValuesTree};
use std::path::Path;

use crate::cache::ResourceCache;
use crate::config::Config;
use crate::project::{self, ChartProject};
use crate::report::{self, ReportMode};

/// Knobs that only exist on the command line.
#[derive(Debug, Clone, Copy)]
pub struct RunFlags {
    /// Fail the command when the run recorded any diagnostic.
    pub strict: bool,
    pub report: ReportMode,
}

pub fn run_move_to_values(config: &Config, flags: RunFlags) -> Result<Outcome> {
    if config.rules.is_empty() {
        bail!("No extraction rules: pass API_VERSION KIND FIELD TEMPLATE or add [[rules]] to the config");
    }

    let output_dir = config.output_dir();
    let cache_dir = config.cache_dir();
    let mut skip_dirs = vec![cache_dir.as_path()];
    if !same_dir(output_dir, &config.project.root) {
        skip_dirs.push(output_dir);
    }
    let chart = project::load_chart(&config.project, &skip_dirs)?;

    let cache = ResourceCache::new(&cache_dir, config.cache.policy);
    let templates = pristine_templates(&chart, &cache);
    let base = base_values(&chart, config.extraction.merge_existing_values)?;

    let extractor = Extractor::new(
        &config.rules,
        ExtractOptions {
            lenient: config.extraction.lenient,
            ..ExtractOptions::default()
        },
    );
    let outcome = extractor
        .run(templates, base)
        .context("Failed to build values")?;

    let (destination, written) = if same_dir(output_dir, &chart.root) {
        let changed = outcome
            .documents
            .iter()
            .filter(|d| chart.file(d.name()).map(Document::raw) != Some(d.raw()));
        let written = project::save_chart(&chart.root, changed.chain([&outcome.values_document]))?;
        (chart.root.clone(), written)
    } else {
        let destination = output_dir.join(chart.name()?);
        let written = project::save_chart(
            &destination,
            chart
                .passthrough()
                .chain(&outcome.documents)
                .chain([&outcome.values_document]),
        )?;
        (destination, written)
    };

    report::emit(&outcome.report, flags.report.reporter().as_ref());
    print_summary(&outcome, &destination, written);

    if flags.strict && !outcome.report.is_clean() {
        bail!(
            "{} diagnostics recorded (--strict)",
            outcome.report.diagnostics().len()
        );
    }
    Ok(outcome)
}

/// Templates with their bytes replaced by the cached copy. A template that
/// cannot be cached goes through as it is.
fn pristine_templates(chart: &ChartProject, cache: &ResourceCache) -> Vec<Document> {
    chart
        .templates()
        .map(|template| {
            if template.is_internal() || !template.is_yaml() {
                return template.clone();
            }
            match cache.fetch(template.name(), template.raw()) {
                Ok(bytes) => template.with_bytes(bytes),
                Err(e) => {
                    log::warn!(target: "helm_dump::cache", "{:#}", e);
                    template.clone()
                }
            }
        })
        .collect()
}

fn base_values(chart: &ChartProject, merge: bool) -> Result<ValuesTree> {
    let Some(values) = chart.values().filter(|_| merge) else {
        return Ok(ValuesTree::new());
    };
    let parsed: serde_json::Value = serde_yaml::from_slice(values.raw())
        .with_context(|| format!("Failed to parse {}", values.name()))?;
    ValuesTree::with_base(parsed).with_context(|| format!("Failed to load {}", values.name()))
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn print_summary(outcome: &Outcome, output_dir: &Path, written: usize) {
    let report = &outcome.report;
    println!("move-to-values");
    println!("  documents: {}", report.documents().len());
    println!("  rewritten: {}", report.rewritten_count());
    println!("  patches applied: {}", report.patch_count());
    println!(
        "  skipped: {} (internal {}, not yaml {}, undecodable {})",
        report.skip_count(),
        report.skipped_for(SkipReason::Internal),
        report.skipped_for(SkipReason::NotYaml),
        report.skipped_for(SkipReason::Undecodable)
    );
    println!("  values: {}", outcome.values.len());
    if !report.warnings().is_empty() {
        println!("  warnings: {}", report.warnings().len());
    }
    println!("  diagnostics: {}", report.diagnostics().len());
    println!("  files written: {} to {}", written, output_dir.display());
    if report.is_clean() {
        println!("ok");
    }
}
