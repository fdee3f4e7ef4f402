//! Run reporting.
//!
//! After a run, every document outcome and every diagnostic is emitted as a
//! [`RunEvent`] on **stderr** so stdout stays reserved for the summary.

use helm_dump_core::report::{Diagnostic, DocumentState, Report, SkipReason};
use std::io::Write;

#[derive(Clone, Debug)]
pub enum RunEvent<'a> {
    Document {
        name: &'a str,
        state: &'a DocumentState,
    },
    Diagnostic(&'a Diagnostic),
    /// A failure downgraded by `--lenient`.
    Warning(&'a Diagnostic),
}

/// Reports run events. Implementations write to stderr (human or JSON).
pub trait RunReporter {
    fn report(&self, event: RunEvent<'_>);
}

/// Human-friendly lines: "rewrite  templates/deployment.yaml  2 patches".
pub struct StderrReport;

impl RunReporter for StderrReport {
    fn report(&self, event: RunEvent<'_>) {
        let line = match &event {
            RunEvent::Document { name, state } => match state {
                DocumentState::Skipped { reason } => {
                    format!("skip     {}  ({})\n", name, skip_label(*reason))
                }
                DocumentState::Unmatched => format!("keep     {}\n", name),
                DocumentState::Rewritten { applied, failed } => {
                    let mut line = format!("rewrite  {}  {}", name, plural(*applied, "patch", "patches"));
                    if *failed > 0 {
                        line.push_str(&format!(", {}", plural(*failed, "failed rule", "failed rules")));
                    }
                    line.push('\n');
                    line
                }
            },
            RunEvent::Diagnostic(d) => format!("error    {}\n", d),
            RunEvent::Warning(d) => format!("warning  {}\n", d),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }
}

/// Machine-readable events: one JSON object per line on stderr.
pub struct JsonReport;

impl RunReporter for JsonReport {
    fn report(&self, event: RunEvent<'_>) {
        let obj = match &event {
            RunEvent::Document { name, state } => serde_json::json!({
                "event": "document",
                "name": name,
                "outcome": state,
            }),
            RunEvent::Diagnostic(d) => serde_json::json!({
                "event": "diagnostic",
                "diagnostic": d,
            }),
            RunEvent::Warning(d) => serde_json::json!({
                "event": "warning",
                "diagnostic": d,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}

/// No-op reporter when reporting is disabled.
pub struct NoReport;

impl RunReporter for NoReport {
    fn report(&self, _event: RunEvent<'_>) {}
}

/// Report mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ReportMode {
    Off,
    Human,
    Json,
}

impl ReportMode {
    /// Default: human output when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ReportMode::Human
        } else {
            ReportMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn RunReporter> {
        match self {
            ReportMode::Off => Box::new(NoReport),
            ReportMode::Human => Box::new(StderrReport),
            ReportMode::Json => Box::new(JsonReport),
        }
    }
}

/// Feed every document outcome, then every warning and diagnostic, to
/// `reporter`.
pub fn emit(report: &Report, reporter: &dyn RunReporter) {
    for document in report.documents() {
        reporter.report(RunEvent::Document {
            name: &document.name,
            state: &document.state,
        });
    }
    for warning in report.warnings() {
        reporter.report(RunEvent::Warning(warning));
    }
    for diagnostic in report.diagnostics() {
        reporter.report(RunEvent::Diagnostic(diagnostic));
    }
}

pub fn skip_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Internal => "internal",
        SkipReason::NotYaml => "not yaml",
        SkipReason::Undecodable => "undecodable",
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}
