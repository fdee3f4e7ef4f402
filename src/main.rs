//! # helm-dump CLI
//!
//! Moves literal values out of a Helm chart's templates into its
//! `values.yaml`, rewriting each template to reference the new value.
//!
//! ## Usage
//!
//! ```bash
//! helm-dump [--config helm-dump.toml] [-v...] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `helm-dump move-to-values API_VERSION KIND FIELD TEMPLATE` | Extract one field of every matching template |
//! | `helm-dump move-to-values --config rules.toml` | Extract every `[[rules]]` entry of the config |
//! | `helm-dump version` | Print build information as JSON |
//!
//! ## Examples
//!
//! ```bash
//! # Move every Deployment's replica count into values.yaml, in place
//! helm-dump move-to-values apps/v1 Deployment .spec.replicas '{{ resourceName . }}.replicas' -d ./web
//!
//! # Write the result to another directory and fail on any diagnostic
//! helm-dump move-to-values apps/v1 Deployment '{.spec.template.spec.containers[0].image}' \
//!     '{{ resourceName . }}.image' -d ./web -o ./out --strict
//! ```

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};
use helm_dump::cache::CachePolicy;
use helm_dump::config::{self, Config};
use helm_dump::logging;
use helm_dump::move_to_values::{self, RunFlags};
use helm_dump::report::ReportMode;
use helm_dump::version::BuildInfo;
use helm_dump_core::ExtractionRule;
use std::path::PathBuf;

/// helm-dump: turn literal values in chart templates into chart values.
#[derive(Parser)]
#[command(
    name = "helm-dump",
    about = "Move literal values from Helm chart templates into values.yaml",
    version
)]
struct Cli {
    /// Path to a configuration file (TOML). Command-line flags override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log more (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move a value from the chart's templates into values.yaml.
    ///
    /// For every template of type API_VERSION/KIND, the value at FIELD is
    /// stored in values.yaml under the key rendered from TEMPLATE, and the
    /// template is rewritten to `{{ .Values.<key> }}`.
    MoveToValues {
        /// apiVersion of the templates to rewrite (e.g. apps/v1).
        api_version: Option<String>,
        /// kind of the templates to rewrite (e.g. Deployment).
        kind: Option<String>,
        /// Path of the value (e.g. .spec.replicas).
        field: Option<String>,
        /// Key template (e.g. '{{ resourceName . }}.replicas').
        template: Option<String>,

        /// The chart directory.
        #[arg(short = 'd', long = "project-root")]
        project_root: Option<PathBuf>,

        /// Write the chart to OUTPUT_DIR/<chart name> instead of in place.
        #[arg(short = 'o', long = "output-directory")]
        output_dir: Option<PathBuf>,

        /// Only warn when a value has no entry to rewrite.
        #[arg(long)]
        lenient: bool,

        /// Exit with an error if anything went wrong along the way.
        #[arg(long)]
        strict: bool,

        /// How pristine template copies are cached.
        #[arg(long, value_enum)]
        cache: Option<CachePolicy>,

        /// Per-document report on stderr [default: human on a TTY, else off].
        #[arg(long, value_enum)]
        report: Option<ReportMode>,
    },

    /// Print version information as JSON.
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::minimal(),
    };

    match cli.command {
        Commands::Version => {
            println!("{}", BuildInfo::current().to_json()?);
        }
        Commands::MoveToValues {
            api_version,
            kind,
            field,
            template,
            project_root,
            output_dir,
            lenient,
            strict,
            cache,
            report,
        } => {
            match (api_version, kind, field, template) {
                (Some(api_version), Some(kind), Some(field), Some(template)) => {
                    cfg.rules
                        .push(ExtractionRule::new(api_version, kind, field, template));
                }
                (None, None, None, None) => {}
                _ => bail!("move-to-values takes all four of API_VERSION KIND FIELD TEMPLATE, or none"),
            }
            if let Some(root) = project_root {
                cfg.project.root = root;
            }
            if output_dir.is_some() {
                cfg.project.output_dir = output_dir;
            }
            if let Some(policy) = cache {
                cfg.cache.policy = policy;
            }
            cfg.extraction.lenient |= lenient;
            cfg.validate()?;

            let flags = RunFlags {
                strict,
                report: report.unwrap_or_else(ReportMode::default_for_tty),
            };
            move_to_values::run_move_to_values(&cfg, flags)?;
        }
    }

    Ok(())
}
