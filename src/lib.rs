//! # helm-dump
//!
//! Command-line tooling around [`helm_dump_core`]: move literal values out
//! of a Helm chart's templates into its `values.yaml`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐   ┌─────────────┐
//! │ chart dir   │──▶│ resource     │──▶│ helm-dump-core   │──▶│ chart dir   │
//! │ (project)   │   │ cache        │   │ Extractor        │   │ + values    │
//! └─────────────┘   └──────────────┘   └────────┬─────────┘   └─────────────┘
//!                                               ▼
//!                                        report (stderr)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`project`] | Chart directory loading and saving |
//! | [`cache`] | Pristine template cache |
//! | [`move_to_values`] | The `move-to-values` command |
//! | [`report`] | Run reporters |
//! | [`logging`] | Logger setup |
//! | [`version`] | Build information |

pub mod cache;
pub mod config;
pub mod logging;
pub mod move_to_values;
pub mod project;
pub mod report;
pub mod version;
