//! # helm-dump core
//!
//! The move-to-values engine: pull literal values out of Kubernetes
//! manifests into a Helm values tree and rewrite each manifest so the
//! literal is replaced by `{{ .Values.<key> }}`, leaving every other byte
//! (comments, formatting, existing template actions) as it was.
//!
//! This crate does no filesystem I/O. Documents come in as bytes and go out
//! as bytes; loading charts, caching and reporting live in the `helm-dump`
//! application crate.
//!
//! ## Pipeline
//!
//! ```text
//! raw bytes ──▶ decode ──▶ rule matches? ──▶ read ──▶ render key ──▶ store
//!                 │                                                   │
//!                 └──▶ syntax tree ──▶ path matcher ──▶ patch plan ◀──┘
//!                                                           │
//!                                   rewritten bytes ◀── apply (high → low)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`path`] | Field path parsing and canonical form |
//! | [`value_reader`] | Reading values out of decoded manifests |
//! | [`key_template`] | Destination key templates |
//! | [`values`] | The values tree |
//! | [`syntax`] | YAML syntax tree with byte spans |
//! | [`visitor`] | Tree traversal and path matching |
//! | [`patch`] | Patches, collection and application |
//! | [`document`] | Documents and decoded views |
//! | [`rule`] | Extraction rules |
//! | [`extract`] | The per-document pipeline |
//! | [`report`] | Run report and diagnostics |
//! | [`error`] | Error type |

pub mod document;
pub mod error;
pub mod extract;
pub mod key_template;
pub mod patch;
pub mod path;
pub mod report;
pub mod rule;
pub mod syntax;
pub mod value_reader;
pub mod values;
pub mod visitor;

pub use document::{Document, TypeSelector};
pub use error::{ExtractError, Result};
pub use extract::{ExtractOptions, Extractor, Outcome, VALUES_DOCUMENT};
pub use rule::ExtractionRule;
pub use values::ValuesTree;
