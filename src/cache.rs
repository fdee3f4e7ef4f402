//! Resource cache.
//!
//! Keeps a pristine copy of every template under `<root>/.helm-dump`, one
//! file per template, so the bytes a run started from can always be found
//! again. Entries are never overwritten: the first writer wins and later
//! readers get its bytes.

use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// One entry per name and content; a changed template gets a new entry.
    #[default]
    ByContent,
    /// One entry per name; the first copy ever stored is reused.
    ByName,
    Off,
}

/// Cache file name for a chart-relative name: `/` and `.` become `_`.
pub fn transliterate(name: &str) -> String {
    name.chars()
        .map(|c| if c == '/' || c == '.' { '_' } else { c })
        .collect()
}

/// First 16 hex digits of the SHA-256 of `data`.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

#[derive(Debug, Clone)]
pub struct ResourceCache {
    dir: PathBuf,
    policy: CachePolicy,
}

impl ResourceCache {
    pub fn new(dir: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Path of the entry for `name` holding `data`; `None` when disabled.
    pub fn entry_path(&self, name: &str, data: &[u8]) -> Option<PathBuf> {
        let file = match self.policy {
            CachePolicy::Off => return None,
            CachePolicy::ByName => transliterate(name),
            CachePolicy::ByContent => format!("{}-{}", transliterate(name), content_hash(data)),
        };
        Some(self.dir.join(file))
    }

    /// The cached bytes for `name`, storing `data` first if there is no
    /// entry yet. Only valid YAML is stored.
    pub fn fetch(&self, name: &str, data: &[u8]) -> Result<Vec<u8>> {
        let Some(path) = self.entry_path(name, data) else {
            return Ok(data.to_vec());
        };

        if path.exists() {
            log::debug!(target: "helm_dump::cache", "{}: hit {}", name, path.display());
            return read_entry(&path);
        }

        serde_yaml::from_slice::<serde_yaml::Value>(data)
            .with_context(|| format!("{} is not valid YAML, not caching it", name))?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {}", self.dir.display()))?;

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(data)
                    .with_context(|| format!("Failed to write cache entry: {}", path.display()))?;
                log::debug!(target: "helm_dump::cache", "{}: stored {}", name, path.display());
                Ok(data.to_vec())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => read_entry(&path),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to create cache entry: {}", path.display())),
        }
    }
}

fn read_entry(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read cache entry: {}", path.display()))
}
