//! TOML configuration.
//!
//! Every section is optional; a run can be driven from the command line
//! alone ([`Config::minimal`]).
//!
//! ```toml
//! [project]
//! root = "./charts/web"
//! output_dir = "./out"          # written to ./out/<chart name>/
//! exclude_globs = ["templates/tests/**"]
//!
//! [cache]
//! policy = "by-content"   # by-content | by-name | off
//! dir = ".helm-dump"
//!
//! [extraction]
//! lenient = false
//! merge_existing_values = true
//!
//! [[rules]]
//! api_version = "apps/v1"
//! kind = "Deployment"
//! source_path = ".spec.replicas"
//! key_template = "{{ resourceName . }}.replicas"
//! ```

use anyhow::{Context, Result};
use globset::Glob;
use helm_dump_core::ExtractionRule;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::CachePolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub rules: Vec<ExtractionRule>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Parent of the written chart directory; in place when unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            output_dir: None,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub policy: CachePolicy,
    /// Relative paths are resolved against the project root.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            policy: CachePolicy::default(),
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".helm-dump")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub lenient: bool,
    /// Seed the values tree from the chart's existing `values.yaml`.
    #[serde(default = "default_true")]
    pub merge_existing_values: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            lenient: false,
            merge_existing_values: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Defaults for a run without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// The cache directory, resolved against the project root.
    pub fn cache_dir(&self) -> PathBuf {
        if self.cache.dir.is_absolute() {
            self.cache.dir.clone()
        } else {
            self.project.root.join(&self.cache.dir)
        }
    }

    /// Where the chart is written.
    pub fn output_dir(&self) -> &Path {
        self.project
            .output_dir
            .as_deref()
            .unwrap_or(&self.project.root)
    }

    /// Check everything that can be checked before touching the chart.
    pub fn validate(&self) -> Result<()> {
        for pattern in self
            .project
            .include_globs
            .iter()
            .chain(&self.project.exclude_globs)
        {
            Glob::new(pattern).with_context(|| format!("invalid glob pattern '{}'", pattern))?;
        }
        if self.project.include_globs.is_empty() {
            anyhow::bail!("project.include_globs must not be empty");
        }
        if self.cache.dir.as_os_str().is_empty() {
            anyhow::bail!("cache.dir must not be empty");
        }
        for (i, rule) in self.rules.iter().enumerate() {
            let fields = [
                ("api_version", &rule.api_version),
                ("kind", &rule.kind),
                ("source_path", &rule.source_path),
                ("key_template", &rule.key_template),
            ];
            for (name, value) in fields {
                if value.trim().is_empty() {
                    anyhow::bail!("rules[{}].{} must not be empty", i, name);
                }
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.project.root, PathBuf::from("."));
        assert_eq!(config.cache.policy, CachePolicy::ByContent);
        assert!(config.extraction.merge_existing_values);
        assert!(!config.extraction.lenient);
        assert!(config.rules.is_empty());
        assert_eq!(config.cache_dir(), PathBuf::from("./.helm-dump"));
        assert_eq!(config.output_dir(), Path::new("."));
    }

    #[test]
    fn parses_all_sections() {
        let config = parse(
            r#"
[project]
root = "/charts/web"
output_dir = "/out/web"
exclude_globs = ["templates/tests/**"]

[cache]
policy = "by-name"
dir = "/tmp/cache"

[extraction]
lenient = true
merge_existing_values = false

[[rules]]
api_version = "apps/v1"
kind = "Deployment"
source_path = ".spec.replicas"
key_template = "{{ resourceName . }}.replicas"

[[rules]]
api_version = "v1"
kind = "Service"
source_path = ".spec.type"
key_template = "{{ resourceName . }}.serviceType"
"#,
        )
        .unwrap();
        assert_eq!(config.cache.policy, CachePolicy::ByName);
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/cache"));
        assert_eq!(config.output_dir(), Path::new("/out/web"));
        assert!(config.extraction.lenient);
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[1].kind, "Service");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse("[cache]\npolicy = \"sometimes\"\n").is_err());
        assert!(parse("[project]\nexclude_globs = [\"a/[\"]\n").is_err());
        assert!(parse(
            "[[rules]]\napi_version = \"v1\"\nkind = \"\"\nsource_path = \".a\"\nkey_template = \"a\"\n"
        )
        .is_err());
        assert!(parse("[[rules]]\napi_version = \"v1\"\n").is_err());
    }
}
