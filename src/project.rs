//! Chart directory loading and saving.
//!
//! A chart is read as a flat list of [`Document`]s named by their path
//! relative to the chart root, always with `/` separators
//! (`templates/deployment.yaml`). Files under `templates/` are the
//! documents the extractor works on; everything else is carried through.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use helm_dump_core::{Document, VALUES_DOCUMENT};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ProjectConfig;

pub const CHART_FILE: &str = "Chart.yaml";
pub const TEMPLATES_DIR: &str = "templates/";

#[derive(Debug)]
pub struct ChartProject {
    pub root: PathBuf,
    /// Every file of the chart, sorted by name.
    pub files: Vec<Document>,
}

impl ChartProject {
    pub fn is_template(name: &str) -> bool {
        name.starts_with(TEMPLATES_DIR)
    }

    pub fn templates(&self) -> impl Iterator<Item = &Document> {
        self.files.iter().filter(|f| Self::is_template(f.name()))
    }

    /// Files that are neither templates nor the values document.
    pub fn passthrough(&self) -> impl Iterator<Item = &Document> {
        self.files
            .iter()
            .filter(|f| !Self::is_template(f.name()) && f.name() != VALUES_DOCUMENT)
    }

    pub fn values(&self) -> Option<&Document> {
        self.files.iter().find(|f| f.name() == VALUES_DOCUMENT)
    }

    pub fn file(&self, name: &str) -> Option<&Document> {
        self.files.iter().find(|f| f.name() == name)
    }

    /// The `name` field of `Chart.yaml`. It names the chart's directory
    /// when the chart is written somewhere else.
    pub fn name(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct ChartMetadata {
            name: String,
        }

        let chart = self
            .file(CHART_FILE)
            .with_context(|| format!("{} has no {}", self.root.display(), CHART_FILE))?;
        let metadata: ChartMetadata = serde_yaml::from_slice(chart.raw())
            .with_context(|| format!("Failed to parse {}", CHART_FILE))?;
        let name = metadata.name.trim();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            bail!("{} has an unusable chart name: {:?}", CHART_FILE, metadata.name);
        }
        Ok(name.to_string())
    }
}

/// Read the chart at `config.root`. `skip_dirs` (the cache, an output
/// directory inside the chart) are left out of the scan.
pub fn load_chart(config: &ProjectConfig, skip_dirs: &[&Path]) -> Result<ChartProject> {
    let root = &config.root;
    if !root.is_dir() {
        bail!("Chart root does not exist or is not a directory: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string()];
    for dir in skip_dirs {
        if let Ok(relative) = dir.strip_prefix(root) {
            let name = chart_name(relative);
            if !name.is_empty() {
                default_excludes.push(format!("{}/**", name));
            }
        }
    }
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to scan {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let name = chart_name(relative);

        if exclude_set.is_match(&name) || !include_set.is_match(&name) {
            continue;
        }

        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read chart file: {}", path.display()))?;
        files.push(Document::new(name, data));
    }

    files.sort_by(|a, b| a.name().cmp(b.name()));

    if !files.iter().any(|f| f.name() == CHART_FILE) {
        bail!(
            "Not a chart directory: {} has no {}",
            root.display(),
            CHART_FILE
        );
    }

    log::info!(
        target: "helm_dump::project",
        "loaded {} files from {}",
        files.len(),
        root.display()
    );

    Ok(ChartProject {
        root: root.clone(),
        files,
    })
}

/// Write `documents` under `dir`, creating directories as needed.
pub fn save_chart<'a>(dir: &Path, documents: impl IntoIterator<Item = &'a Document>) -> Result<usize> {
    let mut written = 0;
    for document in documents {
        let path = dir.join(document.name());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&path, document.raw())
            .with_context(|| format!("Failed to write chart file: {}", path.display()))?;
        log::debug!(target: "helm_dump::project", "wrote {}", path.display());
        written += 1;
    }
    Ok(written)
}

fn chart_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn chart() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("templates/tests")).unwrap();
        fs::create_dir_all(root.join(".helm-dump")).unwrap();
        fs::write(root.join("Chart.yaml"), "apiVersion: v2\nname: web\nversion: 0.1.0\n").unwrap();
        fs::write(root.join("values.yaml"), "image:\n  tag: latest\n").unwrap();
        fs::write(root.join("templates/deployment.yaml"), "kind: Deployment\n").unwrap();
        fs::write(root.join("templates/_helpers.tpl"), "{{/* helpers */}}\n").unwrap();
        fs::write(root.join("templates/tests/test.yaml"), "kind: Pod\n").unwrap();
        fs::write(root.join(".helm-dump/templates_deployment_yaml"), "old\n").unwrap();
        tmp
    }

    fn project_config(root: &Path) -> ProjectConfig {
        ProjectConfig {
            root: root.to_path_buf(),
            ..ProjectConfig::default()
        }
    }

    #[test]
    fn loads_and_classifies_files() {
        let tmp = chart();
        let cache = tmp.path().join(".helm-dump");
        let project = load_chart(&project_config(tmp.path()), &[&cache]).unwrap();

        let names: Vec<&str> = project.files.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "Chart.yaml",
                "templates/_helpers.tpl",
                "templates/deployment.yaml",
                "templates/tests/test.yaml",
                "values.yaml",
            ]
        );
        assert_eq!(project.templates().count(), 3);
        assert_eq!(project.passthrough().count(), 1);
        assert_eq!(project.values().unwrap().raw(), b"image:\n  tag: latest\n");
    }

    #[test]
    fn honours_exclude_globs() {
        let tmp = chart();
        let mut config = project_config(tmp.path());
        config.exclude_globs = vec!["templates/tests/**".to_string()];
        let project = load_chart(&config, &[]).unwrap();
        assert!(project.file("templates/tests/test.yaml").is_none());
        // Not skipped without being told.
        assert!(project.file(".helm-dump/templates_deployment_yaml").is_some());
    }

    #[test]
    fn requires_a_chart_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("values.yaml"), "").unwrap();
        let err = load_chart(&project_config(tmp.path()), &[]).unwrap_err();
        assert!(err.to_string().contains("Chart.yaml"));

        let missing = tmp.path().join("nope");
        assert!(load_chart(&project_config(&missing), &[]).is_err());
    }

    #[test]
    fn reads_the_chart_name() {
        let tmp = chart();
        let project = load_chart(&project_config(tmp.path()), &[]).unwrap();
        assert_eq!(project.name().unwrap(), "web");

        fs::write(tmp.path().join("Chart.yaml"), "apiVersion: v2\nname: ../web\n").unwrap();
        let project = load_chart(&project_config(tmp.path()), &[]).unwrap();
        assert!(project.name().is_err());
    }

    #[test]
    fn saves_nested_files() {
        let tmp = TempDir::new().unwrap();
        let docs = vec![
            Document::new("Chart.yaml", "name: web\n"),
            Document::new("templates/sub/cm.yaml", "kind: ConfigMap\n"),
        ];
        assert_eq!(save_chart(tmp.path(), &docs).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(tmp.path().join("templates/sub/cm.yaml")).unwrap(),
            "kind: ConfigMap\n"
        );
    }
}
