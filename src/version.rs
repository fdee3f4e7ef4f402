//! `helm-dump version`.

use serde::Serialize;

/// Build information, printed as indented JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub version: String,
    pub commit: String,
    pub date: String,
    pub rust_version: String,
}

impl BuildInfo {
    /// Version from the package manifest; the other fields come from the
    /// `HELM_DUMP_COMMIT`, `HELM_DUMP_BUILD_DATE` and `HELM_DUMP_RUSTC`
    /// variables at build time and are empty when those are unset.
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: option_env!("HELM_DUMP_COMMIT").unwrap_or_default().to_string(),
            date: option_env!("HELM_DUMP_BUILD_DATE").unwrap_or_default().to_string(),
            rust_version: option_env!("HELM_DUMP_RUSTC").unwrap_or_default().to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
