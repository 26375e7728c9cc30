//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Library code never reads environment variables itself; binaries
//! read them once and hand the raw values to the helpers below.

use crate::constants::{DEFAULT_CODES_URL, DEFAULT_STORAGE_URL};
use crate::{ClinicError, ClinicResult};
use reqwest::Url;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    codes_url: Url,
    storage_url: Url,
    spec_dir: Option<PathBuf>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidInput`] if either URL does not parse, is not `http`/`https`,
    /// or if `spec_dir` is given but is not a directory.
    pub fn new(codes_url: &str, storage_url: &str, spec_dir: Option<PathBuf>) -> ClinicResult<Self> {
        let codes_url = parse_base_url("codes", codes_url)?;
        let storage_url = parse_base_url("storage", storage_url)?;

        if let Some(dir) = &spec_dir {
            if !dir.is_dir() {
                return Err(ClinicError::InvalidInput(format!(
                    "spec directory {} is not a directory",
                    dir.display()
                )));
            }
        }

        Ok(Self {
            codes_url,
            storage_url,
            spec_dir,
        })
    }

    /// Build a config from raw environment values, applying defaults for missing URLs.
    ///
    /// Empty or whitespace-only values count as missing.
    pub fn from_env_values(
        codes_url: Option<String>,
        storage_url: Option<String>,
        spec_dir: Option<String>,
    ) -> ClinicResult<Self> {
        let codes_url = non_empty(codes_url).unwrap_or_else(|| DEFAULT_CODES_URL.to_string());
        let storage_url =
            non_empty(storage_url).unwrap_or_else(|| DEFAULT_STORAGE_URL.to_string());
        let spec_dir = non_empty(spec_dir).map(PathBuf::from);

        Self::new(&codes_url, &storage_url, spec_dir)
    }

    pub fn codes_url(&self) -> &Url {
        &self.codes_url
    }

    pub fn storage_url(&self) -> &Url {
        &self.storage_url
    }

    pub fn spec_dir(&self) -> Option<&Path> {
        self.spec_dir.as_deref()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_base_url(service: &str, raw: &str) -> ClinicResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        ClinicError::InvalidInput(format!("{service} URL '{raw}' is invalid: {e}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClinicError::InvalidInput(format!(
            "{service} URL must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if url.cannot_be_a_base() {
        return Err(ClinicError::InvalidInput(format!(
            "{service} URL '{raw}' cannot be used as a base URL"
        )));
    }

    Ok(url)
}
