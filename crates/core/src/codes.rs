//! Code-table lookup and caching.
//!
//! Code tables (countries, gender, marital status, ...) come from an external lookup service.
//! [`CodeSource`] abstracts that service; [`CodeCache`] wraps a source with a session-scoped,
//! append-only cache so each category is fetched at most once per session.

use crate::config::CoreConfig;
use crate::constants::CODES_SEGMENT;
use crate::http::{endpoint, ensure_success};
use crate::{ClinicError, ClinicResult};
use async_trait::async_trait;
use ehr::{CodeEntry, CodeTables};
use futures::future::try_join_all;
use reqwest::Url;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// Supplier of code tables.
///
/// Implementations must tolerate repeated calls for the same category.
#[async_trait]
pub trait CodeSource: Send + Sync {
    async fn load_code(&self, category: &str) -> ClinicResult<Vec<CodeEntry>>;
}

#[async_trait]
impl<S: CodeSource + ?Sized> CodeSource for Arc<S> {
    async fn load_code(&self, category: &str) -> ClinicResult<Vec<CodeEntry>> {
        (**self).load_code(category).await
    }
}

/// Code lookup over HTTP: `GET <base>/codes/<category>` returning a JSON array of entries.
#[derive(Clone, Debug)]
pub struct HttpCodeSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCodeSource {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn from_config(cfg: &CoreConfig) -> Self {
        Self::new(reqwest::Client::new(), cfg.codes_url().clone())
    }
}

#[async_trait]
impl CodeSource for HttpCodeSource {
    async fn load_code(&self, category: &str) -> ClinicResult<Vec<CodeEntry>> {
        let url = endpoint(&self.base_url, &[CODES_SEGMENT, category])?;
        tracing::debug!(%url, "loading code table");

        let response = self.client.get(url).send().await?;
        let response = ensure_success("codes", response).await?;
        Ok(response.json::<Vec<CodeEntry>>().await?)
    }
}

/// In-memory code tables.
///
/// Used for offline work and tests. Unknown categories yield an empty table.
#[derive(Clone, Debug, Default)]
pub struct StaticCodeSource {
    tables: HashMap<String, Vec<CodeEntry>>,
}

impl StaticCodeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, category: impl Into<String>, entries: Vec<CodeEntry>) -> Self {
        self.tables.insert(category.into(), entries);
        self
    }

    /// Parses a YAML mapping of category to entry list.
    ///
    /// ```yaml
    /// gender:
    ///   - { id: F, category: gender, title: Female }
    /// ```
    pub fn from_yaml_str(yaml_text: &str) -> ClinicResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let tables = serde_path_to_error::deserialize::<_, HashMap<String, Vec<CodeEntry>>>(
            deserializer,
        )
        .map_err(|err| {
            let path = err.path().to_string();
            let path = if path.is_empty() { "<root>".to_string() } else { path };
            ClinicError::CodeTableFile(format!("at {path}: {}", err.into_inner()))
        })?;

        Ok(Self { tables })
    }

    pub async fn from_yaml_file(path: &Path) -> ClinicResult<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ClinicError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml_str(&text)
    }
}

#[async_trait]
impl CodeSource for StaticCodeSource {
    async fn load_code(&self, category: &str) -> ClinicResult<Vec<CodeEntry>> {
        Ok(self.tables.get(category).cloned().unwrap_or_default())
    }
}

type TableCell = Arc<OnceCell<Arc<Vec<CodeEntry>>>>;

/// Session-scoped cache in front of a [`CodeSource`].
///
/// Entries are never evicted or replaced. Concurrent first requests for a category share one
/// lookup; a failed lookup leaves the category empty so the next request retries it.
#[derive(Debug)]
pub struct CodeCache<S> {
    source: S,
    entries: RwLock<HashMap<String, TableCell>>,
}

impl<S: CodeSource> CodeCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the table for `category`, loading it from the source on first use.
    pub async fn get(&self, category: &str) -> ClinicResult<Arc<Vec<CodeEntry>>> {
        let cell = self.cell(category).await;
        let entries = cell
            .get_or_try_init(|| async {
                tracing::debug!(category, "code table cache miss");
                self.source.load_code(category).await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(entries))
    }

    async fn cell(&self, category: &str) -> TableCell {
        if let Some(cell) = self.entries.read().await.get(category) {
            return Arc::clone(cell);
        }

        let mut entries = self.entries.write().await;
        Arc::clone(entries.entry(category.to_string()).or_default())
    }

    /// Loads every category concurrently and waits for all of them.
    ///
    /// Fails with the first error if any lookup fails.
    pub async fn load_tables(&self, categories: &[String]) -> ClinicResult<CodeTables> {
        let loaded = try_join_all(categories.iter().map(|category| async move {
            self.get(category)
                .await
                .map(|entries| (category.clone(), entries))
        }))
        .await?;

        let mut tables = CodeTables::new();
        for (category, entries) in loaded {
            tables.insert(category, entries);
        }
        Ok(tables)
    }

    /// Categories currently cached, sorted.
    pub async fn cached_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(category, _)| category.clone())
            .collect();
        categories.sort();
        categories
    }
}
