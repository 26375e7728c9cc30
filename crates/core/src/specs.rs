//! Per-document-kind spec loading.
//!
//! A spec table is only usable once the code tables it references are loaded. [`SpecLoader`]
//! resolves both on the first request for a kind, loading the code tables concurrently through
//! the shared [`CodeCache`], and keeps the result for the rest of the session.

use crate::codes::{CodeCache, CodeSource};
use crate::{ClinicError, ClinicResult};
use ehr::templates::{info, person};
use ehr::{ArchetypeId, CodeTables, Document, FieldSpec, FormData, Mapper};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// The document kinds the clinic records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Person,
    Info,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Person, DocumentKind::Info];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Person => "person",
            DocumentKind::Info => "info",
        }
    }

    /// Archetype the document is stored under.
    pub fn archetype_id(self) -> ArchetypeId {
        let raw = match self {
            DocumentKind::Person => person::ARCHETYPE_ID,
            DocumentKind::Info => info::ARCHETYPE_ID,
        };
        ArchetypeId::parse(raw).expect("built-in archetype ID is valid")
    }

    /// The built-in spec table for this kind.
    pub fn builtin_field_specs(self) -> Vec<FieldSpec> {
        match self {
            DocumentKind::Person => person::field_specs(),
            DocumentKind::Info => info::field_specs(),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person" => Ok(DocumentKind::Person),
            "info" => Ok(DocumentKind::Info),
            other => Err(ClinicError::UnknownDocumentKind(other.to_string())),
        }
    }
}

/// A spec table with its code tables resolved.
#[derive(Debug)]
pub struct LoadedSpec {
    kind: DocumentKind,
    fields: Vec<FieldSpec>,
    codes: CodeTables,
}

impl LoadedSpec {
    pub fn new(kind: DocumentKind, fields: Vec<FieldSpec>, codes: CodeTables) -> Self {
        Self {
            kind,
            fields,
            codes,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn codes(&self) -> &CodeTables {
        &self.codes
    }

    pub fn mapper(&self) -> Mapper<'_> {
        Mapper::new(&self.fields, &self.codes)
    }

    /// Composes a fresh document from `form`.
    pub fn compose(&self, form: &FormData) -> ClinicResult<Document> {
        Ok(self.mapper().compose_document(Document::new(), form, "")?)
    }

    /// Extracts fresh form data from `document`.
    pub fn extract(&self, document: &Document) -> FormData {
        self.mapper()
            .extract_form_data(FormData::new(), document, "")
    }
}

/// Loads and caches [`LoadedSpec`]s per [`DocumentKind`].
#[derive(Debug)]
pub struct SpecLoader<S> {
    codes: CodeCache<S>,
    spec_dir: Option<PathBuf>,
    loaded: RwLock<HashMap<DocumentKind, Arc<OnceCell<Arc<LoadedSpec>>>>>,
}

impl<S: CodeSource> SpecLoader<S> {
    /// Creates a loader. When `spec_dir` is set, `<spec_dir>/<kind>.yaml` replaces the built-in
    /// table for that kind if the file exists.
    pub fn new(source: S, spec_dir: Option<PathBuf>) -> Self {
        Self {
            codes: CodeCache::new(source),
            spec_dir,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn code_cache(&self) -> &CodeCache<S> {
        &self.codes
    }

    /// Returns the loaded spec for `kind`, resolving it on first use.
    ///
    /// Concurrent first requests for a kind share one resolution. Failures are not cached.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::FileRead`] if an override file exists but cannot be read.
    /// - [`ClinicError::Ehr`] if an override file is not a valid spec table.
    /// - Any error from the code source.
    pub async fn load(&self, kind: DocumentKind) -> ClinicResult<Arc<LoadedSpec>> {
        let cell = self.cell(kind).await;
        let spec = cell.get_or_try_init(|| self.resolve(kind)).await?;
        Ok(Arc::clone(spec))
    }

    async fn cell(&self, kind: DocumentKind) -> Arc<OnceCell<Arc<LoadedSpec>>> {
        if let Some(cell) = self.loaded.read().await.get(&kind) {
            return Arc::clone(cell);
        }

        let mut loaded = self.loaded.write().await;
        Arc::clone(loaded.entry(kind).or_default())
    }

    async fn resolve(&self, kind: DocumentKind) -> ClinicResult<Arc<LoadedSpec>> {
        let fields = self.field_specs(kind).await?;
        let categories = FieldSpec::code_categories(&fields);
        tracing::debug!(%kind, ?categories, "loading code tables for spec");
        let codes = self.codes.load_tables(&categories).await?;

        Ok(Arc::new(LoadedSpec::new(kind, fields, codes)))
    }

    async fn field_specs(&self, kind: DocumentKind) -> ClinicResult<Vec<FieldSpec>> {
        let Some(dir) = &self.spec_dir else {
            return Ok(kind.builtin_field_specs());
        };

        let path = dir.join(format!("{kind}.yaml"));
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(kind.builtin_field_specs());
        }

        tracing::info!(%kind, path = %path.display(), "using spec table override");
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ClinicError::FileRead {
                path: path.clone(),
                source,
            })?;
        Ok(ehr::parse_spec_table_yaml(&text)?)
    }
}
