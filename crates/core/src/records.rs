//! Submitting and fetching clinic records.
//!
//! [`RecordService`] joins the spec loader and the storage client: a submitted form is composed
//! against its document kind's spec table and uploaded under that kind's archetype; a fetched
//! document is extracted back into form data.

use crate::codes::{CodeSource, HttpCodeSource};
use crate::config::CoreConfig;
use crate::specs::{DocumentKind, LoadedSpec, SpecLoader};
use crate::storage::{StorageClient, StoredDocument};
use crate::ClinicResult;
use ehr::{Document, FormData};
use std::sync::Arc;

#[derive(Debug)]
pub struct RecordService<S> {
    specs: SpecLoader<S>,
    storage: StorageClient,
}

impl RecordService<HttpCodeSource> {
    /// Builds a service talking to the configured code lookup and storage services.
    pub fn from_config(cfg: &CoreConfig) -> Self {
        let client = reqwest::Client::new();
        let source = HttpCodeSource::new(client.clone(), cfg.codes_url().clone());
        Self::with_client(source, client, cfg)
    }
}

impl<S: CodeSource> RecordService<S> {
    pub fn new(specs: SpecLoader<S>, storage: StorageClient) -> Self {
        Self { specs, storage }
    }

    /// Builds a service with a custom code source and the configured storage service.
    pub fn with_source(source: S, cfg: &CoreConfig) -> Self {
        Self::with_client(source, reqwest::Client::new(), cfg)
    }

    fn with_client(source: S, client: reqwest::Client, cfg: &CoreConfig) -> Self {
        Self::new(
            SpecLoader::new(source, cfg.spec_dir().map(|dir| dir.to_path_buf())),
            StorageClient::new(client, cfg.storage_url().clone()),
        )
    }

    pub fn specs(&self) -> &SpecLoader<S> {
        &self.specs
    }

    pub async fn spec(&self, kind: DocumentKind) -> ClinicResult<Arc<LoadedSpec>> {
        self.specs.load(kind).await
    }

    /// Composes `form` as a `kind` document and stores it.
    pub async fn submit(
        &self,
        kind: DocumentKind,
        form: &FormData,
        labels: &[String],
    ) -> ClinicResult<StoredDocument> {
        let spec = self.specs.load(kind).await?;
        let document = spec.compose(form)?;
        self.storage
            .upload(&document, &kind.archetype_id(), labels)
            .await
    }

    /// Fetches a stored `kind` document and extracts its form data.
    pub async fn fetch(&self, kind: DocumentKind, id: &str) -> ClinicResult<FormData> {
        let spec = self.specs.load(kind).await?;
        let document: Document = self.storage.download(id).await?;
        Ok(spec.extract(&document))
    }
}
