//! Document storage client.
//!
//! Composed documents are uploaded as a multipart form:
//!
//! | part          | content                                      |
//! |---------------|----------------------------------------------|
//! | `file`        | the document as JSON, named `<uuid>.json`    |
//! | `contentType` | `application/json`                           |
//! | `archetype`   | archetype ID the document conforms to        |
//! | `labels`      | JSON array of labels                         |

use crate::constants::{DOCUMENT_CONTENT_TYPE, STORAGE_SEGMENT};
use crate::http::{endpoint, ensure_success};
use crate::{ClinicError, ClinicResult};
use ehr::{ArchetypeId, Document};
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage acknowledgement for an uploaded document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
}

#[derive(Clone, Debug)]
pub struct StorageClient {
    client: reqwest::Client,
    base_url: Url,
}

impl StorageClient {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Uploads `document` under `archetype`.
    pub async fn upload(
        &self,
        document: &Document,
        archetype: &ArchetypeId,
        labels: &[String],
    ) -> ClinicResult<StoredDocument> {
        let body = document.to_json_vec().map_err(ClinicError::Serialization)?;
        let labels = serde_json::to_string(labels).map_err(ClinicError::Serialization)?;
        let file_name = format!("{}.json", Uuid::new_v4());

        let file = Part::bytes(body)
            .file_name(file_name.clone())
            .mime_str(DOCUMENT_CONTENT_TYPE)?;
        let form = Form::new()
            .part("file", file)
            .text("contentType", DOCUMENT_CONTENT_TYPE)
            .text("archetype", archetype.to_string())
            .text("labels", labels);

        let url = endpoint(&self.base_url, &[STORAGE_SEGMENT])?;
        let response = self.client.post(url).multipart(form).send().await?;
        let stored = ensure_success("storage", response)
            .await?
            .json::<StoredDocument>()
            .await?;

        tracing::info!(
            id = %stored.id,
            %archetype,
            file_name = %file_name,
            entries = document.len(),
            "document stored"
        );
        Ok(stored)
    }

    /// Fetches a previously stored document.
    pub async fn download(&self, id: &str) -> ClinicResult<Document> {
        let url = endpoint(&self.base_url, &[STORAGE_SEGMENT, id])?;
        tracing::debug!(%url, "fetching document");

        let response = self.client.get(url).send().await?;
        Ok(ensure_success("storage", response)
            .await?
            .json::<Document>()
            .await?)
    }
}
