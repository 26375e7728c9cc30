//! Test doubles for the external code lookup and storage services.

use crate::codes::CodeSource;
use crate::{ClinicError, ClinicResult};
use async_trait::async_trait;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ehr::{CodeEntry, Document};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Code source that counts lookups per category.
#[derive(Debug, Default)]
pub(crate) struct CountingSource {
    calls: Mutex<HashMap<String, usize>>,
    failing: Option<String>,
}

impl CountingSource {
    pub(crate) fn failing_on(category: &str) -> Self {
        Self {
            calls: Mutex::default(),
            failing: Some(category.to_string()),
        }
    }

    pub(crate) fn calls(&self, category: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(category)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl CodeSource for CountingSource {
    async fn load_code(&self, category: &str) -> ClinicResult<Vec<CodeEntry>> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(category.to_string())
            .or_default() += 1;
        tokio::task::yield_now().await;

        if self.failing.as_deref() == Some(category) {
            return Err(ClinicError::Upstream {
                service: "codes",
                status: 503,
                body: "unavailable".into(),
            });
        }

        Ok(sample_codes(category))
    }
}

/// Two entries per category, mirroring what the lookup service returns.
pub(crate) fn sample_codes(category: &str) -> Vec<CodeEntry> {
    match category {
        "countries" => vec![
            CodeEntry::new("SY", "countries", "Syria"),
            CodeEntry::new("AF", "countries", "Afghanistan"),
        ],
        "gender" => vec![
            CodeEntry::new("SNOMED-248152002", "gender", "Female"),
            CodeEntry::new("SNOMED-248153007", "gender", "Male"),
        ],
        "maritalStatus" => vec![
            CodeEntry::new("CODED-single", "maritalStatus", "Single"),
            CodeEntry::new("CODED-married", "maritalStatus", "Married"),
        ],
        other => vec![
            CodeEntry::new("a", other, "A"),
            CodeEntry::new("b", other, "B"),
        ],
    }
}

/// One multipart upload received by the fake storage service.
#[derive(Clone, Debug)]
pub(crate) struct ReceivedUpload {
    pub(crate) file_name: Option<String>,
    pub(crate) file_content_type: Option<String>,
    pub(crate) document: Document,
    pub(crate) content_type: String,
    pub(crate) archetype: String,
    pub(crate) labels: Vec<String>,
}

#[derive(Clone, Default)]
struct FakeState {
    uploads: Arc<Mutex<Vec<ReceivedUpload>>>,
}

/// Running fake services, serving both `/codes/...` and `/storage/...`.
pub(crate) struct FakeServices {
    pub(crate) base_url: Url,
    uploads: Arc<Mutex<Vec<ReceivedUpload>>>,
}

impl FakeServices {
    pub(crate) fn uploads(&self) -> Vec<ReceivedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

async fn codes(Path(category): Path<String>) -> Result<Json<Vec<CodeEntry>>, StatusCode> {
    match category.as_str() {
        "countries" | "gender" | "maritalStatus" => Ok(Json(sample_codes(&category))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn upload(
    State(state): State<FakeState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut file = None;
    let mut file_name = None;
    let mut file_content_type = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            file_name = field.file_name().map(str::to_string);
            file_content_type = field.content_type().map(str::to_string);
            file = Some(field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?);
        } else {
            let text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            fields.insert(name, text);
        }
    }

    let file = file.ok_or(StatusCode::BAD_REQUEST)?;
    let document: Document =
        serde_json::from_slice(&file).map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;
    let labels: Vec<String> = serde_json::from_str(fields.get("labels").ok_or(StatusCode::BAD_REQUEST)?)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let mut uploads = state.uploads.lock().unwrap();
    uploads.push(ReceivedUpload {
        file_name,
        file_content_type,
        document,
        content_type: fields.remove("contentType").unwrap_or_default(),
        archetype: fields.remove("archetype").unwrap_or_default(),
        labels,
    });

    Ok(Json(serde_json::json!({ "id": format!("doc-{}", uploads.len() - 1) })))
}

async fn download(
    State(state): State<FakeState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, StatusCode> {
    let index = id
        .strip_prefix("doc-")
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or(StatusCode::NOT_FOUND)?;

    state
        .uploads
        .lock()
        .unwrap()
        .get(index)
        .map(|upload| Json(upload.document.clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

/// Starts the fake services on an ephemeral local port.
pub(crate) async fn spawn_fake_services() -> FakeServices {
    let state = FakeState::default();
    let uploads = Arc::clone(&state.uploads);

    let app = Router::new()
        .route("/api/codes/:category", get(codes))
        .route("/api/storage", post(upload))
        .route("/api/storage/:id", get(download))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeServices {
        base_url: Url::parse(&format!("http://{addr}/api")).unwrap(),
        uploads,
    }
}
