use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use clinic_core::constants::{
    CODES_URL_ENV, DEFAULT_REST_ADDR, REST_ADDR_ENV, SPEC_DIR_ENV, STORAGE_URL_ENV,
};
use clinic_core::{ClinicError, CodeSource, CoreConfig, DocumentKind, HttpCodeSource, RecordService};
use ehr::{Document, EhrError, FieldSpec, FormData};

type Records = RecordService<Arc<dyn CodeSource>>;

/// Application state shared across REST API handlers
#[derive(Clone)]
struct AppState {
    records: Arc<Records>,
}

#[derive(Serialize, ToSchema)]
struct HealthRes {
    ok: bool,
    message: String,
}

#[derive(Serialize, ToSchema)]
struct SpecRes {
    kind: String,
    archetype: String,
    code_categories: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    fields: Vec<FieldSpec>,
}

#[derive(Deserialize, ToSchema)]
struct ComposeReq {
    #[schema(value_type = Object)]
    form: FormData,
}

#[derive(Serialize, ToSchema)]
struct ComposeRes {
    archetype: String,
    #[schema(value_type = Object)]
    document: Document,
}

#[derive(Deserialize, ToSchema)]
struct ExtractReq {
    #[schema(value_type = Object)]
    document: Document,
}

#[derive(Serialize, ToSchema)]
struct FormRes {
    #[schema(value_type = Object)]
    form: FormData,
}

#[derive(Deserialize, ToSchema)]
struct SubmitReq {
    #[schema(value_type = Object)]
    form: FormData,
    #[serde(default)]
    labels: Vec<String>,
}

#[derive(Serialize, ToSchema)]
struct SubmitRes {
    id: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, get_spec, compose, extract, submit_record, fetch_record),
    components(schemas(
        HealthRes,
        SpecRes,
        ComposeReq,
        ComposeRes,
        ExtractReq,
        FormRes,
        SubmitReq,
        SubmitRes
    ))
)]
struct ApiDoc;

/// REST error with a JSON body of the form `{"status": "error", "message": ...}`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        let status = match &err {
            ClinicError::UnknownDocumentKind(_) => StatusCode::NOT_FOUND,
            ClinicError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ClinicError::Ehr(
                EhrError::UnknownFieldType(_)
                | EhrError::MissingAttribute { .. }
                | EhrError::InvalidYaml(_)
                | EhrError::Schema(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,
            ClinicError::Ehr(_) => StatusCode::BAD_REQUEST,
            ClinicError::Http(_) | ClinicError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ClinicError::FileRead { .. }
            | ClinicError::Serialization(_)
            | ClinicError::CodeTableFile(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", err);
        }

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "status": "error",
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

fn router(records: Arc<Records>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/specs/:kind", get(get_spec))
        .route("/compose/:kind", post(compose))
        .route("/extract/:kind", post(extract))
        .route("/records/:kind", post(submit_record))
        .route("/records/:kind/:id", get(fetch_record))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(AppState { records })
}

/// Main entry point for the clinic REST service
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CLINIC_CODES_URL`: Code lookup service base URL
/// - `CLINIC_STORAGE_URL`: Document storage service base URL
/// - `CLINIC_SPEC_DIR`: Optional directory of `<kind>.yaml` spec table overrides
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_run=info".parse()?)
                .add_directive("clinic_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = CoreConfig::from_env_values(
        std::env::var(CODES_URL_ENV).ok(),
        std::env::var(STORAGE_URL_ENV).ok(),
        std::env::var(SPEC_DIR_ENV).ok(),
    )?;
    let addr = std::env::var(REST_ADDR_ENV).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());

    tracing::info!("++ Codes service at {}", cfg.codes_url());
    tracing::info!("++ Storage service at {}", cfg.storage_url());
    tracing::info!("++ Starting clinic REST on {}", addr);

    let source: Arc<dyn CodeSource> = Arc::new(HttpCodeSource::from_config(&cfg));
    let records = RecordService::with_source(source, &cfg);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(Arc::new(records))).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Clinic REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/specs/{kind}",
    params(("kind" = String, Path, description = "Document kind (person or info)")),
    responses(
        (status = 200, description = "Loaded spec table", body = SpecRes),
        (status = 404, description = "Unknown document kind"),
        (status = 502, description = "Code lookup failed")
    )
)]
/// Returns the spec table for a document kind, loading its code tables on first use.
async fn get_spec(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<SpecRes>, ApiError> {
    let kind: DocumentKind = kind.parse()?;
    let spec = state.records.spec(kind).await?;

    Ok(Json(SpecRes {
        kind: kind.to_string(),
        archetype: kind.archetype_id().to_string(),
        code_categories: FieldSpec::code_categories(spec.fields()),
        fields: spec.fields().to_vec(),
    }))
}

#[utoipa::path(
    post,
    path = "/compose/{kind}",
    params(("kind" = String, Path, description = "Document kind (person or info)")),
    request_body = ComposeReq,
    responses(
        (status = 200, description = "Composed document", body = ComposeRes),
        (status = 400, description = "Form data failed validation"),
        (status = 404, description = "Unknown document kind"),
        (status = 502, description = "Code lookup failed")
    )
)]
/// Composes a document from form data without storing it.
async fn compose(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    payload: Result<Json<ComposeReq>, JsonRejection>,
) -> Result<Json<ComposeRes>, ApiError> {
    let kind: DocumentKind = kind.parse()?;
    let Json(req) = payload?;
    let spec = state.records.spec(kind).await?;
    let document = spec.compose(&req.form)?;

    Ok(Json(ComposeRes {
        archetype: kind.archetype_id().to_string(),
        document,
    }))
}

#[utoipa::path(
    post,
    path = "/extract/{kind}",
    params(("kind" = String, Path, description = "Document kind (person or info)")),
    request_body = ExtractReq,
    responses(
        (status = 200, description = "Extracted form data", body = FormRes),
        (status = 400, description = "Request body is not valid JSON"),
        (status = 404, description = "Unknown document kind"),
        (status = 502, description = "Code lookup failed")
    )
)]
/// Extracts form data from a document.
async fn extract(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    payload: Result<Json<ExtractReq>, JsonRejection>,
) -> Result<Json<FormRes>, ApiError> {
    let kind: DocumentKind = kind.parse()?;
    let Json(req) = payload?;
    let spec = state.records.spec(kind).await?;

    Ok(Json(FormRes {
        form: spec.extract(&req.document),
    }))
}

#[utoipa::path(
    post,
    path = "/records/{kind}",
    params(("kind" = String, Path, description = "Document kind (person or info)")),
    request_body = SubmitReq,
    responses(
        (status = 201, description = "Document stored", body = SubmitRes),
        (status = 400, description = "Form data failed validation"),
        (status = 404, description = "Unknown document kind"),
        (status = 502, description = "Code lookup or storage failed")
    )
)]
/// Composes form data and uploads the document to storage.
async fn submit_record(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    payload: Result<Json<SubmitReq>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitRes>), ApiError> {
    let kind: DocumentKind = kind.parse()?;
    let Json(req) = payload?;
    let stored = state.records.submit(kind, &req.form, &req.labels).await?;

    Ok((StatusCode::CREATED, Json(SubmitRes { id: stored.id })))
}

#[utoipa::path(
    get,
    path = "/records/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Document kind (person or info)"),
        ("id" = String, Path, description = "Storage ID")
    ),
    responses(
        (status = 200, description = "Stored document as form data", body = FormRes),
        (status = 404, description = "Unknown document kind"),
        (status = 502, description = "Code lookup or storage failed")
    )
)]
/// Downloads a stored document and extracts its form data.
async fn fetch_record(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<FormRes>, ApiError> {
    let kind: DocumentKind = kind.parse()?;
    let form = state.records.fetch(kind, &id).await?;

    Ok(Json(FormRes { form }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use clinic_core::StaticCodeSource;
    use ehr::CodeEntry;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app() -> Router {
        let source = StaticCodeSource::new()
            .with_table(
                "countries",
                vec![
                    CodeEntry::new("SY", "countries", "Syria"),
                    CodeEntry::new("AF", "countries", "Afghanistan"),
                ],
            )
            .with_table(
                "gender",
                vec![CodeEntry::new("SNOMED-248152002", "gender", "Female")],
            );
        let source: Arc<dyn CodeSource> = Arc::new(source);
        // nothing listens on port 9: storage calls fail
        let cfg = CoreConfig::new("http://127.0.0.1:9/api", "http://127.0.0.1:9/api", None).unwrap();

        router(Arc::new(RecordService::with_source(source, &cfg)))
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        dispatch(app, request).await
    }

    async fn send_raw(app: Router, uri: &str, body: &'static str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        dispatch(app, request).await
    }

    async fn dispatch(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
    }

    #[tokio::test]
    async fn test_get_spec_lists_code_categories() {
        let (status, body) = send(app(), "GET", "/specs/info", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["archetype"], json!("openEHR-EHR-ADMIN_ENTRY.info.v1"));
        assert_eq!(body["code_categories"], json!(["countries"]));
        assert_eq!(body["fields"][0], json!({ "type": "fixedValue", "ehrPath": "/category", "value": "info" }));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_not_found() {
        let (status, body) = send(app(), "GET", "/specs/visit", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], json!("error"));
        assert_eq!(body["message"], json!("unknown document kind 'visit'"));
    }

    #[tokio::test]
    async fn test_compose_then_extract() {
        let form = json!({ "countryOfOrigin": "SY", "householdSize": 5, "transitCountries": [] });

        let (status, body) =
            send(app(), "POST", "/compose/info", Some(json!({ "form": form }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["document"]["/migration/origin/country"], json!("countries::SY|Syria|"));
        assert_eq!(body["document"]["/household/size"], json!(5));

        let document = body["document"].clone();
        let (status, body) = send(
            app(),
            "POST",
            "/extract/info",
            Some(json!({ "document": document })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["form"], form);
    }

    #[tokio::test]
    async fn test_compose_validation_error_is_bad_request() {
        let (status, body) = send(
            app(),
            "POST",
            "/compose/info",
            Some(json!({ "form": { "countryOfOrigin": "XX" } })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], json!("error"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let (status, body) = send_raw(app(), "/compose/info", "{ not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], json!("error"));
        assert!(body["message"].is_string());

        let (status, body) = send_raw(app(), "/compose/info", r#"{ "data": {} }"#).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], json!("error"));
    }

    #[tokio::test]
    async fn test_extract_tolerates_legacy_document_values() {
        let (status, body) = send(
            app(),
            "POST",
            "/extract/info",
            Some(json!({
                "document": {
                    "/household/size": null,
                    "/health/body/weight": 62.5,
                    "/migration/origin/country": "countries::SY|Syria|"
                }
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["form"]["countryOfOrigin"], json!("SY"));
        assert!(body["form"].get("householdSize").is_none());
        assert!(body["form"].get("weight").is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_is_bad_gateway() {
        let (status, body) = send(
            app(),
            "POST",
            "/records/info",
            Some(json!({ "form": { "householdSize": 2 }, "labels": ["intake"] })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], json!("error"));
    }
}
