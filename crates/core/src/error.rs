use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown document kind '{0}'")]
    UnknownDocumentKind(String),
    #[error("mapping error: {0}")]
    Ehr(#[from] ehr::EhrError),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{service} service returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize document: {0}")]
    Serialization(serde_json::Error),
    #[error("invalid code table file: {0}")]
    CodeTableFile(String),
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
