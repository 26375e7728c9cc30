//! Constants used throughout the clinic core crate.

/// Environment variable naming the code lookup service base URL.
pub const CODES_URL_ENV: &str = "CLINIC_CODES_URL";

/// Environment variable naming the document storage service base URL.
pub const STORAGE_URL_ENV: &str = "CLINIC_STORAGE_URL";

/// Environment variable naming a directory of spec table overrides (`<kind>.yaml`).
pub const SPEC_DIR_ENV: &str = "CLINIC_SPEC_DIR";

/// Environment variable naming the REST listen address.
pub const REST_ADDR_ENV: &str = "CLINIC_REST_ADDR";

/// Default base URL for the code lookup service.
pub const DEFAULT_CODES_URL: &str = "http://localhost:8080/api";

/// Default base URL for the document storage service.
pub const DEFAULT_STORAGE_URL: &str = "http://localhost:8080/api";

/// Default REST listen address.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Path segment for code lookups: `GET <codes_url>/codes/<category>`.
pub const CODES_SEGMENT: &str = "codes";

/// Path segment for storage: `POST <storage_url>/storage`, `GET <storage_url>/storage/<id>`.
pub const STORAGE_SEGMENT: &str = "storage";

/// Content type of uploaded documents.
pub const DOCUMENT_CONTENT_TYPE: &str = "application/json";
