//! Form to openEHR flat document mapping.
//!
//! This crate translates between the nested form values produced by the clinic's data-entry
//! screens and the flat, archetype-path keyed documents exchanged with the clinical-record
//! store. The translation is driven by declarative [`FieldSpec`] tables: one entry per logical
//! field, interpreted in both directions by [`mapper`].
//!
//! The crate performs no I/O. Code tables are resolved by the caller (see `clinic-core`) and
//! passed in as [`CodeTables`].

pub mod codes;
pub mod data_types;
pub mod document;
pub mod field_spec;
pub mod form;
pub mod mapper;
pub mod templates;

pub use codes::{code_to_string, parse_code_string, CodeEntry, CodeTables};
pub use data_types::{ArchetypeId, RmPackage};
pub use document::{Document, DocumentValue};
pub use field_spec::{parse_spec_table_yaml, FieldSpec};
pub use form::FormData;
pub use mapper::{compose_document, extract_form_data, Mapper, MAX_ARRAY_ELEMENTS};

/// Errors returned by the `ehr` mapping crate.
#[derive(Debug, thiserror::Error)]
pub enum EhrError {
    #[error("unknown field spec type '{0}'")]
    UnknownFieldType(String),

    #[error("field spec of type '{kind}' is missing '{attribute}'")]
    MissingAttribute {
        kind: String,
        attribute: &'static str,
    },

    #[error("invalid value at form path '{path}': {reason}")]
    Validation { path: String, reason: String },

    #[error("no code table loaded for category '{0}'")]
    MissingCodeTable(String),

    #[error("code '{id}' not found in code table '{category}'")]
    UnknownCode { category: String, id: String },

    #[error("code '{id}' in table '{category}' cannot be written as a coded-text string")]
    UnrenderableCode { category: String, id: String },

    #[error("invalid form path '{0}'")]
    InvalidFormPath(String),

    #[error("invalid archetype id: {0}")]
    InvalidArchetypeId(String),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("spec table schema mismatch: {0}")]
    Schema(String),
}

/// Type alias for Results that can fail with an [`EhrError`].
pub type EhrResult<T> = Result<T, EhrError>;
