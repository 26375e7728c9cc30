//! # Clinic Core
//!
//! Service layer of the clinic record front-end.
//!
//! This crate connects the pure mapping engine in [`ehr`] to the outside world:
//! - Code tables fetched from the lookup service and cached for the session
//! - Per-document-kind spec tables, built in or overridden from YAML files
//! - Multipart upload and download of documents at the storage service
//!
//! **No API concerns**: HTTP servers and command-line handling belong in the `clinic-run` and
//! `clinic-cli` binaries.

pub mod codes;
pub mod config;
pub mod constants;
pub mod error;
mod http;
pub mod records;
pub mod specs;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use codes::{CodeCache, CodeSource, HttpCodeSource, StaticCodeSource};
pub use config::CoreConfig;
pub use error::{ClinicError, ClinicResult};
pub use records::RecordService;
pub use specs::{DocumentKind, LoadedSpec, SpecLoader};
pub use storage::{StorageClient, StoredDocument};
