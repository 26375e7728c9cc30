//! Built-in spec tables.
//!
//! One table per document kind. Each table names the code-table categories it needs; callers
//! resolve those (see `clinic-core`) before composing.

pub mod info;
pub mod person;

/// Code-table category for countries (nationality, country of origin, transit countries).
pub const COUNTRIES: &str = "countries";

/// Code-table category for administrative gender.
pub const GENDER: &str = "gender";

/// Code-table category for marital status.
pub const MARITAL_STATUS: &str = "maritalStatus";
