//! Patient registration (`person`) document.
//!
//! Identity, contact details, identity documents and family members captured by the
//! registration wizard.

use super::{COUNTRIES, GENDER, MARITAL_STATUS};
use crate::field_spec::FieldSpec;

/// Archetype the `person` document is stored under.
pub const ARCHETYPE_ID: &str = "openEHR-DEMOGRAPHIC-PERSON.person.v1";

/// Returns the `person` spec table.
pub fn field_specs() -> Vec<FieldSpec> {
    vec![
        FieldSpec::fixed_value("/category", "person"),
        FieldSpec::value("firstName", "/identities/name/given"),
        FieldSpec::value("middleName", "/identities/name/middle"),
        FieldSpec::value("lastName", "/identities/name/family"),
        FieldSpec::value("fatherName", "/identities/name/father"),
        FieldSpec::value("dateOfBirth", "/details/birth/date"),
        FieldSpec::code("gender", "/details/gender", GENDER),
        FieldSpec::code("nationality", "/details/nationality", COUNTRIES),
        FieldSpec::code("maritalStatus", "/details/marital_status", MARITAL_STATUS),
        FieldSpec::value("phoneNumber", "/contacts/phone"),
        FieldSpec::value("email", "/contacts/email"),
        FieldSpec::value("address.street", "/contacts/address/street"),
        FieldSpec::value("address.city", "/contacts/address/city"),
        FieldSpec::code("address.country", "/contacts/address/country", COUNTRIES),
        FieldSpec::array(
            "documents",
            "/identities/documents",
            vec![
                FieldSpec::value("type", "type"),
                FieldSpec::value("number", "number"),
                FieldSpec::code("issuer", "issuer", COUNTRIES),
            ],
        ),
        FieldSpec::array(
            "familyMembers",
            "/relationships/family",
            vec![
                FieldSpec::value("relation", "relation"),
                FieldSpec::value("firstName", "name/given"),
                FieldSpec::value("lastName", "name/family"),
                FieldSpec::value("dateOfBirth", "birth/date"),
                FieldSpec::code("nationality", "nationality", COUNTRIES),
                FieldSpec::boolean("livingTogether", "living_together"),
            ],
        ),
    ]
}
