//! Background information (`info`) document.
//!
//! Migration history, household and general health background recorded after registration.
//! Only the country code table is needed.

use super::COUNTRIES;
use crate::field_spec::FieldSpec;

/// Archetype the `info` document is stored under.
pub const ARCHETYPE_ID: &str = "openEHR-EHR-ADMIN_ENTRY.info.v1";

/// Returns the `info` spec table.
pub fn field_specs() -> Vec<FieldSpec> {
    vec![
        FieldSpec::fixed_value("/category", "info"),
        FieldSpec::code("countryOfOrigin", "/migration/origin/country", COUNTRIES),
        FieldSpec::value("placeOfOrigin", "/migration/origin/place"),
        FieldSpec::value("dateOfLeaving", "/migration/origin/left_on"),
        FieldSpec::value("dateOfArrival", "/migration/arrival/date"),
        FieldSpec::array(
            "transitCountries",
            "/migration/transit",
            vec![
                FieldSpec::code("country", "country", COUNTRIES),
                FieldSpec::integer("durationInMonths", "duration_months"),
            ],
        ),
        FieldSpec::value("occupation", "/background/occupation"),
        FieldSpec::integer("yearsOfEducation", "/background/education/years"),
        FieldSpec::integer("householdSize", "/household/size"),
        FieldSpec::boolean("unaccompaniedMinor", "/household/unaccompanied_minor"),
        FieldSpec::boolean("disability", "/health/disability/present"),
        FieldSpec::value("disabilityDescription", "/health/disability/description"),
        FieldSpec::boolean("pregnant", "/health/pregnancy/present"),
        FieldSpec::quantity("height", "/health/body/height", "cm"),
        FieldSpec::quantity("weight", "/health/body/weight", "kg"),
    ]
}
