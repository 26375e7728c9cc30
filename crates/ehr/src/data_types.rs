//! openEHR identifiers used alongside flat documents.
//!
//! Documents are uploaded to storage with the archetype identifier of the template they were
//! composed for. [`ArchetypeId`] parses and validates that identifier so a malformed value is
//! caught before the upload rather than by the storage service.

use crate::{EhrError, EhrResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static ARCHETYPE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^openEHR-(?P<package>[A-Z]+)-(?P<class>[A-Z_]+)\.(?P<concept>[a-z0-9_]+)\.v(?P<version>[0-9]+)$",
    )
    .expect("archetype ID pattern is valid")
});

/// Reference-model package an archetype belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RmPackage {
    Ehr,
    Demographic,
}

impl RmPackage {
    pub fn as_str(self) -> &'static str {
        match self {
            RmPackage::Ehr => "EHR",
            RmPackage::Demographic => "DEMOGRAPHIC",
        }
    }
}

/// Parsed openEHR archetype identifier.
///
/// Canonical form is `openEHR-<PACKAGE>-<CLASS>.<concept>.v<version>`, for example
/// `openEHR-DEMOGRAPHIC-PERSON.person.v1`. The package is `EHR` or `DEMOGRAPHIC`, the class is
/// upper-case letters and `_`, the concept is lower-case letters, digits and `_`, and the version
/// is at least 1.
///
/// ```rust
/// # use ehr::data_types::ArchetypeId;
/// let id: ArchetypeId = "openEHR-EHR-COMPOSITION.encounter.v1".parse()?;
/// assert!(id.is_composition());
/// # Ok::<(), ehr::EhrError>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArchetypeId {
    pub rm_package: RmPackage,
    pub rm_class: String,
    pub concept: String,
    pub version: u32,
}

impl ArchetypeId {
    pub fn parse(raw: &str) -> EhrResult<Self> {
        let invalid = |reason: &str| EhrError::InvalidArchetypeId(format!("'{raw}': {reason}"));

        let caps = ARCHETYPE_ID_RE
            .captures(raw)
            .ok_or_else(|| invalid("expected openEHR-<PACKAGE>-<CLASS>.<concept>.v<n>"))?;

        let rm_package = match &caps["package"] {
            "EHR" => RmPackage::Ehr,
            "DEMOGRAPHIC" => RmPackage::Demographic,
            _ => return Err(invalid("package must be EHR or DEMOGRAPHIC")),
        };
        let version = caps["version"]
            .parse::<u32>()
            .ok()
            .filter(|v| *v >= 1)
            .ok_or_else(|| invalid("version must be at least 1"))?;

        Ok(Self {
            rm_package,
            rm_class: caps["class"].to_string(),
            concept: caps["concept"].to_string(),
            version,
        })
    }

    pub fn is_composition(&self) -> bool {
        self.rm_class == "COMPOSITION"
    }

    pub fn is_demographic(&self) -> bool {
        self.rm_package == RmPackage::Demographic
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "openEHR-{}-{}.{}.v{}",
            self.rm_package.as_str(),
            self.rm_class,
            self.concept,
            self.version
        )
    }
}

impl FromStr for ArchetypeId {
    type Err = EhrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ArchetypeId {
    type Error = EhrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ArchetypeId> for String {
    fn from(id: ArchetypeId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_demographic_person() {
        let id = ArchetypeId::parse("openEHR-DEMOGRAPHIC-PERSON.person.v1").unwrap();

        assert_eq!(id.rm_package, RmPackage::Demographic);
        assert_eq!(id.rm_class, "PERSON");
        assert_eq!(id.concept, "person");
        assert_eq!(id.version, 1);
        assert!(id.is_demographic());
        assert!(!id.is_composition());
    }

    #[test]
    fn test_parse_multi_digit_version() {
        let id: ArchetypeId = "openEHR-EHR-ADMIN_ENTRY.refugee_info.v12".parse().unwrap();
        assert_eq!(id.concept, "refugee_info");
        assert_eq!(id.version, 12);
    }

    #[test]
    fn test_display_round_trips() {
        let raw = "openEHR-EHR-COMPOSITION.encounter.v2";
        assert_eq!(ArchetypeId::parse(raw).unwrap().to_string(), raw);
    }

    #[test]
    fn test_parse_rejects_bad_components() {
        for raw in [
            "",
            "openEHR",
            "ISO-EHR-COMPOSITION.encounter.v1",
            "openEHR-RM-COMPOSITION.encounter.v1",
            "openEHR-EHR-composition.encounter.v1",
            "openEHR-EHR-COMPOSITION.Encounter.v1",
            "openEHR-EHR-COMPOSITION.encounter.v0",
            "openEHR-EHR-COMPOSITION.encounter.vX",
            "openEHR-EHR-COMPOSITION..v1",
        ] {
            let err = ArchetypeId::parse(raw).expect_err(raw);
            assert!(matches!(err, EhrError::InvalidArchetypeId(_)), "{raw}");
        }
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let id = ArchetypeId::parse("openEHR-EHR-ADMIN_ENTRY.info.v1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""openEHR-EHR-ADMIN_ENTRY.info.v1""#);

        let back: ArchetypeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<ArchetypeId>(r#""nope""#).is_err());
    }
}
