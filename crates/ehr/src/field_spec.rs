//! Declarative field specifications.
//!
//! A [`FieldSpec`] describes how one logical field moves between form data and a flat document.
//! Spec tables are ordered lists of these rules; see [`crate::mapper`] for how they are
//! interpreted and [`crate::templates`] for the built-in tables.
//!
//! # Serialised form
//!
//! Tables can be written as YAML (or JSON) lists with a `type` tag and camelCase attributes:
//!
//! ```yaml
//! - type: value
//!   formPath: firstName
//!   ehrPath: /name/given
//! - type: quantity
//!   formPath: weight
//!   ehrPath: /body/weight
//!   unit: kg
//! - type: array
//!   formPath: documents
//!   ehrPath: /documents
//!   items:
//!     - type: value
//!       formPath: number
//!       ehrPath: number
//! ```

use crate::form::FormPath;
use crate::{EhrError, EhrResult};
use serde::{Deserialize, Serialize};

/// One declarative mapping rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldSpec", into = "RawFieldSpec")]
pub enum FieldSpec {
    /// Plain text copy.
    Value { form_path: FormPath, ehr_path: String },

    /// Base-10 integer, stored as a number.
    Integer { form_path: FormPath, ehr_path: String },

    /// Truthy form value, stored as `"true"`/`"false"`.
    Boolean { form_path: FormPath, ehr_path: String },

    /// Constant text written on every compose.
    FixedValue { ehr_path: String, value: String },

    /// Numeric magnitude stored as `"<value>,<unit>"`.
    Quantity {
        form_path: FormPath,
        ehr_path: String,
        unit: String,
    },

    /// Code identifier stored as `"<category>::<id>|<title>|"`.
    Code {
        form_path: FormPath,
        ehr_path: String,
        category: String,
    },

    /// Repeated group; `items` apply to each element under `<ehr_path>:<index>/`.
    Array {
        form_path: FormPath,
        ehr_path: String,
        items: Vec<FieldSpec>,
    },
}

impl FieldSpec {
    pub(crate) fn value(form_path: &'static str, ehr_path: &str) -> Self {
        FieldSpec::Value {
            form_path: FormPath::from_static(form_path),
            ehr_path: ehr_path.to_string(),
        }
    }

    pub(crate) fn integer(form_path: &'static str, ehr_path: &str) -> Self {
        FieldSpec::Integer {
            form_path: FormPath::from_static(form_path),
            ehr_path: ehr_path.to_string(),
        }
    }

    pub(crate) fn boolean(form_path: &'static str, ehr_path: &str) -> Self {
        FieldSpec::Boolean {
            form_path: FormPath::from_static(form_path),
            ehr_path: ehr_path.to_string(),
        }
    }

    pub(crate) fn fixed_value(ehr_path: &str, value: &str) -> Self {
        FieldSpec::FixedValue {
            ehr_path: ehr_path.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn quantity(form_path: &'static str, ehr_path: &str, unit: &str) -> Self {
        FieldSpec::Quantity {
            form_path: FormPath::from_static(form_path),
            ehr_path: ehr_path.to_string(),
            unit: unit.to_string(),
        }
    }

    pub(crate) fn code(form_path: &'static str, ehr_path: &str, category: &str) -> Self {
        FieldSpec::Code {
            form_path: FormPath::from_static(form_path),
            ehr_path: ehr_path.to_string(),
            category: category.to_string(),
        }
    }

    pub(crate) fn array(form_path: &'static str, ehr_path: &str, items: Vec<FieldSpec>) -> Self {
        FieldSpec::Array {
            form_path: FormPath::from_static(form_path),
            ehr_path: ehr_path.to_string(),
            items,
        }
    }

    /// The `type` tag used in serialised tables.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldSpec::Value { .. } => "value",
            FieldSpec::Integer { .. } => "integer",
            FieldSpec::Boolean { .. } => "boolean",
            FieldSpec::FixedValue { .. } => "fixedValue",
            FieldSpec::Quantity { .. } => "quantity",
            FieldSpec::Code { .. } => "code",
            FieldSpec::Array { .. } => "array",
        }
    }

    pub fn ehr_path(&self) -> &str {
        match self {
            FieldSpec::Value { ehr_path, .. }
            | FieldSpec::Integer { ehr_path, .. }
            | FieldSpec::Boolean { ehr_path, .. }
            | FieldSpec::FixedValue { ehr_path, .. }
            | FieldSpec::Quantity { ehr_path, .. }
            | FieldSpec::Code { ehr_path, .. }
            | FieldSpec::Array { ehr_path, .. } => ehr_path,
        }
    }

    /// The form path, or `None` for `fixedValue`.
    pub fn form_path(&self) -> Option<&FormPath> {
        match self {
            FieldSpec::FixedValue { .. } => None,
            FieldSpec::Value { form_path, .. }
            | FieldSpec::Integer { form_path, .. }
            | FieldSpec::Boolean { form_path, .. }
            | FieldSpec::Quantity { form_path, .. }
            | FieldSpec::Code { form_path, .. }
            | FieldSpec::Array { form_path, .. } => Some(form_path),
        }
    }

    /// Code-table categories referenced by `specs`, including inside arrays.
    ///
    /// Deduplicated, in first-seen order.
    pub fn code_categories(specs: &[FieldSpec]) -> Vec<String> {
        fn collect(specs: &[FieldSpec], out: &mut Vec<String>) {
            for spec in specs {
                match spec {
                    FieldSpec::Code { category, .. } => {
                        if !out.iter().any(|seen| seen == category) {
                            out.push(category.clone());
                        }
                    }
                    FieldSpec::Array { items, .. } => collect(items, out),
                    _ => {}
                }
            }
        }

        let mut out = Vec::new();
        collect(specs, &mut out);
        out
    }
}

/// Untyped serialised shape of a [`FieldSpec`].
///
/// Only used at the serialisation boundary; convert with `FieldSpec::try_from`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawFieldSpec {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    form_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ehr_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Vec<RawFieldSpec>>,
}

impl RawFieldSpec {
    fn require<T>(&self, field: Option<T>, attribute: &'static str) -> EhrResult<T> {
        field.ok_or_else(|| EhrError::MissingAttribute {
            kind: self.kind.clone(),
            attribute,
        })
    }

    fn form_path(&self) -> EhrResult<FormPath> {
        FormPath::parse(self.require(self.form_path.as_deref(), "formPath")?)
    }

    fn ehr_path(&self) -> EhrResult<String> {
        self.require(self.ehr_path.clone(), "ehrPath")
    }
}

impl TryFrom<RawFieldSpec> for FieldSpec {
    type Error = EhrError;

    fn try_from(raw: RawFieldSpec) -> Result<Self, Self::Error> {
        let spec = match raw.kind.as_str() {
            "value" => FieldSpec::Value {
                form_path: raw.form_path()?,
                ehr_path: raw.ehr_path()?,
            },
            "integer" => FieldSpec::Integer {
                form_path: raw.form_path()?,
                ehr_path: raw.ehr_path()?,
            },
            "boolean" => FieldSpec::Boolean {
                form_path: raw.form_path()?,
                ehr_path: raw.ehr_path()?,
            },
            "fixedValue" => FieldSpec::FixedValue {
                ehr_path: raw.ehr_path()?,
                value: raw.require(raw.value.clone(), "value")?,
            },
            "quantity" => FieldSpec::Quantity {
                form_path: raw.form_path()?,
                ehr_path: raw.ehr_path()?,
                unit: raw.require(raw.unit.clone(), "unit")?,
            },
            "code" => FieldSpec::Code {
                form_path: raw.form_path()?,
                ehr_path: raw.ehr_path()?,
                category: raw.require(raw.category.clone(), "category")?,
            },
            "array" => FieldSpec::Array {
                form_path: raw.form_path()?,
                ehr_path: raw.ehr_path()?,
                items: raw
                    .require(raw.items.clone(), "items")?
                    .into_iter()
                    .map(FieldSpec::try_from)
                    .collect::<EhrResult<Vec<_>>>()?,
            },
            other => return Err(EhrError::UnknownFieldType(other.to_string())),
        };

        Ok(spec)
    }
}

impl From<FieldSpec> for RawFieldSpec {
    fn from(spec: FieldSpec) -> Self {
        let kind = spec.type_name().to_string();
        let form_path = spec.form_path().map(|path| path.as_str().to_string());
        let ehr_path = Some(spec.ehr_path().to_string());

        let mut raw = RawFieldSpec {
            kind,
            form_path,
            ehr_path,
            ..RawFieldSpec::default()
        };

        match spec {
            FieldSpec::FixedValue { value, .. } => raw.value = Some(value),
            FieldSpec::Quantity { unit, .. } => raw.unit = Some(unit),
            FieldSpec::Code { category, .. } => raw.category = Some(category),
            FieldSpec::Array { items, .. } => {
                raw.items = Some(items.into_iter().map(RawFieldSpec::from).collect())
            }
            FieldSpec::Value { .. } | FieldSpec::Integer { .. } | FieldSpec::Boolean { .. } => {}
        }

        raw
    }
}

/// Parses a spec table from YAML.
///
/// The YAML is first read against the untyped schema (reporting the failing path, for example
/// `[2].items[0].unit`), then each entry is checked for a known `type` and its required
/// attributes.
///
/// # Errors
///
/// - [`EhrError::Schema`] if the YAML does not match the table schema.
/// - [`EhrError::UnknownFieldType`] if an entry has an unrecognised `type`.
/// - [`EhrError::MissingAttribute`] if an entry lacks an attribute its type requires.
/// - [`EhrError::InvalidFormPath`] if a `formPath` is malformed.
pub fn parse_spec_table_yaml(yaml_text: &str) -> EhrResult<Vec<FieldSpec>> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

    let raw = match serde_path_to_error::deserialize::<_, Vec<RawFieldSpec>>(deserializer) {
        Ok(parsed) => parsed,
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() {
                "<root>"
            } else {
                path.as_str()
            };
            return Err(EhrError::Schema(format!("at {path}: {source}")));
        }
    };

    raw.into_iter().map(FieldSpec::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
- type: value
  formPath: firstName
  ehrPath: /name/given
- type: fixedValue
  ehrPath: /language
  value: en
- type: quantity
  formPath: weight
  ehrPath: /body/weight
  unit: kg
- type: array
  formPath: documents
  ehrPath: /documents
  items:
    - type: code
      formPath: type
      ehrPath: type
      category: documentTypes
    - type: value
      formPath: number
      ehrPath: number
"#;

    #[test]
    fn test_parse_spec_table_yaml_reads_every_type() {
        let specs = parse_spec_table_yaml(TABLE).expect("valid table");

        assert_eq!(specs.len(), 4);
        assert_eq!(specs[0], FieldSpec::value("firstName", "/name/given"));
        assert_eq!(specs[1], FieldSpec::fixed_value("/language", "en"));
        assert_eq!(specs[2], FieldSpec::quantity("weight", "/body/weight", "kg"));
        assert_eq!(
            specs[3],
            FieldSpec::array(
                "documents",
                "/documents",
                vec![
                    FieldSpec::code("type", "type", "documentTypes"),
                    FieldSpec::value("number", "number"),
                ]
            )
        );
    }

    #[test]
    fn test_parse_spec_table_yaml_rejects_unknown_type() {
        let yaml = "- type: date\n  formPath: dob\n  ehrPath: /birth/date\n";
        let err = parse_spec_table_yaml(yaml).expect_err("unknown type");
        assert!(matches!(err, EhrError::UnknownFieldType(kind) if kind == "date"));
    }

    #[test]
    fn test_parse_spec_table_yaml_rejects_unknown_nested_type() {
        let yaml = r#"
- type: array
  formPath: items
  ehrPath: /items
  items:
    - type: mystery
      formPath: x
      ehrPath: x
"#;
        let err = parse_spec_table_yaml(yaml).expect_err("unknown nested type");
        assert!(matches!(err, EhrError::UnknownFieldType(kind) if kind == "mystery"));
    }

    #[test]
    fn test_parse_spec_table_yaml_reports_missing_attribute() {
        let yaml = "- type: quantity\n  formPath: height\n  ehrPath: /body/height\n";
        let err = parse_spec_table_yaml(yaml).expect_err("missing unit");
        assert!(matches!(
            err,
            EhrError::MissingAttribute { kind, attribute } if kind == "quantity" && attribute == "unit"
        ));
    }

    #[test]
    fn test_parse_spec_table_yaml_reports_schema_path() {
        let yaml = "- type: value\n  formPath: a\n  ehrPath: /a\n  colour: red\n";
        let err = parse_spec_table_yaml(yaml).expect_err("unknown attribute");
        assert!(matches!(err, EhrError::Schema(msg) if msg.contains("colour")));
    }

    #[test]
    fn test_serialise_uses_camel_case_tags() {
        let spec = FieldSpec::code("nationality", "/nationality", "countries");
        let json = serde_json::to_value(&spec).expect("serialise");

        assert_eq!(
            json,
            serde_json::json!({
                "type": "code",
                "formPath": "nationality",
                "ehrPath": "/nationality",
                "category": "countries"
            })
        );
    }

    #[test]
    fn test_code_categories_are_deduplicated_in_order() {
        let specs = vec![
            FieldSpec::code("nationality", "/nationality", "countries"),
            FieldSpec::code("gender", "/gender", "gender"),
            FieldSpec::array(
                "family",
                "/family",
                vec![FieldSpec::code("nationality", "nationality", "countries")],
            ),
            FieldSpec::code("status", "/status", "maritalStatus"),
        ];

        assert_eq!(
            FieldSpec::code_categories(&specs),
            vec!["countries", "gender", "maritalStatus"]
        );
    }
}
