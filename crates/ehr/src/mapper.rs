//! Field-spec interpreter.
//!
//! [`compose_document`] walks a spec table and writes form values into a flat document;
//! [`extract_form_data`] walks the same table in reverse. Both are pure.
//!
//! Composition is sparse: a form path that is absent (or `null`) never produces a document key,
//! except for `fixedValue` rules, which always write. Extraction is lenient: stored quantity or
//! code strings that do not parse are skipped rather than reported, so documents written by
//! older spec versions still open.
//!
//! Array elements are namespaced under `<prefix><ehr_path>:<index>/`. Array length is not
//! stored; extraction reads elements from index 0 until the first element with no populated
//! value. An array whose index 0 is missing therefore extracts as empty.

use crate::codes::{code_to_string, parse_code_string, CodeTables};
use crate::document::{Document, DocumentValue};
use crate::field_spec::FieldSpec;
use crate::form::{is_populated, FormData, FormPath};
use crate::{EhrError, EhrResult};
use serde_json::{Map, Number, Value};

/// Upper bound on elements read from a single array during extraction.
pub const MAX_ARRAY_ELEMENTS: usize = 1024;

/// A spec table paired with the code tables its `code` rules need.
#[derive(Clone, Copy, Debug)]
pub struct Mapper<'a> {
    specs: &'a [FieldSpec],
    codes: &'a CodeTables,
}

impl<'a> Mapper<'a> {
    pub fn new(specs: &'a [FieldSpec], codes: &'a CodeTables) -> Self {
        Self { specs, codes }
    }

    pub fn specs(&self) -> &'a [FieldSpec] {
        self.specs
    }

    /// See [`compose_document`].
    pub fn compose_document(
        &self,
        base: Document,
        form: &FormData,
        path_prefix: &str,
    ) -> EhrResult<Document> {
        compose_document(self.specs, self.codes, base, form, path_prefix)
    }

    /// See [`extract_form_data`].
    pub fn extract_form_data(
        &self,
        base: FormData,
        document: &Document,
        path_prefix: &str,
    ) -> FormData {
        extract_form_data(self.specs, base, document, path_prefix)
    }
}

/// Writes `form` into `base` according to `specs`.
///
/// Specs are applied in order; each writes only its own key(s).
///
/// # Errors
///
/// - [`EhrError::Validation`] if a present form value has the wrong shape for its rule: a
///   non-integer for `integer`, a non-number for `quantity`, an object or array for `value`, or a
///   non-array for `array`.
/// - [`EhrError::MissingCodeTable`] if a `code` rule's category is not in `codes`.
/// - [`EhrError::UnknownCode`] if a code identifier is not in its table.
/// - [`EhrError::UnrenderableCode`] if a code table entry cannot be written as a coded-text
///   string that extraction reads back.
pub fn compose_document(
    specs: &[FieldSpec],
    codes: &CodeTables,
    base: Document,
    form: &FormData,
    path_prefix: &str,
) -> EhrResult<Document> {
    let mut document = base;
    compose_into(specs, codes, &mut document, form.as_value(), path_prefix)?;
    Ok(document)
}

/// Reads `document` into `base` according to `specs`.
///
/// Never fails: keys that are absent or hold malformed values are skipped.
pub fn extract_form_data(
    specs: &[FieldSpec],
    base: FormData,
    document: &Document,
    path_prefix: &str,
) -> FormData {
    let mut form = base.into_value();
    extract_into(specs, &mut form, document, path_prefix);
    FormData::from(form)
}

fn element_prefix(path_prefix: &str, ehr_path: &str, index: usize) -> String {
    format!("{path_prefix}{ehr_path}:{index}/")
}

fn present<'v>(form: &'v Value, path: &FormPath) -> Option<&'v Value> {
    path.lookup(form).filter(|value| !value.is_null())
}

fn invalid(path: &FormPath, reason: impl Into<String>) -> EhrError {
    EhrError::Validation {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn compose_into(
    specs: &[FieldSpec],
    codes: &CodeTables,
    document: &mut Document,
    form: &Value,
    path_prefix: &str,
) -> EhrResult<()> {
    for spec in specs {
        let key = format!("{path_prefix}{}", spec.ehr_path());

        match spec {
            FieldSpec::FixedValue { value, .. } => {
                document.insert(key, value.as_str());
            }
            FieldSpec::Value { form_path, .. } => {
                if let Some(value) = present(form, form_path) {
                    document.insert(key, text_value(form_path, value)?);
                }
            }
            FieldSpec::Integer { form_path, .. } => {
                if let Some(value) = present(form, form_path) {
                    document.insert(key, integer_value(form_path, value)?);
                }
            }
            FieldSpec::Boolean { form_path, .. } => {
                if let Some(value) = present(form, form_path) {
                    let flag = if is_truthy(value) { "true" } else { "false" };
                    document.insert(key, flag);
                }
            }
            FieldSpec::Quantity {
                form_path, unit, ..
            } => {
                if let Some(value) = present(form, form_path) {
                    let magnitude = magnitude_text(form_path, value)?;
                    document.insert(key, format!("{magnitude},{unit}"));
                }
            }
            FieldSpec::Code {
                form_path,
                category,
                ..
            } => {
                if let Some(value) = present(form, form_path) {
                    let id = value
                        .as_str()
                        .ok_or_else(|| invalid(form_path, "code identifier must be a string"))?;
                    let table = codes
                        .get(category)
                        .ok_or_else(|| EhrError::MissingCodeTable(category.clone()))?;
                    let rendered = code_to_string(id, table).map_err(|err| match err {
                        EhrError::UnknownCode { .. } => EhrError::UnknownCode {
                            category: category.clone(),
                            id: id.to_string(),
                        },
                        other => other,
                    })?;
                    document.insert(key, rendered);
                }
            }
            FieldSpec::Array {
                form_path,
                ehr_path,
                items,
            } => {
                if let Some(value) = present(form, form_path) {
                    let elements = value
                        .as_array()
                        .ok_or_else(|| invalid(form_path, "expected an array"))?;
                    for (index, element) in elements.iter().enumerate() {
                        let prefix = element_prefix(path_prefix, ehr_path, index);
                        compose_into(items, codes, document, element, &prefix)?;
                    }
                }
            }
        }
    }

    Ok(())
}

fn text_value(path: &FormPath, value: &Value) -> EhrResult<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(invalid(path, "expected text, found a nested value")),
    }
}

fn integer_value(path: &FormPath, value: &Value) -> EhrResult<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| invalid(path, format!("'{n}' is not an integer"))),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(path, format!("'{text}' is not a base-10 integer"))),
        _ => Err(invalid(path, "expected an integer")),
    }
}

/// Numeric strings are written as the number they parse to, so `"070"` stores as `70`.
fn magnitude_text(path: &FormPath, value: &Value) -> EhrResult<String> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(text) => parse_magnitude(text)
            .map(|n| n.to_string())
            .ok_or_else(|| invalid(path, format!("'{text}' is not a number"))),
        _ => Err(invalid(path, "expected a number")),
    }
}

/// Parses a magnitude, preferring an integer over a float.
fn parse_magnitude(text: &str) -> Option<Number> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(Number::from(n));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn extract_into(specs: &[FieldSpec], form: &mut Value, document: &Document, path_prefix: &str) {
    for spec in specs {
        let key = format!("{path_prefix}{}", spec.ehr_path());

        if let FieldSpec::Array {
            form_path,
            ehr_path,
            items,
        } = spec
        {
            let elements = extract_array(items, document, path_prefix, ehr_path);
            form_path.assign(form, Value::Array(elements));
            continue;
        }

        let Some(stored) = document.get(&key) else {
            continue;
        };
        if let DocumentValue::Other(raw) = stored {
            tracing::debug!(key = %key, value = %raw, "skipping unsupported document value");
            continue;
        }

        match spec {
            FieldSpec::FixedValue { .. } | FieldSpec::Array { .. } => {}
            FieldSpec::Value { form_path, .. } | FieldSpec::Integer { form_path, .. } => {
                if let Some(value) = stored.to_json() {
                    form_path.assign(form, value);
                }
            }
            FieldSpec::Boolean { form_path, .. } => {
                let flag = matches!(stored, DocumentValue::Text(text) if text == "true");
                form_path.assign(form, Value::Bool(flag));
            }
            FieldSpec::Quantity {
                form_path, unit, ..
            } => match parse_quantity(stored, unit) {
                Some(magnitude) => form_path.assign(form, magnitude),
                None => tracing::debug!(key = %key, unit = %unit, "skipping malformed quantity"),
            },
            FieldSpec::Code { form_path, .. } => {
                match stored.as_text().and_then(parse_code_string) {
                    Some(id) => form_path.assign(form, Value::String(id)),
                    None => tracing::debug!(key = %key, "skipping malformed code string"),
                }
            }
        }
    }
}

fn extract_array(
    items: &[FieldSpec],
    document: &Document,
    path_prefix: &str,
    ehr_path: &str,
) -> Vec<Value> {
    let mut elements = Vec::new();

    for index in 0..MAX_ARRAY_ELEMENTS {
        let prefix = element_prefix(path_prefix, ehr_path, index);
        let mut element = Value::Object(Map::new());
        extract_into(items, &mut element, document, &prefix);

        if !is_populated(&element) {
            return elements;
        }
        elements.push(element);
    }

    tracing::warn!(
        ehr_path = %format!("{path_prefix}{ehr_path}"),
        limit = MAX_ARRAY_ELEMENTS,
        "array extraction stopped at the element limit"
    );
    elements
}

fn parse_quantity(stored: &DocumentValue, unit: &str) -> Option<Value> {
    let text = stored.as_text()?;
    let magnitude = text.strip_suffix(unit)?.strip_suffix(',')?;

    parse_magnitude(magnitude).map(Value::Number)
}
