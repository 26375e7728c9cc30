//! Code tables and coded-text strings.
//!
//! Coded fields are stored in documents as `<category>::<id>|<title>|`. Two identifier prefixes
//! are special: `SNOMED-<id>` renders under the `SNOMED` terminology and `CODED-<id>` under
//! `local`. Every other identifier renders under the category of its code-table entry.

use crate::{EhrError, EhrResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const SNOMED_PREFIX: &str = "SNOMED-";
const CODED_PREFIX: &str = "CODED-";
const SNOMED_TERMINOLOGY: &str = "SNOMED";
const LOCAL_TERMINOLOGY: &str = "local";

static CODE_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<category>[^:|]+)::(?P<id>[^:|]+)\|(?P<title>.*)\|$")
        .expect("code string pattern is valid")
});

/// One entry of a code table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub id: String,
    pub category: String,
    pub title: String,
}

impl CodeEntry {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            title: title.into(),
        }
    }
}

/// Code tables keyed by category, resolved before a compose pass.
///
/// Tables are shared behind `Arc` so a cache can hand the same list to many spec loads.
#[derive(Clone, Debug, Default)]
pub struct CodeTables {
    tables: HashMap<String, Arc<Vec<CodeEntry>>>,
}

impl CodeTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: impl Into<String>, entries: Arc<Vec<CodeEntry>>) {
        self.tables.insert(category.into(), entries);
    }

    pub fn get(&self, category: &str) -> Option<&[CodeEntry]> {
        self.tables.get(category).map(|entries| entries.as_slice())
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<(String, Vec<CodeEntry>)> for CodeTables {
    fn from_iter<I: IntoIterator<Item = (String, Vec<CodeEntry>)>>(iter: I) -> Self {
        Self {
            tables: iter
                .into_iter()
                .map(|(category, entries)| (category, Arc::new(entries)))
                .collect(),
        }
    }
}

/// Renders the code identified by `key` as a coded-text string.
///
/// # Errors
///
/// - [`EhrError::UnknownCode`] if no entry in `codes` has the identifier `key`. The reported
///   category is the one shared by the table's entries, or empty for an empty table.
/// - [`EhrError::UnrenderableCode`] if the rendered terminology or identifier is empty or holds
///   `:` or `|`, since [`parse_code_string`] could not read it back.
pub fn code_to_string(key: &str, codes: &[CodeEntry]) -> EhrResult<String> {
    let entry = codes
        .iter()
        .find(|entry| entry.id == key)
        .ok_or_else(|| EhrError::UnknownCode {
            category: codes
                .first()
                .map(|entry| entry.category.clone())
                .unwrap_or_default(),
            id: key.to_string(),
        })?;

    let (terminology, id) = if let Some(id) = key.strip_prefix(SNOMED_PREFIX) {
        (SNOMED_TERMINOLOGY, id)
    } else if let Some(id) = key.strip_prefix(CODED_PREFIX) {
        (LOCAL_TERMINOLOGY, id)
    } else {
        (entry.category.as_str(), key)
    };

    if !is_code_component(terminology) || !is_code_component(id) {
        return Err(EhrError::UnrenderableCode {
            category: entry.category.clone(),
            id: key.to_string(),
        });
    }

    Ok(format!("{terminology}::{id}|{}|", entry.title))
}

fn is_code_component(text: &str) -> bool {
    !text.is_empty() && !text.contains([':', '|'])
}

/// Parses a coded-text string back into the code identifier.
///
/// Returns `None` for anything that does not match `<category>::<id>|<title>|` with a single
/// `::` separator. The title runs from the first `|` after the identifier to the final `|` and
/// may itself contain `|`.
pub fn parse_code_string(text: &str) -> Option<String> {
    let captures = CODE_STRING.captures(text)?;
    let category = &captures["category"];
    let id = &captures["id"];

    Some(match category {
        SNOMED_TERMINOLOGY => format!("{SNOMED_PREFIX}{id}"),
        LOCAL_TERMINOLOGY => format!("{CODED_PREFIX}{id}"),
        _ => id.to_string(),
    })
}
