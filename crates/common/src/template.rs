//! Template placeholder substitution
//!
//! Served markup carries paired sentinel comments per named key:
//!
//! ```text
//! /** REPLACED_WITH_FEATURE_FLAGS_START **/ {} /** REPLACED_WITH_FEATURE_FLAGS_END **/
//! ```
//!
//! Substitution replaces everything from the start marker through the end
//! marker (markers included) with the JSON encoding of the supplied value,
//! leaving the surrounding markup untouched. The build tool and the test
//! interception layer use the same mechanism with different key sets.

use serde_json::Value;

use crate::error::{Error, Result};

/// One keyed substitution into a template
#[derive(Debug, Clone)]
pub struct Replacement {
    pub key: String,
    pub value: Value,
}

impl Replacement {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

fn start_marker(key: &str) -> String {
    format!("/** REPLACED_WITH_{key}_START **/")
}

fn end_marker(key: &str) -> String {
    format!("/** REPLACED_WITH_{key}_END **/")
}

/// Replace the marker pair for one key with the JSON encoding of `value`.
pub fn replace_for_key(template: &str, key: &str, value: &Value) -> Result<String> {
    let start = start_marker(key);
    let end = end_marker(key);

    let start_index = template
        .find(&start)
        .ok_or_else(|| Error::MissingTemplateMarker {
            key: key.to_string(),
        })?;
    let end_index = template[start_index..]
        .find(&end)
        .map(|i| start_index + i + end.len())
        .ok_or_else(|| Error::MissingTemplateMarker {
            key: key.to_string(),
        })?;

    let mut out = String::with_capacity(template.len());
    out.push_str(&template[..start_index]);
    out.push_str(&serde_json::to_string(value)?);
    out.push_str(&template[end_index..]);
    Ok(out)
}

/// Fold a list of replacements over a template, in order.
pub fn replace_many(template: &str, replacements: &[Replacement]) -> Result<String> {
    replacements.iter().try_fold(
        template.to_string(),
        |current, Replacement { key, value }| replace_for_key(&current, key, value),
    )
}
