//! # Parser
//!
//! Flattens `yaml_config` into `KEY=VALUE` environment entries.
//!
//! Nested mapping keys are joined with `_`:
//!
//! ```yaml
//! database:
//!   host: db.internal
//!   replica:
//!     host: ro.db.internal
//! ```
//!
//! becomes `database_host=db.internal` and `database_replica_host=ro.db.internal`.
//! Only string leaves are emitted. Numbers, booleans, nulls and sequences are
//! dropped rather than stringified, so quote anything that must reach the layer.
//!
//! ## Env file format
//!
//! Entries are written as `KEY=VALUE` lines with no quoting or escaping. A value
//! containing a newline (e.g. a PEM key) is written verbatim and continues on
//! the following lines, where readers will see it as extra entries. Store
//! multi-line material base64-encoded or inside a JSON secret field that the
//! consumer decodes itself.

use crate::constants::KEY_SEPARATOR;
use crate::error::{LayerError, Result};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Flat environment mapping, ordered by key
pub type EnvMap = BTreeMap<String, String>;

/// Parse and flatten a YAML document
///
/// Empty input and an explicit YAML null yield an empty map.
///
/// # Errors
///
/// Returns `LayerError::ConfigParse` if the document is malformed or its top
/// level is not a mapping.
pub fn flatten(document: &str) -> Result<EnvMap> {
    let mut result = EnvMap::new();

    if document.trim().is_empty() {
        return Ok(result);
    }

    let yaml: serde_yaml::Value = serde_yaml::from_str(document)?;

    match &yaml {
        serde_yaml::Value::Mapping(_) => flatten_yaml_value(&yaml, String::new(), &mut result),
        serde_yaml::Value::Null => {}
        other => {
            return Err(LayerError::ConfigParse(format!(
                "expected a mapping at the top level, found {}",
                value_kind(other)
            )));
        }
    }

    debug!("Flattened yaml_config into {} entries", result.len());
    Ok(result)
}

pub(crate) fn flatten_yaml_value(value: &serde_yaml::Value, prefix: String, result: &mut EnvMap) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, val) in map {
                let Some(key_str) = key_to_string(key) else {
                    continue;
                };
                let new_prefix = if prefix.is_empty() {
                    key_str
                } else {
                    format!("{prefix}{KEY_SEPARATOR}{key_str}")
                };
                flatten_yaml_value(val, new_prefix, result);
            }
        }
        serde_yaml::Value::String(s) => {
            result.insert(prefix, s.clone());
        }
        // Non-string leaves are not coerced
        serde_yaml::Value::Number(_)
        | serde_yaml::Value::Bool(_)
        | serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Tagged(_) => {}
    }
}

fn key_to_string(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

/// Render entries as an env file, one `KEY=VALUE` line per entry
#[must_use]
pub fn render_env_file(entries: &EnvMap) -> String {
    let mut content = String::new();
    for (key, value) in entries {
        if value.contains('\n') {
            warn!("Value for {} spans multiple lines and is written unescaped", key);
        }
        content.push_str(key);
        content.push('=');
        content.push_str(value);
        content.push('\n');
    }
    content
}
