//! Config content hashing.
//!
//! The raw config is serialized to JSON, object keys are sorted recursively,
//! and the canonical string is hashed with SHA-256. Two files that differ
//! only in key order or YAML formatting hash identically.

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::RawAccountConfig;

/// Hex SHA-256 of the canonicalized config.
pub fn config_hash(raw: &RawAccountConfig) -> Result<String> {
    let value = serde_json::to_value(raw).context("serialize config for hashing")?;
    let canonical = canonical_json(&value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// JSON with recursively sorted object keys and no insignificant whitespace.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let fields: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", fields.join(","))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
