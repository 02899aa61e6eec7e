//! YAML layer parsing and overlay.
//!
//! Layers are applied in order, each one overlaying the mappings merged so
//! far. Rules:
//! - an empty or comment-only layer contributes nothing
//! - a layer's top level must be a mapping
//! - a `null` value (`key:` with nothing after it) does not unset the earlier value
//! - mappings overlay key by key; any other value (scalar, list) replaces
//!   the earlier value wholesale

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

/// Parse one YAML layer. `Ok(None)` means the layer has no content.
fn parse_layer(index: usize, raw: &str) -> Result<Option<Map<String, Value>>> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(raw).with_context(|| format!("config layer {index}: invalid yaml"))?;
    let json = serde_json::to_value(yaml)
        .with_context(|| format!("config layer {index}: yaml->json conversion failed"))?;

    match json {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => bail!(
            "config layer {index}: top level must be a mapping (got {})",
            kind_of(&other)
        ),
    }
}

/// Merge `yaml_docs` in order into one mapping.
pub(crate) fn merge_layers(yaml_docs: &[&str]) -> Result<Value> {
    let mut merged = Map::new();
    for (index, raw) in yaml_docs.iter().enumerate() {
        if let Some(layer) = parse_layer(index, raw)? {
            overlay(&mut merged, layer);
        }
    }
    Ok(Value::Object(merged))
}

fn overlay(base: &mut Map<String, Value>, layer: Map<String, Value>) {
    for (key, incoming) in layer {
        match incoming {
            Value::Null => {
                // Keep an earlier value; record the key only if nothing set it yet.
                base.entry(key).or_insert(Value::Null);
            }
            Value::Object(nested) => match base.get_mut(&key) {
                Some(Value::Object(existing)) => overlay(existing, nested),
                _ => {
                    base.insert(key, Value::Object(nested));
                }
            },
            replacement => {
                base.insert(key, replacement);
            }
        }
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
