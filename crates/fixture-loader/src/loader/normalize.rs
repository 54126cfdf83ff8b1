//! Conversion of raw reference field values into [`Reference`]s.

use serde_json::Value;

use super::discovery::RecordFields;
use crate::error::ConfigError;
use crate::factory::Relationships;
use crate::identifier::{FieldValue, RawRecordData, Reference};

/// Normalizes the reference fields of every record of `class_name`.
///
/// Fields not declared in `relationships` pass through as literals.
pub fn normalize_records(
    class_name: &str,
    records: Vec<(String, RecordFields)>,
    relationships: &Relationships,
) -> Result<Vec<(String, RawRecordData)>, ConfigError> {
    let mut normalized = Vec::with_capacity(records.len());

    for (key, fields) in records {
        let mut data = RawRecordData::with_capacity(fields.len());
        for (field, value) in fields {
            if !relationships.contains(&field) {
                data.insert(field, FieldValue::Literal(value));
                continue;
            }

            let references = normalize_identifiers(&value, relationships.target(&field))
                .map_err(|reason| ConfigError::UnresolvableReference {
                    class_name: class_name.to_string(),
                    field: field.clone(),
                    value: value.to_string(),
                    reason,
                })?;
            data.insert(field, shape(&value, references));
        }
        normalized.push((key, data));
    }

    Ok(normalized)
}

/// Lists are always to-many, even with a single element; anything else
/// resolving to at most one reference is to-one.
fn shape(raw: &Value, references: Vec<Reference>) -> FieldValue {
    match raw {
        Value::Array(_) => FieldValue::References(references),
        _ if references.len() <= 1 => FieldValue::Reference(references.into_iter().next()),
        _ => FieldValue::References(references),
    }
}

/// Converts a raw reference value into references.
///
/// Accepted shapes:
/// - `null` or an empty string: no reference
/// - `"key"` (or a number): a key of `default_class`, taken verbatim
/// - `"class(key)"`, `"class(k1, k2)"`: explicit class, only on fields
///   without a default class
/// - `{class: ..., key: ...}`: explicit class, `class_name` also accepted
/// - a list of any of the above
pub fn normalize_identifiers(
    value: &Value,
    default_class: Option<&str>,
) -> Result<Vec<Reference>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => parse_reference_str(s, default_class),
        Value::Number(n) => bare_key(&n.to_string(), default_class).map(|r| vec![r]),
        Value::Array(items) => {
            let mut references = Vec::with_capacity(items.len());
            for item in items {
                if item.is_array() {
                    return Err("nested lists are not references".to_string());
                }
                references.extend(normalize_identifiers(item, default_class)?);
            }
            Ok(references)
        }
        Value::Object(map) => {
            let class_name = map
                .get("class")
                .or_else(|| map.get("class_name"))
                .and_then(Value::as_str)
                .or(default_class)
                .ok_or_else(|| "mapping has no `class` and the field has no target class".to_string())?;
            let key = match map.get("key") {
                Some(Value::String(key)) => key.clone(),
                Some(Value::Number(key)) => key.to_string(),
                _ => return Err("mapping has no string `key`".to_string()),
            };
            Ok(vec![Reference::new(class_name, key)])
        }
        Value::Bool(_) => Err("booleans are not references".to_string()),
    }
}

fn parse_reference_str(s: &str, default_class: Option<&str>) -> Result<Vec<Reference>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(class_name) = default_class {
        return Ok(vec![Reference::new(class_name, s)]);
    }

    let Some((class_name, keys)) = s
        .strip_suffix(')')
        .and_then(|rest| rest.split_once('('))
        .filter(|(class_name, _)| is_identifier(class_name.trim()))
    else {
        return Err("bare key on a field without a target class".to_string());
    };
    Ok(keys
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| Reference::new(class_name.trim(), key))
        .collect())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn bare_key(key: &str, default_class: Option<&str>) -> Result<Reference, String> {
    default_class
        .map(|class_name| Reference::new(class_name, key))
        .ok_or_else(|| "bare key on a field without a target class".to_string())
}
