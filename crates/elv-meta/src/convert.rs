//! Conversion from parsed YAML values into the typed [`MetadataBlock`].
//!
//! This is where the depth bound, the reserved-key check, and the tag
//! rejection are enforced structurally, after the textual pre-scan in the
//! parser has already refused anchors and aliases.

use chrono::{DateTime, Utc};
use elv_types::{is_reserved_key, MetaValue, MetadataBlock};
use serde_yaml::Value;

use crate::error::{MetaError, MetaResult};

/// Convert a parsed YAML header into a [`MetadataBlock`].
///
/// `Null` (an empty header) yields an empty block. Anything other than a
/// mapping at the top level is rejected.
pub fn block_from_yaml(value: Value, max_depth: usize) -> MetaResult<MetadataBlock> {
    let mapping = match value {
        Value::Null => return Ok(MetadataBlock::new()),
        Value::Mapping(m) => m,
        Value::Tagged(t) => {
            return Err(MetaError::UnsafeConstruct {
                construct: format!("tag {}", t.tag),
            })
        }
        _ => return Err(MetaError::TopLevelNotMapping),
    };

    let mut block = MetadataBlock::new();
    for (key, value) in mapping {
        let key = match key {
            Value::String(s) => s,
            _ => return Err(MetaError::NonStringKey),
        };
        if is_reserved_key(&key) {
            return Err(MetaError::ReservedKey(key));
        }

        match key.as_str() {
            "name" => block.name = Some(scalar_string(value, "name")?),
            "description" => block.description = Some(scalar_string(value, "description")?),
            "author" => block.author = Some(scalar_string(value, "author")?),
            "version" => block.version = Some(scalar_string(value, "version")?),
            "tags" => block.tags = string_list(value)?,
            "created" => block.created = Some(timestamp(value, "created")?),
            "modified" => block.modified = Some(timestamp(value, "modified")?),
            _ => {
                let converted = meta_from_yaml(value, 1, max_depth)?;
                block.extra.insert(key, converted);
            }
        }
    }
    Ok(block)
}

/// Convert an arbitrary YAML value into a [`MetaValue`], enforcing the depth
/// bound and rejecting tags and reserved keys at every level.
pub fn meta_from_yaml(value: Value, depth: usize, max_depth: usize) -> MetaResult<MetaValue> {
    if depth > max_depth {
        return Err(MetaError::DepthExceeded { max: max_depth });
    }
    match value {
        Value::Null => Ok(MetaValue::Null),
        Value::Bool(b) => Ok(MetaValue::Bool(b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(MetaValue::Int(i))
            } else {
                // Out-of-range integers and floats both land here.
                Ok(MetaValue::Float(n.as_f64().unwrap_or(f64::NAN)))
            }
        }
        Value::String(s) => Ok(MetaValue::Str(s)),
        Value::Sequence(items) => {
            let converted = items
                .into_iter()
                .map(|item| meta_from_yaml(item, depth + 1, max_depth))
                .collect::<MetaResult<Vec<_>>>()?;
            Ok(MetaValue::List(converted))
        }
        Value::Mapping(map) => {
            let mut converted = std::collections::BTreeMap::new();
            for (key, value) in map {
                let key = match key {
                    Value::String(s) => s,
                    _ => return Err(MetaError::NonStringKey),
                };
                if is_reserved_key(&key) {
                    return Err(MetaError::ReservedKey(key));
                }
                converted.insert(key, meta_from_yaml(value, depth + 1, max_depth)?);
            }
            Ok(MetaValue::Map(converted))
        }
        Value::Tagged(t) => Err(MetaError::UnsafeConstruct {
            construct: format!("tag {}", t.tag),
        }),
    }
}

/// Accept a scalar for a recognized string field, coercing numbers and bools
/// to their textual form (users write `version: 1.0` without quotes).
fn scalar_string(value: Value, key: &'static str) -> MetaResult<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(MetaError::InvalidFieldType {
            key,
            expected: "a scalar value",
        }),
    }
}

fn string_list(value: Value) -> MetaResult<Vec<String>> {
    match value {
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| scalar_string(item, "tags"))
            .collect(),
        // A single bare scalar is treated as a one-element list.
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            Ok(vec![scalar_string(value, "tags")?])
        }
        _ => Err(MetaError::InvalidFieldType {
            key: "tags",
            expected: "a list of strings",
        }),
    }
}

fn timestamp(value: Value, key: &'static str) -> MetaResult<DateTime<Utc>> {
    let text = match value {
        Value::String(s) => s,
        _ => {
            return Err(MetaError::InvalidFieldType {
                key,
                expected: "an RFC 3339 timestamp",
            })
        }
    };
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| MetaError::InvalidFieldType {
            key,
            expected: "an RFC 3339 timestamp",
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn recognized_fields_are_typed() {
        let block = block_from_yaml(
            yaml("name: Alpha\nversion: 1.2\ntags: [a, b]\ncreated: 2024-06-01T12:00:00Z\n"),
            10,
        )
        .unwrap();
        assert_eq!(block.name.as_deref(), Some("Alpha"));
        assert_eq!(block.version.as_deref(), Some("1.2"));
        assert_eq!(block.tags, vec!["a".to_string(), "b".to_string()]);
        assert!(block.created.is_some());
    }

    #[test]
    fn unknown_keys_land_in_extra() {
        let block = block_from_yaml(yaml("custom: 7\nflag: true\n"), 10).unwrap();
        assert_eq!(block.extra.get("custom"), Some(&MetaValue::Int(7)));
        assert_eq!(block.extra.get("flag"), Some(&MetaValue::Bool(true)));
    }

    #[test]
    fn reserved_keys_rejected_at_any_level() {
        let top = block_from_yaml(yaml("__proto__: x\n"), 10);
        assert!(matches!(top, Err(MetaError::ReservedKey(_))));

        let nested = block_from_yaml(yaml("outer:\n  constructor: x\n"), 10);
        assert!(matches!(nested, Err(MetaError::ReservedKey(_))));
    }

    #[test]
    fn depth_bound_is_enforced() {
        let deep = yaml("a:\n  b:\n    c:\n      d: 1\n");
        assert!(matches!(
            block_from_yaml(deep.clone(), 3),
            Err(MetaError::DepthExceeded { max: 3 })
        ));
        assert!(block_from_yaml(deep, 10).is_ok());
    }

    #[test]
    fn non_mapping_header_rejected() {
        assert!(matches!(
            block_from_yaml(yaml("- just\n- a\n- list\n"), 10),
            Err(MetaError::TopLevelNotMapping)
        ));
    }

    #[test]
    fn wrong_shape_for_recognized_field() {
        assert!(matches!(
            block_from_yaml(yaml("name: [not, scalar]\n"), 10),
            Err(MetaError::InvalidFieldType { key: "name", .. })
        ));
        assert!(matches!(
            block_from_yaml(yaml("created: not-a-date\n"), 10),
            Err(MetaError::InvalidFieldType { key: "created", .. })
        ));
    }
}
