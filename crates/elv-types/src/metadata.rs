use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Keys that may never appear in a metadata block, at any nesting level.
///
/// These are the prototype-pollution names from dynamic-language object
/// models. The vault's metadata is strongly typed so the attack does not
/// apply here, but the names are rejected anyway so documents cannot carry
/// them to less careful consumers.
pub const RESERVED_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Returns `true` if the key is reserved.
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// A bounded metadata value: scalars, lists, and string-keyed maps.
///
/// Maps use `BTreeMap` so rendering is deterministic. Nesting depth is
/// limited by the parser, not by this type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<MetaValue>),
    Map(BTreeMap<String, MetaValue>),
}

impl MetaValue {
    /// Nesting depth of this value. Scalars are depth 1; each list or map
    /// level adds 1. An empty list or map is depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_) => 1,
            Self::List(items) => 1 + items.iter().map(Self::depth).max().unwrap_or(0),
            Self::Map(map) => 1 + map.values().map(Self::depth).max().unwrap_or(0),
        }
    }
}

/// Typed metadata header of an element document.
///
/// The recognized fields are the ones the vault's callers share; everything
/// else lands in `extra`, an explicitly bounded bag of [`MetaValue`]s. This
/// layer validates *safety*, not business schema: all fields are optional
/// here, and callers apply their own defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    /// Unrecognized fields, preserved verbatim (sorted by key). Flattened so
    /// they render as ordinary top-level header keys.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, MetaValue>,
}

impl MetadataBlock {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block with just a name, the common case in tests and fresh elements.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Insert an unrecognized field, rejecting reserved keys.
    pub fn insert_extra(
        &mut self,
        key: impl Into<String>,
        value: MetaValue,
    ) -> Result<(), TypeError> {
        let key = key.into();
        if is_reserved_key(&key) {
            return Err(TypeError::ReservedKey(key));
        }
        self.extra.insert(key, value);
        Ok(())
    }

    /// Greatest nesting depth across all fields. The block itself counts as
    /// one level, so a block of plain scalars has depth 2.
    pub fn depth(&self) -> usize {
        let extra_depth = self.extra.values().map(MetaValue::depth).max().unwrap_or(0);
        // Recognized fields are scalars or a flat string list: depth <= 2.
        let recognized_depth = if self.tags.is_empty() { 1 } else { 2 };
        1 + extra_depth.max(recognized_depth)
    }

    /// Concatenation of every string in the block, in declaration order.
    /// Extra-bag keys count too: threat text can hide in a key as easily as
    /// in a value.
    pub fn scannable_text(&self) -> String {
        let mut out = String::new();
        let mut push = |s: &str| {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(s);
        };
        if let Some(v) = &self.name {
            push(v);
        }
        if let Some(v) = &self.description {
            push(v);
        }
        if let Some(v) = &self.author {
            push(v);
        }
        if let Some(v) = &self.version {
            push(v);
        }
        for tag in &self.tags {
            push(tag);
        }
        for (key, value) in &self.extra {
            push(key);
            collect_strings(value, &mut push);
        }
        out
    }
}

fn collect_strings(value: &MetaValue, push: &mut impl FnMut(&str)) {
    match value {
        MetaValue::Str(s) => push(s),
        MetaValue::List(items) => {
            for item in items {
                collect_strings(item, push);
            }
        }
        MetaValue::Map(map) => {
            for (key, item) in map {
                push(key);
                collect_strings(item, push);
            }
        }
        MetaValue::Null | MetaValue::Bool(_) | MetaValue::Int(_) | MetaValue::Float(_) => {}
    }
}
