//! Canonical header emission.
//!
//! This is deliberately not a general YAML serializer. Every string, keys
//! included, is double-quoted with escapes, and containers use flow style.
//! Quoted scalars are immune to the parser's construct pre-scan and flow
//! brackets are counted exactly, so the emitted header can never contain a
//! token `parse` would refuse: the round-trip law holds even for strings
//! full of `&`, `*`, `!`, or brackets.

use elv_types::{MetaValue, MetadataBlock};

/// Emit a metadata block as header lines (without the `---` markers).
///
/// Recognized fields come first in declaration order, then the extra bag in
/// key order. An empty block emits nothing.
pub(crate) fn emit_header(block: &MetadataBlock) -> String {
    let mut out = String::new();

    for (key, field) in [
        ("name", &block.name),
        ("description", &block.description),
        ("author", &block.author),
        ("version", &block.version),
    ] {
        if let Some(value) = field {
            emit_entry(&mut out, key, &MetaValue::Str(value.clone()));
        }
    }
    if !block.tags.is_empty() {
        let tags = MetaValue::List(block.tags.iter().cloned().map(MetaValue::Str).collect());
        emit_entry(&mut out, "tags", &tags);
    }
    for (key, stamp) in [("created", &block.created), ("modified", &block.modified)] {
        if let Some(stamp) = stamp {
            emit_entry(&mut out, key, &MetaValue::Str(stamp.to_rfc3339()));
        }
    }
    for (key, value) in &block.extra {
        emit_entry(&mut out, key, value);
    }
    out
}

fn emit_entry(out: &mut String, key: &str, value: &MetaValue) {
    quote_into(out, key);
    out.push_str(": ");
    emit_value(out, value);
    out.push('\n');
}

fn emit_value(out: &mut String, value: &MetaValue) {
    match value {
        MetaValue::Null => out.push_str("null"),
        MetaValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        MetaValue::Int(i) => out.push_str(&i.to_string()),
        MetaValue::Float(x) => out.push_str(&emit_float(*x)),
        MetaValue::Str(s) => quote_into(out, s),
        MetaValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                emit_value(out, item);
            }
            out.push(']');
        }
        MetaValue::Map(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                quote_into(out, key);
                out.push_str(": ");
                emit_value(out, item);
            }
            out.push('}');
        }
    }
}

/// Floats must stay floats on reparse: integral values get a forced `.0`,
/// and the non-finite values use YAML's spellings.
fn emit_float(x: f64) -> String {
    if x.is_nan() {
        ".nan".to_string()
    } else if x.is_infinite() {
        if x > 0.0 { ".inf" } else { "-.inf" }.to_string()
    } else if x == x.trunc() {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// Append `s` as a YAML double-quoted scalar.
///
/// The escapes used (`\"`, `\\`, `\n`, `\r`, `\t`, `\uXXXX` for the rest of
/// the control range) are the JSON subset, which YAML double-quoted style
/// accepts verbatim.
fn quote_into(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // C1 controls included: YAML reads NEL (U+0085) as a line break.
            c if (c as u32) < 0x20 || ('\u{7f}'..='\u{9f}').contains(&c) => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
