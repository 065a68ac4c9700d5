use elv_types::{is_reserved_key, Document, MetaValue};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::convert::block_from_yaml;
use crate::emit::emit_header;
use crate::error::{MetaError, MetaResult};

/// Size and depth bounds enforced before and during parsing.
#[derive(Clone, Debug)]
pub struct ParserLimits {
    /// Maximum size of the whole document in bytes (default: 1 MiB).
    pub max_document_bytes: usize,
    /// Maximum size of the metadata header in bytes (default: 64 KiB).
    pub max_metadata_bytes: usize,
    /// Maximum metadata nesting depth (default: 10).
    pub max_depth: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_document_bytes: 1024 * 1024,
            max_metadata_bytes: 64 * 1024,
            max_depth: 10,
        }
    }
}

/// Forbidden YAML constructs, matched textually on the header before any
/// YAML parsing happens (reject-early, not reject-after-allocation).
///
/// The patterns run against a masked copy of the header where quoted scalars
/// are blanked out (see [`mask_quoted`]), and the prefix groups restrict
/// matches to node-start positions: after `key: `, after sequence dashes at
/// line start, at line start itself, or after flow separators. That is where
/// YAML actually reads these indicators, so prose containing `&` or `*`
/// mid-scalar is not flagged. The bias is still toward rejection: unquoted
/// strings that mimic these constructs at a node-start position are refused.
static FORBIDDEN_CONSTRUCTS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    const NODE_START: &str = r"(^[ \t]*(?:-[ \t]+)+|:\s+|^[ \t]*|[\[{,]\s*)";
    vec![
        (
            "anchor",
            Regex::new(&format!(r"(?m){NODE_START}&[A-Za-z0-9_-]+")).unwrap(),
        ),
        (
            "alias",
            Regex::new(&format!(r"(?m){NODE_START}\*[A-Za-z0-9_-]+")).unwrap(),
        ),
        ("merge key", Regex::new(r"(?m)^\s*<<\s*:").unwrap()),
        (
            "tag",
            Regex::new(&format!(r"(?m){NODE_START}!{{1,2}}\S")).unwrap(),
        ),
        ("directive", Regex::new(r"(?m)^%").unwrap()),
    ]
});

/// Frontmatter parser with a restricted YAML mode.
///
/// See the crate docs for the exact restrictions. The parser is stateless
/// apart from its limits and is cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct SafeParser {
    limits: ParserLimits,
}

impl SafeParser {
    /// Parser with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser with explicit limits.
    pub fn with_limits(limits: ParserLimits) -> Self {
        Self { limits }
    }

    /// The active limits.
    pub fn limits(&self) -> &ParserLimits {
        &self.limits
    }

    /// Parse raw document bytes into a [`Document`].
    ///
    /// The first line must be exactly `---`; the header runs until the next
    /// line that is exactly `---`; the body is everything after that line.
    pub fn parse(&self, raw: &[u8]) -> MetaResult<Document> {
        if raw.len() > self.limits.max_document_bytes {
            return Err(MetaError::DocumentTooLarge {
                len: raw.len(),
                max: self.limits.max_document_bytes,
            });
        }
        let text = std::str::from_utf8(raw).map_err(|_| MetaError::InvalidUtf8)?;

        let (header, body) = split_frontmatter(text)?;
        if header.len() > self.limits.max_metadata_bytes {
            return Err(MetaError::MetadataTooLarge {
                len: header.len(),
                max: self.limits.max_metadata_bytes,
            });
        }

        let masked = mask_quoted(header);
        self.check_constructs(&masked)?;
        self.check_flow_depth(&masked)?;

        let value: serde_yaml::Value = if header.trim().is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::from_str(header)?
        };
        let metadata = block_from_yaml(value, self.limits.max_depth)?;

        debug!(header_len = header.len(), body_len = body.len(), "document parsed");
        Ok(Document {
            metadata,
            body: body.to_string(),
            raw: Some(raw.to_vec()),
        })
    }

    /// Render a document to its canonical on-disk form.
    ///
    /// The metadata invariants (depth bound, no reserved keys) are
    /// re-checked here: documents are constructed in memory by callers, and
    /// nothing may reach disk that `parse` would refuse to read back. The
    /// emitter double-quotes every string, so header content can never trip
    /// the construct pre-scan or the flow-depth bound on reparse.
    pub fn render(&self, doc: &Document) -> MetaResult<Vec<u8>> {
        if doc.metadata.depth() > self.limits.max_depth {
            return Err(MetaError::DepthExceeded {
                max: self.limits.max_depth,
            });
        }
        for key in doc.metadata.extra.keys() {
            if is_reserved_key(key) {
                return Err(MetaError::ReservedKey(key.clone()));
            }
        }
        check_no_reserved_nested(doc.metadata.extra.values())?;

        let yaml = emit_header(&doc.metadata);
        let mut out = Vec::with_capacity(yaml.len() + doc.body.len() + 8);
        out.extend_from_slice(b"---\n");
        out.extend_from_slice(yaml.as_bytes());
        out.extend_from_slice(b"---\n");
        out.extend_from_slice(doc.body.as_bytes());
        Ok(out)
    }

    fn check_constructs(&self, masked: &str) -> MetaResult<()> {
        for (construct, pattern) in FORBIDDEN_CONSTRUCTS.iter() {
            if pattern.is_match(masked) {
                return Err(MetaError::UnsafeConstruct {
                    construct: (*construct).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Bound flow-style nesting (`[[[...`, `{{{...`) by counting brackets.
    /// Runs on the masked header, so quoted scalars never count. Block-style
    /// nesting is bounded after the parse; flow style is the one that can
    /// nest arbitrarily deep in very few bytes, so it gets the pre-parse
    /// check.
    fn check_flow_depth(&self, masked: &str) -> MetaResult<()> {
        let mut depth: usize = 0;
        for ch in masked.chars() {
            match ch {
                '[' | '{' => {
                    depth += 1;
                    if depth > self.limits.max_depth {
                        return Err(MetaError::DepthExceeded {
                            max: self.limits.max_depth,
                        });
                    }
                }
                ']' | '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        Ok(())
    }
}

/// Blank out quoted scalars so the pre-scans only see structural text.
///
/// A quote opens a scalar only at a node-start position (the last
/// non-space character on the line so far is `:`, `-`, `,`, `[`, `{`, or
/// there is none), which is where YAML reads it as a quote; an apostrophe
/// inside prose stays literal. Masked characters become `x`; newlines and
/// the quote characters themselves survive so line anchors keep working.
fn mask_quoted(header: &str) -> String {
    enum State {
        Plain,
        Single,
        Double,
    }
    let mut out = String::with_capacity(header.len());
    let mut state = State::Plain;
    let mut escaped = false;
    let mut last_significant: Option<char> = None;
    for ch in header.chars() {
        match state {
            State::Plain => {
                let opens = matches!(last_significant, None | Some(':' | '-' | ',' | '[' | '{'));
                match ch {
                    '"' if opens => {
                        state = State::Double;
                        escaped = false;
                        out.push('"');
                    }
                    '\'' if opens => {
                        state = State::Single;
                        out.push('\'');
                    }
                    '\n' => {
                        last_significant = None;
                        out.push('\n');
                    }
                    c => {
                        if c != ' ' && c != '\t' {
                            last_significant = Some(c);
                        }
                        out.push(c);
                    }
                }
            }
            State::Double => {
                if escaped {
                    escaped = false;
                    out.push('x');
                } else if ch == '\\' {
                    escaped = true;
                    out.push('x');
                } else if ch == '"' {
                    state = State::Plain;
                    last_significant = Some('"');
                    out.push('"');
                } else {
                    out.push(if ch == '\n' { '\n' } else { 'x' });
                }
            }
            State::Single => {
                if ch == '\'' {
                    state = State::Plain;
                    last_significant = Some('\'');
                    out.push('\'');
                } else {
                    out.push(if ch == '\n' { '\n' } else { 'x' });
                }
            }
        }
    }
    out
}

fn check_no_reserved_nested<'a>(
    values: impl Iterator<Item = &'a MetaValue>,
) -> MetaResult<()> {
    for value in values {
        match value {
            MetaValue::Map(map) => {
                for (key, nested) in map {
                    if is_reserved_key(key) {
                        return Err(MetaError::ReservedKey(key.clone()));
                    }
                    check_no_reserved_nested(std::iter::once(nested))?;
                }
            }
            MetaValue::List(items) => check_no_reserved_nested(items.iter())?,
            _ => {}
        }
    }
    Ok(())
}

/// Split a document into (header, body) at the `---` marker lines.
fn split_frontmatter(text: &str) -> MetaResult<(&str, &str)> {
    let after_open = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
        .ok_or(MetaError::MissingOpeningMarker)?;

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == "---" {
            let header = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return Ok((header, body));
        }
        offset += line.len();
    }
    Err(MetaError::UnterminatedHeader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use elv_types::MetadataBlock;

    fn parse(text: &str) -> MetaResult<Document> {
        SafeParser::new().parse(text.as_bytes())
    }

    #[test]
    fn parses_header_and_body() {
        let doc = parse("---\nname: Alpha\ndescription: helper\n---\nbody text\n").unwrap();
        assert_eq!(doc.metadata.name.as_deref(), Some("Alpha"));
        assert_eq!(doc.metadata.description.as_deref(), Some("helper"));
        assert_eq!(doc.body, "body text\n");
        assert!(doc.raw.is_some());
    }

    #[test]
    fn empty_header_is_an_empty_block() {
        let doc = parse("---\n---\nbody").unwrap();
        assert_eq!(doc.metadata, MetadataBlock::new());
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn body_may_contain_marker_lines() {
        let doc = parse("---\nname: A\n---\nfirst\n---\nsecond\n").unwrap();
        assert_eq!(doc.body, "first\n---\nsecond\n");
    }

    #[test]
    fn missing_opening_marker() {
        for text in ["name: A\n---\n", "", " ---\nname: A\n---\n"] {
            assert!(matches!(parse(text), Err(MetaError::MissingOpeningMarker)));
        }
    }

    #[test]
    fn unterminated_header() {
        assert!(matches!(
            parse("---\nname: A\n"),
            Err(MetaError::UnterminatedHeader)
        ));
    }

    #[test]
    fn anchor_alias_pair_is_rejected_not_partially_parsed() {
        let text = "---\nbase: &a [1, 2]\ncopy: *a\n---\n";
        let err = parse(text).unwrap_err();
        assert!(
            matches!(err, MetaError::UnsafeConstruct { ref construct } if construct == "anchor"),
            "got {err:?}"
        );
    }

    #[test]
    fn alias_alone_is_rejected() {
        let err = parse("---\ncopy: *something\n---\n").unwrap_err();
        assert!(matches!(err, MetaError::UnsafeConstruct { ref construct } if construct == "alias"));
    }

    #[test]
    fn merge_key_is_rejected() {
        let err = parse("---\n<<: {a: 1}\n---\n").unwrap_err();
        assert!(
            matches!(err, MetaError::UnsafeConstruct { ref construct } if construct == "merge key")
        );
    }

    #[test]
    fn custom_tags_are_rejected() {
        for text in [
            "---\npayload: !!python/object {}\n---\n",
            "---\npayload: !exec rm\n---\n",
        ] {
            assert!(matches!(
                parse(text),
                Err(MetaError::UnsafeConstruct { ref construct }) if construct == "tag"
            ));
        }
    }

    #[test]
    fn directives_are_rejected() {
        let err = parse("---\n%YAML 1.1\nname: A\n---\n").unwrap_err();
        assert!(
            matches!(err, MetaError::UnsafeConstruct { ref construct } if construct == "directive")
        );
    }

    #[test]
    fn prose_with_ampersands_and_stars_is_fine() {
        let doc = parse("---\ndescription: AT&T uses C* algebra\n---\n").unwrap();
        assert_eq!(
            doc.metadata.description.as_deref(),
            Some("AT&T uses C* algebra")
        );
    }

    #[test]
    fn expansion_bomb_shape_is_rejected_before_parsing() {
        // Classic billion-laughs prefix; must fail on the anchor pre-scan,
        // long before any expansion could happen.
        let text = "---\na: &a [x, x, x]\nb: &b [*a, *a, *a]\nc: &c [*b, *b, *b]\n---\n";
        assert!(matches!(
            parse(text),
            Err(MetaError::UnsafeConstruct { .. })
        ));
    }

    #[test]
    fn document_size_bound() {
        let parser = SafeParser::with_limits(ParserLimits {
            max_document_bytes: 32,
            ..Default::default()
        });
        let err = parser.parse(b"---\nname: AlphaAlphaAlphaAlpha\n---\n").unwrap_err();
        assert!(matches!(err, MetaError::DocumentTooLarge { .. }));
    }

    #[test]
    fn metadata_size_bound() {
        let parser = SafeParser::with_limits(ParserLimits {
            max_metadata_bytes: 16,
            ..Default::default()
        });
        let err = parser
            .parse(b"---\ndescription: far too long for sixteen bytes\n---\n")
            .unwrap_err();
        assert!(matches!(err, MetaError::MetadataTooLarge { .. }));
    }

    #[test]
    fn flow_nesting_bound_trips_before_parse() {
        let deep = format!("---\nx: {}1{}\n---\n", "[".repeat(40), "]".repeat(40));
        assert!(matches!(
            parse(&deep),
            Err(MetaError::DepthExceeded { .. })
        ));
    }

    #[test]
    fn brackets_inside_quotes_do_not_count_as_nesting() {
        let doc = parse("---\ndescription: \"[[[[[[[[[[[[[[[[[[[[not nesting\"\n---\n").unwrap();
        assert!(doc.metadata.description.unwrap().contains("not nesting"));
    }

    #[test]
    fn render_refuses_reserved_keys_and_excess_depth() {
        let parser = SafeParser::new();

        let mut doc = Document::new(MetadataBlock::named("A"), "");
        doc.metadata
            .extra
            .insert("__proto__".into(), MetaValue::Null);
        assert!(matches!(
            parser.render(&doc),
            Err(MetaError::ReservedKey(_))
        ));

        let mut nested = MetaValue::Int(1);
        for _ in 0..12 {
            nested = MetaValue::List(vec![nested]);
        }
        let mut doc = Document::new(MetadataBlock::new(), "");
        doc.metadata.extra.insert("deep".into(), nested);
        assert!(matches!(
            parser.render(&doc),
            Err(MetaError::DepthExceeded { .. })
        ));
    }

    #[test]
    fn plain_prose_dash_ampersand_is_not_an_anchor() {
        let doc = parse("---\ndescription: pairs well - &also with cheese\n---\n").unwrap();
        assert_eq!(
            doc.metadata.description.as_deref(),
            Some("pairs well - &also with cheese")
        );
    }

    #[test]
    fn quoted_indicators_are_data_not_constructs() {
        let doc = parse("---\nnote: \"see: &x and *y and !z\"\n---\n").unwrap();
        assert_eq!(
            doc.metadata.extra.get("note"),
            Some(&MetaValue::Str("see: &x and *y and !z".into()))
        );
    }

    #[test]
    fn rendered_prose_with_yaml_indicators_reparses() {
        let parser = SafeParser::new();
        let mut block = MetadataBlock::named("Cheddar");
        block.description = Some("pairs well - &also with cheese".into());
        block
            .insert_extra("note", MetaValue::Str("matrix [[[[[[[[[[[indexing".into()))
            .unwrap();
        block
            .insert_extra("wild", MetaValue::Str("*star, !bang and {braces}".into()))
            .unwrap();
        let doc = Document::new(block, "body\n");

        let rendered = parser.render(&doc).unwrap();
        let back = parser.parse(&rendered).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn round_trip_preserves_document() {
        let parser = SafeParser::new();
        let mut block = MetadataBlock::named("Alpha");
        block.description = Some("A friendly assistant".into());
        block.version = Some("1.2".into());
        block.tags = vec!["cooking".into(), "help".into()];
        block.created = Some(
            chrono::DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
                .unwrap()
                .with_timezone(&chrono::Utc),
        );
        block
            .insert_extra("rating", MetaValue::Float(4.5))
            .unwrap();
        block
            .insert_extra(
                "links",
                MetaValue::List(vec![MetaValue::Str("one".into()), MetaValue::Int(2)]),
            )
            .unwrap();
        let doc = Document::new(block, "Body with\n---\nmarker inside.\n");

        let rendered = parser.render(&doc).unwrap();
        let back = parser.parse(&rendered).unwrap();
        assert_eq!(back, doc);
    }

    mod round_trip_props {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        fn safe_string() -> impl Strategy<Value = String> {
            proptest::string::string_regex(r#"[-A-Za-z0-9 .,:&*!#'"\\\[\]{}]{0,24}"#).unwrap()
        }

        fn safe_key() -> impl Strategy<Value = String> {
            proptest::string::string_regex("[a-z][a-z0-9_]{0,11}")
                .unwrap()
                .prop_filter("must not shadow a recognized field", |k| {
                    !matches!(
                        k.as_str(),
                        "name" | "description" | "author" | "version" | "tags" | "created"
                            | "modified"
                    )
                })
        }

        fn meta_value() -> impl Strategy<Value = MetaValue> {
            let leaf = prop_oneof![
                Just(MetaValue::Null),
                any::<bool>().prop_map(MetaValue::Bool),
                any::<i64>().prop_map(MetaValue::Int),
                safe_string().prop_map(MetaValue::Str),
            ];
            leaf.prop_recursive(3, 16, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(MetaValue::List),
                    prop::collection::btree_map(safe_key(), inner, 0..4)
                        .prop_map(|m: BTreeMap<String, MetaValue>| MetaValue::Map(m)),
                ]
            })
        }

        fn document() -> impl Strategy<Value = Document> {
            (
                proptest::option::of(safe_string()),
                proptest::option::of(safe_string()),
                prop::collection::vec(safe_key(), 0..4),
                prop::collection::btree_map(safe_key(), meta_value(), 0..4),
                proptest::string::string_regex("[A-Za-z0-9 .,\n]{0,80}").unwrap(),
            )
                .prop_map(|(name, description, tags, extra, body)| {
                    let mut block = MetadataBlock::new();
                    block.name = name;
                    block.description = description;
                    block.tags = tags;
                    block.extra = extra;
                    Document::new(block, body)
                })
        }

        proptest! {
            #[test]
            fn parse_inverts_render(doc in document()) {
                let parser = SafeParser::new();
                let rendered = parser.render(&doc).unwrap();
                let back = parser.parse(&rendered).unwrap();
                prop_assert_eq!(back, doc);
            }
        }
    }
}
