use std::fs;
use std::io;
use std::sync::Arc;

use tracing::{debug, info, warn};

use elv_guard::{PathGuard, ResolvedPath};
use elv_lock::{atomic_write, LockTable};
use elv_meta::SafeParser;
use elv_scan::ThreatScanner;
use elv_types::{Document, ElementId, ElementKind, MetaValue, MetadataBlock, ResourceKey, Severity};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// File extension for stored elements.
const ELEMENT_EXT: &str = "md";

/// What to do with text that matched low/medium-severity threat patterns.
///
/// Critical matches always reject the write; this policy only governs the
/// lesser severities. The choice is the caller's, made explicit per write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThreatPolicy {
    /// Store the sanitized copy (matched spans neutralized).
    #[default]
    StoreSanitized,
    /// Store the original text; matches are only surfaced as warnings.
    StoreOriginal,
}

/// Per-write options.
#[derive(Clone, Copy, Debug)]
pub struct WriteOptions {
    /// When `false`, writing over an existing element fails with
    /// [`StoreError::AlreadyExists`]. The check runs inside the element's
    /// lock, so it cannot race another writer.
    pub allow_overwrite: bool,
    /// Policy for low/medium threat matches.
    pub on_threat: ThreatPolicy,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            allow_overwrite: true,
            on_threat: ThreatPolicy::default(),
        }
    }
}

impl WriteOptions {
    /// Options that refuse to overwrite an existing element.
    pub fn create_only() -> Self {
        Self {
            allow_overwrite: false,
            ..Self::default()
        }
    }
}

/// Result of a successful write.
#[derive(Clone, Debug, Default)]
pub struct WriteOutcome {
    /// Highest threat severity observed (never `Critical`; that rejects).
    pub severity: Severity,
    /// `true` if the stored text differs from the submitted text.
    pub sanitized: bool,
    /// Human-readable warnings, one per matched pattern label.
    pub warnings: Vec<String>,
}

/// The persistence façade: guarded, locked, scanned element storage.
///
/// Elements live at `<root>/<kind-dir>/<id>.md`. Every operation resolves
/// its path through the [`PathGuard`], acquires the element's lock for its
/// whole duration, and commits writes atomically, so a rejected write leaves
/// the prior file state completely unchanged and readers never observe torn
/// files.
pub struct ElementStore {
    guard: PathGuard,
    locks: Arc<LockTable>,
    scanner: ThreatScanner,
    parser: SafeParser,
}

impl ElementStore {
    /// Open a store over `config.root` with an injected lock table.
    ///
    /// Fails if the root is not an existing absolute directory.
    pub fn open(config: StoreConfig, locks: Arc<LockTable>) -> StoreResult<Self> {
        let guard = PathGuard::new(&config.root)?;
        info!(root = %guard.root().display(), "element store opened");
        Ok(Self {
            guard,
            locks,
            scanner: ThreatScanner::new(),
            parser: SafeParser::with_limits(config.limits),
        })
    }

    /// Read an element's document.
    pub async fn read(&self, kind: ElementKind, id: &ElementId) -> StoreResult<Document> {
        let path = self.resolve(kind, id)?;
        let key = ResourceKey::element(kind, id);
        let _lock = self.locks.acquire(&key).await;

        let bytes = match fs::read(path.as_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    kind,
                    id: id.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let doc = self.parser.parse(&bytes)?;
        debug!(kind = %kind, id = %id, bytes = bytes.len(), "element read");
        Ok(doc)
    }

    /// Write (create or replace) an element.
    ///
    /// The metadata and body are threat-scanned before anything touches
    /// disk. Critical matches reject the write; low/medium matches follow
    /// `opts.on_threat`. The rendered document is the only thing stored: no
    /// partial in-place metadata mutation is trusted.
    pub async fn write(
        &self,
        kind: ElementKind,
        id: &ElementId,
        metadata: MetadataBlock,
        body: &str,
        opts: WriteOptions,
    ) -> StoreResult<WriteOutcome> {
        let path = self.resolve(kind, id)?;
        let key = ResourceKey::element(kind, id);
        let _lock = self.locks.acquire(&key).await;

        if !opts.allow_overwrite && path.as_path().exists() {
            return Err(StoreError::AlreadyExists {
                kind,
                id: id.clone(),
            });
        }

        let mut metadata = metadata;
        let mut body = body.to_string();
        let outcome = self.scan_document(&mut metadata, &mut body, opts.on_threat)?;
        if outcome.severity > Severity::None {
            warn!(
                kind = %kind,
                id = %id,
                severity = %outcome.severity,
                sanitized = outcome.sanitized,
                "element content matched threat patterns"
            );
        }

        let rendered = self.parser.render(&Document::new(metadata, body))?;
        if let Some(parent) = path.as_path().parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(path.as_path(), &rendered)?;
        info!(kind = %kind, id = %id, bytes = rendered.len(), "element written");
        Ok(outcome)
    }

    /// Delete an element.
    pub async fn delete(&self, kind: ElementKind, id: &ElementId) -> StoreResult<()> {
        let path = self.resolve(kind, id)?;
        let key = ResourceKey::element(kind, id);
        let _lock = self.locks.acquire(&key).await;

        if !path.as_path().exists() {
            return Err(StoreError::NotFound {
                kind,
                id: id.clone(),
            });
        }
        fs::remove_file(path.as_path())?;
        info!(kind = %kind, id = %id, "element deleted");
        Ok(())
    }

    /// Rename an element within its kind.
    ///
    /// Both locks are acquired in sorted key order so two concurrent renames
    /// cannot deadlock; the existence checks run inside the locks.
    pub async fn rename(
        &self,
        kind: ElementKind,
        from: &ElementId,
        to: &ElementId,
        allow_overwrite: bool,
    ) -> StoreResult<()> {
        let from_path = self.resolve(kind, from)?;
        let to_path = self.resolve(kind, to)?;
        let from_key = ResourceKey::element(kind, from);
        let to_key = ResourceKey::element(kind, to);

        let (_first, _second);
        if from_key == to_key {
            _first = self.locks.acquire(&from_key).await;
            _second = None;
        } else if from_key < to_key {
            _first = self.locks.acquire(&from_key).await;
            _second = Some(self.locks.acquire(&to_key).await);
        } else {
            _first = self.locks.acquire(&to_key).await;
            _second = Some(self.locks.acquire(&from_key).await);
        }

        if !from_path.as_path().exists() {
            return Err(StoreError::NotFound {
                kind,
                id: from.clone(),
            });
        }
        if !allow_overwrite && from_key != to_key && to_path.as_path().exists() {
            return Err(StoreError::AlreadyExists {
                kind,
                id: to.clone(),
            });
        }
        fs::rename(from_path.as_path(), to_path.as_path())?;
        info!(kind = %kind, from = %from, to = %to, "element renamed");
        Ok(())
    }

    /// Whether an element exists.
    ///
    /// Runs under the element's lock, so it orders with in-flight writes.
    /// Still advisory across calls: for race-free create semantics use
    /// [`WriteOptions::create_only`], whose check runs inside the write's
    /// own lock hold.
    pub async fn exists(&self, kind: ElementKind, id: &ElementId) -> StoreResult<bool> {
        let path = self.resolve(kind, id)?;
        let key = ResourceKey::element(kind, id);
        let _lock = self.locks.acquire(&key).await;
        Ok(path.as_path().exists())
    }

    /// List the ids of all elements of a kind, sorted.
    ///
    /// A point-in-time directory snapshot; there is no single element to
    /// lock, so this is a plain synchronous call. Files whose names do not
    /// parse as element ids are skipped.
    pub fn list(&self, kind: ElementKind) -> StoreResult<Vec<ElementId>> {
        let dir = self.guard.root().join(kind.dir_name());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(&format!(".{ELEMENT_EXT}")) else {
                continue;
            };
            match ElementId::parse(stem) {
                Ok(id) => ids.push(id),
                Err(_) => debug!(kind = %kind, file = name, "skipping unparseable element file"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn resolve(&self, kind: ElementKind, id: &ElementId) -> StoreResult<ResolvedPath> {
        let relative = format!("{}/{}.{ELEMENT_EXT}", kind.dir_name(), id.as_str());
        Ok(self.guard.guard(&relative)?)
    }

    /// Scan every string in the document, map keys included. Critical
    /// severity rejects; otherwise matches are neutralized when the policy
    /// asks for it, and warnings name the matched pattern labels.
    fn scan_document(
        &self,
        metadata: &mut MetadataBlock,
        body: &mut String,
        policy: ThreatPolicy,
    ) -> StoreResult<WriteOutcome> {
        let mut severity = Severity::None;
        let mut labels: Vec<String> = Vec::new();

        {
            let scanner = &self.scanner;
            let mut collect = |text: &str| {
                let verdict = scanner.scan(text);
                severity = severity.max(verdict.severity);
                for label in verdict.matched_patterns {
                    if !labels.contains(&label) {
                        labels.push(label);
                    }
                }
            };
            visit_block_strings(metadata, &mut collect);
            collect(body);
        }

        if severity == Severity::Critical {
            return Err(StoreError::ContentThreatDetected { severity, labels });
        }

        let mut sanitized = false;
        if severity > Severity::None && policy == ThreatPolicy::StoreSanitized {
            sanitize_block(&self.scanner, metadata, &mut sanitized);
            sanitize_string(&self.scanner, body, &mut sanitized);
        }

        let warnings = labels
            .iter()
            .map(|label| format!("content matched threat pattern '{label}'"))
            .collect();
        Ok(WriteOutcome {
            severity,
            sanitized,
            warnings,
        })
    }
}

/// Visit every string in a metadata block, keys included: recognized fields
/// first, then the extra bag depth-first.
fn visit_block_strings<'a>(block: &'a MetadataBlock, f: &mut impl FnMut(&'a str)) {
    for field in [
        &block.name,
        &block.description,
        &block.author,
        &block.version,
    ] {
        if let Some(text) = field {
            f(text);
        }
    }
    for tag in &block.tags {
        f(tag);
    }
    for (key, value) in &block.extra {
        f(key);
        visit_value_strings(value, f);
    }
}

fn visit_value_strings<'a>(value: &'a MetaValue, f: &mut impl FnMut(&'a str)) {
    match value {
        MetaValue::Str(s) => f(s),
        MetaValue::List(items) => {
            for item in items {
                visit_value_strings(item, f);
            }
        }
        MetaValue::Map(map) => {
            for (key, item) in map {
                f(key);
                visit_value_strings(item, f);
            }
        }
        MetaValue::Null | MetaValue::Bool(_) | MetaValue::Int(_) | MetaValue::Float(_) => {}
    }
}

fn sanitize_string(scanner: &ThreatScanner, text: &mut String, changed: &mut bool) {
    let verdict = scanner.scan(text);
    if verdict.severity > Severity::None {
        *text = verdict.sanitized_text;
        *changed = true;
    }
}

/// Neutralize matches in place. Map keys cannot be edited through a mutable
/// reference, so the maps are rebuilt; if a sanitized key collides with an
/// existing one, the later entry in key order wins.
fn sanitize_block(scanner: &ThreatScanner, block: &mut MetadataBlock, changed: &mut bool) {
    for field in [
        &mut block.name,
        &mut block.description,
        &mut block.author,
        &mut block.version,
    ] {
        if let Some(text) = field.as_mut() {
            sanitize_string(scanner, text, changed);
        }
    }
    for tag in &mut block.tags {
        sanitize_string(scanner, tag, changed);
    }
    let extra = std::mem::take(&mut block.extra);
    block.extra = extra
        .into_iter()
        .map(|(mut key, value)| {
            sanitize_string(scanner, &mut key, changed);
            (key, sanitize_value(scanner, value, changed))
        })
        .collect();
}

fn sanitize_value(scanner: &ThreatScanner, value: MetaValue, changed: &mut bool) -> MetaValue {
    match value {
        MetaValue::Str(mut s) => {
            sanitize_string(scanner, &mut s, changed);
            MetaValue::Str(s)
        }
        MetaValue::List(items) => MetaValue::List(
            items
                .into_iter()
                .map(|item| sanitize_value(scanner, item, changed))
                .collect(),
        ),
        MetaValue::Map(map) => MetaValue::Map(
            map.into_iter()
                .map(|(mut key, item)| {
                    sanitize_string(scanner, &mut key, changed);
                    (key, sanitize_value(scanner, item, changed))
                })
                .collect(),
        ),
        other => other,
    }
}
