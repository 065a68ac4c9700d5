use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{GuardError, GuardResult};

/// An absolute path proven to be a descendant of the guard's root.
///
/// Only [`PathGuard::guard`] constructs these. The inner path may or may not
/// exist yet; containment is checked against the deepest existing ancestor.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    /// Borrow the resolved path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Debug for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResolvedPath({:?})", self.0)
    }
}

/// Resolves relative identifiers against a fixed root directory.
///
/// The guard is a pure function of (root, input, filesystem link state): it
/// performs no writes and holds no mutable state. The root is canonicalized
/// once at construction so that later containment checks compare canonical
/// forms on both sides.
///
/// # Examples
///
/// ```
/// use elv_guard::PathGuard;
///
/// let dir = tempfile::tempdir().unwrap();
/// let guard = PathGuard::new(dir.path()).unwrap();
///
/// assert!(guard.guard("personas/alpha.md").is_ok());
/// assert!(guard.guard("../../etc/passwd").is_err());
/// assert!(guard.guard("/etc/passwd").is_err());
/// ```
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Create a guard for the given root.
    ///
    /// The root must be an absolute path to an existing directory.
    pub fn new(root: &Path) -> GuardResult<Self> {
        if !root.is_absolute() {
            return Err(GuardError::RootNotAbsolute);
        }
        if !root.is_dir() {
            return Err(GuardError::RootNotDirectory);
        }
        let root = fs::canonicalize(root)?;
        Ok(Self { root })
    }

    /// The canonicalized root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative identifier to a contained absolute path.
    ///
    /// Rejection happens in two phases: lexical checks on the input string
    /// (traversal segments, absolute prefixes, NUL bytes, disallowed
    /// characters), then a containment re-check after canonicalizing the
    /// deepest existing ancestor, which defeats symlink escapes.
    pub fn guard(&self, relative: &str) -> GuardResult<ResolvedPath> {
        self.check_lexical(relative)?;

        let candidate = self.root.join(relative);
        self.check_containment(&candidate)?;

        debug!(input = relative, "path guarded");
        Ok(ResolvedPath(candidate))
    }

    fn check_lexical(&self, input: &str) -> GuardResult<()> {
        if input.is_empty() {
            return Err(GuardError::violation("empty path"));
        }
        if input.contains('\0') {
            return Err(GuardError::violation("contains NUL byte"));
        }
        if input.contains('\\') {
            return Err(GuardError::violation("contains backslash"));
        }
        if input.starts_with('/') {
            return Err(GuardError::violation("absolute paths are not allowed"));
        }
        // Windows drive prefix (`C:`), even on Unix hosts: the same store may
        // be served to clients on any platform.
        let bytes = input.as_bytes();
        if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
            return Err(GuardError::violation("drive-prefixed paths are not allowed"));
        }

        for component in input.split('/') {
            if component.is_empty() {
                return Err(GuardError::violation("empty path component"));
            }
            if component == ".." {
                return Err(GuardError::violation("parent-directory segment '..'"));
            }
            if component.bytes().all(|b| b == b'.') {
                return Err(GuardError::violation(format!(
                    "dot-only component: {component:?}"
                )));
            }
            for ch in component.chars() {
                if !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.') {
                    return Err(GuardError::violation(format!(
                        "forbidden character in component: {ch:?}"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Canonicalize the deepest existing ancestor of `candidate` and require
    /// it to stay under the root. If the candidate itself exists (including
    /// as a symlink), it is canonicalized directly, so a link inside the root
    /// that points outside is rejected rather than silently followed.
    fn check_containment(&self, candidate: &Path) -> GuardResult<()> {
        let mut probe = candidate;
        loop {
            if probe.symlink_metadata().is_ok() {
                break;
            }
            probe = probe.parent().ok_or_else(|| {
                GuardError::violation("path has no existing ancestor")
            })?;
        }

        // A dangling symlink fails canonicalization; treat that as an escape
        // attempt rather than an I/O error.
        let canonical = fs::canonicalize(probe)
            .map_err(|_| GuardError::violation("unresolvable link in path"))?;

        if !canonical.starts_with(&self.root) {
            debug!(input = ?candidate.file_name(), "containment check failed");
            return Err(GuardError::violation(
                "path resolves outside the storage root",
            ));
        }
        Ok(())
    }
}
