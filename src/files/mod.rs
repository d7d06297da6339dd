//! Project-scoped filesystem access.
//!
//! Every file tool resolves its `path` argument through a [`ProjectGuard`]:
//!
//! 1. The path is normalized lexically against the project root.
//! 2. The [`ExcludeRegistry`] is consulted for the path and each of its
//!    parent directories. A hit is an [`Error::Exclusion`].
//! 3. The normalized path must stay inside the root, otherwise the call
//!    fails with [`Error::FileSystem`]. Existing paths are canonicalized
//!    and checked again so a symlink cannot escape the root.
//!
//! Exclusion patterns are `globset` globs matched against the path
//! relative to the project root, using `/` separators on every platform.

pub mod edit;
pub mod search;

use std::path::{Component, Path, PathBuf};

use docctx_core::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled set of project exclusion globs.
#[derive(Debug, Clone)]
pub struct ExcludeRegistry {
    patterns: Vec<String>,
    set: GlobSet,
}

impl ExcludeRegistry {
    pub fn new(patterns: &[String]) -> Result<Self> {
        Ok(Self {
            patterns: patterns.to_vec(),
            set: build_globset(patterns)?,
        })
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True when `relative` or any of its parent directories matches.
    pub fn is_excluded(&self, relative: &str) -> bool {
        if self.set.is_empty() {
            return false;
        }
        let relative = relative.trim_start_matches("./").trim_end_matches('/');
        if relative.is_empty() || relative == "." {
            return false;
        }
        if self.set.is_match(relative) {
            return true;
        }
        relative
            .match_indices('/')
            .any(|(idx, _)| self.set.is_match(&relative[..idx]))
    }
}

/// Compile glob patterns into a [`GlobSet`].
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::config(format!("invalid glob set: {}", e)))
}

/// A path that passed the guard.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub absolute: PathBuf,
    /// Root-relative form with `/` separators; `"."` for the root itself.
    pub relative: String,
}

/// Confines file tools to the project root and honours exclusions.
#[derive(Debug, Clone)]
pub struct ProjectGuard {
    root: PathBuf,
    excludes: ExcludeRegistry,
}

impl ProjectGuard {
    /// Build a guard for `root`, which must exist.
    pub fn new(root: impl AsRef<Path>, excludes: ExcludeRegistry) -> Result<Self> {
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|e| {
            Error::FileSystem(format!(
                "cannot open project root {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root, excludes })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn excludes(&self) -> &ExcludeRegistry {
        &self.excludes
    }

    /// Resolve a caller-supplied path. The target does not have to exist.
    pub fn resolve(&self, requested: &str) -> Result<ResolvedPath> {
        let requested_trimmed = requested.trim();
        let joined = if Path::new(requested_trimmed).is_absolute() {
            PathBuf::from(requested_trimmed)
        } else {
            self.root.join(requested_trimmed)
        };
        let absolute = normalize(&joined);

        let relative = match absolute.strip_prefix(&self.root) {
            Ok(rel) => to_slash(rel),
            Err(_) => requested_trimmed.trim_start_matches("./").to_string(),
        };

        if self.excludes.is_excluded(&relative) {
            return Err(Error::Exclusion(requested_trimmed.to_string()));
        }

        if !absolute.starts_with(&self.root) {
            return Err(Error::FileSystem(format!(
                "Path '{}' is outside the project root",
                requested_trimmed
            )));
        }

        if absolute.exists() {
            let real = absolute.canonicalize()?;
            if !real.starts_with(&self.root) {
                return Err(Error::FileSystem(format!(
                    "Path '{}' resolves outside the project root",
                    requested_trimmed
                )));
            }
        }

        Ok(ResolvedPath {
            absolute,
            relative: if relative.is_empty() {
                ".".to_string()
            } else {
                relative
            },
        })
    }

    /// Resolve a path that must name an existing regular file.
    pub fn resolve_file(&self, requested: &str) -> Result<ResolvedPath> {
        let resolved = self.resolve(requested)?;
        if !resolved.absolute.exists() {
            return Err(Error::NotFound(format!("File '{}' does not exist", requested)));
        }
        if !resolved.absolute.is_file() {
            return Err(Error::validation(format!("Path '{}' is not a file", requested)));
        }
        Ok(resolved)
    }

    /// Root-relative, `/`-separated form of an absolute path under the root.
    pub fn relative(&self, absolute: &Path) -> String {
        match absolute.strip_prefix(&self.root) {
            Ok(rel) => to_slash(rel),
            Err(_) => to_slash(absolute),
        }
    }
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
