//! Sandbox path resolution.
//!
//! Every path a caller hands the gateway goes through [`SandboxRoot::resolve`]
//! before it reaches the filesystem. Resolution is lexical: the candidate is
//! joined onto the root, `.`/`..` and redundant separators are collapsed, and
//! the result must be the root itself or a descendant of it.
//!
//! Lexical resolution does not see symlinks. A link inside the sandbox that
//! points elsewhere is still followed by the eventual filesystem call.
//! [`SandboxRoot::resolve_guarded`] closes most of that gap by canonicalizing
//! the deepest existing ancestor and re-checking containment, but it is a
//! point-in-time check: a link created between resolution and use is not seen.

use path_clean::PathClean;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Normalize a path by resolving `.` and `..` components lexically.
///
/// `..` at the filesystem root stays at the root, matching how the OS treats
/// `/..`.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.clean()
}

/// Canonicalize a path with fallback to the original path if canonicalization fails.
pub fn canonicalize_root(root: &Path) -> PathBuf {
    std::fs::canonicalize(root).unwrap_or_else(|error| {
        warn!(
            path = %root.display(),
            %error,
            "Failed to canonicalize sandbox root; falling back to provided path"
        );
        root.to_path_buf()
    })
}

/// Reasons a candidate path cannot be used.
#[derive(Debug, Error)]
pub enum SandboxViolation {
    /// The caller supplied an empty path where one is required.
    #[error("path is empty")]
    Empty,
    /// The normalized path leaves the sandbox root.
    #[error("path `{candidate}` resolves outside the sandbox")]
    OutsideSandbox { candidate: String },
    /// The path stays inside lexically but a symlink on the way leads out.
    #[error("path `{candidate}` escapes the sandbox through a symlink")]
    SymlinkEscape { candidate: String },
    /// The guard could not inspect the filesystem to decide.
    #[error("failed to inspect `{}`", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SandboxViolation {
    /// True when the path was proven to leave the sandbox, as opposed to an
    /// input or inspection problem.
    pub fn is_escape(&self) -> bool {
        matches!(self, Self::OutsideSandbox { .. } | Self::SymlinkEscape { .. })
    }
}

/// An absolute path that was inside the sandbox root when it was resolved.
///
/// Never cache one of these across requests; the filesystem can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// The directory tree every path-bearing operation is confined to.
#[derive(Debug, Clone)]
pub struct SandboxRoot {
    root: PathBuf,
    canonical: PathBuf,
}

impl SandboxRoot {
    /// Build a root from an absolute or relative directory path.
    ///
    /// Relative paths are anchored at the current working directory. The
    /// directory is not required to exist yet; the canonical form used by the
    /// symlink guard falls back to the lexical form if it does not.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        let root = normalize_path(&absolute);
        let canonical = canonicalize_root(&root);
        Ok(Self { root, canonical })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Lexically resolve `candidate` against the root.
    pub fn resolve(&self, candidate: &str) -> Result<ResolvedPath, SandboxViolation> {
        if candidate.is_empty() {
            return Err(SandboxViolation::Empty);
        }

        let joined = normalize_path(&self.root.join(candidate));
        if !is_within(&joined, &self.root) {
            return Err(SandboxViolation::OutsideSandbox {
                candidate: candidate.to_owned(),
            });
        }

        Ok(ResolvedPath(joined))
    }

    /// The root itself, used when a tree listing omits its path.
    pub fn resolve_root(&self) -> ResolvedPath {
        ResolvedPath(self.root.clone())
    }

    /// Resolve lexically, then re-check containment after following symlinks.
    ///
    /// The target may not exist yet (writes, mkdir, move destinations), so the
    /// deepest existing ancestor is canonicalized and the remaining components
    /// are appended before the containment check.
    pub fn resolve_guarded(&self, candidate: &str) -> Result<ResolvedPath, SandboxViolation> {
        let resolved = self.resolve(candidate)?;
        self.check_symlinks(candidate, &resolved)?;
        Ok(resolved)
    }

    /// Apply the symlink re-check to an already resolved path.
    pub fn check_symlinks(
        &self,
        candidate: &str,
        resolved: &ResolvedPath,
    ) -> Result<(), SandboxViolation> {
        let canonical = canonicalize_existing_prefix(resolved.as_path())?;
        if is_within(&canonical, &self.canonical) {
            Ok(())
        } else {
            Err(SandboxViolation::SymlinkEscape {
                candidate: candidate.to_owned(),
            })
        }
    }
}

/// Component-wise containment: `/sandbox2` is not inside `/sandbox`.
fn is_within(path: &Path, root: &Path) -> bool {
    path == root || path.starts_with(root)
}

fn canonicalize_existing_prefix(path: &Path) -> Result<PathBuf, SandboxViolation> {
    let mut existing = path.to_path_buf();
    let mut tail = Vec::new();

    loop {
        match std::fs::symlink_metadata(&existing) {
            Ok(_) => break,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                let Some(name) = existing.file_name().map(|name| name.to_os_string()) else {
                    break;
                };
                tail.push(name);
                if !existing.pop() {
                    break;
                }
            }
            Err(source) => {
                return Err(SandboxViolation::Inspect {
                    path: existing,
                    source,
                });
            }
        }
    }

    let mut canonical = match std::fs::canonicalize(&existing) {
        Ok(canonical) => canonical,
        // A dangling link at the deepest existing level: judge the link
        // target lexically instead of failing the request.
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            let target = std::fs::read_link(&existing).map_err(|source| {
                SandboxViolation::Inspect {
                    path: existing.clone(),
                    source,
                }
            })?;
            let parent = existing.parent().unwrap_or_else(|| Path::new("/"));
            normalize_path(&parent.join(target))
        }
        Err(source) => {
            return Err(SandboxViolation::Inspect {
                path: existing,
                source,
            });
        }
    };

    for name in tail.into_iter().rev() {
        canonical.push(name);
    }
    Ok(canonical)
}
