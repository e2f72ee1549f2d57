//! Filesystem operations on already-resolved sandbox paths.
//!
//! Nothing here resolves or validates paths; callers pass [`ResolvedPath`]s
//! produced by the sandbox resolver.

use futures::future::{BoxFuture, FutureExt, join_all};
use sandgate_commons::{FileTreeNode, ResolvedPath};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to move {} to {}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to list {}", path.display())]
    Tree {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read a file as text. Invalid UTF-8 is replaced rather than rejected.
pub async fn read_file(path: &ResolvedPath) -> Result<String, FsError> {
    let bytes = fs::read(path).await.map_err(|source| FsError::Read {
        path: path.as_path().to_path_buf(),
        source,
    })?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

/// Overwrite (or create) a file, creating missing parent directories.
pub async fn write_file(path: &ResolvedPath, content: &str) -> Result<(), FsError> {
    let write_error = |source| FsError::Write {
        path: path.as_path().to_path_buf(),
        source,
    };
    if let Some(parent) = path.as_path().parent() {
        fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    fs::write(path, content).await.map_err(write_error)
}

/// Recursive and idempotent.
pub async fn create_dir(path: &ResolvedPath) -> Result<(), FsError> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| FsError::CreateDir {
            path: path.as_path().to_path_buf(),
            source,
        })
}

/// Rename `from` to `to`, creating the destination's parent directories.
pub async fn move_item(from: &ResolvedPath, to: &ResolvedPath) -> Result<(), FsError> {
    let move_error = |source| FsError::Move {
        from: from.as_path().to_path_buf(),
        to: to.as_path().to_path_buf(),
        source,
    };
    if let Some(parent) = to.as_path().parent() {
        fs::create_dir_all(parent).await.map_err(move_error)?;
    }
    fs::rename(from, to).await.map_err(move_error)
}

/// Describe `path` recursively.
///
/// Failing to describe the target itself is an error. Below it, entries that
/// cannot be described (vanished, unreadable, dangling links) are left out.
/// Symlinked directories are reported with no children and never followed.
pub async fn build_tree(path: &ResolvedPath) -> Result<FileTreeNode, FsError> {
    describe(path.as_path().to_path_buf(), true)
        .await
        .map_err(|source| FsError::Tree {
            path: path.as_path().to_path_buf(),
            source,
        })
}

fn describe(path: PathBuf, follow: bool) -> BoxFuture<'static, io::Result<FileTreeNode>> {
    async move {
        let name = node_name(&path);
        let metadata = fs::metadata(&path).await?;
        if !metadata.is_dir() {
            return Ok(FileTreeNode::file(name, metadata.len()));
        }
        if !follow {
            return Ok(FileTreeNode::directory(name, Vec::new()));
        }

        let mut entries = fs::read_dir(&path).await?;
        let mut pending = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let is_link = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_symlink())
                .unwrap_or(false);
            pending.push(describe(entry.path(), !is_link));
        }

        let children = join_all(pending)
            .await
            .into_iter()
            .filter_map(|child| {
                child
                    .inspect_err(|error| debug!(%error, "skipping tree entry"))
                    .ok()
            })
            .collect();
        Ok(FileTreeNode::directory(name, children))
    }
    .boxed()
}

fn node_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
