//! The per-process bearer token and its on-disk copy.

use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

/// Random bytes behind a token; hex encoding doubles the length.
pub const TOKEN_BYTES: usize = 32;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("system random number generator failed")]
    Rng,
    #[error("failed to write token file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read token file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Shared secret every authenticated request must present.
#[derive(Clone)]
pub struct BridgeToken(Arc<str>);

impl BridgeToken {
    pub fn generate() -> Result<Self, TokenError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| TokenError::Rng)?;
        Ok(Self(hex::encode(bytes).into()))
    }

    /// Wrap an existing token, e.g. one read back from the token file.
    pub fn from_secret(secret: impl Into<Arc<str>>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a presented credential.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// Check an `Authorization` header value. Only the exact form
    /// `Bearer <token>` is accepted.
    pub fn authorizes(&self, header: Option<&str>) -> bool {
        header
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .is_some_and(|candidate| self.matches(candidate))
    }
}

impl fmt::Debug for BridgeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BridgeToken(<redacted>)")
    }
}

/// Owns the token file for the lifetime of the server and deletes it on drop.
///
/// An existing file (left by a crashed run) is overwritten.
#[derive(Debug)]
pub struct TokenFileGuard {
    path: PathBuf,
}

impl TokenFileGuard {
    pub fn create(path: impl Into<PathBuf>, token: &BridgeToken) -> Result<Self, TokenError> {
        let path = path.into();
        write_owner_only(&path, token.expose().as_bytes()).map_err(|source| TokenError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "wrote token file");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TokenFileGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed token file"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => warn!(path = %self.path.display(), %error, "failed to remove token file"),
        }
    }
}

#[cfg(unix)]
fn write_owner_only(path: &Path, contents: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies to newly created files.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, contents: &[u8]) -> io::Result<()> {
    std::fs::write(path, contents)
}

/// Read a token file. A missing or blank file yields `None`.
pub fn read_token_file(path: &Path) -> Result<Option<String>, TokenError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let token = contents.trim();
            Ok((!token.is_empty()).then(|| token.to_owned()))
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TokenError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
