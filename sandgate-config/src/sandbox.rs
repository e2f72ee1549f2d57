use crate::constants::defaults;
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Directory tree every operation is confined to. Unset means the
    /// working directory of the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Token file name, relative to the root.
    #[serde(default = "SandboxConfig::default_token_file")]
    pub token_file: String,
    /// Re-check resolved paths against the canonical root so symlinks
    /// cannot lead out.
    #[serde(default = "SandboxConfig::default_symlink_guard")]
    pub symlink_guard: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: None,
            token_file: Self::default_token_file(),
            symlink_guard: Self::default_symlink_guard(),
        }
    }
}

impl SandboxConfig {
    fn default_token_file() -> String {
        defaults::DEFAULT_TOKEN_FILE.to_owned()
    }

    const fn default_symlink_guard() -> bool {
        true
    }

    /// The configured root, or `fallback` when none was set.
    pub fn root_or(&self, fallback: &Path) -> PathBuf {
        self.root.clone().unwrap_or_else(|| fallback.to_path_buf())
    }

    pub fn token_path(&self, root: &Path) -> PathBuf {
        root.join(&self.token_file)
    }

    pub fn validate(&self) -> Result<()> {
        let token_file = Path::new(&self.token_file);
        ensure!(
            !self.token_file.is_empty()
                && token_file.components().count() == 1
                && token_file.file_name().is_some(),
            "sandbox.token_file must be a plain file name, got `{}`",
            self.token_file
        );
        Ok(())
    }
}
