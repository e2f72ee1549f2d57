use std::path::{Path, PathBuf};

use anyhow::Result;

use super::builder::ConfigBuilder;
use super::layers::ConfigLayerStack;
use crate::root::GatewayConfig;

/// A validated configuration together with the layers it was built from.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: GatewayConfig,
    workspace: PathBuf,
    layer_stack: ConfigLayerStack,
}

impl ConfigManager {
    pub(crate) fn new(config: GatewayConfig, workspace: PathBuf, layer_stack: ConfigLayerStack) -> Self {
        Self {
            config,
            workspace,
            layer_stack,
        }
    }

    /// Load from `workspace` with the process environment and no CLI overrides.
    pub fn load_from_workspace(workspace: impl Into<PathBuf>) -> Result<Self> {
        ConfigBuilder::new().workspace(workspace).build()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn into_config(self) -> GatewayConfig {
        self.config
    }

    /// Directory the config file and `.env` were looked up in.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// The sandbox root: `sandbox.root` when set, otherwise the workspace.
    pub fn sandbox_root(&self) -> PathBuf {
        self.config.sandbox.root_or(&self.workspace)
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.layer_stack.config_file().map(PathBuf::as_path)
    }

    pub fn layer_stack(&self) -> &ConfigLayerStack {
        &self.layer_stack
    }
}
