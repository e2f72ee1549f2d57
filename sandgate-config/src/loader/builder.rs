use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hashbrown::HashMap;
use tracing::debug;

use super::env::{environment_layer, read_dotenv};
use super::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack, insert_dotted_key};
use super::manager::ConfigManager;
use crate::constants::{CONFIG_FILE_NAME, DOTENV_FILE_NAME, env};
use crate::root::GatewayConfig;

#[derive(Debug, Clone, Default)]
enum EnvSource {
    #[default]
    Process,
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    fn get(&self, name: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(name).ok(),
            Self::Fixed(vars) => vars.get(name).cloned(),
        }
    }
}

/// Builder for a [`ConfigManager`].
///
/// The directory searched for `sandgate.toml` and `.env` is, in order, the
/// one set with [`ConfigBuilder::workspace`], `$SANDBOX_ROOT`, or the current
/// directory. An explicit [`ConfigBuilder::config_file`] replaces the search
/// and its parent directory is used for `.env`.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    workspace: Option<PathBuf>,
    config_file: Option<PathBuf>,
    cli_overrides: Vec<(String, toml::Value)>,
    env: EnvSource,
    load_dotenv: bool,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            workspace: None,
            config_file: None,
            cli_overrides: Vec::new(),
            env: EnvSource::Process,
            load_dotenv: true,
        }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workspace(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace = Some(path.into());
        self
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Add a CLI override, e.g. `("server.port", 4000)`.
    pub fn cli_override(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.cli_overrides.push((key.into(), value.into()));
        self
    }

    /// Add overrides from `key=value` strings. Values are parsed as TOML and
    /// fall back to plain strings.
    pub fn cli_overrides(mut self, overrides: &[(String, String)]) -> Self {
        for (key, value) in overrides {
            let toml_value = value
                .parse::<toml::Value>()
                .unwrap_or_else(|_| toml::Value::String(value.clone()));
            self.cli_overrides.push((key.clone(), toml_value));
        }
        self
    }

    /// Read variables from the given map instead of the process environment.
    pub fn env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = EnvSource::Fixed(
            vars.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }

    pub fn without_dotenv(mut self) -> Self {
        self.load_dotenv = false;
        self
    }

    pub fn build(self) -> Result<ConfigManager> {
        let workspace = match &self.workspace {
            Some(path) => path.clone(),
            None => match self.env.get(env::SANDBOX_ROOT).filter(|root| !root.is_empty()) {
                Some(root) => PathBuf::from(root),
                None => std::env::current_dir().context("Failed to resolve current directory")?,
            },
        };

        let mut layer_stack = ConfigLayerStack::default();

        let config_path = match &self.config_file {
            Some(path) => Some(path.clone()),
            None => Some(workspace.join(CONFIG_FILE_NAME)).filter(|path| path.is_file()),
        };
        if let Some(path) = &config_path {
            layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::File { file: path.clone() },
                load_toml_from_file(path)?,
            ));
        }

        if self.load_dotenv {
            let dir = config_path
                .as_deref()
                .and_then(Path::parent)
                .unwrap_or(&workspace);
            let path = dir.join(DOTENV_FILE_NAME);
            let vars = read_dotenv(&path)?;
            if let Some(layer) = environment_layer(|name| vars.get(name).cloned())? {
                debug!(path = %path.display(), "loaded dotenv layer");
                layer_stack.push(ConfigLayerEntry::new(
                    ConfigLayerSource::Dotenv { file: path },
                    layer,
                ));
            }
        }

        if let Some(layer) = environment_layer(|name| self.env.get(name))? {
            layer_stack.push(ConfigLayerEntry::new(ConfigLayerSource::Environment, layer));
        }

        if !self.cli_overrides.is_empty() {
            let mut runtime = toml::Table::new();
            for (key, value) in self.cli_overrides {
                insert_dotted_key(&mut runtime, &key, value);
            }
            layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::Runtime,
                toml::Value::Table(runtime),
            ));
        }

        let config: GatewayConfig = layer_stack
            .effective_config()
            .try_into()
            .context("Failed to deserialize effective configuration")?;
        config
            .validate()
            .context("Configuration failed validation")?;

        Ok(ConfigManager::new(config, workspace, layer_stack))
    }
}

fn load_toml_from_file(path: &Path) -> Result<toml::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
