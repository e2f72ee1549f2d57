use serde::Serialize;
use std::path::PathBuf;
use toml::Value as TomlValue;

/// Where a configuration layer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConfigLayerSource {
    /// `sandgate.toml` in the sandbox root, or the file passed with `--config`.
    File { file: PathBuf },
    /// Variables read from a `.env` file.
    Dotenv { file: PathBuf },
    /// Process environment.
    Environment,
    /// Command-line overrides.
    Runtime,
}

/// A single layer of configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayerEntry {
    pub source: ConfigLayerSource,
    pub config: TomlValue,
}

impl ConfigLayerEntry {
    pub fn new(source: ConfigLayerSource, config: TomlValue) -> Self {
        Self { source, config }
    }
}

/// Layers ordered from lowest to highest precedence. Compiled defaults are
/// not a layer; serde fills whatever no layer sets.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayerStack {
    layers: Vec<ConfigLayerEntry>,
}

impl ConfigLayerStack {
    pub fn push(&mut self, layer: ConfigLayerEntry) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[ConfigLayerEntry] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Fold every layer into one document; later layers win key by key.
    pub fn effective_config(&self) -> TomlValue {
        let mut merged = TomlValue::Table(toml::Table::new());
        for layer in &self.layers {
            overlay(&mut merged, &layer.config);
        }
        merged
    }

    /// The file of the highest-precedence file layer, if any.
    pub fn config_file(&self) -> Option<&PathBuf> {
        self.layers.iter().rev().find_map(|layer| match &layer.source {
            ConfigLayerSource::File { file } => Some(file),
            _ => None,
        })
    }
}

/// Tables merge recursively; any other value replaces what is below it.
fn overlay(base: &mut TomlValue, top: &TomlValue) {
    match (base, top) {
        (TomlValue::Table(base), TomlValue::Table(top)) => {
            for (key, value) in top {
                match base.get_mut(key) {
                    Some(existing) => overlay(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, top) => *base = top.clone(),
    }
}

/// Set `a.b.c = value`, creating (or replacing non-table) intermediate tables.
pub(crate) fn insert_dotted_key(table: &mut toml::Table, key: &str, value: TomlValue) {
    match key.split_once('.') {
        None => {
            table.insert(key.to_owned(), value);
        }
        Some((head, rest)) => {
            let entry = table
                .entry(head.to_owned())
                .or_insert_with(|| TomlValue::Table(toml::Table::new()));
            if !entry.is_table() {
                *entry = TomlValue::Table(toml::Table::new());
            }
            if let TomlValue::Table(child) = entry {
                insert_dotted_key(child, rest, value);
            }
        }
    }
}
