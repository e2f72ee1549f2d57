use super::layers::insert_dotted_key;
use crate::constants::env;
use hashbrown::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name}=`{value}` is not a valid {expected}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("failed to read {}", path.display())]
    Dotenv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

#[derive(Debug, Clone, Copy)]
enum ValueKind {
    Text,
    Integer,
}

const ENV_BINDINGS: &[(&str, &str, ValueKind)] = &[
    (env::SANDBOX_ROOT, "sandbox.root", ValueKind::Text),
    (env::PORT, "server.port", ValueKind::Integer),
    (env::HOST, "server.host", ValueKind::Text),
    (env::CORS_ORIGIN, "server.cors_origin", ValueKind::Text),
    (env::EXEC_TIMEOUT_SECS, "exec.timeout_secs", ValueKind::Integer),
    (env::RATE_LIMIT, "rate_limit.max_requests", ValueKind::Integer),
    (env::RATE_WINDOW_SECS, "rate_limit.window_secs", ValueKind::Integer),
    (env::LOG, "log_level", ValueKind::Text),
];

/// Translate the recognised variables into a TOML layer. Empty values count
/// as unset. Returns `None` when no variable is present.
pub(crate) fn environment_layer(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<toml::Value>, ConfigError> {
    let mut table = toml::Table::new();
    for (name, key, kind) in ENV_BINDINGS {
        let Some(raw) = lookup(*name).filter(|value| !value.trim().is_empty()) else {
            continue;
        };
        let value = match kind {
            ValueKind::Text => toml::Value::String(raw),
            ValueKind::Integer => raw
                .trim()
                .parse::<u64>()
                .ok()
                .and_then(|number| i64::try_from(number).ok())
                .map(toml::Value::Integer)
                .ok_or(ConfigError::InvalidEnv {
                    name: *name,
                    value: raw,
                    expected: "non-negative integer",
                })?,
        };
        insert_dotted_key(&mut table, key, value);
    }
    Ok((!table.is_empty()).then_some(toml::Value::Table(table)))
}

/// Variables from a dotenv file. A missing file yields an empty map.
pub(crate) fn read_dotenv(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(dotenvy::Error::Io(err)) if err.kind() == ErrorKind::NotFound => {
            return Ok(HashMap::new());
        }
        Err(source) => {
            return Err(ConfigError::Dotenv {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    iter.map(|item| {
        item.map_err(|source| ConfigError::Dotenv {
            path: path.to_path_buf(),
            source,
        })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_owned())
        }
    }

    #[test]
    fn maps_variables_onto_keys() {
        let layer = environment_layer(lookup(&[
            ("PORT", "4100"),
            ("SANDBOX_ROOT", "/srv/sandbox"),
            ("SANDGATE_RATE_LIMIT", "10"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(layer["server"]["port"].as_integer(), Some(4100));
        assert_eq!(layer["sandbox"]["root"].as_str(), Some("/srv/sandbox"));
        assert_eq!(layer["rate_limit"]["max_requests"].as_integer(), Some(10));
    }

    #[test]
    fn empty_values_are_ignored() {
        assert!(environment_layer(lookup(&[("PORT", "  ")])).unwrap().is_none());
    }

    #[test]
    fn rejects_non_numeric_port() {
        let err = environment_layer(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().starts_with("PORT=`eighty`"));
    }

    #[test]
    fn missing_dotenv_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_dotenv(&dir.path().join(".env")).unwrap().is_empty());
    }
}
