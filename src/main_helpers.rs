use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const LOG_TARGETS: &[&str] = &[
    "sandgate",
    "sandgate_bash_runner",
    "sandgate_commons",
    "sandgate_config",
    "tower_http",
];

/// Filter directives for `level` applied to our own crates only.
pub(crate) fn default_directives(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr
/// so `token` and `doctor` output stays clean on stdout.
pub(crate) fn initialize_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&level.to_ascii_lowercase())));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
    if let Err(err) = init_result {
        tracing::warn!(error = %err, "tracing already initialized; skipping setup");
    }
}
