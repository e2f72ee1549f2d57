/// File looked up in the sandbox root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "sandgate.toml";

/// Dotenv file looked up next to the config file.
pub const DOTENV_FILE_NAME: &str = ".env";

/// Compiled defaults, the lowest configuration layer.
pub mod defaults {
    pub const DEFAULT_HOST: &str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 3001;
    pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
    pub const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

    pub const DEFAULT_TOKEN_FILE: &str = ".bridge-token";

    pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
    pub const DEFAULT_RATE_MAX_REQUESTS: u32 = 120;
    pub const DEFAULT_RATE_SWEEP_INTERVAL_SECS: u64 = 300;
    /// Upper bound for the rate window and the sweep interval.
    pub const MAX_RATE_WINDOW_SECS: u64 = 24 * 60 * 60;

    pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_EXEC_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

/// Environment variables mapped onto configuration keys.
pub mod env {
    pub const SANDBOX_ROOT: &str = "SANDBOX_ROOT";
    pub const PORT: &str = "PORT";
    pub const HOST: &str = "HOST";
    pub const CORS_ORIGIN: &str = "CORS_ORIGIN";
    pub const EXEC_TIMEOUT_SECS: &str = "SANDGATE_EXEC_TIMEOUT_SECS";
    pub const RATE_LIMIT: &str = "SANDGATE_RATE_LIMIT";
    pub const RATE_WINDOW_SECS: &str = "SANDGATE_RATE_WINDOW_SECS";
    pub const LOG: &str = "SANDGATE_LOG";
}
