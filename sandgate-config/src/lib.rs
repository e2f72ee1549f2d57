//! Configuration for the sandgate gateway.
//!
//! [`GatewayConfig`] is assembled from layers, lowest precedence first:
//! compiled defaults, `sandgate.toml` (or an explicit file), the `.env` file
//! and process environment, and finally command-line overrides. See
//! [`ConfigBuilder`].

pub mod constants;
pub mod exec;
pub mod loader;
pub mod rate_limit;
pub mod root;
pub mod sandbox;
pub mod server;

pub use exec::ExecConfig;
pub use loader::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};
pub use loader::{ConfigBuilder, ConfigError, ConfigManager};
pub use rate_limit::RateLimitConfig;
pub use root::GatewayConfig;
pub use sandbox::SandboxConfig;
pub use server::ServerConfig;
