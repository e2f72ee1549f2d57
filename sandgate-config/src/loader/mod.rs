pub mod layers;

mod builder;
mod env;
mod manager;

pub use builder::ConfigBuilder;
pub use env::ConfigError;
pub use manager::ConfigManager;
