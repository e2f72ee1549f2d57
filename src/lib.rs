//! sandgate: a loopback HTTP gateway that lets local tooling read and write
//! files and run shell commands inside one directory tree.
//!
//! The binary wires these modules together; integration tests and the
//! [`client::BridgeClient`] use them directly.

pub mod cli;
pub mod client;
pub mod doctor;
pub mod exec;
pub mod fs_ops;
pub mod hardening;
pub mod rate_limiter;
pub mod server;
pub mod token;

pub use client::{BridgeClient, ClientError};
pub use exec::{CommandGateway, GatewayError};
pub use rate_limiter::{Admission, RateLimiter};
pub use server::{ApiError, AppState, create_router};
pub use token::{BridgeToken, TokenFileGuard};
