use crate::constants::defaults;
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind. Only loopback addresses are accepted.
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    /// The single origin allowed by the CORS policy.
    #[serde(default = "ServerConfig::default_cors_origin")]
    pub cors_origin: String,
    /// Requests with larger bodies are answered with 413.
    #[serde(default = "ServerConfig::default_body_limit_bytes")]
    pub body_limit_bytes: usize,
    /// Mount `GET /bridge-token` for same-origin callers.
    #[serde(default)]
    pub expose_token_endpoint: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            cors_origin: Self::default_cors_origin(),
            body_limit_bytes: Self::default_body_limit_bytes(),
            expose_token_endpoint: false,
        }
    }
}

impl ServerConfig {
    fn default_host() -> String {
        defaults::DEFAULT_HOST.to_owned()
    }

    const fn default_port() -> u16 {
        defaults::DEFAULT_PORT
    }

    fn default_cors_origin() -> String {
        defaults::DEFAULT_CORS_ORIGIN.to_owned()
    }

    const fn default_body_limit_bytes() -> usize {
        defaults::DEFAULT_BODY_LIMIT_BYTES
    }

    /// The bind address, already checked to be loopback by [`Self::validate`].
    pub fn ip(&self) -> Result<IpAddr> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(IpAddr::from([127, 0, 0, 1]));
        }
        self.host
            .parse()
            .map_err(|_| anyhow::anyhow!("server.host `{}` is not an IP address", self.host))
    }

    /// True for the `*` wildcard, which credentialed CORS does not permit.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origin.trim() == "*"
    }

    pub fn validate(&self) -> Result<()> {
        let ip = self.ip()?;
        ensure!(
            ip.is_loopback(),
            "server.host must be a loopback address, got `{}`",
            self.host
        );
        ensure!(
            !self.cors_origin.trim().is_empty(),
            "server.cors_origin must not be empty"
        );
        ensure!(
            !self.allows_any_origin(),
            "server.cors_origin must name a single origin such as `http://localhost:3000`; \
             `*` cannot be combined with credentialed requests"
        );
        ensure!(
            self.body_limit_bytes > 0,
            "server.body_limit_bytes must be greater than zero"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_cors_origin_is_rejected() {
        let config = ServerConfig {
            cors_origin: " * ".into(),
            ..ServerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.cors_origin"));
    }

    #[test]
    fn explicit_origin_is_accepted() {
        let config = ServerConfig {
            cors_origin: "http://127.0.0.1:5173".into(),
            ..ServerConfig::default()
        };
        config.validate().unwrap();
    }
}
