use crate::token::read_token_file;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use sandgate_commons::HealthStatus;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// What `/health` said, if anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthProbe {
    Online(HealthStatus),
    Offline,
    Error(StatusCode),
}

impl fmt::Display for HealthProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online(health) => write!(f, "ONLINE (version {})", health.version),
            Self::Offline => f.write_str("OFFLINE"),
            Self::Error(status) => write!(f, "ERROR({})", status.as_u16()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DoctorReport {
    pub url: String,
    pub health: HealthProbe,
    pub token_file: PathBuf,
    pub token_present: bool,
}

impl DoctorReport {
    pub fn is_healthy(&self) -> bool {
        matches!(self.health, HealthProbe::Online(_)) && self.token_present
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "gateway  {}: {}", self.url, self.health)?;
        let token = if self.token_present {
            "present"
        } else {
            "missing"
        };
        write!(f, "token    {}: {token}", self.token_file.display())
    }
}

/// Probe `{base_url}/health`. Connection failures and timeouts count as
/// offline rather than as errors.
pub async fn probe_health(base_url: &str) -> Result<HealthProbe> {
    let http = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    let response = match http.get(&url).send().await {
        Ok(response) => response,
        Err(error) => {
            tracing::debug!(%error, %url, "health probe failed");
            return Ok(HealthProbe::Offline);
        }
    };
    let status = response.status();
    if !status.is_success() {
        return Ok(HealthProbe::Error(status));
    }
    match response.json::<HealthStatus>().await {
        Ok(health) => Ok(HealthProbe::Online(health)),
        Err(error) => {
            tracing::debug!(%error, "health body did not parse");
            Ok(HealthProbe::Error(status))
        }
    }
}

pub async fn run_doctor(base_url: &str, token_file: PathBuf) -> Result<DoctorReport> {
    let health = probe_health(base_url).await?;
    let token_present = read_token_file(&token_file)?.is_some();
    Ok(DoctorReport {
        url: base_url.to_owned(),
        health,
        token_file,
        token_present,
    })
}
