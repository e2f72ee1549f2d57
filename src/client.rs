//! HTTP client for a running gateway.
//!
//! Every call carries the bearer token. Non-2xx answers surface as
//! [`ClientError::Status`] with the message the gateway put in its error body.

use crate::token::{BridgeToken, TokenError, read_token_file};
use reqwest::{Client, RequestBuilder, StatusCode};
use sandgate_commons::{
    ContentResponse, ErrorBody, ExecOutcome, FileTreeNode, HealthStatus, SuccessResponse,
    TreeResponse,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to gateway failed")]
    Http(#[from] reqwest::Error),
    #[error("gateway answered {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("no token found at {}; is the gateway running?", path.display())]
    MissingToken { path: PathBuf },
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Clone, Debug)]
pub struct BridgeClient {
    base_url: String,
    http: Client,
    token: BridgeToken,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>, token: BridgeToken) -> ClientResult<Self> {
        Self::with_timeout(base_url, token, None)
    }

    /// Like [`Self::new`], but every request gives up after `timeout`.
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: BridgeToken,
        timeout: Option<Duration>,
    ) -> ClientResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http: builder.build()?,
            token,
        })
    }

    /// Build a client from the token file a gateway wrote into its root.
    pub fn from_token_file(base_url: impl Into<String>, path: &Path) -> ClientResult<Self> {
        let secret = read_token_file(path)?.ok_or_else(|| ClientError::MissingToken {
            path: path.to_path_buf(),
        })?;
        Self::new(base_url, BridgeToken::from_secret(secret))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.bearer_auth(self.token.expose()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unexpected response")
                    .to_owned(),
            };
            return Err(ClientError::Status { status, message });
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn health(&self) -> ClientResult<HealthStatus> {
        self.send(self.http.get(self.url("/health"))).await
    }

    pub async fn read(&self, path: &str) -> ClientResult<String> {
        let request = self.http.get(self.url("/fs/read")).query(&[("path", path)]);
        let body: ContentResponse = self.send(request).await?;
        Ok(body.content)
    }

    pub async fn write(&self, path: &str, content: &str) -> ClientResult<()> {
        let request = self
            .http
            .post(self.url("/fs/write"))
            .json(&json!({ "path": path, "content": content }));
        self.send::<SuccessResponse>(request).await.map(drop)
    }

    pub async fn mkdir(&self, path: &str) -> ClientResult<()> {
        let request = self
            .http
            .post(self.url("/fs/mkdir"))
            .json(&json!({ "path": path }));
        self.send::<SuccessResponse>(request).await.map(drop)
    }

    pub async fn move_item(&self, source: &str, destination: &str) -> ClientResult<()> {
        let request = self
            .http
            .post(self.url("/fs/move"))
            .json(&json!({ "source": source, "destination": destination }));
        self.send::<SuccessResponse>(request).await.map(drop)
    }

    /// Tree below `path`, or below the sandbox root when `None`.
    pub async fn tree(&self, path: Option<&str>) -> ClientResult<FileTreeNode> {
        let mut request = self.http.get(self.url("/fs/tree"));
        if let Some(path) = path {
            request = request.query(&[("path", path)]);
        }
        let body: TreeResponse = self.send(request).await?;
        Ok(body.tree)
    }

    pub async fn exec(&self, command: &str) -> ClientResult<ExecOutcome> {
        let request = self
            .http
            .post(self.url("/exec"))
            .json(&json!({ "command": command }));
        self.send(request).await
    }
}
