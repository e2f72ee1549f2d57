//! The HTTP surface: router, shared state, and the serve loop.

mod error;
mod extract;
mod handlers;
mod middleware;

pub use error::{ApiError, security_headers};

use crate::exec::CommandGateway;
use crate::rate_limiter::RateLimiter;
use crate::token::{BridgeToken, TokenFileGuard};
use anyhow::{Context, Result, ensure};
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use axum::{Router, middleware as axum_middleware};
use sandgate_commons::{ResolvedPath, SandboxRoot, SandboxViolation};
use sandgate_config::GatewayConfig;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Settings the request path needs, copied out of [`GatewayConfig`].
#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    pub symlink_guard: bool,
    pub trust_forwarded_for: bool,
    pub cors_origin: HeaderValue,
    pub body_limit_bytes: usize,
    pub expose_token_endpoint: bool,
    pub token_path: PathBuf,
}

struct Shared {
    sandbox: SandboxRoot,
    token: BridgeToken,
    limiter: Arc<RateLimiter>,
    gateway: CommandGateway,
    settings: ServerSettings,
}

/// Cheaply cloneable state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Shared>,
}

impl AppState {
    pub fn new(config: &GatewayConfig, sandbox: SandboxRoot, token: BridgeToken) -> Result<Self> {
        ensure!(
            !config.server.allows_any_origin(),
            "server.cors_origin `*` cannot be used with credentialed CORS"
        );
        let cors_origin = HeaderValue::from_str(&config.server.cors_origin)
            .context("server.cors_origin is not a valid header value")?;
        let gateway = CommandGateway::new(sandbox.path(), &config.exec)
            .context("exec.extra_denied_patterns contains an invalid pattern")?;
        let settings = ServerSettings {
            symlink_guard: config.sandbox.symlink_guard,
            trust_forwarded_for: config.rate_limit.trust_forwarded_for,
            cors_origin,
            body_limit_bytes: config.server.body_limit_bytes,
            expose_token_endpoint: config.server.expose_token_endpoint,
            token_path: config.sandbox.token_path(sandbox.path()),
        };

        Ok(Self {
            inner: Arc::new(Shared {
                sandbox,
                token,
                limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
                gateway,
                settings,
            }),
        })
    }

    pub fn sandbox(&self) -> &SandboxRoot {
        &self.inner.sandbox
    }

    pub fn token(&self) -> &BridgeToken {
        &self.inner.token
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.limiter
    }

    pub fn gateway(&self) -> &CommandGateway {
        &self.inner.gateway
    }

    pub(crate) fn settings(&self) -> &ServerSettings {
        &self.inner.settings
    }

    /// Resolve a caller-supplied path, mapping violations onto API errors.
    pub(crate) fn resolve(&self, relative: &str) -> Result<ResolvedPath, ApiError> {
        let resolved = if self.settings().symlink_guard {
            self.sandbox().resolve_guarded(relative)
        } else {
            self.sandbox().resolve(relative)
        };

        resolved.map_err(|violation| match violation {
            SandboxViolation::Empty => ApiError::Validation(extract::PATH_REQUIRED),
            violation if violation.is_escape() => {
                warn!(%violation, "rejected path outside sandbox");
                ApiError::OutsideSandbox
            }
            violation => {
                error!(%violation, "failed to inspect path");
                ApiError::OperationFailed("Path inspection failed")
            }
        })
    }
}

fn cors_layer(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build the router. Layers run outermost first: tracing, CORS, the body
/// limit, rate limiting, then authentication.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/fs/read", get(handlers::read_file))
        .route("/fs/write", post(handlers::write_file))
        .route("/fs/mkdir", post(handlers::make_dir))
        .route("/fs/move", post(handlers::move_item))
        .route("/fs/tree", get(handlers::tree))
        .route("/exec", post(handlers::exec));
    if state.settings().expose_token_endpoint {
        router = router.route(middleware::TOKEN_PATH, get(handlers::bridge_token));
    }

    let [nosniff, frame_options] = security_headers();
    router
        .layer(SetResponseHeaderLayer::overriding(nosniff.0, nosniff.1))
        .layer(SetResponseHeaderLayer::overriding(
            frame_options.0,
            frame_options.1,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::limit_body,
        ))
        .layer(DefaultBodyLimit::disable())
        .layer(cors_layer(state.settings().cors_origin.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Run the gateway for `root` until ctrl-c or SIGTERM.
///
/// The token file is written only once the listener is bound and is removed
/// again on the way out, whether the server stopped cleanly or not.
pub async fn run(config: &GatewayConfig, root: &Path) -> Result<()> {
    ensure!(
        root.is_dir(),
        "sandbox root {} is not a directory",
        root.display()
    );
    let sandbox = SandboxRoot::new(root)
        .with_context(|| format!("Failed to open sandbox root {}", root.display()))?;
    let token = BridgeToken::generate()?;
    let state = AppState::new(config, sandbox, token.clone())?;

    let addr = SocketAddr::new(config.server.ip()?, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local_addr = listener.local_addr()?;

    let token_file = TokenFileGuard::create(&state.settings().token_path, &token)?;
    let sweeper = state
        .limiter()
        .spawn_sweeper(config.rate_limit.sweep_interval());

    info!(
        addr = %local_addr,
        root = %state.sandbox().path().display(),
        token_file = %token_file.path().display(),
        "sandgate listening"
    );

    let served = serve(listener, state, shutdown_signal()).await;
    sweeper.abort();
    drop(token_file);
    served.context("HTTP server failed")?;
    info!("sandgate stopped");
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
