use super::AppState;
use super::error::ApiError;
use super::extract::{ApiJson, MovePaths, PathBody, PathJson, QueryPath, TreeTarget};
use crate::exec::GatewayError;
use crate::fs_ops;
use crate::token::read_token_file;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use sandgate_commons::{
    ContentResponse, ExecOutcome, HealthStatus, SuccessResponse, TokenResponse, TreeResponse,
};
use serde::Deserialize;
use std::error::Error as StdError;
use tracing::{error, info, warn};

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Log the underlying failure and hand back the generic message.
fn operation_failed(failure: impl StdError, message: &'static str) -> ApiError {
    let cause = failure
        .source()
        .map(ToString::to_string)
        .unwrap_or_default();
    error!(error = %failure, %cause, "{message}");
    ApiError::OperationFailed(message)
}

pub(crate) async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::ok(env!("CARGO_PKG_VERSION")))
}

pub(crate) async fn read_file(QueryPath(path): QueryPath) -> ApiResult<ContentResponse> {
    let content = fs_ops::read_file(&path)
        .await
        .map_err(|failure| operation_failed(failure, "File read failed"))?;
    Ok(Json(ContentResponse { content }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct WriteBody {
    path: Option<String>,
    content: Option<String>,
}

impl PathBody for WriteBody {
    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

pub(crate) async fn write_file(
    PathJson { path, body }: PathJson<WriteBody>,
) -> ApiResult<SuccessResponse> {
    let content = body
        .content
        .ok_or(ApiError::Validation("Content is required"))?;
    fs_ops::write_file(&path, &content)
        .await
        .map_err(|failure| operation_failed(failure, "File write failed"))?;
    Ok(Json(SuccessResponse::OK))
}

#[derive(Debug, Deserialize)]
pub(crate) struct TargetBody {
    path: Option<String>,
}

impl PathBody for TargetBody {
    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

pub(crate) async fn make_dir(
    PathJson { path, .. }: PathJson<TargetBody>,
) -> ApiResult<SuccessResponse> {
    fs_ops::create_dir(&path)
        .await
        .map_err(|failure| operation_failed(failure, "mkdir failed"))?;
    Ok(Json(SuccessResponse::OK))
}

pub(crate) async fn move_item(
    MovePaths {
        source,
        destination,
    }: MovePaths,
) -> ApiResult<SuccessResponse> {
    fs_ops::move_item(&source, &destination)
        .await
        .map_err(|failure| operation_failed(failure, "Move failed"))?;
    Ok(Json(SuccessResponse::OK))
}

pub(crate) async fn tree(TreeTarget(path): TreeTarget) -> ApiResult<TreeResponse> {
    let tree = fs_ops::build_tree(&path)
        .await
        .map_err(|failure| operation_failed(failure, "Tree read failed"))?;
    Ok(Json(TreeResponse { tree }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecBody {
    command: Option<String>,
}

/// The command runs on its own task so a dropped connection does not cut it
/// short; the timeout still bounds it.
pub(crate) async fn exec(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ExecBody>,
) -> ApiResult<ExecOutcome> {
    let command = body
        .command
        .filter(|command| !command.trim().is_empty())
        .ok_or(ApiError::Validation("Command is required"))?;

    info!(%command, "executing command");
    let gateway = state.gateway().clone();
    let task = tokio::spawn(async move { gateway.execute(&command).await });
    match task.await {
        Ok(Ok(outcome)) => {
            info!(exit_code = outcome.exit_code, "command finished");
            Ok(Json(outcome))
        }
        Ok(Err(GatewayError::Blocked(violation))) => {
            warn!(%violation, "command blocked");
            Err(ApiError::CommandBlocked)
        }
        Ok(Err(failure @ GatewayError::Failed(_))) => {
            Err(operation_failed(failure, "Execution failed"))
        }
        Err(join_error) => Err(operation_failed(join_error, "Execution failed")),
    }
}

/// Hands the current token to same-origin callers.
pub(crate) async fn bridge_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(origin) = headers.get(header::ORIGIN)
        && *origin != state.settings().cors_origin
    {
        warn!(origin = ?origin, "token request from foreign origin");
        return ApiError::ForbiddenOrigin.into_response();
    }

    match read_token_file(&state.settings().token_path) {
        Ok(Some(token)) => Json(TokenResponse { token }).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(TokenResponse {
                token: String::new(),
            }),
        )
            .into_response(),
        Err(failure) => operation_failed(failure, "Token read failed").into_response(),
    }
}
