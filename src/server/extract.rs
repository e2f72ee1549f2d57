//! Extractors that turn request input into sandbox-resolved paths before a
//! handler runs.

use super::AppState;
use super::error::ApiError;
use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::Uri;
use axum::http::request::Parts;
use sandgate_commons::ResolvedPath;
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub(crate) const PATH_REQUIRED: &str = "Path is required";

#[derive(Debug, Deserialize)]
struct PathQuery {
    path: Option<String>,
}

fn query_path(uri: &Uri) -> Result<Option<String>, ApiError> {
    let Query(query) = Query::<PathQuery>::try_from_uri(uri)?;
    Ok(query.path.filter(|path| !path.is_empty()))
}

/// JSON body with failures reported as [`ApiError`].
pub(crate) struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await?;
        Ok(Self(value))
    }
}

/// The resolved `?path=` query parameter, which is required.
pub(crate) struct QueryPath(pub ResolvedPath);

impl FromRequestParts<AppState> for QueryPath {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let path = query_path(&parts.uri)?.ok_or(ApiError::Validation(PATH_REQUIRED))?;
        state.resolve(&path).map(Self)
    }
}

/// The resolved `?path=` query parameter, defaulting to the sandbox root.
pub(crate) struct TreeTarget(pub ResolvedPath);

impl FromRequestParts<AppState> for TreeTarget {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match query_path(&parts.uri)? {
            Some(path) => state.resolve(&path).map(Self),
            None => Ok(Self(state.sandbox().resolve_root())),
        }
    }
}

/// Request bodies that may carry the target path.
pub(crate) trait PathBody {
    fn path(&self) -> Option<&str>;
}

/// A JSON body plus its resolved target. `?path=` takes precedence over the
/// body's `path` field.
pub(crate) struct PathJson<T> {
    pub path: ResolvedPath,
    pub body: T,
}

impl<T> FromRequest<AppState> for PathJson<T>
where
    T: DeserializeOwned + PathBody + Send,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let from_query = query_path(request.uri())?;
        let ApiJson(body) = ApiJson::<T>::from_request(request, state).await?;
        let relative = from_query
            .or_else(|| {
                body.path()
                    .filter(|path| !path.is_empty())
                    .map(str::to_owned)
            })
            .ok_or(ApiError::Validation(PATH_REQUIRED))?;
        let path = state.resolve(&relative)?;
        Ok(Self { path, body })
    }
}

#[derive(Debug, Deserialize)]
struct MoveBody {
    source: Option<String>,
    destination: Option<String>,
}

/// Source and destination of a move, each resolved independently.
pub(crate) struct MovePaths {
    pub source: ResolvedPath,
    pub destination: ResolvedPath,
}

impl FromRequest<AppState> for MovePaths {
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let ApiJson(body) = ApiJson::<MoveBody>::from_request(request, state).await?;
        let (Some(source), Some(destination)) = (
            body.source.filter(|source| !source.is_empty()),
            body.destination
                .filter(|destination| !destination.is_empty()),
        ) else {
            return Err(ApiError::Validation("Source and destination required"));
        };

        Ok(Self {
            source: state.resolve(&source)?,
            destination: state.resolve(&destination)?,
        })
    }
}
