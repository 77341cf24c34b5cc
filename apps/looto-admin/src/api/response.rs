//! Response envelope, error mapping and extractors that fail into the envelope.
//!
//! Every body the API returns, success or failure, has the shape
//! `{ statusCode, success, message, data }`.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, OptionalFromRequest, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use looto_core::LootoError;
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// A success with `data: null`.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// An error rendered as the envelope with `success: false`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Access denied. No token provided.")
    }

    pub fn too_many_requests() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many login attempts, please try again later",
        )
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<LootoError> for ApiError {
    fn from(err: LootoError) -> Self {
        let status = match &err {
            LootoError::NotFound(_) => StatusCode::NOT_FOUND,
            LootoError::InvalidInput(_)
            | LootoError::InvalidState(_)
            | LootoError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            LootoError::Conflict(_) => StatusCode::CONFLICT,
            LootoError::InvalidCredentials
            | LootoError::AccountLocked
            | LootoError::Unauthorized => StatusCode::UNAUTHORIZED,
            LootoError::Forbidden(_) => StatusCode::FORBIDDEN,
            LootoError::Storage(_) | LootoError::Codec(_) | LootoError::PasswordHash(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if err.is_internal() {
            tracing::error!(error = %err, "request failed");
            return Self::internal();
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            status_code: self.status.as_u16(),
            success: false,
            message: self.message,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// `Json` whose rejection is an [`ApiError`].
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match <Json<T> as FromRequest<S>>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

/// Absent body (no content type) extracts as `None`.
impl<S, T> OptionalFromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        match <Json<T> as OptionalFromRequest<S>>::from_request(req, state).await {
            Ok(value) => Ok(value.map(|Json(value)| Self(value))),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

/// `Query` whose rejection is an [`ApiError`].
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(query_rejection(rejection)),
        }
    }
}

fn query_rejection(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

/// Parse a numeric path segment, answering 404 for anything that cannot be an id.
pub fn parse_id<T: From<u64>>(raw: &str, kind: &'static str) -> Result<T, ApiError> {
    raw.parse::<u64>()
        .map(T::from)
        .map_err(|_| ApiError::from(LootoError::NotFound(kind)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_status_codes() {
        let cases = [
            (LootoError::NotFound("User"), StatusCode::NOT_FOUND),
            (LootoError::invalid_input("x"), StatusCode::BAD_REQUEST),
            (LootoError::invalid_state("x"), StatusCode::BAD_REQUEST),
            (LootoError::Conflict("x".into()), StatusCode::CONFLICT),
            (LootoError::AccountLocked, StatusCode::UNAUTHORIZED),
            (LootoError::Forbidden("users.edit"), StatusCode::FORBIDDEN),
            (
                LootoError::PasswordHash("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = ApiError::from(LootoError::PasswordHash("salt too short".into()));
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn ids_parse_or_404() {
        let id: Result<looto_core::UserId, _> = parse_id("42", "User");
        assert_eq!(id.ok(), Some(looto_core::UserId(42)));
        let bad: Result<looto_core::UserId, _> = parse_id("abc", "User");
        assert_eq!(bad.map_err(|e| e.status).err(), Some(StatusCode::NOT_FOUND));
    }
}
