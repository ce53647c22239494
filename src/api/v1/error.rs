use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, error};
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        *code
    } else if err.is_not_found() {
        ApiErrorCode::NotFound
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
        || err.find::<warp::reject::PayloadTooLarge>().is_some()
        || err.find::<warp::reject::LengthRequired>().is_some()
    {
        debug!(?err, "malformed request");
        ApiErrorCode::BadRequest
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiErrorCode::NotFound
    } else {
        error!(?err, "unhandled rejection");
        ApiErrorCode::InternalError
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code, code.to_string()));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid username, email or password")]
    InvalidCredentials,
    #[error("Account is suspended")]
    AccountSuspended,
    #[error("Account is deleted")]
    AccountDeleted,
    #[error("Account is pending verification")]
    AccountPendingVerification,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Session not found")]
    SessionNotFound,
    #[error("Malformed request")]
    BadRequest,
    #[error("Not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        error!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::TokenExpired
            | ApiErrorCode::SessionNotFound => StatusCode::UNAUTHORIZED,
            ApiErrorCode::AccountSuspended
            | ApiErrorCode::AccountDeleted
            | ApiErrorCode::AccountPendingVerification => StatusCode::FORBIDDEN,
            ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::AccountSuspended => ApiErrorCode::AccountSuspended,
            AuthError::AccountDeleted => ApiErrorCode::AccountDeleted,
            AuthError::AccountPendingVerification => ApiErrorCode::AccountPendingVerification,
            // Clients are not told that a replay was detected.
            AuthError::TokenInvalid | AuthError::TokenReplayDetected | AuthError::UserNotFound => {
                ApiErrorCode::InvalidToken
            }
            AuthError::TokenExpired => ApiErrorCode::TokenExpired,
            AuthError::SessionNotFound => ApiErrorCode::SessionNotFound,
            AuthError::Store(e) => ApiErrorCode::internal(e),
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_is_indistinguishable_from_a_bad_token() {
        assert_eq!(
            ApiErrorCode::from(AuthError::TokenReplayDetected),
            ApiErrorCode::from(AuthError::TokenInvalid)
        );
    }

    #[test]
    fn infrastructure_details_stay_server_side() {
        let code = ApiErrorCode::from(AuthError::Store("redis down: connection refused".into()));
        assert_eq!(code, ApiErrorCode::InternalError);
        assert!(!code.to_string().contains("redis"));
        assert_eq!(code.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
