use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or username.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_id: SessionId,
    pub user: UserSnapshot,
    pub auth_tokens: AuthTokens,
}

pub async fn login(
    body: LoginRequest,
    client: ClientContext,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_input = LoginInput {
        identifier: body.identifier,
        password: body.password,
        client,
    };
    let login_result = auth_service
        .login(login_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let login_response = LoginResponse {
        session_id: login_result.session_id,
        user: login_result.user,
        auth_tokens: login_result.tokens,
    };

    Ok(warp::reply::json(&ApiResponse::ok(login_response)))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    client: ClientContext,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let refresh_input = RefreshInput {
        refresh_token: RefreshToken(body.refresh_token),
        client,
    };
    let auth_tokens = auth_service
        .refresh(refresh_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(auth_tokens)))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub logout_all: bool,
}

pub async fn logout(
    body: LogoutRequest,
    (claims, access_token): (AccessClaims, AccessToken),
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let logout_input = LogoutInput {
        user_id: claims.user_id,
        session_id: claims.session_id,
        access_token,
        refresh_token: body.refresh_token.map(RefreshToken),
        logout_all: body.logout_all,
    };
    let outcome = auth_service
        .logout(logout_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(outcome)))
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// The session the request was made from.
    pub current: bool,
}

pub async fn list_sessions(
    (claims, _): (AccessClaims, AccessToken),
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let sessions = auth_service
        .list_sessions(claims.user_id)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let views: Vec<SessionView> = sessions
        .into_iter()
        .map(|s| SessionView {
            current: s.session_id == claims.session_id,
            session_id: s.session_id,
            ip: s.ip,
            user_agent: s.user_agent,
            created_at: s.created_at,
            expires_at: s.expires_at,
        })
        .collect();

    Ok(warp::reply::json(&ApiResponse::ok(views)))
}
