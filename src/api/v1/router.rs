use super::error::*;
use super::handler;
use crate::application_port::*;
use crate::domain_model::ClientContext;
use crate::server::*;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{Filter, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_client())
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let refresh = warp::post()
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_client())
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout);

    let sessions = warp::get()
        .and(warp::path("sessions"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::list_sessions);

    login.or(refresh).or(logout).or(sessions)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_client() -> impl Filter<Extract = (ClientContext,), Error = warp::Rejection> + Clone {
    warp::addr::remote()
        .and(warp::header::optional::<String>("user-agent"))
        .map(|addr: Option<SocketAddr>, user_agent: Option<String>| {
            ClientContext::new(
                addr.map(|a| a.ip().to_string()).unwrap_or_default(),
                user_agent.unwrap_or_default(),
            )
        })
}

/// Bearer authentication. Blacklisted tokens are rejected like forged ones.
fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = ((AccessClaims, AccessToken),), Error = warp::Rejection> + Clone {
    warp::header::<String>("authorization").and_then(move |header: String| {
        let auth_service = auth_service.clone();
        async move {
            if let Some(token) = header.strip_prefix("Bearer ") {
                let access_token = AccessToken(token.to_owned());
                let claims = auth_service
                    .verify_access_token(&access_token)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok((claims, access_token))
            } else {
                Err(reject::custom(ApiErrorCode::InvalidToken))
            }
        }
    })
}
