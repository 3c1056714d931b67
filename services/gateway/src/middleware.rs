//! Session gate applied to every route

use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use tracing::error;

use crate::{auth::SESSION_COOKIE, error::GatewayError, state::AppState};

pub const LOGIN_PATH: &str = "/login";
pub const LOGOUT_PATH: &str = "/logout";

/// Username of the live session, inserted into request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

/// Redirect every request without a live session to the login page
///
/// The login and logout paths are always public. The check runs before
/// route dispatch, so unknown paths redirect too.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let is_public = matches!(req.uri().path(), LOGIN_PATH | LOGOUT_PATH);
    if is_public {
        return next.run(req).await;
    }

    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty());

    let user = match token {
        Some(token) => match state.session_repository.resolve_user(&token).await {
            Ok(user) => user,
            Err(e) => {
                error!("Failed to resolve session: {}", e);
                return GatewayError::from(e).into_page();
            }
        },
        None => None,
    };

    match user {
        Some(username) => {
            req.extensions_mut().insert(CurrentUser(username));
            next.run(req).await
        }
        None => found(LOGIN_PATH),
    }
}

/// 302 redirect
pub fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
