//! Operator login: captcha check, credential check and session cookies

use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::{config::AdminSettings, repositories::SESSION_TTL_SECS, turnstile::TurnstileVerifier};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_token";

/// Why a login attempt failed; never shown to the user
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    #[error("captcha rejected")]
    CaptchaRejected,

    #[error("verification service unavailable")]
    CaptchaUnavailable,

    #[error("invalid credentials")]
    BadCredentials,
}

/// Login form as posted by the browser
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "cf-turnstile-response", default)]
    pub captcha: String,
}

/// Verify the captcha, then the single configured account
///
/// Credentials are not compared at all when the captcha check fails.
pub async fn authenticate(
    admin: &AdminSettings,
    verifier: &TurnstileVerifier,
    form: &LoginForm,
) -> Result<(), LoginFailure> {
    match verifier.verify(&form.captcha).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("Login rejected: captcha check failed");
            return Err(LoginFailure::CaptchaRejected);
        }
        Err(e) => {
            warn!("Login rejected: {}", e);
            return Err(LoginFailure::CaptchaUnavailable);
        }
    }

    let username_ok = safe_equal(&form.username, &admin.username);
    let password_ok = safe_equal(&form.password, &admin.password);
    if !(username_ok && password_ok) {
        warn!("Login rejected: bad credentials for user {}", form.username);
        return Err(LoginFailure::BadCredentials);
    }

    Ok(())
}

/// Constant-time string comparison
fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

/// Cookie issued on login; expires together with the server-side session
pub fn session_cookie(token: String) -> Cookie<'static> {
    build_cookie(token, time::Duration::seconds(SESSION_TTL_SECS))
}

/// Cookie sent on logout to drop the session client-side
pub fn cleared_session_cookie() -> Cookie<'static> {
    build_cookie(String::new(), time::Duration::ZERO)
}

fn build_cookie(value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}
