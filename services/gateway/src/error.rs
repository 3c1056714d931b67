//! Custom error types for the gateway service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    auth::LoginFailure,
    config::ConfigError,
    views::{self, ErrorPage},
};

/// Message shown for every failed login, whatever factor failed
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed, please try again";

/// Custom error type for the gateway service
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Required settings are missing
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Captcha or credential check failed
    #[error("Authentication failed: {0}")]
    Auth(LoginFailure),

    /// Malformed or empty request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Messaging or verification service failure
    #[error("{0}")]
    Upstream(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),

    /// No route matched
    #[error("Not found")]
    NotFound,

    /// Anything else that should never reach the user in detail
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Config(_)
            | GatewayError::Upstream(_)
            | GatewayError::Database(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the operator
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Auth(_) => LOGIN_FAILED_MESSAGE.to_string(),
            GatewayError::BadRequest(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Render as a plain HTML page instead of JSON
    pub fn into_page(self) -> Response {
        let status = self.status();
        let message = match status {
            StatusCode::NOT_FOUND => "404 Not Found".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR => format!("Server error: {}", self.public_message()),
            _ => self.public_message(),
        };

        views::render_page(status, &ErrorPage { message: &message })
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}

/// Wrapper turning a [`GatewayError`] into an HTML response for page routes
#[derive(Debug)]
pub struct PageError(pub GatewayError);

impl From<GatewayError> for PageError {
    fn from(err: GatewayError) -> Self {
        PageError(err)
    }
}

impl From<common::error::DatabaseError> for PageError {
    fn from(err: common::error::DatabaseError) -> Self {
        PageError(err.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        self.0.into_page()
    }
}

/// Type alias for gateway results
pub type GatewayResult<T> = Result<T, GatewayError>;
