//! Human verification through the Turnstile siteverify endpoint

use reqwest::Client;
use serde::Deserialize;
use tracing::error;

use crate::{
    config::TurnstileSettings,
    error::{GatewayError, GatewayResult},
};

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
}

/// Verifier holding the site secret
#[derive(Clone)]
pub struct TurnstileVerifier {
    http: Client,
    settings: TurnstileSettings,
}

impl TurnstileVerifier {
    pub fn new(http: Client, settings: TurnstileSettings) -> Self {
        Self { http, settings }
    }

    /// Public site key rendered into the login form
    pub fn site_key(&self) -> &str {
        &self.settings.site_key
    }

    /// Check a token produced by the browser widget
    ///
    /// `Ok(false)` means the service answered and rejected the token;
    /// transport or decoding failures are upstream errors.
    pub async fn verify(&self, token: &str) -> GatewayResult<bool> {
        let response = self
            .http
            .post(&self.settings.verify_url)
            .form(&[
                ("secret", self.settings.secret.as_str()),
                ("response", token),
            ])
            .send()
            .await
            .map_err(|e| {
                error!("Turnstile verification request failed: {}", e);
                GatewayError::Upstream("Verification service unavailable".to_string())
            })?;

        let body: VerifyResponse = response.json().await.map_err(|e| {
            error!("Turnstile verification reply unreadable: {}", e);
            GatewayError::Upstream("Verification service returned an invalid reply".to_string())
        })?;

        Ok(body.success)
    }
}
