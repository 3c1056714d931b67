//! Application state shared across handlers

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::{
    config::Settings,
    error::{GatewayError, GatewayResult},
    relay::MediaRelay,
    repositories::{MediaRepository, SessionRepository},
    telegram::TelegramClient,
    turnstile::TurnstileVerifier,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub session_repository: SessionRepository,
    pub media_repository: MediaRepository,
    pub relay: MediaRelay,
    pub verifier: TurnstileVerifier,
}

impl AppState {
    /// Wire repositories and outbound clients around one pool and one HTTP client
    pub fn new(settings: Settings, pool: SqlitePool) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.outbound_timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let session_repository = SessionRepository::new(pool.clone());
        let media_repository = MediaRepository::new(pool);
        let telegram = TelegramClient::new(http.clone(), settings.telegram.clone());
        let relay = MediaRelay::new(telegram, media_repository.clone());
        let verifier = TurnstileVerifier::new(http, settings.turnstile.clone());

        Ok(Self {
            settings: Arc::new(settings),
            session_repository,
            media_repository,
            relay,
            verifier,
        })
    }
}
