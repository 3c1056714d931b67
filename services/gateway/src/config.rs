//! Gateway configuration
//!
//! Settings are read from the environment once at process start and then
//! passed explicitly through the application state.

use std::{env, time::Duration};
use thiserror::Error;

const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_OUTBOUND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TURNSTILE_VERIFY_URL: &str =
    "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// Missing or unusable settings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Configuration error: set TG_BOT_TOKEN and TG_CHAT_ID in the environment")]
    MissingBot,

    #[error("Configuration error: set TURNSTILE_SITE_KEY and TURNSTILE_SECRET_KEY in the environment")]
    MissingVerification,

    #[error("Configuration error: ADMIN_PATH \"{0}\" collides with a built-in route or contains a route pattern")]
    InvalidAdminPath(String),
}

/// Paths the gallery cannot be mounted on; route pattern characters are refused too
const RESERVED_PATHS: &[&str] = &["", "login", "logout", "upload", "delete-images", "api/status"];

/// Raw configuration as found in the environment
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub turnstile_site_key: Option<String>,
    pub turnstile_secret: Option<String>,
    pub username: String,
    pub password: String,
    pub admin_path: String,
    pub telegram_api_base: String,
    pub turnstile_verify_url: String,
    /// Per-call timeout for outbound requests, in seconds
    pub outbound_timeout: u64,
    pub bind_addr: String,
}

impl GatewayConfig {
    /// Create a new GatewayConfig from environment variables
    ///
    /// # Environment Variables
    /// - `TG_BOT_TOKEN`, `TG_CHAT_ID`: bot credential and target channel (required)
    /// - `TURNSTILE_SITE_KEY`, `TURNSTILE_SECRET_KEY`: human verification keys (required)
    /// - `USERNAME`, `PASSWORD`: operator credentials (default: "admin" / "password")
    /// - `ADMIN_PATH`: gallery sub-path without slashes (default: "admin")
    /// - `TG_API_BASE`: Telegram Bot API base URL (default: "https://api.telegram.org")
    /// - `TURNSTILE_VERIFY_URL`: siteverify endpoint (default: Cloudflare)
    /// - `OUTBOUND_TIMEOUT_SECS`: outbound call timeout (default: 30)
    /// - `BIND_ADDR`: listen address (default: "0.0.0.0:3000")
    pub fn from_env() -> Self {
        let admin_path = env_or("ADMIN_PATH", "admin");

        Self {
            bot_token: env_opt("TG_BOT_TOKEN"),
            chat_id: env_opt("TG_CHAT_ID"),
            turnstile_site_key: env_opt("TURNSTILE_SITE_KEY"),
            turnstile_secret: env_opt("TURNSTILE_SECRET_KEY"),
            username: env_or("USERNAME", "admin"),
            password: env_or("PASSWORD", "password"),
            admin_path: admin_path.trim_matches('/').to_string(),
            telegram_api_base: env_or("TG_API_BASE", DEFAULT_TELEGRAM_API_BASE),
            turnstile_verify_url: env_or("TURNSTILE_VERIFY_URL", DEFAULT_TURNSTILE_VERIFY_URL),
            outbound_timeout: env_opt("OUTBOUND_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_OUTBOUND_TIMEOUT_SECS),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
        }
    }

    /// Resolve into [`Settings`], failing when bot or verification settings are absent
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let (Some(bot_token), Some(chat_id)) = (self.bot_token, self.chat_id) else {
            return Err(ConfigError::MissingBot);
        };
        let (Some(site_key), Some(secret)) = (self.turnstile_site_key, self.turnstile_secret)
        else {
            return Err(ConfigError::MissingVerification);
        };
        if RESERVED_PATHS.contains(&self.admin_path.as_str())
            || self.admin_path.contains([':', '*', '{', '}'])
        {
            return Err(ConfigError::InvalidAdminPath(self.admin_path));
        }

        Ok(Settings {
            telegram: TelegramSettings {
                bot_token,
                chat_id,
                api_base: self.telegram_api_base.trim_end_matches('/').to_string(),
            },
            turnstile: TurnstileSettings {
                site_key,
                secret,
                verify_url: self.turnstile_verify_url,
            },
            admin: AdminSettings {
                username: self.username,
                password: self.password,
                path: self.admin_path,
            },
            outbound_timeout: Duration::from_secs(if self.outbound_timeout == 0 {
                DEFAULT_OUTBOUND_TIMEOUT_SECS
            } else {
                self.outbound_timeout
            }),
        })
    }
}

/// Fully resolved settings shared by every handler
#[derive(Debug, Clone)]
pub struct Settings {
    pub telegram: TelegramSettings,
    pub turnstile: TurnstileSettings,
    pub admin: AdminSettings,
    pub outbound_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct TurnstileSettings {
    pub site_key: String,
    pub secret: String,
    pub verify_url: String,
}

/// The single operator account and the gallery location
#[derive(Debug, Clone)]
pub struct AdminSettings {
    pub username: String,
    pub password: String,
    pub path: String,
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "TG_BOT_TOKEN",
        "TG_CHAT_ID",
        "TURNSTILE_SITE_KEY",
        "TURNSTILE_SECRET_KEY",
        "USERNAME",
        "PASSWORD",
        "ADMIN_PATH",
        "TG_API_BASE",
        "TURNSTILE_VERIFY_URL",
        "OUTBOUND_TIMEOUT_SECS",
        "BIND_ADDR",
    ];

    fn clear_env() {
        for key in KEYS {
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    fn complete() -> GatewayConfig {
        GatewayConfig {
            bot_token: Some("token".to_string()),
            chat_id: Some("-100".to_string()),
            turnstile_site_key: Some("site".to_string()),
            turnstile_secret: Some("secret".to_string()),
            username: "admin".to_string(),
            password: "password".to_string(),
            admin_path: "admin".to_string(),
            telegram_api_base: "https://api.telegram.org/".to_string(),
            turnstile_verify_url: DEFAULT_TURNSTILE_VERIFY_URL.to_string(),
            outbound_timeout: 30,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }

    #[test]
    #[serial]
    fn test_gateway_config_defaults() {
        clear_env();

        let config = GatewayConfig::from_env();
        assert_eq!(config.bot_token, None);
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "password");
        assert_eq!(config.admin_path, "admin");
        assert_eq!(config.telegram_api_base, DEFAULT_TELEGRAM_API_BASE);
        assert_eq!(config.outbound_timeout, 30);
    }

    #[test]
    #[serial]
    fn test_gateway_config_from_env_with_custom_values() {
        clear_env();
        unsafe {
            std::env::set_var("TG_BOT_TOKEN", "123:abc");
            std::env::set_var("TG_CHAT_ID", "   ");
            std::env::set_var("ADMIN_PATH", "/gallery/");
            std::env::set_var("OUTBOUND_TIMEOUT_SECS", "5");
        }

        let config = GatewayConfig::from_env();
        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.chat_id, None, "blank values count as missing");
        assert_eq!(config.admin_path, "gallery");
        assert_eq!(config.outbound_timeout, 5);

        clear_env();
    }

    #[test]
    fn test_validate_reports_missing_bot_first() {
        let mut config = complete();
        config.chat_id = None;
        config.turnstile_secret = None;

        assert_eq!(config.validate().unwrap_err(), ConfigError::MissingBot);
    }

    #[test]
    fn test_validate_reports_missing_verification() {
        let mut config = complete();
        config.turnstile_site_key = None;

        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::MissingVerification
        );
    }

    #[test]
    fn test_validate_rejects_reserved_admin_path() {
        let mut config = complete();
        config.admin_path = "upload".to_string();

        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::InvalidAdminPath("upload".to_string())
        );
    }

    #[test]
    #[serial]
    fn test_zero_timeout_falls_back_to_default() {
        clear_env();
        unsafe {
            std::env::set_var("OUTBOUND_TIMEOUT_SECS", "0");
        }

        assert_eq!(GatewayConfig::from_env().outbound_timeout, 30);

        let mut config = complete();
        config.outbound_timeout = 0;
        assert_eq!(
            config.validate().unwrap().outbound_timeout,
            Duration::from_secs(30)
        );

        clear_env();
    }

    #[test]
    fn test_validate_rejects_route_patterns_in_admin_path() {
        for path in [":x", "gallery/*rest", "{id}", "a/:b"] {
            let mut config = complete();
            config.admin_path = path.to_string();

            assert_eq!(
                config.validate().unwrap_err(),
                ConfigError::InvalidAdminPath(path.to_string()),
                "{} should be refused",
                path
            );
        }
    }

    #[test]
    fn test_validate_trims_api_base() {
        let settings = complete().validate().unwrap();
        assert_eq!(settings.telegram.api_base, "https://api.telegram.org");
        assert_eq!(settings.outbound_timeout, Duration::from_secs(30));
    }
}
