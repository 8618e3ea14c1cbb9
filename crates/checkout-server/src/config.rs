//! Server Configuration

use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_PADDLE_TOLERANCE_SECS: u64 = 300;

/// Settings read from the environment at startup
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// `None` disables the LemonSqueezy webhook endpoint
    pub lemonsqueezy_webhook_secret: Option<String>,
    /// `None` disables the Paddle webhook endpoint
    pub paddle_webhook_secret: Option<String>,
    /// Replay window for Paddle signatures; zero turns the check off
    pub paddle_webhook_tolerance: Duration,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("lemonsqueezy_webhook_secret", &self.lemonsqueezy_webhook_secret.as_ref().map(|_| "<set>"))
            .field("paddle_webhook_secret", &self.paddle_webhook_secret.as_ref().map(|_| "<set>"))
            .field("paddle_webhook_tolerance", &self.paddle_webhook_tolerance)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let tolerance_secs = match lookup("PADDLE_WEBHOOK_TOLERANCE_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("PADDLE_WEBHOOK_TOLERANCE_SECS must be a number of seconds, got {raw:?}"))?,
            None => DEFAULT_PADDLE_TOLERANCE_SECS,
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            lemonsqueezy_webhook_secret: secret("LEMONSQUEEZY_WEBHOOK_SECRET"),
            paddle_webhook_secret: secret("PADDLE_WEBHOOK_SECRET"),
            paddle_webhook_tolerance: Duration::from_secs(tolerance_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.lemonsqueezy_webhook_secret, None);
        assert_eq!(config.paddle_webhook_secret, None);
        assert_eq!(config.paddle_webhook_tolerance, Duration::from_secs(300));
    }

    #[test]
    fn test_from_lookup() {
        let config = ServerConfig::from_lookup(|key| match key {
            "BIND_ADDR" => Some("127.0.0.1:8080".into()),
            "LEMONSQUEEZY_WEBHOOK_SECRET" => Some("ls_secret".into()),
            "PADDLE_WEBHOOK_SECRET" => Some("   ".into()),
            "PADDLE_WEBHOOK_TOLERANCE_SECS" => Some("60".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.lemonsqueezy_webhook_secret.as_deref(), Some("ls_secret"));
        assert_eq!(config.paddle_webhook_secret, None);
        assert_eq!(config.paddle_webhook_tolerance, Duration::from_secs(60));
        assert!(!format!("{config:?}").contains("ls_secret"));
    }

    #[test]
    fn test_invalid_tolerance() {
        let result = ServerConfig::from_lookup(|key| (key == "PADDLE_WEBHOOK_TOLERANCE_SECS").then(|| "soon".into()));
        assert!(result.is_err());
    }
}
