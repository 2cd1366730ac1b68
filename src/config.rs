//! Configuration loader
//!
//! Reads the LLM provider credential and endpoint overrides from the
//! process environment, after loading a local `.env` file if one exists.
//! A missing credential is fatal: nothing else can be built without it.

use crate::error::AgentError;
use crate::Result;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use tracing::info;

pub const API_KEY_VAR: &str = "GROQ_API_KEY";

pub const DEFAULT_MODEL_ID: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_DUCKDUCKGO_BASE_URL: &str = "https://api.duckduckgo.com";
pub const DEFAULT_YAHOO_FINANCE_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

/// Opaque API secret. Never printed; `Debug` shows a fingerprint only.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a secret, rejecting empty or whitespace-only values.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into().trim().to_string();
        if secret.is_empty() {
            return Err(AgentError::ConfigurationError(format!(
                "{} is empty",
                API_KEY_VAR
            )));
        }
        Ok(Self(secret))
    }

    /// Raw secret, for the Authorization header only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First 8 hex chars of the SHA-256 of the secret.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(digest)[..8].to_string()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(sha256:{})", self.fingerprint())
    }
}

/// Everything the driver needs to build a run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credential: Credential,
    pub model_id: String,
    pub groq_base_url: String,
    pub duckduckgo_base_url: String,
    pub yahoo_finance_base_url: String,
    pub http_timeout: Duration,
    pub max_tool_rounds: u32,
}

impl Settings {
    /// Load `.env` (if present) and resolve settings from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup(API_KEY_VAR).ok_or_else(|| {
            AgentError::ConfigurationError(format!(
                "No Groq API key found. Please set {} in your environment or .env file.",
                API_KEY_VAR
            ))
        })?;
        let credential = Credential::new(secret)?;

        let string_or = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let settings = Self {
            credential,
            model_id: string_or("GROQ_MODEL", DEFAULT_MODEL_ID),
            groq_base_url: trim_url(string_or("GROQ_BASE_URL", DEFAULT_GROQ_BASE_URL)),
            duckduckgo_base_url: trim_url(string_or(
                "DUCKDUCKGO_BASE_URL",
                DEFAULT_DUCKDUCKGO_BASE_URL,
            )),
            yahoo_finance_base_url: trim_url(string_or(
                "YAHOO_FINANCE_BASE_URL",
                DEFAULT_YAHOO_FINANCE_BASE_URL,
            )),
            http_timeout: Duration::from_secs(parse_positive(
                &lookup,
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            max_tool_rounds: parse_positive(&lookup, "MAX_TOOL_ROUNDS", DEFAULT_MAX_TOOL_ROUNDS)?,
        };

        info!(
            model = %settings.model_id,
            credential = %settings.credential.fingerprint(),
            "Settings loaded"
        );

        Ok(settings)
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Unsigned override that must be at least 1.
fn parse_positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Default + PartialEq,
{
    let raw = match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(default),
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Ok(value),
        _ => Err(AgentError::ConfigurationError(format!(
            "{} must be a positive number, got {:?}",
            key, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let err = Settings::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, AgentError::ConfigurationError(_)));
        assert!(err.to_string().contains(API_KEY_VAR));
    }

    #[test]
    fn test_blank_key_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[(API_KEY_VAR, "   ")])).unwrap_err();
        assert!(matches!(err, AgentError::ConfigurationError(_)));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[(API_KEY_VAR, "gsk_test")])).unwrap();
        assert_eq!(settings.model_id, DEFAULT_MODEL_ID);
        assert_eq!(settings.groq_base_url, DEFAULT_GROQ_BASE_URL);
        assert_eq!(settings.http_timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
        assert_eq!(settings.max_tool_rounds, DEFAULT_MAX_TOOL_ROUNDS);
        assert_eq!(settings.credential.expose(), "gsk_test");
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            (API_KEY_VAR, "gsk_test"),
            ("GROQ_MODEL", "llama-3.1-8b-instant"),
            ("GROQ_BASE_URL", "http://localhost:9000/v1/"),
            ("MAX_TOOL_ROUNDS", "3"),
        ]))
        .unwrap();
        assert_eq!(settings.model_id, "llama-3.1-8b-instant");
        assert_eq!(settings.groq_base_url, "http://localhost:9000/v1");
        assert_eq!(settings.max_tool_rounds, 3);
    }

    #[test]
    fn test_malformed_number() {
        let err = Settings::from_lookup(lookup_from(&[
            (API_KEY_VAR, "gsk_test"),
            ("HTTP_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AgentError::ConfigurationError(_)));
    }

    #[test]
    fn test_zero_is_rejected() {
        for key in ["MAX_TOOL_ROUNDS", "HTTP_TIMEOUT_SECS"] {
            let err = Settings::from_lookup(lookup_from(&[(API_KEY_VAR, "gsk_test"), (key, "0")]))
                .unwrap_err();
            assert!(matches!(err, AgentError::ConfigurationError(ref msg) if msg.contains(key)));
        }
    }

    #[test]
    fn test_debug_hides_secret() {
        let credential = Credential::new("gsk_super_secret_value").unwrap();
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("super_secret"));
        assert!(printed.contains(&credential.fingerprint()));
        assert_eq!(credential.fingerprint().len(), 8);
    }
}
