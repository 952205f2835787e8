use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::StartupError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_BIND: &str = "127.0.0.1:21296";
pub const DEFAULT_STATIC_DIR: &str = "dist";
pub const DEFAULT_BODY_LIMIT_BYTES: u64 = 20 * 1024 * 1024;

/// Process-wide settings, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub body_limit_bytes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = non_empty("API_KEY")
            .or_else(|| non_empty("GEMINI_API_KEY"))
            .ok_or(StartupError::MissingApiKey)?;

        let model = non_empty("CLEANSE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_base = non_empty("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let bind = non_empty("CLEANSE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind
            .parse::<SocketAddr>()
            .map_err(|source| StartupError::InvalidBindAddress {
                value: bind.clone(),
                source,
            })?;

        let static_dir = non_empty("CLEANSE_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));

        let body_limit_bytes = match non_empty("CLEANSE_BODY_LIMIT_BYTES") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(limit) if limit > 0 => limit,
                _ => return Err(StartupError::InvalidBodyLimit(raw)),
            },
            None => DEFAULT_BODY_LIMIT_BYTES,
        };

        Ok(Self {
            api_key,
            model,
            api_base,
            bind_addr,
            static_dir,
            body_limit_bytes,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("bind_addr", &self.bind_addr)
            .field("static_dir", &self.static_dir)
            .field("body_limit_bytes", &self.body_limit_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, StartupError::MissingApiKey));

        let err = Config::from_lookup(lookup(&[("API_KEY", "   ")])).unwrap_err();
        assert!(matches!(err, StartupError::MissingApiKey));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("API_KEY", "secret")])).unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.bind_addr, DEFAULT_BIND.parse::<SocketAddr>().unwrap());
        assert_eq!(config.static_dir, PathBuf::from("dist"));
        assert_eq!(config.body_limit_bytes, DEFAULT_BODY_LIMIT_BYTES);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "fallback"),
            ("CLEANSE_MODEL", "gemini-2.5-flash-image"),
            ("GEMINI_API_BASE", "http://127.0.0.1:9000/v1beta/"),
            ("CLEANSE_BIND", "0.0.0.0:8080"),
            ("CLEANSE_STATIC_DIR", "public"),
            ("CLEANSE_BODY_LIMIT_BYTES", "1024"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "fallback");
        assert_eq!(config.model, "gemini-2.5-flash-image");
        assert_eq!(config.api_base, "http://127.0.0.1:9000/v1beta");
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.body_limit_bytes, 1024);
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[("API_KEY", "k"), ("CLEANSE_BIND", "nope")]))
            .unwrap_err();
        assert!(matches!(err, StartupError::InvalidBindAddress { .. }));

        let err = Config::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("CLEANSE_BODY_LIMIT_BYTES", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StartupError::InvalidBodyLimit(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = Config::from_lookup(lookup(&[("API_KEY", "top-secret")])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("top-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
