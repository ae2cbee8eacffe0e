//! Process configuration read from the environment.

use std::net::SocketAddr;

use secrecy::SecretString;

use crate::api::RateLimitConfig;
use crate::domain::{ChainConfig, ConfigError};
use crate::infra::ProviderConfig;

/// Placeholder shipped in `.env.example`; treated as unset.
const PRIVATE_KEY_PLACEHOLDER: &str = "YOUR_HEX_ENCODED_PRIVATE_KEY_HERE";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Everything `main` needs to assemble the server.
#[derive(Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub api_auth_key: SecretString,
    /// `None` means an ephemeral key is generated.
    pub wallet_private_key: Option<SecretString>,
    pub chain: ChainConfig,
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary lookup, so tests need not touch the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_auth_key = non_empty("API_AUTH_KEY")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("API_AUTH_KEY".to_string()))?;

        let bind_addr = match non_empty("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "BIND_ADDR".to_string(),
                message: format!("{}", e),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        let wallet_private_key = non_empty("WALLET_PRIVATE_KEY")
            .filter(|v| v != PRIVATE_KEY_PLACEHOLDER)
            .map(SecretString::from);

        let mut chain = ChainConfig::base_sepolia();
        if let Some(url) = non_empty("CHAIN_RPC_URL") {
            chain = chain.with_rpc_target(url);
        }

        let parse_u32 = |key: &str, default: u32| -> Result<u32, ConfigError> {
            match non_empty(key) {
                Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("{}", e),
                }),
                None => Ok(default),
            }
        };
        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            rpc_rps: parse_u32("RATE_LIMIT_RPS", defaults.rpc_rps)?,
            rpc_burst: parse_u32("RATE_LIMIT_BURST", defaults.rpc_burst)?,
            trust_proxy_headers: non_empty("TRUST_PROXY_HEADERS")
                .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
            ..defaults
        };

        let log_format = match non_empty("LOG_FORMAT").as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            bind_addr,
            api_auth_key,
            wallet_private_key,
            chain,
            provider: ProviderConfig::from_lookup(&non_empty)?,
            rate_limit,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("API_AUTH_KEY", "secret")])).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.api_auth_key.expose_secret(), "secret");
        assert!(config.wallet_private_key.is_none());
        assert_eq!(config.chain, ChainConfig::base_sepolia());
        assert_eq!(config.rate_limit.rpc_rps, 10);
        assert_eq!(config.rate_limit.rpc_burst, 20);
        assert!(!config.rate_limit.trust_proxy_headers);
        assert_eq!(config.provider.timeout, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_missing_auth_key() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "API_AUTH_KEY"));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("API_AUTH_KEY", "secret"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("WALLET_PRIVATE_KEY", "0xabc"),
            ("CHAIN_RPC_URL", "http://localhost:8545"),
            ("RATE_LIMIT_RPS", "5"),
            ("RATE_LIMIT_BURST", "7"),
            ("TRUST_PROXY_HEADERS", "true"),
            ("RECEIPT_POLL_MS", "250"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(
            config.wallet_private_key.unwrap().expose_secret(),
            "0xabc"
        );
        assert_eq!(config.chain.rpc_target, "http://localhost:8545");
        assert_eq!(config.chain.chain_id, "0x14A34");
        assert_eq!(config.rate_limit.rpc_rps, 5);
        assert_eq!(config.rate_limit.rpc_burst, 7);
        assert!(config.rate_limit.trust_proxy_headers);
        assert_eq!(config.provider.receipt_poll_interval, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_placeholder_key_is_ignored() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("API_AUTH_KEY", "secret"),
            ("WALLET_PRIVATE_KEY", PRIVATE_KEY_PLACEHOLDER),
        ]))
        .unwrap();
        assert!(config.wallet_private_key.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("API_AUTH_KEY", "secret"),
            ("BIND_ADDR", "not-an-addr"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "BIND_ADDR"));

        let err = AppConfig::from_lookup(lookup_from(&[
            ("API_AUTH_KEY", "secret"),
            ("RATE_LIMIT_RPS", "fast"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "RATE_LIMIT_RPS"));
    }
}
