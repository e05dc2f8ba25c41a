use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_hours: i64,
}

impl Config {
    /// Reads `CQMS_*` variables from the environment (after `.env`, if any).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("CQMS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CQMS_JWT_SECRET is unset or still a placeholder");
        }

        let db_path = get("CQMS_DB_PATH").unwrap_or_else(|| "cqms.db".into()).into();
        let host = get("CQMS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = get("CQMS_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("CQMS_PORT must be a port number")?;
        let token_ttl_hours = get("CQMS_TOKEN_TTL_HOURS")
            .unwrap_or_else(|| "12".into())
            .parse()
            .context("CQMS_TOKEN_TTL_HOURS must be a whole number of hours")?;
        if token_ttl_hours <= 0 {
            bail!("CQMS_TOKEN_TTL_HOURS must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
            token_ttl_hours,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_lookup(lookup(&[("CQMS_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("cqms.db"));
        assert_eq!(config.port, 3000);
        assert_eq!(config.token_ttl(), chrono::Duration::hours(12));
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn placeholder_or_missing_secret_is_refused() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("CQMS_JWT_SECRET", "dev-secret-change-me")])).is_err());
    }

    #[test]
    fn bad_numbers_are_reported() {
        let bad_port = lookup(&[("CQMS_JWT_SECRET", "s"), ("CQMS_PORT", "http")]);
        assert!(Config::from_lookup(bad_port).is_err());

        let bad_ttl = lookup(&[("CQMS_JWT_SECRET", "s"), ("CQMS_TOKEN_TTL_HOURS", "0")]);
        assert!(Config::from_lookup(bad_ttl).is_err());
    }
}
