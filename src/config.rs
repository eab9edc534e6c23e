use std::env;

use thiserror::Error;

pub const DEFAULT_DRIVER_SERVICE_URL: &str = "http://driver-service:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} tidak ditemukan di .env")]
    Missing(&'static str),
    #[error("nilai {key} tidak valid: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings, read once at startup and shared as `web::Data<AppConfig>`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
    pub host: String,
    pub port: u16,
    /// `None` allows any origin.
    pub cors_origin: Option<String>,
    pub driver_service_url: String,
    pub db_max_connections: u32,
    pub payload_limit_mb: usize,
    pub run_migrations: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_ttl_days: parse_or(&lookup, "JWT_TTL_DAYS", 2)?,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".into()),
            port: parse_or(&lookup, "PORT", 8000)?,
            cors_origin: lookup("CORS_ORIGIN").filter(|v| !v.trim().is_empty()),
            driver_service_url: lookup("DRIVER_SERVICE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_DRIVER_SERVICE_URL.into()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            payload_limit_mb: parse_or(&lookup, "PAYLOAD_LIMIT_MB", 50)?,
            run_migrations: parse_bool(lookup("RUN_MIGRATIONS")),
        })
    }

    pub fn payload_limit_bytes(&self) -> usize {
        self.payload_limit_mb * 1024 * 1024
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        _ => Ok(default),
    }
}

fn parse_bool(raw: Option<String>) -> bool {
    matches!(
        raw.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
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
    fn defaults_are_applied() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://root@localhost/driver"),
            ("JWT_SECRET", "rahasia"),
        ]))
        .unwrap();

        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.jwt_ttl_days, 2);
        assert_eq!(cfg.db_max_connections, 5);
        assert_eq!(cfg.driver_service_url, DEFAULT_DRIVER_SERVICE_URL);
        assert_eq!(cfg.payload_limit_bytes(), 50 * 1024 * 1024);
        assert!(cfg.cors_origin.is_none());
        assert!(!cfg.run_migrations);
    }

    #[test]
    fn missing_secret_is_reported() {
        let err = AppConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "mysql://root@localhost/driver",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://root@localhost/driver"),
            ("JWT_SECRET", "rahasia"),
            ("PORT", "delapan ribu"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn overrides_and_trailing_slash() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://root@localhost/driver"),
            ("JWT_SECRET", "rahasia"),
            ("PORT", "8001"),
            ("DRIVER_SERVICE_URL", "http://localhost:8080/"),
            ("RUN_MIGRATIONS", "true"),
            ("CORS_ORIGIN", "http://localhost:3000"),
        ]))
        .unwrap();

        assert_eq!(cfg.port, 8001);
        assert_eq!(cfg.driver_service_url, "http://localhost:8080");
        assert!(cfg.run_migrations);
        assert_eq!(cfg.cors_origin.as_deref(), Some("http://localhost:3000"));
    }
}
