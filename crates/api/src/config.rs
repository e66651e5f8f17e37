//! Process configuration, read once at startup from the environment.

use std::time::Duration;

use thiserror::Error;

use easypaies_auth::credentials::{DEFAULT_BCRYPT_COST, MIN_BCRYPT_COST};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl AppEnv {
    pub fn is_production(self) -> bool {
        self == AppEnv::Production
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: AppEnv,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expires_in: chrono::Duration,
    pub jwt_cookie_expires_days: i64,
    pub bcrypt_cost: u32,
    /// Reserved for a persistent backend; the server runs on in-memory stores.
    pub database_url: Option<String>,
    pub docs_bucket: String,
    pub docs_base_url: String,
    pub mail_from: String,
    pub mail_reply_to: Option<String>,
    /// Inbox of the public website contact form.
    pub contact_email: String,
    pub mail_timeout: Duration,
    pub storage_timeout: Duration,
    /// Seed account created at startup when both are set.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    /// Development defaults. Used as the base that environment variables
    /// override, and directly by tests.
    pub fn local(jwt_secret: impl Into<String>) -> Self {
        Self {
            env: AppEnv::Development,
            port: 8080,
            jwt_secret: jwt_secret.into(),
            jwt_expires_in: chrono::Duration::days(90),
            jwt_cookie_expires_days: 90,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            database_url: None,
            docs_bucket: "easy-paies-docs".to_string(),
            docs_base_url: "https://docs.easy-paies.fr".to_string(),
            mail_from: "Easy-Paies <no-reply@easy-paies.fr>".to_string(),
            mail_reply_to: Some("contact@easy-paies.fr".to_string()),
            contact_email: "contact@easy-paies.fr".to_string(),
            mail_timeout: Duration::from_secs(10),
            storage_timeout: Duration::from_secs(30),
            admin_email: None,
            admin_password: None,
        }
    }

    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let env = match get("APP_ENV").as_deref() {
            None | Some("development") | Some("dev") | Some("test") => AppEnv::Development,
            Some("production") | Some("prod") => AppEnv::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "APP_ENV",
                    value: other.to_string(),
                    reason: "expected development or production",
                });
            }
        };

        let jwt_secret = match (get("JWT_SECRET"), env) {
            (Some(secret), _) => secret,
            (None, AppEnv::Production) => return Err(ConfigError::Missing("JWT_SECRET")),
            (None, AppEnv::Development) => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                "dev-secret".to_string()
            }
        };

        let mut config = Self::local(jwt_secret);
        config.env = env;

        if let Some(v) = get("PORT") {
            config.port = v.parse().map_err(|_| invalid("PORT", &v, "expected a port number"))?;
        }
        if let Some(v) = get("JWT_EXPIRES_IN") {
            config.jwt_expires_in = parse_ttl(&v).ok_or_else(|| invalid("JWT_EXPIRES_IN", &v, "expected 90d, 1h, 30m or seconds"))?;
        }
        if let Some(v) = get("JWT_COOKIE_EXPIRES_IN") {
            config.jwt_cookie_expires_days = v
                .parse::<i64>()
                .ok()
                .filter(|d| *d > 0)
                .ok_or_else(|| invalid("JWT_COOKIE_EXPIRES_IN", &v, "expected a positive number of days"))?;
        }
        if let Some(v) = get("BCRYPT_COST") {
            config.bcrypt_cost = v
                .parse::<u32>()
                .ok()
                .filter(|c| (MIN_BCRYPT_COST..=31).contains(c))
                .ok_or_else(|| invalid("BCRYPT_COST", &v, "expected 4..=31"))?;
        }
        if let Some(v) = get("MAIL_TIMEOUT_SECS") {
            config.mail_timeout = parse_secs("MAIL_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("STORAGE_TIMEOUT_SECS") {
            config.storage_timeout = parse_secs("STORAGE_TIMEOUT_SECS", &v)?;
        }

        config.database_url = get("DATABASE_URL");
        if let Some(v) = get("DOCS_BUCKET") {
            config.docs_bucket = v;
        }
        if let Some(v) = get("DOCS_BASE_URL") {
            config.docs_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("MAIL_FROM") {
            config.mail_from = v;
        }
        if let Some(v) = get("MAIL_REPLY_TO") {
            config.mail_reply_to = Some(v);
        }
        if let Some(v) = get("CONTACT_EMAIL") {
            config.contact_email = v;
        }
        config.admin_email = get("ADMIN_EMAIL");
        config.admin_password = get("ADMIN_PASSWORD");

        Ok(config)
    }
}

fn invalid(key: &'static str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason,
    }
}

fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| invalid(key, value, "expected a positive number of seconds"))
}

/// `90d`, `12h`, `30m`, `45s` or a bare number of seconds.
pub fn parse_ttl(raw: &str) -> Option<chrono::Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last()? {
        (idx, c) if c.is_ascii_alphabetic() => (&raw[..idx], Some(c.to_ascii_lowercase())),
        _ => (raw, None),
    };
    let n: i64 = digits.parse().ok().filter(|n| *n > 0)?;
    match unit {
        None | Some('s') => Some(chrono::Duration::seconds(n)),
        Some('m') => Some(chrono::Duration::minutes(n)),
        Some('h') => Some(chrono::Duration::hours(n)),
        Some('d') => Some(chrono::Duration::days(n)),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn ttl_units() {
        assert_eq!(parse_ttl("90d"), Some(chrono::Duration::days(90)));
        assert_eq!(parse_ttl("1h"), Some(chrono::Duration::hours(1)));
        assert_eq!(parse_ttl("30m"), Some(chrono::Duration::minutes(30)));
        assert_eq!(parse_ttl("3600"), Some(chrono::Duration::seconds(3600)));
        assert_eq!(parse_ttl("3w"), None);
        assert_eq!(parse_ttl("d"), None);
    }

    #[test]
    fn production_requires_a_secret() {
        assert_eq!(
            from(&[("APP_ENV", "production")]).unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
        let cfg = from(&[("APP_ENV", "production"), ("JWT_SECRET", "s3cret")]).unwrap();
        assert!(cfg.env.is_production());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = from(&[
            ("JWT_SECRET", "x"),
            ("JWT_EXPIRES_IN", "1h"),
            ("JWT_COOKIE_EXPIRES_IN", "7"),
            ("BCRYPT_COST", "4"),
            ("PORT", "3000"),
            ("DOCS_BASE_URL", "https://cdn.example.com/"),
        ])
        .unwrap();
        assert_eq!(cfg.jwt_expires_in, chrono::Duration::hours(1));
        assert_eq!(cfg.jwt_cookie_expires_days, 7);
        assert_eq!(cfg.bcrypt_cost, 4);
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.docs_base_url, "https://cdn.example.com");
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(from(&[("PORT", "http")]), Err(ConfigError::Invalid { key: "PORT", .. })));
        assert!(matches!(from(&[("BCRYPT_COST", "2")]), Err(ConfigError::Invalid { .. })));
        assert!(matches!(from(&[("APP_ENV", "staging")]), Err(ConfigError::Invalid { .. })));
    }
}
