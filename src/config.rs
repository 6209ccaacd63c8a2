use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub session_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub max_rows: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub request_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub import: ImportConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "recipebox".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "recipebox-users".into()),
            session_ttl_days: env_or("SESSION_TTL_DAYS", 30),
        };

        let production = std::env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let cookie = CookieConfig {
            secure: env_or("COOKIE_SECURE", production),
        };

        let import = ImportConfig {
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
            max_rows: env_or("IMPORT_MAX_ROWS", 10_000),
        };

        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            jwt,
            cookie,
            import,
        })
    }

    /// Session lifetime in seconds, shared by the token `exp` and the cookie `Max-Age`.
    pub fn session_ttl_secs(&self) -> i64 {
        self.jwt.session_ttl_days * 24 * 60 * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_missing_or_garbage() {
        assert_eq!(env_or("RECIPEBOX_TEST_UNSET_VAR", 42u32), 42);
        std::env::set_var("RECIPEBOX_TEST_BAD_NUMBER", "not-a-number");
        assert_eq!(env_or("RECIPEBOX_TEST_BAD_NUMBER", 7usize), 7);
    }

    #[test]
    fn thirty_day_session_is_2592000_seconds() {
        let cfg = crate::state::test_config();
        assert_eq!(cfg.session_ttl_secs(), 2_592_000);
    }
}
