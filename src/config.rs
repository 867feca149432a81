use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// Which SMS backend delivers OTP codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmsProvider {
    /// Write the code to the log (development only)
    Log,
    Twilio {
        account_sid: String,
        auth_token: String,
        from_number: String,
    },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database (None runs on the in-memory store)
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Redis (None disables caching)
    pub redis_url: Option<String>,
    pub redis_cache_ttl_seconds: u64,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Tokens
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,

    // OTP
    pub otp_ttl_seconds: i64,
    pub otp_max_attempts: i32,
    pub otp_rate_limit_max: u32,
    pub otp_rate_limit_window_seconds: u64,
    pub otp_expose_debug: bool,

    // SMS
    pub sms_provider: SmsProvider,
}

const DEV_JWT_SECRET: &str = "development-secret-key-change-me-please";

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Codes in response bodies are a development aid only.
fn debug_otp_allowed(env: &Environment, requested: bool) -> Result<bool> {
    if requested && env.is_prod() {
        bail!("OTP_EXPOSE_DEBUG is not allowed in prod");
    }
    Ok(requested)
}

fn parse_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Database
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if database_url.is_none() && !env.is_dev() {
            bail!("DATABASE_URL must be set outside of dev");
        }
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10);

        // Redis
        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.is_empty());
        let redis_cache_ttl_seconds = parse_or("REDIS_CACHE_TTL_SECONDS", 300);

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Tokens
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if env.is_dev() => DEV_JWT_SECRET.to_string(),
            Err(_) => return Err(anyhow::anyhow!("JWT_SECRET must be set outside of dev")),
        };
        if env.is_prod() && jwt_secret.len() < 32 {
            bail!("JWT_SECRET must be at least 32 bytes in prod");
        }
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "homesprint".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "homesprint-api".to_string());
        let access_token_ttl_seconds = parse_or("ACCESS_TOKEN_TTL_SECONDS", 15 * 60);
        let refresh_token_ttl_seconds = parse_or("REFRESH_TOKEN_TTL_SECONDS", 7 * 24 * 60 * 60);

        // OTP
        let otp_ttl_seconds = parse_or("OTP_TTL_SECONDS", 5 * 60);
        let otp_max_attempts = parse_or("OTP_MAX_ATTEMPTS", 5);
        let otp_rate_limit_max = parse_or("OTP_RATE_LIMIT_MAX", 5);
        let otp_rate_limit_window_seconds = parse_or("OTP_RATE_LIMIT_WINDOW_SECONDS", 60 * 60);
        let otp_expose_debug =
            debug_otp_allowed(&env, parse_bool("OTP_EXPOSE_DEBUG", env.is_dev()))?;

        // SMS
        let sms_provider = match env::var("SMS_PROVIDER")
            .unwrap_or_else(|_| "log".to_string())
            .to_lowercase()
            .as_str()
        {
            "twilio" => SmsProvider::Twilio {
                account_sid: env::var("TWILIO_ACCOUNT_SID")
                    .context("TWILIO_ACCOUNT_SID must be set for SMS_PROVIDER=twilio")?,
                auth_token: env::var("TWILIO_AUTH_TOKEN")
                    .context("TWILIO_AUTH_TOKEN must be set for SMS_PROVIDER=twilio")?,
                from_number: env::var("TWILIO_FROM_NUMBER")
                    .context("TWILIO_FROM_NUMBER must be set for SMS_PROVIDER=twilio")?,
            },
            "log" => {
                if env.is_prod() {
                    bail!("SMS_PROVIDER=log is not allowed in prod");
                }
                SmsProvider::Log
            }
            other => bail!("Unknown SMS_PROVIDER: {}", other),
        };

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            redis_url,
            redis_cache_ttl_seconds,
            cors_allow_origins,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            otp_ttl_seconds,
            otp_max_attempts,
            otp_rate_limit_max,
            otp_rate_limit_window_seconds,
            otp_expose_debug,
            sms_provider,
        })
    }

    /// Deterministic settings for tests: in-memory store, no Redis, log SMS.
    pub fn test_default() -> Self {
        Settings {
            env: Environment::Dev,
            server_addr: "127.0.0.1:0".to_string(),
            database_url: None,
            database_max_connections: 1,
            redis_url: None,
            redis_cache_ttl_seconds: 60,
            cors_allow_origins: vec!["http://localhost:3000".to_string()],
            jwt_secret: "test-secret-key-that-is-long-enough-for-hs256".to_string(),
            jwt_issuer: "homesprint".to_string(),
            jwt_audience: "homesprint-api".to_string(),
            access_token_ttl_seconds: 15 * 60,
            refresh_token_ttl_seconds: 7 * 24 * 60 * 60,
            otp_ttl_seconds: 5 * 60,
            otp_max_attempts: 5,
            otp_rate_limit_max: 5,
            otp_rate_limit_window_seconds: 60 * 60,
            otp_expose_debug: true,
            sms_provider: SmsProvider::Log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing_defaults_to_dev() {
        assert_eq!(Environment::from_str("production"), Environment::Prod);
        assert_eq!(Environment::from_str("STAGING"), Environment::Staging);
        assert_eq!(Environment::from_str("whatever"), Environment::Dev);
    }

    #[test]
    fn debug_otp_is_refused_in_prod() {
        assert!(debug_otp_allowed(&Environment::Prod, true).is_err());
        assert!(!debug_otp_allowed(&Environment::Prod, false).unwrap());
        assert!(debug_otp_allowed(&Environment::Staging, true).unwrap());
        assert!(debug_otp_allowed(&Environment::Dev, true).unwrap());
    }

    #[test]
    fn test_default_exposes_debug_otp() {
        let settings = Settings::test_default();
        assert!(settings.otp_expose_debug);
        assert_eq!(settings.otp_rate_limit_max, 5);
        assert!(settings.database_url.is_none());
    }
}
