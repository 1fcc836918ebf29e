//! Process configuration read from `.env` and the environment.

use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_SESSION_TTL_MINUTES: i64 = 720;
/// Thirty days.
pub const MAX_SESSION_TTL_MINUTES: i64 = 30 * 24 * 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    /// Unknown names fall back to development.
    fn parse(raw: &str) -> Self {
        let name = raw.trim().to_ascii_lowercase();
        match name.as_str() {
            "production" | "prod" => AppEnvironment::Production,
            "test" | "ci" => AppEnvironment::Test,
            _ => AppEnvironment::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub directory: DirectoryConfig,
}

impl AppConfig {
    /// Read `.env` (if present) and then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let environment = env::var("APP_ENV")
            .map(|raw| AppEnvironment::parse(&raw))
            .unwrap_or(AppEnvironment::Development);
        let server = ServerConfig {
            host: var_or("APP_HOST", DEFAULT_HOST),
            port: match env::var("APP_PORT") {
                Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidPort)?,
                Err(_) => DEFAULT_PORT,
            },
        };
        let telemetry = TelemetryConfig {
            log_level: var_or("APP_LOG_LEVEL", DEFAULT_LOG_LEVEL),
        };

        Ok(AppConfig {
            environment,
            server,
            telemetry,
            directory: DirectoryConfig::from_env()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// `localhost` is accepted as an alias for the IPv4 loopback.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host
                .parse::<IpAddr>()
                .map_err(|source| ConfigError::InvalidHost { source })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

/// Marketplace-level knobs: sessions, uploads and the bootstrap administrator.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub session_ttl_minutes: i64,
    pub max_upload_bytes: usize,
    pub admin: Option<AdminBootstrap>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            admin: None,
        }
    }
}

impl DirectoryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let session_ttl_minutes = bounded_var(
            "DIRECTORY_SESSION_TTL_MINUTES",
            DEFAULT_SESSION_TTL_MINUTES,
            MAX_SESSION_TTL_MINUTES,
            ConfigError::InvalidSessionTtl,
        )?;
        let max_upload_bytes = bounded_var(
            "DIRECTORY_MAX_UPLOAD_BYTES",
            DEFAULT_MAX_UPLOAD_BYTES,
            usize::MAX,
            ConfigError::InvalidUploadLimit,
        )?;

        let admin = match (
            env::var("DIRECTORY_ADMIN_EMAIL").ok(),
            env::var("DIRECTORY_ADMIN_PASSWORD").ok(),
        ) {
            (None, None) => None,
            (Some(email), Some(password)) => Some(AdminBootstrap { email, password }),
            _ => return Err(ConfigError::IncompleteAdminBootstrap),
        };

        Ok(DirectoryConfig {
            session_ttl_minutes,
            max_upload_bytes,
            admin,
        })
    }
}

/// Credentials for the administrator account created at startup.
#[derive(Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse `key` as a number in `1..=max`, or use `default` when it is unset.
fn bounded_var<T>(key: &str, default: T, max: T, invalid: ConfigError) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() && value <= max => Ok(value),
        _ => Err(invalid),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost {
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("DIRECTORY_SESSION_TTL_MINUTES must be between 1 and 43200 minutes (thirty days)")]
    InvalidSessionTtl,
    #[error("DIRECTORY_MAX_UPLOAD_BYTES must be a positive number of bytes")]
    InvalidUploadLimit,
    #[error("DIRECTORY_ADMIN_EMAIL and DIRECTORY_ADMIN_PASSWORD must be set together")]
    IncompleteAdminBootstrap,
}
