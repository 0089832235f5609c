use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::safety::cache::DEFAULT_FRESHNESS;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub registry: RegistryConfig,
    pub rate_limit: RateLimitConfig,
    pub patterns: PatternConfig,
    pub admin: AdminConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let include_targets = parse_bool("APP_LOG_TARGETS", false)?;

        let base_url = env::var("REGISTRY_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:4000".to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidRegistryUrl { value: base_url });
        }
        let api_token = env::var("REGISTRY_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let registry = RegistryConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            timeout: Duration::from_millis(parse_number("REGISTRY_TIMEOUT_MS", 5_000)?),
            use_cache: parse_bool("REGISTRY_USE_CACHE", true)?,
            cache_freshness: Duration::from_secs(parse_number(
                "REGISTRY_CACHE_TTL_SECS",
                DEFAULT_FRESHNESS.as_secs(),
            )?),
        };

        let rate_limit = RateLimitConfig {
            max_attempts: parse_number("RATE_LIMIT_MAX_ATTEMPTS", 5)? as usize,
            window: Duration::from_secs(parse_number("RATE_LIMIT_WINDOW_SECS", 60)?),
        };

        let patterns = PatternConfig {
            extra_user_agents: parse_list("BLOCKED_USER_AGENTS"),
            extra_domains: parse_list("BLOCKED_DOMAINS"),
        };

        let admin = AdminConfig {
            token: env::var("ADMIN_API_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets,
            },
            registry,
            rate_limit,
            patterns,
            admin,
        })
    }
}

fn parse_number(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub include_targets: bool,
}

/// Connection details for the remote blacklist registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL without a trailing slash, e.g. `https://portal.example.com`.
    pub base_url: String,
    pub api_token: Option<String>,
    /// Upper bound for every registry round trip.
    pub timeout: Duration,
    pub use_cache: bool,
    pub cache_freshness: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_attempts: usize,
    pub window: Duration,
}

/// Extra blocked tokens applied on top of the built-in lists at startup.
#[derive(Debug, Clone, Default)]
pub struct PatternConfig {
    pub extra_user_agents: Vec<String>,
    pub extra_domains: Vec<String>,
}

/// Operator credential for the in-process administration routes.
///
/// Registry entry administration never uses it; those calls carry the caller's own bearer.
#[derive(Debug, Clone, Default)]
pub struct AdminConfig {
    pub token: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidFlag { key: &'static str },
    InvalidRegistryUrl { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
            ConfigError::InvalidRegistryUrl { value } => {
                write!(f, "REGISTRY_BASE_URL '{value}' must start with http:// or https://")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
