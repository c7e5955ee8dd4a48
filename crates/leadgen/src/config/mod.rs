use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::routing::{StudentId, DEFAULT_CURSOR_ATTEMPTS};

pub const DEFAULT_BASE_DOMAIN: &str = "averyfastsale.com";
pub const DEFAULT_RATE_LIMIT_PER_HOUR: u32 = 5;

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
    pub routing: RoutingConfig,
    pub intake: IntakeConfig,
    pub base_domain: String,
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
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        )?;

        let base_domain = non_empty_var("APP_BASE_DOMAIN")
            .unwrap_or_else(|| DEFAULT_BASE_DOMAIN.to_string())
            .to_ascii_lowercase();

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            routing: RoutingConfig::from_env()?,
            intake: IntakeConfig::from_env()?,
            base_domain,
        })
    }
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Inputs to lead routing that live outside the rule tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingConfig {
    pub fallback_student_id: Option<StudentId>,
    pub county_matching: bool,
    pub cursor_attempts: u8,
    /// Optional CSV exports to seed the routing table from.
    pub students_csv: Option<PathBuf>,
    pub rules_csv: Option<PathBuf>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            fallback_student_id: None,
            county_matching: false,
            cursor_attempts: DEFAULT_CURSOR_ATTEMPTS,
            students_csv: None,
            rules_csv: None,
        }
    }
}

impl RoutingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let county_matching = match non_empty_var("ROUTING_COUNTY_MATCHING") {
            Some(value) => parse_bool("ROUTING_COUNTY_MATCHING", &value)?,
            None => false,
        };

        let cursor_attempts = match non_empty_var("ROUTING_CURSOR_ATTEMPTS") {
            Some(value) => value
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or(ConfigError::InvalidNumber {
                    key: "ROUTING_CURSOR_ATTEMPTS",
                    value,
                })?,
            None => DEFAULT_CURSOR_ATTEMPTS,
        };

        let students_csv = non_empty_var("ROUTING_STUDENTS_CSV").map(PathBuf::from);
        let rules_csv = non_empty_var("ROUTING_RULES_CSV").map(PathBuf::from);
        if students_csv.is_some() != rules_csv.is_some() {
            return Err(ConfigError::IncompleteRoutingTable);
        }

        Ok(Self {
            fallback_student_id: non_empty_var("ROUTING_FALLBACK_STUDENT_ID").map(StudentId),
            county_matching,
            cursor_attempts,
            students_csv,
            rules_csv,
        })
    }
}

/// Public lead form limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeConfig {
    pub max_submissions_per_hour: u32,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_submissions_per_hour: DEFAULT_RATE_LIMIT_PER_HOUR,
        }
    }
}

impl IntakeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_submissions_per_hour = match non_empty_var("LEADS_RATE_LIMIT_PER_HOUR") {
            Some(value) => value.trim().parse::<u32>().map_err(|_| {
                ConfigError::InvalidNumber {
                    key: "LEADS_RATE_LIMIT_PER_HOUR",
                    value,
                }
            })?,
            None => DEFAULT_RATE_LIMIT_PER_HOUR,
        };

        Ok(Self {
            max_submissions_per_hour,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            key,
            value: value.to_string(),
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat(String),
    InvalidFlag { key: &'static str, value: String },
    InvalidNumber { key: &'static str, value: String },
    IncompleteRoutingTable,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'json', got '{value}'")
            }
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be true or false, got '{value}'")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a positive number, got '{value}'")
            }
            ConfigError::IncompleteRoutingTable => write!(
                f,
                "ROUTING_STUDENTS_CSV and ROUTING_RULES_CSV must be set together"
            ),
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
