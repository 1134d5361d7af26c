//! Service configuration read from the process environment (and `.env` when present).

use crate::calculator::ProgramYear;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(raw: Option<&str>) -> Self {
        let value = raw.unwrap_or_default().trim().to_ascii_lowercase();
        match value.as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub assessment: AssessmentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `load` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = AppEnvironment::parse(lookup("APP_ENV").as_deref());

        let port = match lookup("APP_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        let server = ServerConfig {
            host: lookup("APP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
        };

        let telemetry = TelemetryConfig {
            log_level: lookup("APP_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        };

        let default_program_year = match lookup("ASSESSMENT_PROGRAM_YEAR") {
            Some(raw) => raw
                .parse::<ProgramYear>()
                .map_err(|_| ConfigError::InvalidProgramYear(raw))?,
            None => ProgramYear::Y2023_2024,
        };
        let queue_capacity = match lookup("WORKER_QUEUE_CAPACITY") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or(ConfigError::InvalidQueueCapacity(raw))?,
            None => DEFAULT_QUEUE_CAPACITY,
        };

        Ok(Self {
            environment,
            server,
            telemetry,
            assessment: AssessmentConfig {
                default_program_year,
                queue_capacity,
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host
                .parse()
                .map_err(|source| ConfigError::InvalidHost {
                    host: self.host.clone(),
                    source,
                })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the calculator and the assessment worker.
#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    /// Program year used when a calculation request does not carry one.
    pub default_program_year: ProgramYear,
    /// Bound of the worker command queue.
    pub queue_capacity: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APP_PORT '{0}' must be a valid u16")]
    InvalidPort(String),
    #[error("APP_HOST '{host}' must be localhost or an IPv4/IPv6 address")]
    InvalidHost {
        host: String,
        source: AddrParseError,
    },
    #[error("ASSESSMENT_PROGRAM_YEAR '{0}' is not a supported program year")]
    InvalidProgramYear(String),
    #[error("WORKER_QUEUE_CAPACITY '{0}' must be a positive integer")]
    InvalidQueueCapacity(String),
}
