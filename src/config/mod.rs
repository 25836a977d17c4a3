//! Configuration management for the payroll core

use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Service name attached to every request span
    pub app_name: String,
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Advertised gateway host (may be empty)
    pub gateway_host: String,
    /// Advertised gateway base path (may be empty)
    pub gateway_base_path: String,
    /// Database configuration
    pub database: DatabaseConfig,
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Telemetry configuration
    pub telemetry: TelemetryConfig,
    /// Shutdown grace period
    pub graceful_timeout: Duration,
    /// Per-request deadline
    pub request_timeout: Duration,
    /// Whether the refresh cookie carries the `Secure` flag
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub dsn: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub auto_migrate: bool,
    /// `savepoints` or `none`
    pub nested_strategy: String,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `text` or `json`
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            metrics_enabled: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "payroll-core".to_string()),
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            gateway_host: env::var("GATEWAY_HOST").unwrap_or_default(),
            gateway_base_path: env::var("GATEWAY_BASE_PATH").unwrap_or_default(),
            database: DatabaseConfig {
                dsn: env::var("DB_DSN").context("DB_DSN is required")?,
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: env::var("DB_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                auto_migrate: env::var("DB_AUTO_MIGRATE")
                    .map(|s| s.to_lowercase() != "false")
                    .unwrap_or(true),
                nested_strategy: env::var("TX_NESTED_STRATEGY")
                    .unwrap_or_else(|_| "savepoints".to_string()),
            },
            jwt: JwtConfig {
                access_secret: env::var("JWT_ACCESS_SECRET")
                    .context("JWT_ACCESS_SECRET is required")?,
                refresh_secret: env::var("JWT_REFRESH_SECRET")
                    .context("JWT_REFRESH_SECRET is required")?,
                access_ttl: duration_var("JWT_ACCESS_TTL", "15m")?,
                refresh_ttl: duration_var("JWT_REFRESH_TTL", "720h")?,
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
                metrics_enabled: env::var("METRICS_ENABLED")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(false),
            },
            graceful_timeout: duration_var("GRACEFUL_TIMEOUT", "10s")?,
            request_timeout: duration_var("REQUEST_TIMEOUT", "30s")?,
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(true),
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Base URL advertised through the gateway, if one is configured.
    pub fn public_base_url(&self) -> Option<String> {
        if self.gateway_host.is_empty() {
            return None;
        }
        let path = self.gateway_base_path.trim_end_matches('/');
        Some(format!("{}{}", self.gateway_host.trim_end_matches('/'), path))
    }
}

fn duration_var(name: &str, default: &str) -> Result<Duration> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_duration(&raw).with_context(|| format!("Invalid {name}: {raw:?}"))
}

/// Parse a Go-style duration such as `15m`, `720h`, `1h30m` or `250ms`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        bail!("empty duration");
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if digits == 0 {
            bail!("expected a number at {rest:?}");
        }
        let value: f64 = rest[..digits].parse().context("invalid number")?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => bail!("missing unit in duration"),
            other => bail!("unknown unit {other:?}"),
        };
        rest = &rest[unit_len..];
        total += Duration::from_nanos((value * nanos_per_unit).round() as u64);
    }
    Ok(total)
}
