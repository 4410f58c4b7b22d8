//! Configuration management for Semula Core

use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Hosted auth/storage backend configuration
    pub backend: BackendConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Logging and metrics configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the hosted project (e.g., https://xyz.supabase.co)
    pub url: String,
    /// Public anon key, sent as `apikey` on every request
    pub anon_key: String,
    pub timeout_secs: u64,
    /// Table holding budget line items
    pub budget_items_table: String,
    /// Table holding user profiles (id, display_name, role, created_at)
    pub profiles_table: String,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any origin
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl CorsConfig {
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "pretty"
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            metrics_enabled: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let backend_url = env::var("SUPABASE_URL").context("SUPABASE_URL is required")?;

        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            backend: BackendConfig {
                url: backend_url.trim_end_matches('/').to_string(),
                anon_key: env::var("SUPABASE_ANON_KEY")
                    .context("SUPABASE_ANON_KEY is required")?,
                timeout_secs: env::var("BACKEND_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("Invalid BACKEND_TIMEOUT_SECS")?,
                budget_items_table: env::var("BUDGET_ITEMS_TABLE")
                    .unwrap_or_else(|_| "budget_items".to_string()),
                profiles_table: env::var("PROFILES_TABLE")
                    .unwrap_or_else(|_| "profiles".to_string()),
            },
            cors: CorsConfig {
                allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .map(|v| parse_list(&v))
                    .unwrap_or_else(|_| CorsConfig::default().allowed_origins),
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                metrics_enabled: env::var("METRICS_ENABLED")
                    .map(|v| parse_bool(&v))
                    .unwrap_or(false),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
