// src/config/mod.rs
// All tunables come from the environment (.env supported); loaded once at startup.

use once_cell::sync::Lazy;
use std::str::FromStr;
use std::time::Duration;

/// Settings for one remote AI provider.
///
/// A provider with no API key in the environment is filtered out of the
/// registry at startup and never tried at runtime.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub priority: u32,
    pub rate_limit_per_minute: u32,
}

#[derive(Debug, Clone)]
pub struct CourierConfig {
    // ── Server Configuration
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub log_level: String,

    // ── Provider Credentials & Ordering
    pub groq: ProviderSettings,
    pub gemini: ProviderSettings,
    pub openrouter: ProviderSettings,
    pub primary_provider: String,

    // ── Dispatch Behaviour
    pub ai_timeout_secs: u64,
    pub ai_max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub circuit_failure_threshold: u32,
    pub circuit_cooldown_secs: u64,
    pub request_deadline_secs: u64,
    pub validate_keys_on_startup: bool,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            // Tolerate inline comments and stray whitespace in .env values
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

/// Optional string variable; empty values count as unset.
fn env_var_opt(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            if clean_val.is_empty() {
                None
            } else {
                Some(clean_val.to_string())
            }
        }
        Err(_) => None,
    }
}

impl CourierConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            host: env_var_or("COURIER_HOST", "0.0.0.0".to_string()),
            port: env_var_or("COURIER_PORT", 8600),
            cors_origin: env_var_or("COURIER_CORS_ORIGIN", "http://localhost:3000".to_string()),
            log_level: env_var_or("COURIER_LOG_LEVEL", "info".to_string()),

            groq: ProviderSettings {
                api_key: env_var_opt("GROQ_API_KEY"),
                model: env_var_or("GROQ_MODEL", "llama-3.1-8b-instant".to_string()),
                priority: env_var_or("GROQ_PRIORITY", 1),
                rate_limit_per_minute: env_var_or("GROQ_RATE_LIMIT", 30),
            },
            gemini: ProviderSettings {
                api_key: env_var_opt("GEMINI_API_KEY"),
                model: env_var_or("GEMINI_MODEL", "gemini-2.5-flash".to_string()),
                priority: env_var_or("GEMINI_PRIORITY", 2),
                rate_limit_per_minute: env_var_or("GEMINI_RATE_LIMIT", 30),
            },
            openrouter: ProviderSettings {
                api_key: env_var_opt("OPENROUTER_API_KEY"),
                model: env_var_or("OPENROUTER_MODEL", "anthropic/claude-3-haiku".to_string()),
                priority: env_var_or("OPENROUTER_PRIORITY", 3),
                rate_limit_per_minute: env_var_or("OPENROUTER_RATE_LIMIT", 30),
            },
            primary_provider: env_var_or("AI_PRIMARY_SERVICE", "groq".to_string()),

            ai_timeout_secs: env_var_or("AI_TIMEOUT", 30),
            ai_max_retries: env_var_or("AI_MAX_RETRIES", 3),
            retry_base_delay_ms: env_var_or("AI_RETRY_BASE_DELAY_MS", 1000),
            retry_max_delay_ms: env_var_or("AI_RETRY_MAX_DELAY_MS", 10000),
            circuit_failure_threshold: env_var_or("CIRCUIT_FAILURE_THRESHOLD", 5),
            circuit_cooldown_secs: env_var_or("CIRCUIT_COOLDOWN_SECS", 30),
            request_deadline_secs: env_var_or("COURIER_REQUEST_DEADLINE", 120),
            validate_keys_on_startup: env_var_or("VALIDATE_KEYS_ON_STARTUP", false),
        }
    }

    // --- Convenience Methods for Common Operations ---

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-call timeout for provider requests
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    /// Overall deadline for one inbound chat request
    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    pub fn circuit_cooldown(&self) -> Duration {
        Duration::from_secs(self.circuit_cooldown_secs)
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<CourierConfig> = Lazy::new(CourierConfig::from_env);
