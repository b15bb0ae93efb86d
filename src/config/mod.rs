use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub ai: AiMode,
    pub request: RequestConfig,
    pub triage: TriageConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Whether ticket analysis may call the language-model provider.
///
/// Decided once, at load time, from the presence of `OPENAI_API_KEY`.
#[derive(Debug, Clone)]
pub enum AiMode {
    /// Credential present: try the provider first, fall back on failure.
    Enabled(OpenAiConfig),
    /// No credential: heuristic analysis only, no network traffic.
    Disabled,
}

/// OpenAI-compatible chat completions settings
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Request `response_format = json_object` from the provider.
    pub json_mode: bool,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
}

/// Triage pipeline tuning
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Maximum number of historical tickets handed to the analysis client.
    pub history_sample_cap: usize,
    /// Optional JSON file replacing the built-in agent roster.
    pub roster_path: Option<PathBuf>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 1500;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_HISTORY_SAMPLE_CAP: usize = 50;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let ai = match env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => {
                let temperature: f64 = parse_env("AI_TEMPERATURE", DEFAULT_TEMPERATURE)?;
                if !(0.0..=2.0).contains(&temperature) {
                    return Err(AppError::Config {
                        message: format!("AI_TEMPERATURE must be within 0.0-2.0, got {}", temperature),
                    });
                }

                AiMode::Enabled(OpenAiConfig {
                    api_key: key.trim().to_string(),
                    base_url: env::var("OPENAI_BASE_URL")
                        .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
                    model: env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                    temperature,
                    max_tokens: parse_env("AI_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
                    json_mode: parse_env("AI_JSON_MODE", true)?,
                })
            }
            _ => AiMode::Disabled,
        };

        let request = RequestConfig {
            timeout_ms: parse_env("REQUEST_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
        };
        if request.timeout_ms == 0 {
            return Err(AppError::Config {
                message: "REQUEST_TIMEOUT_MS must be greater than zero".to_string(),
            });
        }

        let triage = TriageConfig {
            history_sample_cap: parse_env("HISTORY_SAMPLE_CAP", DEFAULT_HISTORY_SAMPLE_CAP)?,
            roster_path: env::var("AGENT_ROSTER_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        };
        if triage.history_sample_cap == 0 {
            return Err(AppError::Config {
                message: "HISTORY_SAMPLE_CAP must be greater than zero".to_string(),
            });
        }

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/tickets.db".to_string()),
            ),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5)?,
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        Ok(Config {
            ai,
            request,
            triage,
            database,
            logging,
        })
    }

    /// True when a provider credential is configured.
    pub fn ai_enabled(&self) -> bool {
        matches!(self.ai, AiMode::Enabled(_))
    }
}

/// Read and parse an optional variable; a present but unparsable value is an error.
fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| AppError::Config {
                message: format!("{} has an invalid value: {:?}", key, raw),
            })
        }
        _ => Ok(default),
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("json_mode", &self.json_mode)
            .finish()
    }
}

impl OpenAiConfig {
    /// Settings with defaults for everything but the credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            json_mode: true,
        }
    }

    /// Point the client at another OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            history_sample_cap: DEFAULT_HISTORY_SAMPLE_CAP,
            roster_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_config_default() {
        assert_eq!(RequestConfig::default().timeout_ms, 30_000);
    }

    #[test]
    fn test_triage_config_default() {
        let config = TriageConfig::default();
        assert_eq!(config.history_sample_cap, 50);
        assert!(config.roster_path.is_none());
    }

    #[test]
    fn test_openai_config_defaults() {
        let config = OpenAiConfig::new("sk-test");
        assert_eq!(config.base_url, "https://api.openai.com");
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.json_mode);
        assert_eq!(config.max_tokens, 1500);
    }

    #[test]
    fn test_openai_config_debug_redacts_key() {
        let config = OpenAiConfig::new("sk-very-secret");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-very-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_openai_config_builders() {
        let config = OpenAiConfig::new("k")
            .with_base_url("http://localhost:8080")
            .with_model("gpt-4o");
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.model, "gpt-4o");
    }
}
