//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for web-qa, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults for a hosted OpenAI-compatible model and a local WebDriver
//! - Builder-friendly plain structs that CLI flags can override
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WEB_QA_LLM_ENDPOINT` | Chat completions endpoint URL | Gemini OpenAI-compatible endpoint |
//! | `WEB_QA_LLM_MODEL` | Model name | `gemini-2.5-flash` |
//! | `WEB_QA_LLM_API_KEY` | Bearer token for the endpoint | unset |
//! | `WEB_QA_LLM_MAX_TOKENS` | Maximum tokens in a response | `4096` |
//! | `WEB_QA_LLM_TIMEOUT` | Per-request timeout in seconds | `300` |
//! | `WEB_QA_LLM_CONNECT_TIMEOUT` | Connection timeout in seconds | `10` |
//! | `WEB_QA_MAX_AGENT_TURNS` | Tool-calling turns per agent request | `25` |
//! | `WEB_QA_WEBDRIVER_URL` | WebDriver server URL | `http://localhost:9515` |
//! | `WEB_QA_BROWSER` | `chrome` or `firefox` | `chrome` |
//! | `WEB_QA_ACTION_TIMEOUT` | Page action timeout in milliseconds | `5000` |
//! | `WEB_QA_SESSION_DIR` | Base directory for run sessions | `/tmp/web-qa` |
//! | `WEB_QA_OUTPUT` | Results file name | `qa_results.json` |
//!
//! # Example
//!
//! ```bash
//! # Use a local model server and Firefox
//! export WEB_QA_LLM_ENDPOINT="http://localhost:11434/v1/chat/completions"
//! export WEB_QA_LLM_MODEL="qwen3"
//! export WEB_QA_BROWSER="firefox"
//! export WEB_QA_WEBDRIVER_URL="http://localhost:4444"
//! ```

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default chat completions endpoint
pub const DEFAULT_LLM_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";

/// Default model name
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";

/// Default max tokens per response
pub const DEFAULT_LLM_MAX_TOKENS: u32 = 4096;

/// Default LLM connection timeout (seconds)
pub const DEFAULT_LLM_CONNECT_TIMEOUT: u64 = 10;

/// Default LLM request timeout (seconds)
pub const DEFAULT_LLM_REQUEST_TIMEOUT: u64 = 300;

/// Default cap on tool-calling turns for one agent request
pub const DEFAULT_MAX_AGENT_TURNS: usize = 25;

/// Default WebDriver server (chromedriver's default port)
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Default browser
pub const DEFAULT_BROWSER: &str = "chrome";

/// Default timeout for click/fill/get_text (milliseconds)
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 5000;

/// Default session base directory
pub const DEFAULT_SESSION_DIR: &str = "/tmp/web-qa";

/// Default results file name
pub const DEFAULT_OUTPUT_FILE: &str = "qa_results.json";

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_LLM_ENDPOINT: &str = "WEB_QA_LLM_ENDPOINT";
pub const ENV_LLM_MODEL: &str = "WEB_QA_LLM_MODEL";
pub const ENV_LLM_API_KEY: &str = "WEB_QA_LLM_API_KEY";
pub const ENV_LLM_MAX_TOKENS: &str = "WEB_QA_LLM_MAX_TOKENS";
pub const ENV_LLM_REQUEST_TIMEOUT: &str = "WEB_QA_LLM_TIMEOUT";
pub const ENV_LLM_CONNECT_TIMEOUT: &str = "WEB_QA_LLM_CONNECT_TIMEOUT";
pub const ENV_MAX_AGENT_TURNS: &str = "WEB_QA_MAX_AGENT_TURNS";
pub const ENV_WEBDRIVER_URL: &str = "WEB_QA_WEBDRIVER_URL";
pub const ENV_BROWSER: &str = "WEB_QA_BROWSER";
pub const ENV_ACTION_TIMEOUT: &str = "WEB_QA_ACTION_TIMEOUT";
pub const ENV_SESSION_DIR: &str = "WEB_QA_SESSION_DIR";
pub const ENV_OUTPUT_FILE: &str = "WEB_QA_OUTPUT";

/// Legacy API key variable, still honoured when the prefixed one is unset
pub const ENV_LLM_API_KEY_LEGACY: &str = "GEMINI_API_KEY";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for web-qa
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmSettings,
    pub browser: BrowserSettings,
    pub session: SessionSettings,
}

/// Model endpoint settings
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    /// Connection timeout (seconds)
    pub connect_timeout: u64,
    /// Whole-request timeout (seconds)
    pub request_timeout: u64,
    pub max_turns: usize,
}

/// Browser and WebDriver settings
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub browser: String,
    /// Timeout applied to element lookups (milliseconds)
    pub action_timeout_ms: u64,
}

/// Session and output settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Base directory for session storage
    pub base_dir: String,
    /// Default results file name
    pub output_file: String,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            llm: LlmSettings::from_env(),
            browser: BrowserSettings::from_env(),
            session: SessionSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            llm: LlmSettings::defaults(),
            browser: BrowserSettings::defaults(),
            session: SessionSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl LlmSettings {
    pub fn from_env() -> Self {
        Self {
            endpoint: env_or(ENV_LLM_ENDPOINT, DEFAULT_LLM_ENDPOINT),
            model: env_or(ENV_LLM_MODEL, DEFAULT_LLM_MODEL),
            api_key: env::var(ENV_LLM_API_KEY)
                .or_else(|_| env::var(ENV_LLM_API_KEY_LEGACY))
                .ok()
                .filter(|key| !key.trim().is_empty()),
            max_tokens: env_parse(ENV_LLM_MAX_TOKENS).unwrap_or(DEFAULT_LLM_MAX_TOKENS),
            connect_timeout: env_parse(ENV_LLM_CONNECT_TIMEOUT)
                .unwrap_or(DEFAULT_LLM_CONNECT_TIMEOUT),
            request_timeout: env_parse(ENV_LLM_REQUEST_TIMEOUT)
                .unwrap_or(DEFAULT_LLM_REQUEST_TIMEOUT),
            max_turns: env_parse(ENV_MAX_AGENT_TURNS).unwrap_or(DEFAULT_MAX_AGENT_TURNS),
        }
    }

    pub fn defaults() -> Self {
        Self {
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            max_tokens: DEFAULT_LLM_MAX_TOKENS,
            connect_timeout: DEFAULT_LLM_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_LLM_REQUEST_TIMEOUT,
            max_turns: DEFAULT_MAX_AGENT_TURNS,
        }
    }
}

impl BrowserSettings {
    pub fn from_env() -> Self {
        Self {
            webdriver_url: env_or(ENV_WEBDRIVER_URL, DEFAULT_WEBDRIVER_URL),
            browser: env_or(ENV_BROWSER, DEFAULT_BROWSER),
            action_timeout_ms: env_parse(ENV_ACTION_TIMEOUT).unwrap_or(DEFAULT_ACTION_TIMEOUT_MS),
        }
    }

    pub fn defaults() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            browser: DEFAULT_BROWSER.to_string(),
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
        }
    }
}

impl SessionSettings {
    pub fn from_env() -> Self {
        Self {
            base_dir: env_or(ENV_SESSION_DIR, DEFAULT_SESSION_DIR),
            output_file: env_or(ENV_OUTPUT_FILE, DEFAULT_OUTPUT_FILE),
        }
    }

    pub fn defaults() -> Self {
        Self {
            base_dir: DEFAULT_SESSION_DIR.to_string(),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| parse_setting(&s))
}

/// Parse a numeric setting, tolerating surrounding whitespace
fn parse_setting<T: std::str::FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

/// Get session base directory (convenience function)
pub fn session_base_dir() -> String {
    get().session.base_dir.clone()
}
