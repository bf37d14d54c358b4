//! Server configuration, loaded from environment variables at startup.

use cortex_chat_core::{CortexModel, DEFAULT_MAX_TURNS};

/// Connection settings for the Snowflake SQL API.
#[derive(Debug, Clone)]
pub struct SnowflakeConfig {
    /// Account URL, e.g. `https://myorg-myaccount.snowflakecomputing.com`.
    pub url: String,
    /// Bearer token (PAT, OAuth access token or key-pair JWT).
    pub token: String,
    /// Value of `X-Snowflake-Authorization-Token-Type`.
    pub token_type: String,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    /// Statement and HTTP timeout in seconds.
    pub timeout_secs: u64,
}

/// Runtime configuration for cortex-chat-server.
///
/// Every field has a default so the server starts without any environment
/// variables set; completions fail until the Snowflake URL and token are
/// provided.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://cortex-chat.db"`).
    /// The file is created on first start.
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Serve Swagger UI at `/swagger-ui` (default: `true`).
    pub enable_swagger: bool,

    /// Comma-separated CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Transcript window passed to the prompt builder.
    pub max_turns: i64,

    /// Model preselected in the UI and used when API callers omit one.
    pub default_model: String,

    /// Temperature preselected in the UI and used when API callers omit one.
    pub default_temperature: f32,

    pub snowflake: SnowflakeConfig,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("CORTEX_CHAT_BIND", "0.0.0.0:3000"),
            database_url: env_or("CORTEX_CHAT_DATABASE_URL", "sqlite://cortex-chat.db"),
            log_level: env_or("CORTEX_CHAT_LOG", "info"),
            log_json: parse_bool("CORTEX_CHAT_LOG_JSON", false),
            enable_swagger: parse_bool("CORTEX_CHAT_ENABLE_SWAGGER", true),
            cors_allowed_origins: env_opt("CORTEX_CHAT_CORS_ORIGINS"),
            max_turns: parse_env("CORTEX_CHAT_MAX_TURNS", DEFAULT_MAX_TURNS),
            default_model: env_or(
                "CORTEX_CHAT_DEFAULT_MODEL",
                &CortexModel::default().to_string(),
            ),
            default_temperature: parse_env("CORTEX_CHAT_DEFAULT_TEMPERATURE", 0.7),
            snowflake: SnowflakeConfig {
                url: env_or("CORTEX_CHAT_SNOWFLAKE_URL", ""),
                token: env_or("CORTEX_CHAT_SNOWFLAKE_TOKEN", ""),
                token_type: env_or(
                    "CORTEX_CHAT_SNOWFLAKE_TOKEN_TYPE",
                    "PROGRAMMATIC_ACCESS_TOKEN",
                ),
                warehouse: env_opt("CORTEX_CHAT_SNOWFLAKE_WAREHOUSE"),
                role: env_opt("CORTEX_CHAT_SNOWFLAKE_ROLE"),
                database: env_opt("CORTEX_CHAT_SNOWFLAKE_DATABASE"),
                schema: env_opt("CORTEX_CHAT_SNOWFLAKE_SCHEMA"),
                timeout_secs: parse_env("CORTEX_CHAT_SNOWFLAKE_TIMEOUT_SECS", 120),
            },
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".into(),
        database_url: "sqlite::memory:".into(),
        log_level: "debug".into(),
        log_json: false,
        enable_swagger: false,
        cors_allowed_origins: None,
        max_turns: DEFAULT_MAX_TURNS,
        default_model: "mistral-large".into(),
        default_temperature: 0.7,
        snowflake: SnowflakeConfig {
            url: "https://example.invalid".into(),
            token: String::new(),
            token_type: "PROGRAMMATIC_ACCESS_TOKEN".into(),
            warehouse: None,
            role: None,
            database: None,
            schema: None,
            timeout_secs: 5,
        },
    }
}
