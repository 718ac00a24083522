//! chartqa Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Tabular agent configuration
    pub agent: AgentConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, starting from defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(lookup)?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Load from `CHARTQA_CONFIG` if set, then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("CHARTQA_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        base.with_env_override()
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_lookup(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    fn apply_lookup<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            self.server.static_dir = PathBuf::from(dir);
        }

        // CORS origins from environment variable (comma-separated)
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // LLM
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.openai_base_url = Some(url);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.llm.ollama_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(temperature) = lookup("LLM_TEMPERATURE") {
            self.llm.temperature = parse_value("LLM_TEMPERATURE", temperature)?;
        }
        if let Some(max_tokens) = lookup("LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_value("LLM_MAX_TOKENS", max_tokens)?;
        }

        // Agent
        if let Some(path) = lookup("AGENT_DATA_PATH") {
            self.agent.data_path = PathBuf::from(path);
        }
        if let Some(iterations) = lookup("AGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = parse_value("AGENT_MAX_ITERATIONS", iterations)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Check that everything needed to serve requests is present
    ///
    /// Hosted providers need an API key; without one every request would fail,
    /// so startup is refused instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider.requires_api_key() && self.llm.openai_api_key.is_none() {
            return Err(ConfigError::MissingRequired("OPENAI_API_KEY".to_string()));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AGENT_MAX_ITERATIONS".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// LLM settings for the tabular agent (same provider, agent temperature)
    pub fn agent_llm(&self) -> LlmConfig {
        LlmConfig {
            temperature: self.agent.temperature,
            ..self.llm.clone()
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Directory holding the pre-built frontend
    pub static_dir: PathBuf,

    /// Index document inside `static_dir`, served at `/`
    pub index_file: String,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins for CORS (empty = any origin)
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn index_path(&self) -> PathBuf {
        self.static_dir.join(&self.index_file)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 81,
            static_dir: PathBuf::from("public"),
            index_file: "index.html".to_string(),
            cors_enabled: true,
            cors_origins: vec![],
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for Azure or compatible APIs)
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for free-form generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 256,
            temperature: 0.9,
            timeout_secs: 120,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
    Azure,
}

impl LlmProvider {
    /// Hosted providers authenticate with an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Azure)
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
            Self::Azure => write!(f, "azure"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "azure" => Ok(Self::Azure),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Tabular agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// CSV file the agent answers questions about
    pub data_path: PathBuf,

    /// Temperature for the agent's reasoning calls
    pub temperature: f32,

    /// Maximum reason/act iterations per question
    pub max_iterations: usize,

    /// Timeout for a single tool call in seconds
    pub tool_timeout_secs: u64,

    /// Rows shown in the table preview inside the prompt
    pub preview_rows: usize,

    /// Observations longer than this are truncated
    pub max_observation_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/gapminder.csv"),
            temperature: 0.0,
            max_iterations: 15,
            tool_timeout_secs: 10,
            preview_rows: 5,
            max_observation_chars: 4000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 81);
        assert_eq!(config.server.index_path(), PathBuf::from("public/index.html"));
        assert_eq!(config.agent.data_path, PathBuf::from("data/gapminder.csv"));
        assert_eq!(config.agent.temperature, 0.0);
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAI
        );
        assert_eq!(
            "Ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::Ollama
        );
        assert!("invalid".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_lookup_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("API_PORT", "8081"),
            ("OPENAI_API_KEY", "sk-test"),
            ("LLM_MODEL", "gpt-4o-mini"),
            ("AGENT_DATA_PATH", "/tmp/data.csv"),
            ("CORS_ORIGINS", "http://a.example, ,http://b.example"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.llm.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.agent.data_path, PathBuf::from("/tmp/data.csv"));
        assert_eq!(
            config.server.cors_origins,
            vec!["http://a.example", "http://b.example"]
        );
    }

    #[test]
    fn test_invalid_port_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("API_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "API_PORT"));
    }

    #[test]
    fn test_blank_api_key_treated_as_missing() {
        let config = AppConfig::from_lookup(lookup_from(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert!(config.llm.openai_api_key.is_none());
    }

    #[test]
    fn test_validate_requires_api_key_for_openai() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(ref key) if key == "OPENAI_API_KEY"));
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let mut config = AppConfig::default();
        config.llm.openai_api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ollama_needs_no_key() {
        let config = AppConfig::from_lookup(lookup_from(&[("LLM_PROVIDER", "ollama")])).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_agent_llm_uses_agent_temperature() {
        let mut config = AppConfig::default();
        config.llm.model = "gpt-4o".to_string();
        let agent_llm = config.agent_llm();
        assert_eq!(agent_llm.temperature, 0.0);
        assert_eq!(agent_llm.model, "gpt-4o");
        assert_eq!(config.llm.temperature, 0.9);
    }

    #[test]
    fn test_from_file_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 9000\n\n[agent]\ndata_path = \"fixtures/countries.csv\"\nmax_iterations = 4"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.agent.data_path, PathBuf::from("fixtures/countries.csv"));
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.llm.max_tokens, 256);
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/nonexistent/chartqa.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }
}
