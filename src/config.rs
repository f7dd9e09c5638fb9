use std::env;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::llm::gemini::DEFAULT_BASE_URL;
use crate::llm::selector::{DEFAULT_FALLBACK_MODEL, DEFAULT_MODELS};
use crate::llm::{GeminiSettings, GenerationConfig, ModelSelector};
use crate::tools::InvokerSettings;
use crate::workflow::DEFAULT_WORKFLOW_MODEL;

/// Prefix for structured environment overrides, e.g. `CHAINFLOW__SERVER__PORT`.
pub const ENV_PREFIX: &str = "CHAINFLOW";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: Option<bool>,
}

/// Which binary is loading configuration; selects service-specific defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Agent,
    Workflow,
}

impl Service {
    pub fn default_port(self) -> u16 {
        match self {
            Self::Agent => 8000,
            Self::Workflow => 8001,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub models: Vec<String>,
    pub fallback_model: Option<String>,
    pub workflow_model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("fallback_model", &self.fallback_model)
            .field("workflow_model", &self.workflow_model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("top_k", &self.top_k)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct ToolsConfig {
    pub backend_url: String,
    pub trusted_domain: String,
    pub bearer_token: Option<String>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("backend_url", &self.backend_url)
            .field("trusted_domain", &self.trusted_domain)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub max_iterations: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn load(service: Service) -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args(), service)
    }

    /// Layer defaults, config file, `CHAINFLOW__*` env, legacy env vars, and
    /// CLI flags, in increasing precedence.
    pub fn load_from_args<I, T>(args: I, service: Service) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", i64::from(service.default_port()))?
            .set_default("llm.api_key", "")?
            .set_default("llm.base_url", DEFAULT_BASE_URL)?
            .set_default("llm.models", DEFAULT_MODELS.to_vec())?
            .set_default("llm.fallback_model", DEFAULT_FALLBACK_MODEL)?
            .set_default("llm.workflow_model", DEFAULT_WORKFLOW_MODEL)?
            .set_default("llm.temperature", 0.7)?
            .set_default("llm.top_p", 0.8)?
            .set_default("llm.top_k", 40)?
            .set_default("llm.timeout_secs", 60)?
            .set_default("tools.backend_url", "http://localhost:3000")?
            .set_default("tools.trusted_domain", "api.subgraph.somnia.network")?
            .set_default("tools.timeout_secs", 60)?
            .set_default("agent.max_iterations", 10)?
            .set_default("logging.json", false)?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("llm.models")
                .try_parsing(true),
        );

        // Unprefixed variables kept for existing deployments.
        for (var, key) in [
            ("GEMINI_API_KEY", "llm.api_key"),
            ("GEMINI_BASE_URL", "llm.base_url"),
            ("BACKEND_URL", "tools.backend_url"),
            ("SOMNIA_BEARER_TOKEN", "tools.bearer_token"),
        ] {
            if let Some(val) = env::var(var).ok().filter(|v| !v.trim().is_empty()) {
                builder = builder.set_override(key, val)?;
            }
        }

        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(json) = cli.log_json {
            builder = builder.set_override("logging.json", json)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.llm.api_key.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "GEMINI_API_KEY not found in environment variables".to_string(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(config::ConfigError::Message(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            base_url: self.llm.base_url.clone(),
            api_key: self.llm.api_key.clone(),
            timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }

    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.llm.temperature,
            top_p: Some(self.llm.top_p),
            top_k: Some(self.llm.top_k),
            ..GenerationConfig::default()
        }
    }

    pub fn model_selector(&self) -> ModelSelector {
        ModelSelector::new(
            self.llm.models.clone(),
            self.llm.fallback_model.clone().filter(|m| !m.is_empty()),
        )
    }

    pub fn invoker_settings(&self) -> InvokerSettings {
        InvokerSettings {
            timeout: Duration::from_secs(self.tools.timeout_secs),
            trusted_domain: self.tools.trusted_domain.clone(),
            bearer_token: self
                .tools
                .bearer_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
        }
    }
}
