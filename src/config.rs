use clap::Parser;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_key: Option<String>, // absent or blank selects mock mode
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub web: WebConfig,
    pub llm: LlmConfig,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Credential for the chat-completion provider
    #[arg(long)]
    pub api_key: Option<String>,

    /// Model requested from the provider
    #[arg(long)]
    pub model: Option<String>,
}

const ENV_PREFIX: &str = "ER_SQL";
const API_KEY_VAR: &str = "OPENAI_API_KEY";
const PORT_VAR: &str = "PORT";

impl LlmConfig {
    /// The provider credential, if one is configured and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Pick up a local .env before reading the environment
        let _ = dotenvy::dotenv();

        let mut config_builder = Self::base_builder()?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/er-sql/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.apply_cli_overrides(args);

        Ok(config)
    }

    /// Builder pre-loaded with the built-in defaults.
    pub fn base_builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let defaults = AppConfig::default();

        Config::builder()
            .set_default("web.host", defaults.web.host)?
            .set_default("web.port", defaults.web.port as i64)?
            .set_default("llm.api_url", defaults.llm.api_url)?
            .set_default("llm.model", defaults.llm.model)?
            .set_default("llm.temperature", defaults.llm.temperature as f64)?
            .set_default("llm.max_tokens", defaults.llm.max_tokens as i64)?
            .set_default("llm.timeout_secs", defaults.llm.timeout_secs as i64)
    }

    /// Applies the conventional `OPENAI_API_KEY` and `PORT` variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = lookup(API_KEY_VAR) {
            self.llm.api_key = Some(api_key);
        }

        if let Some(port) = lookup(PORT_VAR) {
            self.web.port = port.trim().parse().map_err(|_| {
                ConfigError::Message(format!("{} must be a port number, got '{}'", PORT_VAR, port))
            })?;
        }

        Ok(())
    }

    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        // Override with command line args if provided
        if let Some(host) = &args.host {
            self.web.host = host.clone();
        }
        if let Some(port) = args.port {
            self.web.port = port;
        }
        if let Some(api_key) = &args.api_key {
            self.llm.api_key = Some(api_key.clone());
        }
        if let Some(model) = &args.model {
            self.llm.model = model.clone();
        }
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            llm: LlmConfig {
                api_key: None,
                api_url: "https://api.openai.com/v1/chat/completions".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                temperature: 0.3,
                max_tokens: 500,
                timeout_secs: 60,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_round_trip_through_builder() {
        let config: AppConfig = AppConfig::base_builder()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config, AppConfig::default());
        assert!(config.llm.credential().is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let toml = r#"
            [web]
            port = 9100

            [llm]
            model = "gpt-4o-mini"
            api_key = "sk-file"
        "#;

        let config: AppConfig = AppConfig::base_builder()
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.web.port, 9100);
        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.credential(), Some("sk-file"));
        assert_eq!(config.llm.max_tokens, 500);
    }

    #[test]
    fn conventional_env_vars_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[("OPENAI_API_KEY", "sk-env"), ("PORT", "5001")]))
            .unwrap();

        assert_eq!(config.llm.credential(), Some("sk-env"));
        assert_eq!(config.web.port, 5001);
    }

    #[test]
    fn invalid_port_is_a_config_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(env(&[("PORT", "eighty")]))
            .unwrap_err();

        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn blank_credential_means_mock_mode() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env(&[("OPENAI_API_KEY", "   ")])).unwrap();
        assert!(config.llm.credential().is_none());
    }

    #[test]
    fn cli_flags_win() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env(&[("PORT", "5001")])).unwrap();
        config.apply_cli_overrides(&CliArgs {
            port: Some(7000),
            host: Some("127.0.0.1".to_string()),
            api_key: Some("sk-cli".to_string()),
            model: Some("gpt-4o".to_string()),
            ..CliArgs::default()
        });

        assert_eq!(config.web.port, 7000);
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.llm.credential(), Some("sk-cli"));
        assert_eq!(config.llm.model, "gpt-4o");
    }
}
