pub mod extract;
pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use crate::er::ErModel;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use tracing::{debug, info, warn};

use providers::mock::generate_mock_sql;
use providers::openai::OpenAiProvider;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, model: &ErModel, description: &str) -> Result<String, LlmError>;

    fn name(&self) -> &str;
}

/// Turns an ER model and a query description into SQL.
///
/// With a provider configured the request is delegated to it; any provider
/// failure is logged and answered by the mock rule table instead, so
/// [`SqlSynthesizer::generate`] always yields a SQL string.
pub struct SqlSynthesizer {
    provider: Option<Box<dyn SqlGenerator>>,
}

impl SqlSynthesizer {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        match config.credential() {
            Some(api_key) => {
                let provider = OpenAiProvider::new(config, api_key)?;
                info!("Using LLM provider at {} with model {}", config.api_url, config.model);
                Ok(Self::with_provider(Box::new(provider)))
            }
            None => {
                info!("No LLM credential configured, using mock SQL generation");
                Ok(Self::mock())
            }
        }
    }

    pub fn mock() -> Self {
        Self { provider: None }
    }

    pub fn with_provider(provider: Box<dyn SqlGenerator>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn is_mock(&self) -> bool {
        self.provider.is_none()
    }

    pub async fn generate(&self, model: &ErModel, description: &str) -> String {
        let Some(provider) = &self.provider else {
            return generate_mock_sql(model, description);
        };

        match provider.generate_sql(model, description).await {
            Ok(sql) => {
                debug!("{} generated SQL: {}", provider.name(), sql);
                sql
            }
            Err(e) => {
                warn!("{} failed, falling back to mock SQL: {}", provider.name(), e);
                generate_mock_sql(model, description)
            }
        }
    }
}
