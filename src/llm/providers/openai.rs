use crate::config::LlmConfig;
use crate::er::ErModel;
use crate::llm::extract::extract_sql;
use crate::llm::prompt::{prepare_prompt, SYSTEM_PROMPT};
use crate::llm::{LlmError, SqlGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Chat-completion provider speaking the OpenAI wire format.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig, api_key: &str) -> Result<Self, LlmError> {
        if config.api_url.trim().is_empty() {
            return Err(LlmError::ConfigError(
                "API URL is required for the LLM provider".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, model: &ErModel, description: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: prepare_prompt(model, description),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl SqlGenerator for OpenAiProvider {
    async fn generate_sql(&self, model: &ErModel, description: &str) -> Result<String, LlmError> {
        let request = self.build_request(model, description);
        debug!("Sending chat completion request to {} with model {}", self.api_url, self.model);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!("LLM API responded with status code: {} - {}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                status
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();

        let sql = extract_sql(&content);
        if sql.is_empty() {
            return Err(LlmError::ResponseError("Empty completion".to_string()));
        }

        Ok(sql)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::er::Entity;

    #[test]
    fn request_carries_system_and_user_messages() {
        let config = AppConfig::default().llm;
        let provider = OpenAiProvider::new(&config, "sk-test").unwrap();
        let model = ErModel::new(vec![Entity::new("Users", ["id"])], vec![]);

        let request = serde_json::to_value(provider.build_request(&model, "all users")).unwrap();

        assert_eq!(request["model"], "gpt-3.5-turbo");
        assert_eq!(request["max_tokens"], 500);
        assert_eq!(request["messages"][0]["role"], "system");
        assert_eq!(request["messages"][1]["role"], "user");
        let user = request["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("- Users: id"));
        assert!(user.contains("all users"));
    }

    #[test]
    fn blank_url_is_rejected() {
        let config = LlmConfig {
            api_url: " ".to_string(),
            ..AppConfig::default().llm
        };
        assert!(matches!(
            OpenAiProvider::new(&config, "sk-test"),
            Err(LlmError::ConfigError(_))
        ));
    }

    #[test]
    fn response_tolerates_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
