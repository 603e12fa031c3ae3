//! OpenAI-compatible chat-completions client (DeepSeek by default) and the dialogue and
//! evaluation services built on it.

use crate::prompt::{dialogue_messages, evaluation_messages, parse_report, ChatMessage};
use crate::{
    ChatConfig, DialogueRequest, DialogueService, EvaluationFailure, EvaluationOutcome,
    EvaluationRequest, EvaluationService, Result, ServiceError,
};
use async_trait::async_trait;
use catalog::Catalog;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ChatClient {
    config: ChatConfig,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ServiceError::Config("chat backend requires an API key".into()))?;
        let endpoint = format!(
            "{}/v1/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            config,
            endpoint,
            api_key,
            client,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Run one completion and return the first choice's content ("" when absent).
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        json_object: bool,
    ) -> Result<String> {
        #[derive(serde::Serialize)]
        struct ResponseFormat {
            r#type: &'static str,
        }
        #[derive(serde::Serialize)]
        struct CompletionReq<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
            #[serde(skip_serializing_if = "Option::is_none")]
            response_format: Option<ResponseFormat>,
        }

        let req = CompletionReq {
            model: &self.config.model,
            messages,
            temperature,
            response_format: json_object.then_some(ResponseFormat {
                r#type: "json_object",
            }),
        };

        let start = std::time::Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let details = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                details,
            });
        }

        #[derive(serde::Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct Choice {
            message: Option<Message>,
        }
        #[derive(serde::Deserialize)]
        struct RespBody {
            #[serde(default)]
            choices: Vec<Choice>,
        }

        let body: RespBody = resp
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;
        debug!(
            "chat completion in {} ms ({} messages)",
            start.elapsed().as_millis(),
            messages.len()
        );
        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }
}

/// Persona dialogue over chat completions.
pub struct ChatDialogue {
    client: ChatClient,
    catalog: Arc<Catalog>,
}

impl ChatDialogue {
    pub fn new(config: ChatConfig, catalog: Arc<Catalog>) -> Result<Self> {
        Ok(Self {
            client: ChatClient::new(config)?,
            catalog,
        })
    }
}

#[async_trait]
impl DialogueService for ChatDialogue {
    async fn reply(&self, request: &DialogueRequest) -> Result<String> {
        let persona = self
            .catalog
            .persona(&request.persona_id)
            .ok_or_else(|| ServiceError::UnknownPersona(request.persona_id.clone()))?;
        let messages = dialogue_messages(persona, &request.history);
        let text = self
            .client
            .complete(&messages, self.client.config().dialogue_temperature, false)
            .await?;
        Ok(text.trim().to_string())
    }

    fn name(&self) -> &str {
        "chat"
    }
}

/// Rubric evaluation over chat completions.
pub struct ChatEvaluator {
    client: ChatClient,
}

impl ChatEvaluator {
    pub fn new(config: ChatConfig) -> Result<Self> {
        Ok(Self {
            client: ChatClient::new(config)?,
        })
    }
}

#[async_trait]
impl EvaluationService for ChatEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationOutcome {
        let messages = evaluation_messages(request);
        let cfg = self.client.config();
        match self
            .client
            .complete(&messages, cfg.evaluation_temperature, cfg.json_response_format)
            .await
        {
            Ok(raw) if raw.trim().is_empty() => parse_report("{}"),
            Ok(raw) => parse_report(&raw),
            Err(ServiceError::Status { details, .. }) => Err(EvaluationFailure::service(details)),
            Err(e) => {
                warn!("evaluation request failed: {}", e);
                Err(EvaluationFailure::service(e.to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requires_api_key() {
        let cfg = ChatConfig {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(ChatClient::new(cfg), Err(ServiceError::Config(_))));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let cfg = ChatConfig {
            base_url: "http://127.0.0.1:9009/".to_string(),
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let client = ChatClient::new(cfg).unwrap();
        assert_eq!(client.endpoint, "http://127.0.0.1:9009/v1/chat/completions");
    }

    #[tokio::test]
    async fn unknown_persona_is_an_error() {
        let cfg = ChatConfig {
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let dialogue = ChatDialogue::new(cfg, Arc::new(catalog::builtin_catalog())).unwrap();
        let err = dialogue
            .reply(&DialogueRequest {
                persona_id: "nobody".to_string(),
                history: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnknownPersona(id) if id == "nobody"));
    }
}
