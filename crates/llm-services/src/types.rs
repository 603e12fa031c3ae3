use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The person practising the call
    Trainee,
    /// The simulated persona
    Counterpart,
}

impl Speaker {
    /// Chat-completions role of this speaker.
    pub fn chat_role(self) -> &'static str {
        match self {
            Speaker::Trainee => "user",
            Speaker::Counterpart => "assistant",
        }
    }
}

/// One utterance of the call transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn trainee(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Trainee,
            text: text.into(),
        }
    }

    pub fn counterpart(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Counterpart,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueRequest {
    pub persona_id: String,
    pub history: Vec<Turn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub transcript: Vec<Turn>,
    /// What the trainee was selling
    pub context: String,
}

/// Score of one rubric block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationBlock {
    pub key: String,
    pub title: String,
    /// 0 to 5
    pub score: f32,
    #[serde(default)]
    pub what_went_well: Vec<String>,
    #[serde(default)]
    pub to_improve: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// 0 to 10
    pub total: f32,
    #[serde(default)]
    pub blocks: Vec<EvaluationBlock>,
    #[serde(default)]
    pub summary: String,
}

/// Error payload shown in place of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationFailure {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

pub const NON_JSON_ERROR: &str = "Non-JSON response";

impl EvaluationFailure {
    pub fn service(details: impl Into<String>) -> Self {
        Self {
            error: "Eval error".to_string(),
            details: Some(details.into()),
            raw: None,
        }
    }

    pub fn non_json(raw: impl Into<String>) -> Self {
        Self {
            error: NON_JSON_ERROR.to_string(),
            details: None,
            raw: Some(raw.into()),
        }
    }

    pub fn malformed(details: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            error: "Malformed evaluation".to_string(),
            details: Some(details.into()),
            raw: Some(raw.into()),
        }
    }

    pub fn is_non_json(&self) -> bool {
        self.error == NON_JSON_ERROR
    }
}

pub type EvaluationOutcome = Result<EvaluationReport, EvaluationFailure>;

/// Settings for the chat-completions backed services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// "mock" or "chat"
    pub backend: String,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub dialogue_temperature: f32,
    pub evaluation_temperature: f32,
    pub timeout_ms: u64,
    /// Ask for `response_format = json_object` on evaluation calls
    pub json_response_format: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend: "chat".to_string(),
            base_url: "https://api.deepseek.com".to_string(),
            api_key: None,
            model: "deepseek-chat".to_string(),
            dialogue_temperature: 0.7,
            evaluation_temperature: 0.2,
            timeout_ms: 30_000,
            json_response_format: true,
        }
    }
}

impl ChatConfig {
    /// Overlay `DEEPSEEK_BASE_URL`, `DEEPSEEK_API_KEY` and `DEEPSEEK_MODEL`.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var("DEEPSEEK_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(key) = std::env::var("DEEPSEEK_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("DEEPSEEK_MODEL") {
            self.model = model;
        }
        self
    }
}
