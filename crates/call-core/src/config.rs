use anyhow::{Context, Result};
use llm_services::ChatConfig;
use serde::{Deserialize, Serialize};
use speech_io::{CaptureConfig, SpeechParams};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timing and wording of one practice call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Quiet period after the last recognition result that ends an utterance
    pub silence_ms: u64,
    /// Debounce window of the background evaluation
    pub evaluation_debounce_ms: u64,
    /// Transcripts shorter than this are never evaluated
    pub min_evaluation_turns: usize,
    /// Counterpart line recorded when the dialogue service fails or stays silent
    pub fallback_reply: String,
    pub capture: CaptureConfig,
    pub voice: SpeechParams,
    /// What the trainee is selling, passed to the evaluator
    pub evaluation_context: String,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            silence_ms: 800,
            evaluation_debounce_ms: 1200,
            min_evaluation_turns: 2,
            fallback_reply: "(no response)".to_string(),
            capture: CaptureConfig::default(),
            voice: SpeechParams::default(),
            evaluation_context: "Стоматологическая клиника: консультация и запись на приём"
                .to_string(),
        }
    }
}

impl CallConfig {
    pub fn silence_window(&self) -> Duration {
        Duration::from_millis(self.silence_ms)
    }

    pub fn evaluation_debounce(&self) -> Duration {
        Duration::from_millis(self.evaluation_debounce_ms)
    }

    pub fn locale(&self) -> &str {
        &self.capture.locale
    }
}

/// Top-level settings file of the trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub persona: String,
    pub scenario: String,
    /// Extra catalog YAML files layered over the built-in catalog
    pub catalog_dir: Option<PathBuf>,
    pub call: CallConfig,
    pub chat: ChatConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            persona: "patient-1".to_string(),
            scenario: catalog::DEFAULT_SCENARIO.to_string(),
            catalog_dir: None,
            call: CallConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl TrainerConfig {
    /// Load a YAML (`.yml`/`.yaml`) or JSON settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing json: {}", path.display()))?
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("parsing yaml: {}", path.display()))?
        };
        Ok(config)
    }

    /// Settings file if given, defaults otherwise; chat settings are then overlaid with
    /// the environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.chat = config.chat.with_env();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_call_timing() {
        let cfg = CallConfig::default();
        assert_eq!(cfg.silence_window(), Duration::from_millis(800));
        assert_eq!(cfg.evaluation_debounce(), Duration::from_millis(1200));
        assert_eq!(cfg.min_evaluation_turns, 2);
        assert_eq!(cfg.locale(), "ru-RU");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let raw = "persona: patient-2\ncall:\n  silence_ms: 600\n  fallback_reply: \"(нет ответа)\"\nchat:\n  backend: mock\n";
        let cfg: TrainerConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(cfg.persona, "patient-2");
        assert_eq!(cfg.scenario, "price");
        assert_eq!(cfg.call.silence_ms, 600);
        assert_eq!(cfg.call.evaluation_debounce_ms, 1200);
        assert_eq!(cfg.call.fallback_reply, "(нет ответа)");
        assert_eq!(cfg.chat.backend, "mock");
        assert_eq!(cfg.chat.model, "deepseek-chat");
    }

    #[test]
    fn json_files_are_accepted() {
        let dir = std::env::temp_dir().join(format!("trainer-cfg-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("trainer.json");
        fs::write(&path, r#"{"call": {"evaluation_debounce_ms": 50}}"#).unwrap();
        let cfg = TrainerConfig::load(&path).unwrap();
        assert_eq!(cfg.call.evaluation_debounce_ms, 50);
        fs::remove_dir_all(&dir).unwrap();
    }
}
