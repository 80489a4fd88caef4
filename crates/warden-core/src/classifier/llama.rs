//! llama.cpp server classifier backend.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint (llama.cpp's
//! `llama-server` hosting a small instruct model). The model is probed lazily:
//! until a probe succeeds every classification retries the probe first, so a
//! backend that comes up after the service started is picked up without a
//! restart.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{parse_verdict, truncate_chars, ClassifierError, ContentClassifier, RawVerdict};
use crate::config::ClassifierSettings;

const SYSTEM_PROMPT: &str = "You are a strict content moderation classifier. \
Reply with only a single digit from 0 to 9.";

const RUBRIC: &str = "Rate the severity of this social media message from 0 to 9.

Scale:
- 0-2: normal, friendly, harmless content.
- 3-6: rude, mildly offensive, swearing or insults.
- 7-9: hate speech, racism, threats, slurs, calls to harm people.

Rules:
- Identity statements are always 0.
- Casual swearing without a target is at most 5.
- Only use 7 or above when the message attacks, threatens, or dehumanizes.

Message:";

/// Handle to a model the server reported as available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModel {
    /// Model id as reported by the server.
    pub model_id: String,
}

/// Readiness of the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierState {
    /// No probe attempted yet.
    Unloaded,
    /// Backend reachable and serving a model.
    Loaded(LoadedModel),
    /// Last probe failed.
    FailedToLoad(String),
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    id: String,
}

/// Classifier backed by a llama.cpp HTTP server.
pub struct LlamaServerClassifier {
    client: Client,
    settings: ClassifierSettings,
    state: RwLock<ClassifierState>,
}

impl std::fmt::Debug for LlamaServerClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaServerClassifier")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl LlamaServerClassifier {
    /// Creates an unloaded classifier. No network traffic happens here.
    pub fn new(settings: ClassifierSettings) -> Result<Self, ClassifierError> {
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            client,
            settings,
            state: RwLock::new(ClassifierState::Unloaded),
        })
    }

    /// Returns a snapshot of the readiness state.
    pub fn state(&self) -> ClassifierState {
        self.state.read().clone()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    /// Probes the server and records which model it serves.
    pub async fn load(&self) -> Result<LoadedModel, ClassifierError> {
        match self.probe().await {
            Ok(model) => {
                info!(
                    base_url = %self.settings.base_url,
                    model_id = %model.model_id,
                    "Classifier backend loaded"
                );
                *self.state.write() = ClassifierState::Loaded(model.clone());
                Ok(model)
            }
            Err(e) => {
                warn!(
                    base_url = %self.settings.base_url,
                    "Failed to load classifier backend: {}",
                    e
                );
                *self.state.write() = ClassifierState::FailedToLoad(e.to_string());
                Err(e)
            }
        }
    }

    async fn probe(&self) -> Result<LoadedModel, ClassifierError> {
        let models: ModelsResponse = self
            .client
            .get(self.endpoint("/v1/models"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let model_id = models
            .data
            .iter()
            .find(|m| m.id.contains(&self.settings.model))
            .or_else(|| models.data.first())
            .map(|m| m.id.clone())
            .ok_or_else(|| {
                ClassifierError::NotLoaded("server reports no loaded models".to_string())
            })?;

        Ok(LoadedModel { model_id })
    }

    async fn ensure_loaded(&self) -> Result<LoadedModel, ClassifierError> {
        let loaded = match &*self.state.read() {
            ClassifierState::Loaded(model) => Some(model.clone()),
            _ => None,
        };
        match loaded {
            Some(model) => Ok(model),
            None => self.load().await,
        }
    }

    fn build_request<'a>(&self, model_id: &'a str, text: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: model_id,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("{}\n\"{}\"", RUBRIC, text),
                },
            ],
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: self.settings.max_tokens,
            stream: false,
        }
    }

    async fn complete(&self, model_id: &str, text: &str) -> Result<String, ClassifierError> {
        let request = self.build_request(model_id, text);
        let response = self
            .client
            .post(self.endpoint("/v1/chat/completions"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Inference(format!("{}: {}", status, body)));
        }

        let body: ChatResponse = response.error_for_status()?.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ClassifierError::MalformedResponse("no choices returned".to_string()))
    }
}

#[async_trait]
impl ContentClassifier for LlamaServerClassifier {
    async fn classify(&self, text: &str, max_chars: usize) -> Result<RawVerdict, ClassifierError> {
        let model = self.ensure_loaded().await?;

        let raw = match self.complete(&model.model_id, truncate_chars(text, max_chars)).await {
            Ok(raw) => raw,
            Err(ClassifierError::Request(e)) if e.is_connect() => {
                *self.state.write() = ClassifierState::FailedToLoad(e.to_string());
                return Err(ClassifierError::Request(e));
            }
            Err(e) => return Err(e),
        };

        let raw = raw.trim().to_lowercase();
        debug!(raw = %raw, "Classifier raw response");
        Ok(parse_verdict(&raw))
    }

    fn name(&self) -> &str {
        &self.settings.model
    }

    fn is_loaded(&self) -> bool {
        matches!(*self.state.read(), ClassifierState::Loaded(_))
    }

    async fn warm_up(&self) -> Result<(), ClassifierError> {
        self.load().await?;
        let verdict = self.classify("Hello, nice to meet you!", 64).await?;
        debug!(?verdict, "Classifier warm-up complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base_url: &str) -> ClassifierSettings {
        ClassifierSettings {
            base_url: base_url.to_string(),
            timeout_secs: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_starts_unloaded() {
        let classifier = LlamaServerClassifier::new(settings("http://127.0.0.1:1")).unwrap();
        assert_eq!(classifier.state(), ClassifierState::Unloaded);
        assert!(!classifier.is_loaded());
        assert_eq!(classifier.name(), "phi-3-mini");
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let classifier = LlamaServerClassifier::new(settings("http://localhost:8080/")).unwrap();
        assert_eq!(
            classifier.endpoint("/v1/models"),
            "http://localhost:8080/v1/models"
        );
    }

    #[test]
    fn test_request_uses_deterministic_sampling() {
        let classifier = LlamaServerClassifier::new(settings("http://localhost:8080")).unwrap();
        let request = classifier.build_request("phi-3", "some text");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "phi-3");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["max_tokens"], 5);
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json["messages"][1]["content"]
            .as_str()
            .unwrap()
            .ends_with("\"some text\""));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // Port 1 is reserved; the connection is refused immediately.
        let classifier = LlamaServerClassifier::new(settings("http://127.0.0.1:1")).unwrap();

        let result = classifier.classify("hello", 500).await;
        assert!(result.is_err());
        assert!(matches!(
            classifier.state(),
            ClassifierState::FailedToLoad(_)
        ));
        assert!(classifier.warm_up().await.is_err());
        assert!(!classifier.is_loaded());
    }
}
