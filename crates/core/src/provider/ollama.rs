use crate::error::{PipelineError, PipelineResult};
use crate::provider::{
    build_prompt, classify_provider_error, finish_reason_for_text, TranslationEndpoint, TranslationRequest,
    TranslationResponse,
};
use genai::chat::{ChatMessage, ChatRequest};
use genai::Client;

/// Translation endpoint backed by a local Ollama instance via `genai`.
pub struct OllamaEndpoint {
    model: String,
    client: Client,
}

impl OllamaEndpoint {
    pub fn new(model: &str) -> Self {
        Self { model: model.to_string(), client: Client::default() }
    }
}

#[async_trait::async_trait]
impl TranslationEndpoint for OllamaEndpoint {
    async fn translate(&self, request: &TranslationRequest) -> PipelineResult<TranslationResponse> {
        let message = ChatMessage::user(build_prompt(request));
        let chat_request = ChatRequest::from_messages(vec![message]);

        let response = self
            .client
            .exec_chat(&self.model, chat_request, None)
            .await
            .map_err(|e| classify_provider_error("ollama", &e.to_string()))?;

        let translated_text = response.first_text().unwrap_or_default().trim().to_string();
        if translated_text.is_empty() {
            return Err(PipelineError::TranslationEndpointBlocked(
                "ollama returned an empty response".to_string(),
            ));
        }

        Ok(TranslationResponse {
            finish_reason: finish_reason_for_text(&translated_text).to_string(),
            translated_text,
            usage_tokens: None,
        })
    }

    async fn check(&self) -> PipelineResult<()> {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string());
        let url = format!("{host}/api/tags");

        let resp = reqwest::get(&url).await.map_err(|e| {
            PipelineError::ExtractorUnavailable(format!("cannot connect to ollama at {host}: {e}"))
        })?;

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PipelineError::ExtractorUnavailable(format!("invalid response from ollama: {e}")))?;

        let empty = vec![];
        let models = body["models"]
            .as_array()
            .unwrap_or(&empty)
            .iter()
            .filter_map(|m| m["name"].as_str())
            .collect::<Vec<_>>();

        if !models.iter().any(|m| m.contains(self.model.as_str())) {
            return Err(PipelineError::ConfigInvalid(format!(
                "model '{}' not found in ollama; available: {}",
                self.model,
                if models.is_empty() { "none".to_string() } else { models.join(", ") }
            )));
        }

        tracing::info!("ollama model '{}' is ready", self.model);
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_identifier(&self) -> &str {
        &self.model
    }
}
