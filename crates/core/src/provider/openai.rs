use crate::error::{PipelineError, PipelineResult};
use crate::provider::{
    build_prompt, classify_provider_error, finish_reason_for_text, TranslationEndpoint, TranslationRequest,
    TranslationResponse,
};
use genai::chat::{ChatMessage, ChatRequest};
use genai::Client;

/// Translation endpoint backed by OpenAI's chat API via `genai`.
pub struct OpenAiEndpoint {
    model: String,
    client: Client,
}

impl OpenAiEndpoint {
    pub fn new(model: &str) -> Self {
        Self { model: model.to_string(), client: Client::default() }
    }
}

#[async_trait::async_trait]
impl TranslationEndpoint for OpenAiEndpoint {
    async fn translate(&self, request: &TranslationRequest) -> PipelineResult<TranslationResponse> {
        let message = ChatMessage::user(build_prompt(request));
        let chat_request = ChatRequest::from_messages(vec![message]);

        let response = self
            .client
            .exec_chat(&self.model, chat_request, None)
            .await
            .map_err(|e| classify_provider_error("openai", &e.to_string()))?;

        let translated_text = response.first_text().unwrap_or_default().trim().to_string();
        if translated_text.is_empty() {
            return Err(PipelineError::TranslationEndpointBlocked(
                "openai returned an empty response".to_string(),
            ));
        }

        Ok(TranslationResponse {
            finish_reason: finish_reason_for_text(&translated_text).to_string(),
            translated_text,
            usage_tokens: None,
        })
    }

    async fn check(&self) -> PipelineResult<()> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(PipelineError::ConfigInvalid(
                "missing OPENAI_API_KEY environment variable".to_string(),
            ));
        }
        tracing::info!("openai model '{}' ready", self.model);
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_identifier(&self) -> &str {
        &self.model
    }
}
