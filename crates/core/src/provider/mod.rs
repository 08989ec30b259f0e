//! Translation endpoint adapters (spec §6.3), generalized from a
//! single-method vision-description trait into a text-in/text-out
//! translation contract shared by every backend.

pub mod anthropic;
pub mod ollama;
pub mod openai;

use crate::error::{PipelineError, PipelineResult};

/// One translation call (spec §6.3 request shape).
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub text: String,
    pub source_language_hint: Option<String>,
    pub target_language: String,
    pub model_identifier: String,
    pub temperature: f64,
    /// Appended after the base translation instructions; used by the
    /// self-correcting translator to ask for a targeted fix.
    pub system_instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TranslationResponse {
    pub translated_text: String,
    pub finish_reason: String,
    pub usage_tokens: Option<u32>,
}

/// Narrow contract every backend implements; routing and retry live above
/// this trait, not inside it.
#[async_trait::async_trait]
pub trait TranslationEndpoint: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> PipelineResult<TranslationResponse>;

    /// Verify the endpoint is reachable and configured before the pipeline
    /// commits to using it for a whole document.
    async fn check(&self) -> PipelineResult<()>;

    fn provider_name(&self) -> &str;

    fn model_identifier(&self) -> &str;
}

/// Default model identifier for each provider when a config omits one.
pub fn default_model(provider_name: &str) -> &'static str {
    match provider_name {
        "ollama" => "qwen2.5",
        "openai" => "gpt-4o-mini",
        "anthropic" => "claude-3-5-sonnet-20241022",
        _ => "gpt-4o-mini",
    }
}

/// Factory: build an endpoint by provider name and model identifier.
pub fn create_endpoint(
    provider_name: &str,
    model_identifier: &str,
) -> PipelineResult<Box<dyn TranslationEndpoint>> {
    match provider_name {
        "ollama" => Ok(Box::new(ollama::OllamaEndpoint::new(model_identifier))),
        "openai" => Ok(Box::new(openai::OpenAiEndpoint::new(model_identifier))),
        "anthropic" => Ok(Box::new(anthropic::AnthropicEndpoint::new(model_identifier))),
        other => Err(PipelineError::ConfigInvalid(format!(
            "unknown translation provider '{other}'; use ollama | openai | anthropic"
        ))),
    }
}

/// Maps a provider-reported error into the spec §7 error-kind it actually
/// is, sniffing the formatted message for the handful of phrases providers
/// use for policy refusals. Anything not recognizably a policy block is
/// treated as transient and left to the caller's retry budget.
pub fn classify_provider_error(provider: &str, detail: &str) -> PipelineError {
    let lower = detail.to_lowercase();
    if lower.contains("recitation") {
        PipelineError::TranslationEndpointBlocked(format!("{provider}: recitation-blocked: {detail}"))
    } else if lower.contains("safety") || lower.contains("content_filter") || lower.contains("content filter") {
        PipelineError::TranslationEndpointBlocked(format!("{provider}: safety-blocked: {detail}"))
    } else if lower.contains("blocked") || lower.contains("refused") {
        PipelineError::TranslationEndpointBlocked(format!("{provider}: {detail}"))
    } else {
        PipelineError::TranslationEndpointTransient(format!("{provider}: {detail}"))
    }
}

/// Derives a finish-reason for a *successful* chat call (spec §6.3): an
/// empty completion reads as an unexplained policy refusal, and a
/// completion that doesn't end on sentence-ending punctuation reads as
/// truncated by the provider's output-length cap.
pub fn finish_reason_for_text(text: &str) -> &'static str {
    if text.trim().is_empty() {
        "other_blocked"
    } else if ends_mid_sentence(text) {
        "length_cap"
    } else {
        "complete"
    }
}

fn ends_mid_sentence(text: &str) -> bool {
    match text.trim_end().chars().last() {
        Some(c) => !matches!(c, '.' | '!' | '?' | '"' | '\'' | ')' | ']' | '”' | '’'),
        None => true,
    }
}

/// Shared instruction prefix every backend sends ahead of the source text.
pub fn build_prompt(request: &TranslationRequest) -> String {
    let mut prompt = format!(
        "Translate the following text into {}. Preserve paragraph breaks, list structure, and any markdown-like markers exactly. Respond with the translation only, no commentary.",
        request.target_language
    );
    if let Some(hint) = &request.source_language_hint {
        prompt.push_str(&format!(" The source language is {hint}."));
    }
    if let Some(extra) = &request.system_instructions {
        prompt.push('\n');
        prompt.push_str(extra);
    }
    prompt.push_str("\n\n---\n");
    prompt.push_str(&request.text);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_sentence_reads_as_complete() {
        assert_eq!(finish_reason_for_text("Bonjour le monde."), "complete");
    }

    #[test]
    fn unterminated_output_reads_as_length_capped() {
        assert_eq!(finish_reason_for_text("Bonjour le monde sans fin"), "length_cap");
    }

    #[test]
    fn safety_phrase_in_error_message_classifies_as_blocked() {
        let err = classify_provider_error("openai", "request rejected by content_filter policy");
        assert!(matches!(err, PipelineError::TranslationEndpointBlocked(_)));
    }

    #[test]
    fn generic_error_message_classifies_as_transient() {
        let err = classify_provider_error("openai", "connection reset by peer");
        assert!(matches!(err, PipelineError::TranslationEndpointTransient(_)));
    }
}
