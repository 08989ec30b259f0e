//! Self-Correcting Translator (spec §4.4): translate, validate with
//! `StructuredContentValidator`, and retry with a targeted correction
//! prompt naming the specific violation before giving up and quarantining.

use crate::document::ContentBlock;
use crate::error::PipelineError;
use crate::executor::RateLimiter;
use crate::provider::{TranslationEndpoint, TranslationRequest};
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;

static LATEX_COMMAND: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\\[a-zA-Z]+").unwrap());
static LATEX_ENV: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\\(begin|end)\{([a-zA-Z*]+)\}").unwrap());

pub struct Violation(pub String);

/// Runs every structural check applicable to `original`'s content shape and
/// returns the first violation found, or `None` if everything checked out.
pub fn validate(block: &ContentBlock, original: &str, translated: &str) -> Option<Violation> {
    if let ContentBlock::Table { table, .. } = block {
        if let Some(v) = validate_table(&table.rows, translated) {
            return Some(v);
        }
    }
    if original.contains("```") {
        if let Some(v) = validate_code_fences(original, translated) {
            return Some(v);
        }
    }
    if original.contains('$') || original.contains("\\begin") {
        if let Some(v) = validate_latex(original, translated) {
            return Some(v);
        }
    }
    if looks_like_list(original) {
        if let Some(v) = validate_list_markers(original, translated) {
            return Some(v);
        }
    }
    None
}

fn validate_table(input_rows: &[Vec<String>], translated: &str) -> Option<Violation> {
    let output_rows: Vec<&str> = translated.lines().filter(|l| !l.trim().is_empty()).collect();
    let input_count = input_rows.len();
    let output_count = output_rows.len();

    if input_count > 0 {
        let diff = (input_count as f64 - output_count as f64).abs();
        if diff > input_count as f64 * 0.1 {
            return Some(Violation(format!(
                "original has {input_count} rows, yours has {output_count} — regenerate preserving exactly {input_count} rows"
            )));
        }
    }

    let input_avg_cols = average_columns(input_rows.iter().map(|r| r.len()));
    let output_avg_cols = average_columns(output_rows.iter().map(|l| l.split('|').filter(|c| !c.trim().is_empty()).count()));
    if (input_avg_cols - output_avg_cols).abs() > 1.0 {
        return Some(Violation(format!(
            "original averages {input_avg_cols:.1} columns per row, yours averages {output_avg_cols:.1} — keep the same column count"
        )));
    }

    None
}

fn average_columns(counts: impl Iterator<Item = usize>) -> f64 {
    let values: Vec<usize> = counts.collect();
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

fn validate_code_fences(original: &str, translated: &str) -> Option<Violation> {
    let input_fences = original.matches("```").count();
    let output_fences = translated.matches("```").count();
    if input_fences != output_fences {
        return Some(Violation(format!(
            "original has {input_fences} code fence markers, yours has {output_fences} — preserve every ``` exactly"
        )));
    }

    let input_lang = original.split("```").nth(1).and_then(|s| s.lines().next());
    let output_lang = translated.split("```").nth(1).and_then(|s| s.lines().next());
    if input_lang.map(str::trim) != output_lang.map(str::trim) {
        return Some(Violation(format!(
            "code fence language tag changed from {:?} to {:?} — keep it untranslated",
            input_lang.unwrap_or(""),
            output_lang.unwrap_or("")
        )));
    }

    None
}

fn validate_latex(original: &str, translated: &str) -> Option<Violation> {
    let input_dollars = original.matches('$').count();
    let output_dollars = translated.matches('$').count();
    if input_dollars != output_dollars {
        return Some(Violation(format!(
            "original has {input_dollars} '$' delimiters, yours has {output_dollars} — keep every math delimiter unchanged"
        )));
    }

    let input_envs: Vec<String> = LATEX_ENV.find_iter(original).map(|m| m.as_str().to_string()).collect();
    let output_envs: Vec<String> = LATEX_ENV.find_iter(translated).map(|m| m.as_str().to_string()).collect();
    if input_envs.len() != output_envs.len() {
        return Some(Violation(
            "\\begin{...}/\\end{...} pairs do not match the original — preserve them verbatim".to_string(),
        ));
    }

    let input_commands = LATEX_COMMAND.find_iter(original).count();
    let output_commands = LATEX_COMMAND.find_iter(translated).count();
    if (input_commands as i64 - output_commands as i64).abs() > 1 {
        return Some(Violation(format!(
            "original has {input_commands} LaTeX commands, yours has {output_commands} — keep commands untranslated"
        )));
    }

    None
}

fn looks_like_list(text: &str) -> bool {
    text.lines().filter(|l| {
        let t = l.trim_start();
        t.starts_with("- ") || t.starts_with("* ") || t.starts_with(|c: char| c.is_ascii_digit())
    }).count() >= 2
}

fn validate_list_markers(original: &str, translated: &str) -> Option<Violation> {
    let input_markers = count_list_markers(original);
    let output_markers = count_list_markers(translated);
    if input_markers != output_markers {
        return Some(Violation(format!(
            "original has {input_markers} list items, yours has {output_markers} — preserve every marker"
        )));
    }
    let input_nesting = max_indent(original);
    let output_nesting = max_indent(translated);
    if input_nesting != output_nesting {
        return Some(Violation(
            "list nesting depth changed — preserve the original indentation structure".to_string(),
        ));
    }
    None
}

fn count_list_markers(text: &str) -> usize {
    text.lines()
        .filter(|l| {
            let t = l.trim_start();
            t.starts_with("- ") || t.starts_with("* ") || t.starts_with(|c: char| c.is_ascii_digit())
        })
        .count()
}

fn max_indent(text: &str) -> usize {
    text.lines().map(|l| l.len() - l.trim_start().len()).max().unwrap_or(0)
}

pub struct CorrectionOutcome {
    pub translated_text: String,
    pub validator_confidence: f64,
    pub quarantined: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Runs the translate/validate/correct loop of spec §4.4 step 1-4, subject
/// to the same token-bucket limiter grouped translations use (spec §4.6
/// applies it to every call, not just batched ones). Returns `quarantined =
/// true` when the budget is exhausted or the provider refuses the content
/// outright; the caller is responsible for writing the quarantine record
/// and substituting `original_text`.
pub async fn translate_with_self_correction(
    endpoint: &dyn TranslationEndpoint,
    limiter: &RateLimiter,
    cancel: &CancellationToken,
    block: &ContentBlock,
    target_language: &str,
    model_identifier: &str,
    temperature: f64,
    max_attempts: u32,
) -> CorrectionOutcome {
    let original = block.original_text().to_string();
    let mut correction: Option<String> = None;
    let mut last_error = None;

    for attempt in 0..=max_attempts {
        let request = TranslationRequest {
            text: original.clone(),
            source_language_hint: None,
            target_language: target_language.to_string(),
            model_identifier: model_identifier.to_string(),
            temperature,
            system_instructions: correction.clone(),
        };

        if cancel.is_cancelled() {
            last_error = Some("cancelled before dispatch".to_string());
            break;
        }
        limiter.acquire().await;

        let response = match endpoint.translate(&request).await {
            Ok(r) => r,
            Err(PipelineError::TranslationEndpointBlocked(detail)) => {
                return CorrectionOutcome {
                    translated_text: original,
                    validator_confidence: 0.0,
                    quarantined: true,
                    attempts: attempt + 1,
                    last_error: Some(detail),
                };
            }
            Err(e) => {
                last_error = Some(e.to_string());
                continue;
            }
        };

        if response.finish_reason == "length_cap" {
            last_error = Some("translation output was truncated by the provider's length cap".to_string());
            correction = Some(
                "Your previous translation was cut off by a length limit. Regenerate a complete, \
                 concise translation that fits within the same budget."
                    .to_string(),
            );
            continue;
        }

        match validate(block, &original, &response.translated_text) {
            None => {
                return CorrectionOutcome {
                    translated_text: response.translated_text,
                    validator_confidence: 1.0,
                    quarantined: false,
                    attempts: attempt + 1,
                    last_error: None,
                };
            }
            Some(Violation(detail)) => {
                last_error = Some(detail.clone());
                correction = Some(format!(
                    "Your previous translation violated a structural requirement: {detail}. Regenerate the full translation, fixing this exactly."
                ));
            }
        }
    }

    CorrectionOutcome {
        translated_text: original,
        validator_confidence: 0.0,
        quarantined: true,
        attempts: max_attempts + 1,
        last_error,
    }
}
