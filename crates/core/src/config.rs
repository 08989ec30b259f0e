use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global translation strategy knob (spec §4.2). Shifts Paragraph routing
/// thresholds; never changes preserve/self_correcting choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    CostOptimized,
    #[default]
    Balanced,
    QualityFocused,
    SpeedFocused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub target_language: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_identifier")]
    pub model_identifier: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_translations: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Token-bucket capacity/refill rate for the async batch executor's rate
    /// limiter (spec §4.6).
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: f64,
    /// Environment variable name holding the API key; never the key itself.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_temperature() -> f64 {
    0.1
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_model_identifier() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_concurrent() -> usize {
    10
}
fn default_request_timeout() -> u64 {
    600
}
fn default_requests_per_minute() -> f64 {
    60.0
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_language: "en".to_string(),
            provider: default_provider(),
            model_identifier: default_model_identifier(),
            temperature: default_temperature(),
            max_concurrent_translations: default_max_concurrent(),
            request_timeout_seconds: default_request_timeout(),
            requests_per_minute: default_requests_per_minute(),
            api_key_env: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub strategy: RoutingStrategy,
    #[serde(default = "default_cost_model")]
    pub cost_model: String,
    #[serde(default = "default_quality_model")]
    pub quality_model: String,
    #[serde(default = "default_complexity_threshold")]
    pub complexity_threshold: f64,
}

fn default_cost_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_quality_model() -> String {
    "gpt-4o".to_string()
}
fn default_complexity_threshold() -> f64 {
    0.5
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::default(),
            cost_model: default_cost_model(),
            quality_model: default_quality_model(),
            complexity_threshold: default_complexity_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enable_memory: bool,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    #[serde(default = "default_true")]
    pub enable_persistent: bool,
    #[serde(default = "default_persistent_path")]
    pub persistent_path: PathBuf,
    #[serde(default = "default_persistent_capacity")]
    pub persistent_capacity: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_memory_capacity() -> usize {
    1_000
}
fn default_persistent_path() -> PathBuf {
    PathBuf::from("cache/persistent")
}
fn default_persistent_capacity() -> usize {
    10_000
}
fn default_similarity_threshold() -> f64 {
    0.85
}
fn default_embedding_model() -> String {
    "hashed-trigram-v1".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_memory: true,
            memory_capacity: default_memory_capacity(),
            enable_persistent: true,
            persistent_path: default_persistent_path(),
            persistent_capacity: default_persistent_capacity(),
            similarity_threshold: default_similarity_threshold(),
            embedding_model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default = "default_max_group_size_chars")]
    pub max_group_size_chars: usize,
    #[serde(default = "default_max_items_per_group")]
    pub max_items_per_group: usize,
}

fn default_max_group_size_chars() -> usize {
    12_000
}
fn default_max_items_per_group() -> usize {
    8
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            enable: true,
            max_group_size_chars: default_max_group_size_chars(),
            max_items_per_group: default_max_items_per_group(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfCorrectionConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    2
}

impl Default for SelfCorrectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    #[serde(default = "default_min_image_dim")]
    pub min_image_width_px: u32,
    #[serde(default = "default_min_image_dim")]
    pub min_image_height_px: u32,
    #[serde(default = "default_max_aspect_ratio")]
    pub max_aspect_ratio: u32,
    #[serde(default = "default_heading_max_words")]
    pub heading_max_words: usize,
    #[serde(default = "default_heading_min_font_ratio")]
    pub heading_min_font_ratio: f64,
}

fn default_min_image_dim() -> u32 {
    50
}
fn default_max_aspect_ratio() -> u32 {
    20
}
fn default_heading_max_words() -> usize {
    15
}
fn default_heading_min_font_ratio() -> f64 {
    1.4
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            min_image_width_px: default_min_image_dim(),
            min_image_height_px: default_min_image_dim(),
            max_aspect_ratio: default_max_aspect_ratio(),
            heading_max_words: default_heading_max_words(),
            heading_min_font_ratio: default_heading_min_font_ratio(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    #[serde(default = "default_chars_per_line")]
    pub chars_per_line: usize,
    #[serde(default = "default_lines_per_page")]
    pub lines_per_page: usize,
}

fn default_chars_per_line() -> usize {
    80
}
fn default_lines_per_page() -> usize {
    25
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            chars_per_line: default_chars_per_line(),
            lines_per_page: default_lines_per_page(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default = "default_trace_output_dir")]
    pub output_dir: PathBuf,
}

fn default_trace_output_dir() -> PathBuf {
    PathBuf::from("trace")
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enable: true,
            output_dir: default_trace_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineConfig {
    #[serde(default = "default_quarantine_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_quarantine_dir() -> PathBuf {
    PathBuf::from("quarantine")
}
fn default_retention_days() -> u32 {
    30
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            directory: default_quarantine_dir(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Hierarchical pipeline configuration (spec §6.4). Every key has a default
/// so an empty TOML file, or no file at all, produces a usable config.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    pub translation: TranslationConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub self_correction: SelfCorrectionConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub assembler: AssemblerConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub quarantine: QuarantineConfig,
}

impl PipelineConfig {
    /// Load from `path` if it exists, merging onto defaults; otherwise
    /// return the all-defaults config. Mirrors the override chain surveyed
    /// in other translation-pipeline configs (spec §6.4a): explicit path,
    /// then an environment variable, then a `pdf-transl.toml` sitting next
    /// to the input PDF, then defaults.
    pub fn load_or_default(path: Option<&std::path::Path>, input_pdf: &std::path::Path) -> Result<Self, String> {
        let resolved = path
            .map(|p| p.to_path_buf())
            .or_else(|| std::env::var("PDF_TRANSL_CONFIG").ok().map(PathBuf::from))
            .or_else(|| adjacent_config_path(input_pdf));

        match resolved {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(&p)
                    .map_err(|e| format!("reading config {}: {e}", p.display()))?;
                toml::from_str(&text).map_err(|e| format!("parsing config {}: {e}", p.display()))
            }
            _ => Ok(Self::default()),
        }
    }
}

/// `pdf-transl.toml` in the same directory as `input_pdf`, if that
/// directory can be determined.
fn adjacent_config_path(input_pdf: &std::path::Path) -> Option<PathBuf> {
    let dir = input_pdf.parent()?;
    let candidate = dir.join("pdf-transl.toml");
    candidate.exists().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_every_section_populated() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.translation.temperature, 0.1);
        assert_eq!(cfg.cache.similarity_threshold, 0.85);
        assert_eq!(cfg.self_correction.max_attempts, 2);
        assert_eq!(cfg.grouping.max_group_size_chars, 12_000);
        assert_eq!(cfg.reconciliation.heading_min_font_ratio, 1.4);
        assert_eq!(cfg.assembler.lines_per_page, 25);
        assert_eq!(cfg.quarantine.retention_days, 30);
    }

    #[test]
    fn load_or_default_falls_back_when_path_missing() {
        let cfg = PipelineConfig::load_or_default(
            Some(std::path::Path::new("/nonexistent/pdf-transl.toml")),
            std::path::Path::new("/nonexistent/input.pdf"),
        )
        .unwrap();
        assert_eq!(cfg.translation.target_language, "en");
    }

    #[test]
    fn load_or_default_picks_up_config_next_to_the_input_pdf() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("pdf-transl.toml"),
            "[translation]\ntarget_language = \"ja\"\n",
        )
        .unwrap();

        let cfg = PipelineConfig::load_or_default(None, &dir.path().join("report.pdf")).unwrap();
        assert_eq!(cfg.translation.target_language, "ja");
    }

    #[test]
    fn load_or_default_prefers_explicit_path_over_adjacent_config() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("pdf-transl.toml"),
            "[translation]\ntarget_language = \"ja\"\n",
        )
        .unwrap();
        let explicit = dir.path().join("explicit.toml");
        std::fs::write(&explicit, "[translation]\ntarget_language = \"de\"\n").unwrap();

        let cfg = PipelineConfig::load_or_default(Some(&explicit), &dir.path().join("report.pdf")).unwrap();
        assert_eq!(cfg.translation.target_language, "de");
    }
}
