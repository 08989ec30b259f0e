use thiserror::Error;

/// Result type alias using [`PipelineError`].
pub type PipelineResult<T> = Result<T, PipelineError>;

/// One variant per error kind of the error-handling design. Each variant's
/// locality (startup / per-PDF / per-batch / per-block / per-document) and
/// recovery is noted in its doc comment and enforced by where it is caught,
/// not propagated past that scope.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Startup. Fatal, process exits 1.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Per-PDF. Retried with backoff by the extractor adapter; fatal for
    /// that PDF once retries are exhausted.
    #[error("layout extractor timed out: {0}")]
    ExtractorTimeout(String),

    /// Per-PDF. Same recovery as `ExtractorTimeout`.
    #[error("layout extractor unavailable: {0}")]
    ExtractorUnavailable(String),

    /// Per-PDF. The PDF itself is quarantined; other PDFs continue.
    #[error("layout extractor rejected corrupt input: {0}")]
    ExtractorCorruptInput(String),

    /// Per-PDF. Recoverable: the Document proceeds without images.
    #[error("visual extractor failed: {0}")]
    VisualExtractorFailed(String),

    /// Per-batch. Backoff+jitter, up to 5 retries.
    #[error("translation endpoint rate-limited: {0}")]
    RateLimited(String),

    /// Per-batch. Retried up to 3 times.
    #[error("translation endpoint transient failure: {0}")]
    TranslationEndpointTransient(String),

    /// Per-block. No retry: the block is quarantined and the original text
    /// substituted.
    #[error("translation endpoint blocked the request: {0}")]
    TranslationEndpointBlocked(String),

    /// Per-block. Drives the self-correction loop.
    #[error("structural validation failed: {0}")]
    ValidationFailed(String),

    /// Per-op. The affected cache tier is skipped; the pipeline continues.
    #[error("cache I/O error: {0}")]
    CacheIoError(String),

    /// Per-document. Fatal for that document; the trace is dumped.
    #[error("assembler invariant violated: {0}")]
    AssemblerInvariantViolated(String),

    /// Per-document. Hard assertion failure; surfaces the stage where the
    /// image count dropped.
    #[error("image preservation violated at stage '{stage}': {detail}")]
    ImagePreservationViolation { stage: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] pdf_transl_storage::StorageError),
}

impl PipelineError {
    /// The exit code this error maps to when it escapes to `main` as a
    /// document- or startup-scoped fatal (spec §6.5).
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::ConfigInvalid(_) => 1,
            PipelineError::ExtractorTimeout(_)
            | PipelineError::ExtractorUnavailable(_)
            | PipelineError::ExtractorCorruptInput(_) => 2,
            PipelineError::TranslationEndpointTransient(_) | PipelineError::RateLimited(_) => 3,
            _ => 2,
        }
    }
}
