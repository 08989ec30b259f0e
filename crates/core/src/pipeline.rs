//! Per-Document controller (spec §5): owns one PDF's journey from the two
//! extractors through reconciliation, translation, and assembly, threading
//! a [`Trace`] and a [`CancellationToken`] through every suspension point.
//! Follows a single-writer-per-document orchestration: one owned
//! `tokio::task` per PDF, generalized from page-at-a-time image
//! description to the reconcile/route/translate/assemble staging this
//! pipeline requires.

use crate::assembler;
use crate::cache::SemanticCache;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::executor;
use crate::extractor::{LayoutExtractor, VisualExtractor};
use crate::provider::TranslationEndpoint;
use crate::quarantine::QuarantineStore;
use crate::reconciler;
use crate::trace::{self, SpanMetadata, Trace};
use pdf_transl_storage::StorageBackend;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Factory so the controller can mint a fresh owned [`StorageBackend`] for
/// each of the cache, quarantine store, and direct output writes without
/// tying this crate to one concrete backend.
pub type StorageFactory = Arc<dyn Fn() -> Box<dyn StorageBackend> + Send + Sync>;

pub struct Pipeline {
    config: PipelineConfig,
    layout_extractor: Arc<dyn LayoutExtractor>,
    visual_extractor: Arc<dyn VisualExtractor>,
    endpoint: Arc<dyn TranslationEndpoint>,
    storage_factory: StorageFactory,
}

/// Summary handed back to the CLI once a single PDF has been translated
/// (spec §6.5's exit-code decision is made from `quarantined`).
pub struct PipelineOutcome {
    pub document_id: String,
    pub output_path: String,
    pub trace_path: String,
    pub translated_blocks: usize,
    pub cache_hits: usize,
    pub api_calls: usize,
    pub quarantined: usize,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        layout_extractor: Arc<dyn LayoutExtractor>,
        visual_extractor: Arc<dyn VisualExtractor>,
        endpoint: Arc<dyn TranslationEndpoint>,
        storage_factory: StorageFactory,
    ) -> Self {
        Self { config, layout_extractor, visual_extractor, endpoint, storage_factory }
    }

    /// Runs the full pipeline for one PDF: extract (parallel), reconcile,
    /// route+translate, assemble, persisting assets/output/trace/quarantine
    /// as it goes. Startup and Document-scoped fatals propagate; per-PDF,
    /// per-batch, and per-block failures are absorbed per spec §7.
    pub async fn translate(&self, input_pdf: &Path, cancel: CancellationToken) -> PipelineResult<PipelineOutcome> {
        let document_stem = input_pdf
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string();

        self.endpoint.check().await.map_err(|e| {
            PipelineError::ConfigInvalid(format!("translation endpoint not ready: {e}"))
        })?;

        let mut tracer = Trace::new(document_stem.clone());

        let (layout, visual) = self.extract(input_pdf, &mut tracer).await?;

        let reconcile_start = Instant::now();
        let (mut document, assets) = reconciler::reconcile(
            document_stem.clone(),
            &layout,
            &visual,
            &self.config.reconciliation,
        );
        let original_image_count = document.image_count();

        let storage = (self.storage_factory)();
        for asset in &assets {
            let ext = extension_for_mime(&asset.mime_type);
            let path = format!("{document_stem}/assets/{}.{ext}", asset.asset_id.0);
            storage.write_bytes_atomic(&path, &asset.binary).await?;
        }

        tracer.record(
            "reconcile",
            SpanMetadata {
                images_found: visual.images.len(),
                images_preserved: document.image_count(),
                processing_ms: reconcile_start.elapsed().as_millis() as u64,
                ..Default::default()
            },
        );

        let audit_before_translate = trace::audit(&document);

        let cache = Arc::new(SemanticCache::new(Some((self.storage_factory)()), &self.config.cache).await?);
        let quarantine = Arc::new(QuarantineStore::new(
            (self.storage_factory)(),
            format!("{document_stem}/{}", self.config.quarantine.directory.display()),
        ));

        let translate_start = Instant::now();
        let outcome = executor::execute(
            &mut document,
            self.endpoint.clone(),
            cache,
            quarantine,
            &self.config,
            cancel,
        )
        .await?;

        let audit_after_translate = trace::audit(&document);
        trace::check_image_count_nondecreasing("translate", &audit_before_translate, &audit_after_translate)?;

        tracer.record(
            "translate",
            SpanMetadata {
                images_found: audit_before_translate.image_blocks,
                images_preserved: audit_after_translate.image_blocks,
                cache_hits: outcome.cache_hits,
                api_calls: outcome.api_calls,
                validation_fails: outcome.quarantined,
                processing_ms: translate_start.elapsed().as_millis() as u64,
                ..Default::default()
            },
        );

        let assemble_start = Instant::now();
        let assembled = assembler::assemble(&document, &self.config.assembler)?;
        let translated_image_count = document.image_count();

        trace::assert_invariants(
            &document,
            original_image_count,
            translated_image_count,
            &assembled.toc.iter().map(|entry| entry.bookmark_id).collect::<Vec<_>>(),
        )?;

        tracer.record(
            "assemble",
            SpanMetadata {
                images_found: translated_image_count,
                images_preserved: translated_image_count,
                processing_ms: assemble_start.elapsed().as_millis() as u64,
                ..Default::default()
            },
        );

        let output_path = format!("{document_stem}/output.md");
        storage.write_text(&output_path, &assembled.markdown).await?;

        let trace_path = format!("{document_stem}/trace.json");
        let trace_json = serde_json::to_vec_pretty(&tracer)?;
        storage.write_bytes(&trace_path, &trace_json).await?;

        for issue in tracer.preservation_issues() {
            tracing::warn!(document_id = %document_stem, "{issue}");
        }

        Ok(PipelineOutcome {
            document_id: document_stem,
            output_path,
            trace_path,
            translated_blocks: outcome.translated_blocks,
            cache_hits: outcome.cache_hits,
            api_calls: outcome.api_calls,
            quarantined: outcome.quarantined,
        })
    }

    async fn extract(
        &self,
        input_pdf: &Path,
        tracer: &mut Trace,
    ) -> PipelineResult<(crate::extractor::LayoutOutput, crate::extractor::VisualOutput)> {
        let extract_start = Instant::now();
        let (layout_result, visual_result) =
            tokio::join!(self.layout_extractor.extract(input_pdf), self.visual_extractor.extract(input_pdf));

        let layout = layout_result?;

        let visual = match visual_result {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "visual extractor failed, proceeding without images");
                crate::extractor::VisualOutput::default()
            }
        };

        tracer.record(
            "extract",
            SpanMetadata {
                images_found: visual.images.len(),
                images_preserved: visual.images.len(),
                processing_ms: extract_start.elapsed().as_millis() as u64,
                ..Default::default()
            },
        );

        Ok((layout, visual))
    }
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BoundingBox;
    use crate::extractor::{ExtractedImage, LayoutOutput, LayoutPage, TextFragment, VisualOutput};
    use crate::provider::{TranslationRequest, TranslationResponse};
    use async_trait::async_trait;
    use pdf_transl_storage::LocalStorage;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct StubLayoutExtractor;

    #[async_trait]
    impl LayoutExtractor for StubLayoutExtractor {
        async fn extract(&self, _pdf_path: &Path) -> PipelineResult<LayoutOutput> {
            Ok(LayoutOutput {
                pages: vec![LayoutPage {
                    page_index: 0,
                    fragments: vec![TextFragment {
                        text: "Hello world.".to_string(),
                        bbox: BoundingBox { x: 0.0, y: 10.0, width: 200.0, height: 12.0 },
                        font_name: "Body".to_string(),
                        font_size: 10.0,
                        bold: false,
                        italic: false,
                        page_index: 0,
                    }],
                }],
            })
        }
    }

    struct StubVisualExtractor;

    #[async_trait]
    impl VisualExtractor for StubVisualExtractor {
        async fn extract(&self, _pdf_path: &Path) -> PipelineResult<VisualOutput> {
            Ok(VisualOutput { images: Vec::<ExtractedImage>::new() })
        }
    }

    struct StubEndpoint;

    #[async_trait]
    impl TranslationEndpoint for StubEndpoint {
        async fn translate(&self, request: &TranslationRequest) -> PipelineResult<TranslationResponse> {
            Ok(TranslationResponse {
                translated_text: format!("[translated] {}", request.text),
                finish_reason: "stop".to_string(),
                usage_tokens: None,
            })
        }

        async fn check(&self) -> PipelineResult<()> {
            Ok(())
        }

        fn provider_name(&self) -> &str {
            "stub"
        }

        fn model_identifier(&self) -> &str {
            "stub-model"
        }
    }

    struct EmptyLayoutExtractor;

    #[async_trait]
    impl LayoutExtractor for EmptyLayoutExtractor {
        async fn extract(&self, _pdf_path: &Path) -> PipelineResult<LayoutOutput> {
            Ok(LayoutOutput { pages: Vec::new() })
        }
    }

    #[tokio::test]
    async fn empty_pdf_produces_empty_document_with_well_formed_toc() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let factory: StorageFactory = Arc::new(move || {
            Box::new(LocalStorage::new(root.clone(), "http://localhost".to_string())) as Box<dyn StorageBackend>
        });

        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            Arc::new(EmptyLayoutExtractor),
            Arc::new(StubVisualExtractor),
            Arc::new(StubEndpoint),
            factory,
        );

        let outcome = pipeline
            .translate(&PathBuf::from("blank.pdf"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.translated_blocks, 0);
        assert_eq!(outcome.quarantined, 0);

        let output = tokio::fs::read_to_string(dir.path().join("blank/output.md")).await.unwrap();
        assert!(!output.contains('#'));
    }

    #[tokio::test]
    async fn translates_a_simple_document_end_to_end() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let factory: StorageFactory = Arc::new(move || {
            Box::new(LocalStorage::new(root.clone(), "http://localhost".to_string())) as Box<dyn StorageBackend>
        });

        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            Arc::new(StubLayoutExtractor),
            Arc::new(StubVisualExtractor),
            Arc::new(StubEndpoint),
            factory,
        );

        let outcome = pipeline
            .translate(&PathBuf::from("sample.pdf"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.quarantined, 0);
        assert!(outcome.translated_blocks > 0);

        let output = tokio::fs::read_to_string(dir.path().join("sample/output.md")).await.unwrap();
        assert!(output.contains("translated"));
    }
}
