//! Integration tests exercising `Pipeline::translate` end to end against
//! synthetic extractor output, without a real PDF fixture. Unit tests for
//! each stage live colocated under `#[cfg(test)]`; these check that the
//! stages actually compose.

use async_trait::async_trait;
use pdf_transl_core::config::PipelineConfig;
use pdf_transl_core::document::BoundingBox;
use pdf_transl_core::error::{PipelineError, PipelineResult};
use pdf_transl_core::extractor::{
    ExtractedImage, LayoutExtractor, LayoutOutput, LayoutPage, TextFragment, VisualExtractor, VisualOutput,
};
use pdf_transl_core::provider::{TranslationEndpoint, TranslationRequest, TranslationResponse};
use pdf_transl_core::{Pipeline, StorageFactory};
use pdf_transl_storage::{LocalStorage, StorageBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn frag(text: &str, font_size: f64, y: f64, page_index: u32) -> TextFragment {
    TextFragment {
        text: text.to_string(),
        bbox: BoundingBox { x: 72.0, y, width: 400.0, height: font_size + 2.0 },
        font_name: "Body".to_string(),
        font_size,
        bold: font_size > 12.0,
        italic: false,
        page_index,
    }
}

struct TwoPageLayoutExtractor;

#[async_trait]
impl LayoutExtractor for TwoPageLayoutExtractor {
    async fn extract(&self, _pdf_path: &Path) -> PipelineResult<LayoutOutput> {
        Ok(LayoutOutput {
            pages: vec![
                LayoutPage {
                    page_index: 0,
                    fragments: vec![
                        frag("Introduction", 18.0, 700.0, 0),
                        frag("This document describes the quarterly results.", 10.0, 650.0, 0),
                        frag("Results held steady across every region this quarter.", 10.0, 600.0, 0),
                        frag("Copyright 2026 Example Corp.", 10.0, 20.0, 0),
                    ],
                },
                LayoutPage {
                    page_index: 1,
                    fragments: vec![
                        frag("Methodology", 18.0, 700.0, 1),
                        frag("Data was collected from every regional office.", 10.0, 650.0, 1),
                        frag("2", 10.0, 20.0, 1),
                    ],
                },
            ],
        })
    }
}

struct NoImagesExtractor;

#[async_trait]
impl VisualExtractor for NoImagesExtractor {
    async fn extract(&self, _pdf_path: &Path) -> PipelineResult<VisualOutput> {
        Ok(VisualOutput { images: Vec::<ExtractedImage>::new() })
    }
}

struct OneImageExtractor;

#[async_trait]
impl VisualExtractor for OneImageExtractor {
    async fn extract(&self, _pdf_path: &Path) -> PipelineResult<VisualOutput> {
        Ok(VisualOutput {
            images: vec![ExtractedImage {
                binary: vec![0u8; 16],
                mime_type: "image/png".to_string(),
                bbox: BoundingBox { x: 72.0, y: 400.0, width: 200.0, height: 150.0 },
                page_index: 0,
                min_dim_px: 150,
                aspect_ratio: 1.33,
            }],
        })
    }
}

struct UppercasingEndpoint;

#[async_trait]
impl TranslationEndpoint for UppercasingEndpoint {
    async fn translate(&self, request: &TranslationRequest) -> PipelineResult<TranslationResponse> {
        Ok(TranslationResponse {
            translated_text: request.text.to_uppercase(),
            finish_reason: "complete".to_string(),
            usage_tokens: None,
        })
    }

    async fn check(&self) -> PipelineResult<()> {
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "uppercase-stub"
    }

    fn model_identifier(&self) -> &str {
        "stub-model"
    }
}

struct AlwaysRefusingEndpoint;

#[async_trait]
impl TranslationEndpoint for AlwaysRefusingEndpoint {
    async fn translate(&self, _request: &TranslationRequest) -> PipelineResult<TranslationResponse> {
        Err(PipelineError::TranslationEndpointBlocked("policy refused this content".to_string()))
    }

    async fn check(&self) -> PipelineResult<()> {
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "refusing-stub"
    }

    fn model_identifier(&self) -> &str {
        "stub-model"
    }
}

fn storage_factory(root: PathBuf) -> StorageFactory {
    Arc::new(move || Box::new(LocalStorage::new(root.clone(), "http://localhost".to_string())) as Box<dyn StorageBackend>)
}

#[tokio::test]
async fn two_page_document_produces_headings_and_a_table_of_contents() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        Arc::new(TwoPageLayoutExtractor),
        Arc::new(NoImagesExtractor),
        Arc::new(UppercasingEndpoint),
        storage_factory(dir.path().to_path_buf()),
    );

    let outcome = pipeline
        .translate(&PathBuf::from("quarterly-report.pdf"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.quarantined, 0);
    assert!(outcome.translated_blocks > 0);

    let output = tokio::fs::read_to_string(dir.path().join("quarterly-report/output.md")).await.unwrap();
    // Headings translate and survive assembly; the page-number and
    // copyright-notice fragments never make it into a block at all.
    assert!(output.contains("INTRODUCTION"));
    assert!(output.contains("METHODOLOGY"));
    assert!(!output.to_lowercase().contains("copyright"));
}

#[tokio::test]
async fn an_image_on_the_page_is_preserved_as_a_block_through_translation() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        Arc::new(TwoPageLayoutExtractor),
        Arc::new(OneImageExtractor),
        Arc::new(UppercasingEndpoint),
        storage_factory(dir.path().to_path_buf()),
    );

    let outcome = pipeline
        .translate(&PathBuf::from("with-image.pdf"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.quarantined, 0);
    let asset_dir = dir.path().join("with-image/assets");
    let mut entries = tokio::fs::read_dir(&asset_dir).await.unwrap();
    let mut count = 0;
    while entries.next_entry().await.unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 1);
}

#[tokio::test]
async fn a_provider_that_refuses_every_block_quarantines_the_whole_document_but_still_completes() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        Arc::new(TwoPageLayoutExtractor),
        Arc::new(NoImagesExtractor),
        Arc::new(AlwaysRefusingEndpoint),
        storage_factory(dir.path().to_path_buf()),
    );

    let outcome = pipeline
        .translate(&PathBuf::from("refused.pdf"), CancellationToken::new())
        .await
        .unwrap();

    // Every translatable block fails, but the run still produces output
    // with the originals substituted in place of an aborted Document
    // (propagation policy, §7).
    assert!(outcome.quarantined > 0);
    assert!(tokio::fs::metadata(dir.path().join("refused/output.md")).await.is_ok());
    assert!(tokio::fs::metadata(dir.path().join("refused/quarantine/refused.jsonl")).await.is_ok());
}

#[tokio::test]
async fn cancelling_before_translation_starts_still_yields_a_well_formed_outcome() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        Arc::new(TwoPageLayoutExtractor),
        Arc::new(NoImagesExtractor),
        Arc::new(UppercasingEndpoint),
        storage_factory(dir.path().to_path_buf()),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = pipeline.translate(&PathBuf::from("cancelled.pdf"), cancel).await.unwrap();

    // Cancellation quarantines in-flight blocks rather than failing the
    // whole Document; every block still resolves to some text.
    assert!(outcome.quarantined > 0 || outcome.translated_blocks > 0);
}
