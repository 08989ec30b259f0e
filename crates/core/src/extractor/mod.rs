//! Contracts for the two external collaborators of spec §6.1/§6.2: the
//! layout extractor (text + structural metadata) and the visual extractor
//! (binary images). Both are narrow traits so a document's reconciler never
//! depends on a concrete PDF library.

pub mod pdfium;

use crate::error::PipelineResult;
use async_trait::async_trait;

/// One text fragment as positioned and styled on a page (spec §6.1).
#[derive(Debug, Clone)]
pub struct TextFragment {
    pub text: String,
    pub bbox: crate::document::BoundingBox,
    pub font_name: String,
    pub font_size: f64,
    pub bold: bool,
    pub italic: bool,
    pub page_index: u32,
}

#[derive(Debug, Clone, Default)]
pub struct LayoutPage {
    pub page_index: u32,
    pub fragments: Vec<TextFragment>,
}

#[derive(Debug, Clone, Default)]
pub struct LayoutOutput {
    pub pages: Vec<LayoutPage>,
}

/// Consumed contract: PDF path in, a per-page sequence of styled text
/// fragments out. `ExtractorUnavailable`/`ExtractorTimeout` are retried by
/// the caller with backoff; `ExtractorCorruptInput` quarantines the PDF
/// (spec §6.1).
#[async_trait]
pub trait LayoutExtractor: Send + Sync {
    async fn extract(&self, pdf_path: &std::path::Path) -> PipelineResult<LayoutOutput>;
}

/// One extracted binary image (spec §6.2). The caller filters decorative
/// elements by `min_dim_px` and `aspect_ratio` before handing images to the
/// reconciler (step 9).
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub binary: Vec<u8>,
    pub mime_type: String,
    pub bbox: crate::document::BoundingBox,
    pub page_index: u32,
    pub min_dim_px: u32,
    pub aspect_ratio: f64,
}

#[derive(Debug, Clone, Default)]
pub struct VisualOutput {
    pub images: Vec<ExtractedImage>,
}

/// Consumed contract: PDF path in, extracted binaries with bounding boxes
/// out. Failure is recoverable — the Document proceeds without images
/// (spec §6.2, §7 `VisualExtractorFailed`).
#[async_trait]
pub trait VisualExtractor: Send + Sync {
    async fn extract(&self, pdf_path: &std::path::Path) -> PipelineResult<VisualOutput>;
}
