use super::{ExtractedImage, LayoutExtractor, LayoutOutput, LayoutPage, TextFragment, VisualExtractor, VisualOutput};
use crate::document::BoundingBox;
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};

/// `pdfium-render`-backed implementation of both extractor contracts: one
/// bound library, blocking pdfium calls pushed onto `spawn_blocking` since
/// pdfium itself is not async.
pub struct PdfiumExtractor {
    library_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self { library_path: None }
    }

    pub fn with_library_path(path: PathBuf) -> Self {
        Self { library_path: Some(path) }
    }
}

impl Default for PdfiumExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn bind(library_path: &Option<PathBuf>) -> PipelineResult<Pdfium> {
    let bindings = match library_path {
        Some(p) => Pdfium::bind_to_library(p)
            .map_err(|e| PipelineError::ExtractorUnavailable(format!("{e}")))?,
        None => Pdfium::bind_to_system_library()
            .map_err(|e| PipelineError::ExtractorUnavailable(format!("{e}")))?,
    };
    Ok(Pdfium::new(bindings))
}

fn font_weight_value(weight: PdfFontWeight) -> u32 {
    match weight {
        PdfFontWeight::Weight100 => 100,
        PdfFontWeight::Weight200 => 200,
        PdfFontWeight::Weight300 => 300,
        PdfFontWeight::Weight400Normal => 400,
        PdfFontWeight::Weight500 => 500,
        PdfFontWeight::Weight600 => 600,
        PdfFontWeight::Weight700Bold => 700,
        PdfFontWeight::Weight800 => 800,
        PdfFontWeight::Weight900 => 900,
        PdfFontWeight::Custom(value) => value,
    }
}

#[async_trait]
impl LayoutExtractor for PdfiumExtractor {
    async fn extract(&self, pdf_path: &Path) -> PipelineResult<LayoutOutput> {
        let library_path = self.library_path.clone();
        let path = pdf_path.to_path_buf();

        tokio::task::spawn_blocking(move || -> PipelineResult<LayoutOutput> {
            let pdfium = bind(&library_path)?;
            let document = pdfium.load_pdf_from_file(&path, None).map_err(|e| {
                PipelineError::ExtractorCorruptInput(format!("{}: {e}", path.display()))
            })?;

            let mut pages = Vec::new();
            for (page_index, page) in document.pages().iter().enumerate() {
                let mut fragments = Vec::new();
                let text_page = page
                    .text()
                    .map_err(|e| PipelineError::ExtractorUnavailable(format!("{e}")))?;

                for object in page.objects().iter() {
                    if let Some(text_object) = object.as_text_object() {
                        let text = text_object.text();
                        if text.trim().is_empty() {
                            continue;
                        }
                        let bounds = object.bounds().unwrap_or(PdfQuadPoints::ZERO);
                        let font = text_object.font();
                        fragments.push(TextFragment {
                            text,
                            bbox: BoundingBox {
                                x: bounds.left().value as f64,
                                y: bounds.top().value as f64,
                                width: (bounds.right().value - bounds.left().value) as f64,
                                height: (bounds.top().value - bounds.bottom().value) as f64,
                            },
                            font_name: font.name(),
                            font_size: text_object.unscaled_font_size().value as f64,
                            bold: font.weight().map(|w| font_weight_value(w) >= 600).unwrap_or(false),
                            italic: font.is_italic(),
                            page_index: page_index as u32,
                        });
                    }
                }
                let _ = text_page;
                pages.push(LayoutPage {
                    page_index: page_index as u32,
                    fragments,
                });
            }

            Ok(LayoutOutput { pages })
        })
        .await
        .map_err(|e| PipelineError::ExtractorUnavailable(format!("extractor task panicked: {e}")))?
    }
}

#[async_trait]
impl VisualExtractor for PdfiumExtractor {
    async fn extract(&self, pdf_path: &Path) -> PipelineResult<VisualOutput> {
        let library_path = self.library_path.clone();
        let path = pdf_path.to_path_buf();

        tokio::task::spawn_blocking(move || -> PipelineResult<VisualOutput> {
            let pdfium = bind(&library_path)?;
            let document = pdfium
                .load_pdf_from_file(&path, None)
                .map_err(|e| PipelineError::VisualExtractorFailed(format!("{e}")))?;

            let mut images = Vec::new();
            for (page_index, page) in document.pages().iter().enumerate() {
                for object in page.objects().iter() {
                    if let Some(image_object) = object.as_image_object() {
                        let bounds = object.bounds().unwrap_or(PdfQuadPoints::ZERO);
                        let width = (bounds.right().value - bounds.left().value).abs();
                        let height = (bounds.top().value - bounds.bottom().value).abs();
                        let min_dim = width.min(height).max(0.0) as u32;
                        let aspect_ratio = if height > 0.0 {
                            (width / height).abs() as f64
                        } else {
                            f64::MAX
                        };

                        let bitmap = match image_object.get_raw_bitmap() {
                            Ok(b) => b,
                            Err(_) => continue,
                        };
                        let dynamic_image = bitmap.as_image();
                        let mut buf = std::io::Cursor::new(Vec::new());
                        if dynamic_image
                            .write_to(&mut buf, image::ImageFormat::Png)
                            .is_err()
                        {
                            continue;
                        }

                        images.push(ExtractedImage {
                            binary: buf.into_inner(),
                            mime_type: "image/png".to_string(),
                            bbox: BoundingBox {
                                x: bounds.left().value as f64,
                                y: bounds.top().value as f64,
                                width: width as f64,
                                height: height as f64,
                            },
                            page_index: page_index as u32,
                            min_dim_px: min_dim,
                            aspect_ratio,
                        });
                    }
                }
            }

            Ok(VisualOutput { images })
        })
        .await
        .map_err(|e| PipelineError::VisualExtractorFailed(format!("extractor task panicked: {e}")))?
    }
}
