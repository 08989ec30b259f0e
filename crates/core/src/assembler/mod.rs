//! Two-Pass Document Assembler (spec §4.7): Pass 1 renders blocks in
//! Document order with bookmark anchors and page tracking, deferring
//! Footnotes to a trailing Notes section; Pass 2 builds and validates the
//! table of contents against Pass 1's recorded bookmarks.

pub mod page_estimator;
pub mod toc;

use crate::config::AssemblerConfig;
use crate::document::{BookmarkId, ContentBlock, Document, MathDisplayMode};
use crate::error::PipelineResult;
use page_estimator::Estimator;
use toc::TocEntry;

pub struct AssembledDocument {
    pub markdown: String,
    pub toc: Vec<TocEntry>,
}

pub fn assemble(document: &Document, config: &AssemblerConfig) -> PipelineResult<AssembledDocument> {
    let mut estimator = Estimator::new(config.chars_per_line, config.lines_per_page);
    let mut body = Vec::new();
    let mut footnotes = Vec::new();
    let mut bookmarks: Vec<(BookmarkId, String, u32)> = Vec::new();

    for block in document.blocks() {
        if let ContentBlock::Footnote { .. } = block {
            footnotes.push(block);
            continue;
        }

        if let ContentBlock::Heading { heading, .. } = block {
            bookmarks.push((heading.bookmark_id, rendered_text(block).to_string(), estimator.current_page()));
        }

        body.push(render_block(block));
        estimator.advance(block);
    }

    if !footnotes.is_empty() {
        body.push("## Notes\n".to_string());
        for footnote in &footnotes {
            body.push(render_block(footnote));
            estimator.advance(footnote);
        }
    }

    let toc_entries = toc::build(&bookmarks);
    toc::validate(document, &toc_entries)?;

    let mut markdown = toc::render_markdown(&toc_entries);
    markdown.push('\n');
    markdown.push_str(&body.join("\n\n"));
    markdown.push('\n');

    Ok(AssembledDocument { markdown, toc: toc_entries })
}

fn rendered_text(block: &ContentBlock) -> &str {
    block.translated_text().unwrap_or_else(|| block.original_text())
}

/// Per-block-kind markdown rendering (spec §4.7 rendering rules).
fn render_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Heading { heading, .. } => {
            let marker = "#".repeat(heading.level.clamp(1, 6) as usize);
            format!(
                "<a id=\"bookmark-{}\"></a>\n{marker} {}",
                heading.bookmark_id.0,
                rendered_text(block)
            )
        }
        ContentBlock::Paragraph { .. } => rendered_text(block).to_string(),
        ContentBlock::ListItem { list_item, .. } => {
            let indent = "  ".repeat(list_item.nesting_level as usize);
            let bullet = if list_item.ordered { "1." } else { "-" };
            format!("{indent}{bullet} {}", rendered_text(block))
        }
        ContentBlock::Footnote { footnote, .. } => {
            format!("[{}]: {}", footnote.reference_id, rendered_text(block))
        }
        ContentBlock::Table { .. } => rendered_text(block).to_string(),
        ContentBlock::Caption { .. } => format!("*{}*", rendered_text(block)),
        ContentBlock::MathFormula { math, .. } => match math.display_mode {
            MathDisplayMode::Inline => format!("${}$", math.latex),
            MathDisplayMode::Block => format!("$$\n{}\n$$", math.latex),
        },
        ContentBlock::CodeBlock { code, original_text, .. } => {
            let lang = code.language.as_deref().unwrap_or("");
            format!("```{lang}\n{original_text}\n```")
        }
        ContentBlock::ImagePlaceholder { image, .. } => {
            format!("![image-{}](asset:{})", image.reading_order_position, image.image_asset_id.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        BlockId, BlockMetadata, BookmarkId as BookmarkIdTy, BoundingBox, FootnoteBlock, HeadingBlock, Page,
        ParagraphBlock,
    };

    fn bbox() -> BoundingBox {
        BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 }
    }

    #[test]
    fn assembles_heading_paragraph_and_trailing_footnote() {
        let mut document = Document::new("doc-1");
        let bookmark_id = BookmarkIdTy::new();
        document.pages.push(Page {
            page_number: 1,
            blocks: vec![
                ContentBlock::Heading {
                    id: BlockId::new(),
                    page_number: 1,
                    bounding_box: bbox(),
                    original_text: "Intro".to_string(),
                    translated_text: Some("Introduction".to_string()),
                    metadata: BlockMetadata::default(),
                    heading: HeadingBlock { level: 1, bookmark_id, numbering: None },
                },
                ContentBlock::Paragraph {
                    id: BlockId::new(),
                    page_number: 1,
                    bounding_box: bbox(),
                    original_text: "as shown.[1]".to_string(),
                    translated_text: Some("comme montre.[1]".to_string()),
                    metadata: BlockMetadata::default(),
                    paragraph: ParagraphBlock { is_continuation: false },
                },
                ContentBlock::Footnote {
                    id: BlockId::new(),
                    page_number: 1,
                    bounding_box: bbox(),
                    original_text: "See Smith.".to_string(),
                    translated_text: Some("Voir Smith.".to_string()),
                    metadata: BlockMetadata::default(),
                    footnote: FootnoteBlock { reference_id: "1".to_string(), origin_page: 1 },
                },
            ],
        });

        let config = AssemblerConfig::default();
        let assembled = assemble(&document, &config).unwrap();
        assert!(assembled.markdown.contains("# Introduction"));
        assert!(assembled.markdown.contains("## Notes"));
        assert!(assembled.markdown.contains("[1]: Voir Smith."));
        assert_eq!(assembled.toc.len(), 1);
        assert_eq!(assembled.toc[0].bookmark_id, bookmark_id);
    }
}
