//! Table of contents (spec §4.7 Pass 2): one entry per Heading, walked in
//! the order Pass 1 recorded them, validated against the Document's
//! heading set before the assembled document is considered complete.

use crate::document::{BookmarkId, ContentBlock, Document};
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone)]
pub struct TocEntry {
    pub bookmark_id: BookmarkId,
    pub title: String,
    pub page_number: u32,
}

pub fn build(recorded: &[(BookmarkId, String, u32)]) -> Vec<TocEntry> {
    recorded
        .iter()
        .map(|(bookmark_id, title, page_number)| TocEntry {
            bookmark_id: *bookmark_id,
            title: title.clone(),
            page_number: *page_number,
        })
        .collect()
}

/// Fail-fast if the TOC entry set doesn't exactly match the Document's
/// heading set (spec §4.7 Pass 2).
pub fn validate(document: &Document, toc: &[TocEntry]) -> PipelineResult<()> {
    let heading_count = document.headings().count();
    if heading_count != toc.len() {
        return Err(PipelineError::AssemblerInvariantViolated(format!(
            "{heading_count} headings in Document but {} TOC entries", toc.len()
        )));
    }

    for entry in toc {
        let resolves = document.headings().any(|h| match h {
            ContentBlock::Heading { heading, .. } => heading.bookmark_id == entry.bookmark_id,
            _ => false,
        });
        if !resolves {
            return Err(PipelineError::AssemblerInvariantViolated(format!(
                "TOC entry references bookmark {:?} absent from the Document",
                entry.bookmark_id.0
            )));
        }
    }

    Ok(())
}

pub fn render_markdown(toc: &[TocEntry]) -> String {
    let mut out = String::from("## Table of Contents\n\n");
    for entry in toc {
        out.push_str(&format!(
            "- [{}](#bookmark-{}) ... p.{}\n",
            entry.title, entry.bookmark_id.0, entry.page_number
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BlockId, BlockMetadata, BoundingBox, HeadingBlock, Page};

    #[test]
    fn validate_fails_when_toc_is_missing_a_heading() {
        let mut document = Document::new("doc-1");
        document.pages.push(Page {
            page_number: 1,
            blocks: vec![ContentBlock::Heading {
                id: BlockId::new(),
                page_number: 1,
                bounding_box: BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 },
                original_text: "Intro".to_string(),
                translated_text: None,
                metadata: BlockMetadata::default(),
                heading: HeadingBlock { level: 1, bookmark_id: BookmarkId::new(), numbering: None },
            }],
        });
        assert!(validate(&document, &[]).is_err());
    }

    #[test]
    fn validate_passes_for_matching_toc() {
        let bookmark_id = BookmarkId::new();
        let mut document = Document::new("doc-1");
        document.pages.push(Page {
            page_number: 1,
            blocks: vec![ContentBlock::Heading {
                id: BlockId::new(),
                page_number: 1,
                bounding_box: BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 },
                original_text: "Intro".to_string(),
                translated_text: Some("Introduction".to_string()),
                metadata: BlockMetadata::default(),
                heading: HeadingBlock { level: 1, bookmark_id, numbering: None },
            }],
        });
        let toc = build(&[(bookmark_id, "Introduction".to_string(), 1)]);
        assert!(validate(&document, &toc).is_ok());
    }
}
