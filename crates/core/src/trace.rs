//! Observability (spec §4.9): per-stage audits, a per-document trace of
//! spans, and the hard assertions that halt the pipeline rather than ship a
//! document with a broken invariant.

use crate::document::{ContentBlock, Document};
use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Audit {
    pub total_blocks: usize,
    pub image_blocks: usize,
    pub text_blocks: usize,
    pub math_blocks: usize,
    pub table_blocks: usize,
}

pub fn audit(document: &Document) -> Audit {
    let mut audit = Audit::default();
    for block in document.blocks() {
        audit.total_blocks += 1;
        match block {
            ContentBlock::ImagePlaceholder { .. } => audit.image_blocks += 1,
            ContentBlock::MathFormula { .. } => audit.math_blocks += 1,
            ContentBlock::Table { .. } => audit.table_blocks += 1,
            ContentBlock::CodeBlock { .. } => {}
            _ => audit.text_blocks += 1,
        }
    }
    audit
}

/// Any decrease in `image_blocks` between two stage audits is an error
/// (spec §4.9).
pub fn check_image_count_nondecreasing(stage: &str, before: &Audit, after: &Audit) -> PipelineResult<()> {
    if after.image_blocks < before.image_blocks {
        return Err(PipelineError::ImagePreservationViolation {
            stage: stage.to_string(),
            detail: format!("{} -> {}", before.image_blocks, after.image_blocks),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanMetadata {
    pub images_found: usize,
    pub images_preserved: usize,
    pub cache_hits: usize,
    pub api_calls: usize,
    pub validation_passes: usize,
    pub validation_fails: usize,
    pub processing_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub stage: String,
    pub metadata: SpanMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    pub document_id: String,
    pub spans: Vec<Span>,
}

impl Trace {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self { document_id: document_id.into(), spans: Vec::new() }
    }

    pub fn record(&mut self, stage: &str, metadata: SpanMetadata) {
        self.spans.push(Span { stage: stage.to_string(), metadata });
    }

    /// Any stage whose image preservation rate dropped below 100% is
    /// flagged in the summary (spec §4.9); this does not itself fail the
    /// pipeline, `check_image_count_nondecreasing` does that.
    pub fn preservation_issues(&self) -> Vec<String> {
        self.spans
            .iter()
            .filter(|s| s.metadata.images_found > 0 && s.metadata.images_preserved < s.metadata.images_found)
            .map(|s| {
                format!(
                    "{}: preserved {}/{} images",
                    s.stage, s.metadata.images_preserved, s.metadata.images_found
                )
            })
            .collect()
    }
}

/// Hard assertions (spec §4.9), process-fatal if violated.
pub fn assert_invariants(
    document: &Document,
    original_image_count: usize,
    translated_image_count: usize,
    toc_entry_bookmark_ids: &[crate::document::BookmarkId],
) -> PipelineResult<()> {
    if original_image_count != translated_image_count {
        return Err(PipelineError::AssemblerInvariantViolated(format!(
            "original_image_count {original_image_count} != translated_image_count {translated_image_count}"
        )));
    }

    let heading_count = document.headings().count();
    if heading_count != toc_entry_bookmark_ids.len() {
        return Err(PipelineError::AssemblerInvariantViolated(format!(
            "len(headings) {heading_count} != len(toc_entries) {}",
            toc_entry_bookmark_ids.len()
        )));
    }

    for bookmark_id in toc_entry_bookmark_ids {
        let exists = document.headings().any(|h| match h {
            ContentBlock::Heading { heading, .. } => heading.bookmark_id == *bookmark_id,
            _ => false,
        });
        if !exists {
            return Err(PipelineError::AssemblerInvariantViolated(format!(
                "TOC references bookmark {:?} not present in Document",
                bookmark_id.0
            )));
        }
    }

    Ok(())
}
