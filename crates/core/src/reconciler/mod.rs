//! The reconciler turns raw extractor output into a [`Document`] (spec
//! §4.1): global font analysis, per-fragment classification, paragraph and
//! heading merge passes, footnote relocation, image association, and
//! artifact filtering.

pub mod classify;
pub mod font;
pub mod merge;
pub mod spatial;

use crate::config::ReconciliationConfig;
use crate::document::{
    BlockId, BlockMetadata, BoundingBox, CaptionBlock, ContentBlock, Document,
    ImagePlaceholderBlock, Page, TableBlock,
};
use crate::extractor::{ExtractedImage, LayoutOutput, VisualOutput};
use classify::{classify, ClassifyContext, Draft};
use merge::{extract_footnotes, merge_adjacent_headings, merge_paragraphs, to_footnote_block, Classified};
use std::collections::HashMap;

/// Standard US-letter-ish page height in points, used when the extractor
/// doesn't report per-page dimensions. Only affects the near-bottom
/// footnote heuristic and the header/footer band check.
const DEFAULT_PAGE_HEIGHT: f64 = 792.0;
const DEFAULT_PAGE_WIDTH: f64 = 612.0;
const MIN_REPEAT_PAGES: usize = 3;

/// One binary asset produced alongside the Document; the pipeline controller
/// persists these to the asset store keyed by `asset_id` (spec invariant 4).
pub struct AssetRecord {
    pub asset_id: crate::document::AssetId,
    pub binary: Vec<u8>,
    pub mime_type: String,
}

pub fn reconcile(
    document_id: impl Into<String>,
    layout: &LayoutOutput,
    visual: &VisualOutput,
    config: &ReconciliationConfig,
) -> (Document, Vec<AssetRecord>) {
    let all_fragments: Vec<_> = layout
        .pages
        .iter()
        .flat_map(|p| p.fragments.iter().cloned())
        .collect();
    let font_profile = font::analyze(&all_fragments, config.heading_min_font_ratio);

    let kept_images: Vec<&ExtractedImage> = visual
        .images
        .iter()
        .filter(|img| {
            !spatial::is_decorative(
                img,
                config.min_image_width_px,
                config.min_image_height_px,
                config.max_aspect_ratio as f64,
            )
        })
        .collect();

    let mut pages: Vec<Page> = Vec::with_capacity(layout.pages.len());
    let mut assets: Vec<AssetRecord> = Vec::new();
    let repeats = tally_repeating_text(layout, DEFAULT_PAGE_HEIGHT);

    for layout_page in &layout.pages {
        let page_number = layout_page.page_index + 1;
        let ctx = ClassifyContext {
            font_profile: &font_profile,
            heading_max_words: config.heading_max_words,
            page_height: DEFAULT_PAGE_HEIGHT,
        };

        let classified: Vec<Classified> = layout_page
            .fragments
            .iter()
            .filter(|f| {
                !spatial::is_repeating_artifact(
                    &f.text,
                    &f.bbox,
                    DEFAULT_PAGE_HEIGHT,
                    &repeats,
                    MIN_REPEAT_PAGES,
                ) && !spatial::is_page_number_artifact(&f.text, &f.bbox, DEFAULT_PAGE_HEIGHT)
                    && !spatial::is_boilerplate_artifact(&f.text)
            })
            .map(|f| Classified { draft: classify(f, &ctx), fragment: f.clone() })
            .collect();

        let merged_paragraphs = merge_paragraphs(classified, DEFAULT_PAGE_WIDTH);
        let (in_flow, footnote_candidates) = extract_footnotes(merged_paragraphs);
        let in_flow = merge_adjacent_headings(in_flow);

        let mut blocks: Vec<ContentBlock> = in_flow
            .into_iter()
            .filter_map(|item| draft_to_block(item, page_number))
            .collect();

        for (fragment, reference_id) in footnote_candidates {
            blocks.push(ContentBlock::Footnote {
                id: BlockId::new(),
                page_number,
                bounding_box: fragment.bbox,
                original_text: fragment.text.clone(),
                translated_text: None,
                metadata: BlockMetadata::default(),
                footnote: to_footnote_block(reference_id, page_number),
            });
        }

        insert_captions(&mut blocks);

        let page_images: Vec<ExtractedImage> = kept_images
            .iter()
            .filter(|img| img.page_index + 1 == page_number)
            .map(|img| (*img).clone())
            .collect();
        assets.extend(insert_images(&mut blocks, &page_images, page_number));

        pages.push(Page { page_number, blocks });
    }

    let mut document = Document::new(document_id.into());
    document.pages = pages;
    document.font_profile = font_profile;
    (document, assets)
}

fn draft_to_block(item: Classified, page_number: u32) -> Option<ContentBlock> {
    let bbox = item.fragment.bbox;
    let base_text = item.fragment.text.clone();
    let block = match item.draft {
        Draft::MathFormula { text, latex, display_mode } => ContentBlock::MathFormula {
            id: BlockId::new(),
            page_number,
            bounding_box: bbox,
            original_text: text,
            translated_text: None,
            metadata: BlockMetadata::default(),
            math: crate::document::MathFormulaBlock { latex, display_mode },
        },
        Draft::CodeBlock { text, language } => ContentBlock::CodeBlock {
            id: BlockId::new(),
            page_number,
            bounding_box: bbox,
            original_text: text,
            translated_text: None,
            metadata: BlockMetadata::default(),
            code: crate::document::CodeBlockBlock { language },
        },
        Draft::Table { text } => ContentBlock::Table {
            id: BlockId::new(),
            page_number,
            bounding_box: bbox,
            original_text: text.clone(),
            translated_text: None,
            metadata: BlockMetadata::default(),
            table: parse_table_rows(&text),
        },
        Draft::FootnoteCandidate { .. } => return None,
        Draft::Heading { text, level, numbering } => ContentBlock::Heading {
            id: BlockId::new(),
            page_number,
            bounding_box: bbox,
            original_text: text,
            translated_text: None,
            metadata: BlockMetadata::default(),
            heading: crate::document::HeadingBlock {
                level: level.clamp(1, 6),
                bookmark_id: crate::document::BookmarkId::new(),
                numbering,
            },
        },
        Draft::ListItem { text, marker, ordered } => ContentBlock::ListItem {
            id: BlockId::new(),
            page_number,
            bounding_box: bbox,
            original_text: text,
            translated_text: None,
            metadata: BlockMetadata::default(),
            list_item: crate::document::ListItemBlock {
                marker,
                nesting_level: indent_nesting_level(&item.fragment.bbox),
                ordered,
            },
        },
        Draft::Paragraph { text } => ContentBlock::Paragraph {
            id: BlockId::new(),
            page_number,
            bounding_box: bbox,
            original_text: text,
            translated_text: None,
            metadata: BlockMetadata::default(),
            paragraph: crate::document::ParagraphBlock { is_continuation: false },
        },
    };
    let _ = base_text;
    Some(block)
}

fn indent_nesting_level(bbox: &BoundingBox) -> u32 {
    (bbox.x / 18.0).floor().max(0.0) as u32
}

/// Table rows are split naively on pipe/whitespace columns; the first row
/// is assumed a header unless it looks identical in shape to the rest.
fn parse_table_rows(text: &str) -> TableBlock {
    let rows: Vec<Vec<String>> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            if line.contains('|') {
                line.split('|').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect()
            } else {
                line.split_whitespace().map(|c| c.to_string()).collect()
            }
        })
        .collect();
    TableBlock { rows, header_rows: if text.lines().count() > 1 { 1 } else { 0 }, caption_id: None }
}

/// A short Paragraph immediately following a Table or ImagePlaceholder that
/// starts with "Figure"/"Table" and a number is promoted to a Caption block
/// pointing at its predecessor.
fn insert_captions(blocks: &mut [ContentBlock]) {
    let mut caption_targets: Vec<(usize, BlockId)> = Vec::new();
    for idx in 1..blocks.len() {
        let is_caption_candidate = matches!(&blocks[idx], ContentBlock::Paragraph { original_text, .. }
            if looks_like_caption(original_text));
        if !is_caption_candidate {
            continue;
        }
        if matches!(&blocks[idx - 1], ContentBlock::Table { .. } | ContentBlock::ImagePlaceholder { .. }) {
            caption_targets.push((idx, blocks[idx - 1].id()));
        }
    }
    for (idx, target_id) in caption_targets {
        if let ContentBlock::Paragraph { id, page_number, bounding_box, original_text, metadata, .. } =
            blocks[idx].clone()
        {
            blocks[idx] = ContentBlock::Caption {
                id,
                page_number,
                bounding_box,
                original_text,
                translated_text: None,
                metadata,
                caption: CaptionBlock { target_id },
            };
        }
    }
}

fn looks_like_caption(text: &str) -> bool {
    let trimmed = text.trim_start();
    let lower = trimmed.to_lowercase();
    (lower.starts_with("figure") || lower.starts_with("table"))
        && trimmed.split_whitespace().count() <= 20
}

fn insert_images(blocks: &mut Vec<ContentBlock>, images: &[ExtractedImage], page_number: u32) -> Vec<AssetRecord> {
    if images.is_empty() {
        return Vec::new();
    }
    let associations = spatial::associate_images(images, blocks, page_number);
    let mut assets = Vec::with_capacity(associations.len());
    let mut offset = 0usize;
    for (assoc, image) in associations.into_iter().zip(images.iter()) {
        let placeholder = ContentBlock::ImagePlaceholder {
            id: BlockId::new(),
            page_number,
            bounding_box: assoc.bounding_box,
            original_text: String::new(),
            translated_text: None,
            metadata: BlockMetadata::default(),
            image: ImagePlaceholderBlock {
                image_asset_id: assoc.asset_id,
                caption_id: None,
                spatial_relationship: assoc.spatial_relationship,
                reading_order_position: 0,
            },
        };
        assets.push(AssetRecord { asset_id: assoc.asset_id, binary: image.binary.clone(), mime_type: image.mime_type.clone() });
        match assoc.insert_before_index {
            Some(idx) => blocks.insert(idx + offset, placeholder),
            None => blocks.push(placeholder),
        }
        offset += 1;
    }
    for (position, block) in blocks.iter_mut().enumerate() {
        if let ContentBlock::ImagePlaceholder { image, .. } = block {
            image.reading_order_position = position as u32;
        }
    }
    assets
}

fn tally_repeating_text(
    layout: &LayoutOutput,
    page_height: f64,
) -> HashMap<(String, u32), usize> {
    let mut seen_per_key: HashMap<(String, u32), std::collections::HashSet<u32>> = HashMap::new();
    for page in &layout.pages {
        for frag in &page.fragments {
            let band = if frag.bbox.y <= page_height * 0.08 {
                0
            } else if frag.bbox.y >= page_height * 0.92 {
                1
            } else {
                continue;
            };
            let key = (spatial::normalize_for_repeat_check(&frag.text), band);
            seen_per_key.entry(key).or_default().insert(page.page_index);
        }
    }
    seen_per_key.into_iter().map(|(k, pages)| (k, pages.len())).collect()
}
