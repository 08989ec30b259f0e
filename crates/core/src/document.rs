use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Identifies a [`ContentBlock`] uniquely within its owning [`Document`]
/// (invariant 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub Uuid);

impl BlockId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies a Heading's bookmark anchor, stable from creation through
/// assembly (invariant 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookmarkId(pub Uuid);

impl BookmarkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BookmarkId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies a binary asset in the asset store (invariant 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub Uuid);

impl AssetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Axis-aligned bounding box in page coordinates (points, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn distance_to(&self, other: &BoundingBox) -> f64 {
        let (cx1, cy1) = self.center();
        let (cx2, cy2) = other.center();
        ((cx1 - cx2).powi(2) + (cy1 - cy2).powi(2)).sqrt()
    }
}

/// Position of an image relative to its associated text block (spec §4.1
/// step 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialRelationship {
    Before,
    After,
    Alongside,
    Wrapped,
}

/// Per-block outcome metadata that the pipeline stages stamp on as the
/// block moves through translation; never drives routing decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Set when the self-correcting translator exhausts its retry budget
    /// and substitutes `original_text` (spec §4.4 step 4).
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub translation_failed: bool,
    /// Validator confidence used to derive the cache write's quality score
    /// (spec §4.5).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub validator_confidence: Option<f64>,
    /// True if this translation came from a cache hit rather than a live
    /// call.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadingBlock {
    pub level: u8,
    pub bookmark_id: BookmarkId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub numbering: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphBlock {
    pub is_continuation: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ListMarker {
    Bullet,
    Number,
    Letter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItemBlock {
    pub marker: ListMarker,
    pub nesting_level: u32,
    pub ordered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootnoteBlock {
    pub reference_id: String,
    pub origin_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableBlock {
    pub rows: Vec<Vec<String>>,
    pub header_rows: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub caption_id: Option<BlockId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionBlock {
    pub target_id: BlockId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathDisplayMode {
    Inline,
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathFormulaBlock {
    pub latex: String,
    pub display_mode: MathDisplayMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlockBlock {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePlaceholderBlock {
    pub image_asset_id: AssetId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub caption_id: Option<BlockId>,
    pub spatial_relationship: SpatialRelationship,
    pub reading_order_position: u32,
}

/// The tagged-variant atom of a [`Document`] (spec §3). All components
/// switch on `kind`; there is no inheritance or dynamic dispatch in the
/// data model itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ContentBlock {
    Heading {
        id: BlockId,
        page_number: u32,
        bounding_box: BoundingBox,
        original_text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        translated_text: Option<String>,
        metadata: BlockMetadata,
        #[serde(flatten)]
        heading: HeadingBlock,
    },
    Paragraph {
        id: BlockId,
        page_number: u32,
        bounding_box: BoundingBox,
        original_text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        translated_text: Option<String>,
        metadata: BlockMetadata,
        #[serde(flatten)]
        paragraph: ParagraphBlock,
    },
    ListItem {
        id: BlockId,
        page_number: u32,
        bounding_box: BoundingBox,
        original_text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        translated_text: Option<String>,
        metadata: BlockMetadata,
        #[serde(flatten)]
        list_item: ListItemBlock,
    },
    Footnote {
        id: BlockId,
        page_number: u32,
        bounding_box: BoundingBox,
        original_text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        translated_text: Option<String>,
        metadata: BlockMetadata,
        #[serde(flatten)]
        footnote: FootnoteBlock,
    },
    Table {
        id: BlockId,
        page_number: u32,
        bounding_box: BoundingBox,
        original_text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        translated_text: Option<String>,
        metadata: BlockMetadata,
        #[serde(flatten)]
        table: TableBlock,
    },
    Caption {
        id: BlockId,
        page_number: u32,
        bounding_box: BoundingBox,
        original_text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        translated_text: Option<String>,
        metadata: BlockMetadata,
        #[serde(flatten)]
        caption: CaptionBlock,
    },
    MathFormula {
        id: BlockId,
        page_number: u32,
        bounding_box: BoundingBox,
        original_text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        translated_text: Option<String>,
        metadata: BlockMetadata,
        #[serde(flatten)]
        math: MathFormulaBlock,
    },
    CodeBlock {
        id: BlockId,
        page_number: u32,
        bounding_box: BoundingBox,
        original_text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        translated_text: Option<String>,
        metadata: BlockMetadata,
        #[serde(flatten)]
        code: CodeBlockBlock,
    },
    ImagePlaceholder {
        id: BlockId,
        page_number: u32,
        bounding_box: BoundingBox,
        original_text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        translated_text: Option<String>,
        metadata: BlockMetadata,
        #[serde(flatten)]
        image: ImagePlaceholderBlock,
    },
}

impl ContentBlock {
    pub fn id(&self) -> BlockId {
        match self {
            ContentBlock::Heading { id, .. }
            | ContentBlock::Paragraph { id, .. }
            | ContentBlock::ListItem { id, .. }
            | ContentBlock::Footnote { id, .. }
            | ContentBlock::Table { id, .. }
            | ContentBlock::Caption { id, .. }
            | ContentBlock::MathFormula { id, .. }
            | ContentBlock::CodeBlock { id, .. }
            | ContentBlock::ImagePlaceholder { id, .. } => *id,
        }
    }

    pub fn page_number(&self) -> u32 {
        match self {
            ContentBlock::Heading { page_number, .. }
            | ContentBlock::Paragraph { page_number, .. }
            | ContentBlock::ListItem { page_number, .. }
            | ContentBlock::Footnote { page_number, .. }
            | ContentBlock::Table { page_number, .. }
            | ContentBlock::Caption { page_number, .. }
            | ContentBlock::MathFormula { page_number, .. }
            | ContentBlock::CodeBlock { page_number, .. }
            | ContentBlock::ImagePlaceholder { page_number, .. } => *page_number,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            ContentBlock::Heading { bounding_box, .. }
            | ContentBlock::Paragraph { bounding_box, .. }
            | ContentBlock::ListItem { bounding_box, .. }
            | ContentBlock::Footnote { bounding_box, .. }
            | ContentBlock::Table { bounding_box, .. }
            | ContentBlock::Caption { bounding_box, .. }
            | ContentBlock::MathFormula { bounding_box, .. }
            | ContentBlock::CodeBlock { bounding_box, .. }
            | ContentBlock::ImagePlaceholder { bounding_box, .. } => *bounding_box,
        }
    }

    pub fn original_text(&self) -> &str {
        match self {
            ContentBlock::Heading { original_text, .. }
            | ContentBlock::Paragraph { original_text, .. }
            | ContentBlock::ListItem { original_text, .. }
            | ContentBlock::Footnote { original_text, .. }
            | ContentBlock::Table { original_text, .. }
            | ContentBlock::Caption { original_text, .. }
            | ContentBlock::MathFormula { original_text, .. }
            | ContentBlock::CodeBlock { original_text, .. }
            | ContentBlock::ImagePlaceholder { original_text, .. } => original_text,
        }
    }

    pub fn translated_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Heading { translated_text, .. }
            | ContentBlock::Paragraph { translated_text, .. }
            | ContentBlock::ListItem { translated_text, .. }
            | ContentBlock::Footnote { translated_text, .. }
            | ContentBlock::Table { translated_text, .. }
            | ContentBlock::Caption { translated_text, .. }
            | ContentBlock::MathFormula { translated_text, .. }
            | ContentBlock::CodeBlock { translated_text, .. }
            | ContentBlock::ImagePlaceholder { translated_text, .. } => translated_text.as_deref(),
        }
    }

    pub fn metadata(&self) -> &BlockMetadata {
        match self {
            ContentBlock::Heading { metadata, .. }
            | ContentBlock::Paragraph { metadata, .. }
            | ContentBlock::ListItem { metadata, .. }
            | ContentBlock::Footnote { metadata, .. }
            | ContentBlock::Table { metadata, .. }
            | ContentBlock::Caption { metadata, .. }
            | ContentBlock::MathFormula { metadata, .. }
            | ContentBlock::CodeBlock { metadata, .. }
            | ContentBlock::ImagePlaceholder { metadata, .. } => metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut BlockMetadata {
        match self {
            ContentBlock::Heading { metadata, .. }
            | ContentBlock::Paragraph { metadata, .. }
            | ContentBlock::ListItem { metadata, .. }
            | ContentBlock::Footnote { metadata, .. }
            | ContentBlock::Table { metadata, .. }
            | ContentBlock::Caption { metadata, .. }
            | ContentBlock::MathFormula { metadata, .. }
            | ContentBlock::CodeBlock { metadata, .. }
            | ContentBlock::ImagePlaceholder { metadata, .. } => metadata,
        }
    }

    /// MathFormula and CodeBlock blocks never have `translated_text` set —
    /// they carry `original_text` verbatim (invariant 5).
    pub fn is_preserve_only(&self) -> bool {
        matches!(
            self,
            ContentBlock::MathFormula { .. } | ContentBlock::CodeBlock { .. }
        )
    }

    /// Set the translated text. Panics on preserve-only blocks, which must
    /// go through [`ContentBlock::preserve`] instead so invariant 5 cannot
    /// be violated by a careless caller.
    pub fn set_translated_text(&mut self, text: String) {
        assert!(
            !self.is_preserve_only(),
            "invariant 5 violation: attempted to translate a preserve-only block"
        );
        let slot = match self {
            ContentBlock::Heading { translated_text, .. }
            | ContentBlock::Paragraph { translated_text, .. }
            | ContentBlock::ListItem { translated_text, .. }
            | ContentBlock::Footnote { translated_text, .. }
            | ContentBlock::Table { translated_text, .. }
            | ContentBlock::Caption { translated_text, .. }
            | ContentBlock::ImagePlaceholder { translated_text, .. } => translated_text,
            ContentBlock::MathFormula { .. } | ContentBlock::CodeBlock { .. } => unreachable!(),
        };
        *slot = Some(text);
    }

    /// Copy `original_text` into `translated_text` verbatim, the "preserve"
    /// strategy of spec §4.2.
    pub fn preserve(&mut self) {
        let text = self.original_text().to_string();
        match self {
            ContentBlock::MathFormula { .. } | ContentBlock::CodeBlock { .. } => {}
            _ => {
                let slot = match self {
                    ContentBlock::Heading { translated_text, .. }
                    | ContentBlock::Paragraph { translated_text, .. }
                    | ContentBlock::ListItem { translated_text, .. }
                    | ContentBlock::Footnote { translated_text, .. }
                    | ContentBlock::Table { translated_text, .. }
                    | ContentBlock::Caption { translated_text, .. }
                    | ContentBlock::ImagePlaceholder { translated_text, .. } => translated_text,
                    ContentBlock::MathFormula { .. } | ContentBlock::CodeBlock { .. } => {
                        unreachable!()
                    }
                };
                *slot = Some(text);
            }
        }
    }
}

/// An ordered sequence of [`ContentBlock`]s in reading order (invariant 8).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub blocks: Vec<ContentBlock>,
}

/// Dominant body style plus the `font-size -> heading-level` mapping
/// derived by global font analysis (spec §4.1 step 2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FontProfile {
    pub body_font_name: String,
    pub body_font_size: f64,
    /// Sorted descending by size; index 0 maps to heading level 1.
    pub heading_sizes: Vec<f64>,
}

impl FontProfile {
    /// Level for a given font size, or `None` if it doesn't qualify as a
    /// heading size under the current profile.
    pub fn level_for_size(&self, size: f64) -> Option<u8> {
        self.heading_sizes
            .iter()
            .position(|&s| (s - size).abs() < f64::EPSILON)
            .map(|idx| (idx + 1).min(6) as u8)
    }
}

/// Owns an ordered sequence of [`Page`]s plus document-level side
/// structures (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub pages: Vec<Page>,
    pub font_profile: FontProfile,
}

impl Document {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            pages: Vec::new(),
            font_profile: FontProfile::default(),
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item = &ContentBlock> {
        self.pages.iter().flat_map(|p| p.blocks.iter())
    }

    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut ContentBlock> {
        self.pages.iter_mut().flat_map(|p| p.blocks.iter_mut())
    }

    pub fn find_block(&self, id: BlockId) -> Option<&ContentBlock> {
        self.blocks().find(|b| b.id() == id)
    }

    pub fn find_block_mut(&mut self, id: BlockId) -> Option<&mut ContentBlock> {
        self.blocks_mut().find(|b| b.id() == id)
    }

    pub fn image_count(&self) -> usize {
        self.blocks()
            .filter(|b| matches!(b, ContentBlock::ImagePlaceholder { .. }))
            .count()
    }

    pub fn headings(&self) -> impl Iterator<Item = &ContentBlock> {
        self.blocks().filter(|b| matches!(b, ContentBlock::Heading { .. }))
    }

    /// Exhaustively checks the invariants of spec §3 that can be verified
    /// from the Document alone (invariants 1-6; invariant 7 is checked
    /// across pipeline stages by the Tracer's audits, invariant 8 by the
    /// reconciler's reading-order sweep at construction time).
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen_ids = HashSet::new();
        let mut seen_bookmarks = HashSet::new();
        let mut footnote_refs = HashSet::new();
        let mut inline_markers = HashSet::new();
        let mut caption_targets = Vec::new();
        let mut table_and_image_ids = HashSet::new();

        for block in self.blocks() {
            if !seen_ids.insert(block.id()) {
                return Err(format!("duplicate block id {:?}", block.id().0));
            }
            match block {
                ContentBlock::Heading { heading, .. } => {
                    if !seen_bookmarks.insert(heading.bookmark_id) {
                        return Err(format!(
                            "duplicate bookmark id {:?}",
                            heading.bookmark_id.0
                        ));
                    }
                }
                ContentBlock::Footnote { footnote, .. } => {
                    footnote_refs.insert(footnote.reference_id.clone());
                }
                ContentBlock::Paragraph { original_text, .. } => {
                    for marker in extract_footnote_markers(original_text) {
                        inline_markers.insert(marker);
                    }
                }
                ContentBlock::Caption { caption, .. } => {
                    caption_targets.push(caption.target_id);
                }
                ContentBlock::Table { .. } | ContentBlock::ImagePlaceholder { .. } => {
                    table_and_image_ids.insert(block.id());
                }
                _ => {}
            }
            if let ContentBlock::MathFormula { translated_text, .. }
            | ContentBlock::CodeBlock { translated_text, .. } = block
            {
                if translated_text.is_some() {
                    return Err(format!(
                        "invariant 5 violation: preserve-only block {:?} has translated_text set",
                        block.id().0
                    ));
                }
            }
        }

        for target in &caption_targets {
            if !table_and_image_ids.contains(target) {
                return Err(format!(
                    "invariant 3 violation: caption target {:?} does not resolve",
                    target.0
                ));
            }
        }

        if footnote_refs != inline_markers {
            return Err(format!(
                "invariant 2 violation: footnote refs {footnote_refs:?} != inline markers {inline_markers:?}"
            ));
        }

        Ok(())
    }
}

/// Footnote markers of the form `[1]`, `(2)` at the end of a paragraph's
/// text. Used both by invariant checking and by the reconciler/assembler.
pub fn extract_footnote_markers(text: &str) -> Vec<String> {
    let mut markers = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some(end) = text[i..].find(']') {
                let inner = &text[i + 1..i + end];
                if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
                    markers.push(inner.to_string());
                }
                i += end + 1;
                continue;
            }
        }
        i += 1;
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 20.0,
        }
    }

    #[test]
    fn preserve_copies_original_to_translated() {
        let mut block = ContentBlock::MathFormula {
            id: BlockId::new(),
            page_number: 1,
            bounding_box: bbox(),
            original_text: "$E=mc^2$".to_string(),
            translated_text: None,
            metadata: BlockMetadata::default(),
            math: MathFormulaBlock {
                latex: "E=mc^2".to_string(),
                display_mode: MathDisplayMode::Inline,
            },
        };
        block.preserve();
        assert_eq!(block.translated_text(), None);
        assert_eq!(block.original_text(), "$E=mc^2$");
    }

    #[test]
    #[should_panic(expected = "invariant 5")]
    fn set_translated_text_panics_on_preserve_only() {
        let mut block = ContentBlock::CodeBlock {
            id: BlockId::new(),
            page_number: 1,
            bounding_box: bbox(),
            original_text: "fn main() {}".to_string(),
            translated_text: None,
            metadata: BlockMetadata::default(),
            code: CodeBlockBlock { language: Some("rust".to_string()) },
        };
        block.set_translated_text("should panic".to_string());
    }

    #[test]
    fn extracts_footnote_markers_from_trailing_bracket() {
        let markers = extract_footnote_markers("as previously shown.[1]");
        assert_eq!(markers, vec!["1".to_string()]);
    }

    #[test]
    fn check_invariants_detects_duplicate_ids() {
        let id = BlockId::new();
        let mut doc = Document::new("doc-1");
        doc.pages.push(Page {
            page_number: 1,
            blocks: vec![
                ContentBlock::Paragraph {
                    id,
                    page_number: 1,
                    bounding_box: bbox(),
                    original_text: "a".to_string(),
                    translated_text: None,
                    metadata: BlockMetadata::default(),
                    paragraph: ParagraphBlock { is_continuation: false },
                },
                ContentBlock::Paragraph {
                    id,
                    page_number: 1,
                    bounding_box: bbox(),
                    original_text: "b".to_string(),
                    translated_text: None,
                    metadata: BlockMetadata::default(),
                    paragraph: ParagraphBlock { is_continuation: false },
                },
            ],
        });
        assert!(doc.check_invariants().is_err());
    }

    #[test]
    fn check_invariants_passes_on_matched_footnote() {
        let footnote_block_id = BlockId::new();
        let mut doc = Document::new("doc-1");
        doc.pages.push(Page {
            page_number: 1,
            blocks: vec![
                ContentBlock::Paragraph {
                    id: BlockId::new(),
                    page_number: 1,
                    bounding_box: bbox(),
                    original_text: "as previously shown.[1]".to_string(),
                    translated_text: None,
                    metadata: BlockMetadata::default(),
                    paragraph: ParagraphBlock { is_continuation: false },
                },
                ContentBlock::Footnote {
                    id: footnote_block_id,
                    page_number: 2,
                    bounding_box: bbox(),
                    original_text: "See Smith 2020.".to_string(),
                    translated_text: None,
                    metadata: BlockMetadata::default(),
                    footnote: FootnoteBlock {
                        reference_id: "1".to_string(),
                        origin_page: 2,
                    },
                },
            ],
        });
        assert!(doc.check_invariants().is_ok());
    }
}
