use crate::document::{
    BoundingBox, CodeBlockBlock, FontProfile, HeadingBlock, ListMarker,
    MathDisplayMode, ParagraphBlock,
};
use crate::extractor::TextFragment;
use regex::Regex;
use std::sync::LazyLock;

static LATEX_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$.*?\$\$|\\begin\{equation\}").unwrap());
static LATEX_INLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[^$\n]+\$").unwrap());
static SECTION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)*\s").unwrap());
static FOOTNOTE_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\[\d+\]|\(\d+\)|\d+\.|[ivxIVX]+\.|\*)\s").unwrap());
static BULLET_MARK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-*\x{2022}]\s").unwrap());
static NUMBER_MARK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[.)]\s").unwrap());
static LETTER_MARK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z][.)]\s").unwrap());

/// Draft classification before merge/footnote/heading-merge passes run. One
/// fragment maps to exactly one draft; later passes may combine, relocate,
/// or demote drafts but never invent blocks out of nothing (mirrors the
/// teacher's `cleanup_extracted_text` pass-then-merge shape).
#[derive(Debug, Clone)]
pub enum Draft {
    MathFormula { text: String, latex: String, display_mode: MathDisplayMode },
    CodeBlock { text: String, language: Option<String> },
    Table { text: String },
    FootnoteCandidate { text: String },
    Heading { text: String, level: u8, numbering: Option<String> },
    ListItem { text: String, marker: ListMarker, ordered: bool },
    Paragraph { text: String },
}

pub struct ClassifyContext<'a> {
    pub font_profile: &'a FontProfile,
    pub heading_max_words: usize,
    pub page_height: f64,
}

/// Precedence rules of spec §4.1 step 3, plus the length filter of step 4.
pub fn classify(fragment: &TextFragment, ctx: &ClassifyContext) -> Draft {
    let text = fragment.text.trim();

    if LATEX_BLOCK.is_match(text) {
        return Draft::MathFormula {
            text: fragment.text.clone(),
            latex: strip_latex_delimiters(text),
            display_mode: MathDisplayMode::Block,
        };
    }
    if LATEX_INLINE.is_match(text) {
        return Draft::MathFormula {
            text: fragment.text.clone(),
            latex: strip_latex_delimiters(text),
            display_mode: MathDisplayMode::Inline,
        };
    }

    if looks_fenced_or_monospace(text) {
        return Draft::CodeBlock {
            text: fragment.text.clone(),
            language: detect_fence_language(text),
        };
    }

    if looks_like_table(text) {
        return Draft::Table { text: fragment.text.clone() };
    }

    let near_bottom = fragment.bbox.y >= ctx.page_height * 0.85;
    if near_bottom && FOOTNOTE_MARK.is_match(text) {
        return Draft::FootnoteCandidate { text: fragment.text.clone() };
    }

    let is_heading_size = super::font::is_heading_sized(ctx.font_profile, fragment.font_size);
    let has_keyword = has_heading_keyword(text);
    if is_heading_size || has_keyword {
        let word_count = text.split_whitespace().count();
        if word_count <= ctx.heading_max_words && text.len() <= 100 {
            let level = ctx
                .font_profile
                .level_for_size(fragment.font_size)
                .unwrap_or(if has_keyword { 2 } else { 1 });
            let numbering = SECTION_NUMBER
                .find(text)
                .map(|m| m.as_str().trim().to_string());
            return Draft::Heading { text: fragment.text.clone(), level, numbering };
        }
        // Length filter (step 4): demote an over-long heading candidate.
    }

    if BULLET_MARK.is_match(text) {
        return Draft::ListItem { text: fragment.text.clone(), marker: ListMarker::Bullet, ordered: false };
    }
    if NUMBER_MARK.is_match(text) {
        return Draft::ListItem { text: fragment.text.clone(), marker: ListMarker::Number, ordered: true };
    }
    if LETTER_MARK.is_match(text) {
        return Draft::ListItem { text: fragment.text.clone(), marker: ListMarker::Letter, ordered: true };
    }

    Draft::Paragraph { text: fragment.text.clone() }
}

fn has_heading_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.starts_with("introduction")
        || lower.starts_with("chapter")
        || SECTION_NUMBER.is_match(text)
}

fn strip_latex_delimiters(text: &str) -> String {
    text.trim_matches('$').trim().to_string()
}

fn looks_fenced_or_monospace(text: &str) -> bool {
    text.starts_with("```") || text.lines().all(|l| l.starts_with("    ") && !l.trim().is_empty())
}

fn detect_fence_language(text: &str) -> Option<String> {
    text.strip_prefix("```")
        .and_then(|rest| rest.lines().next())
        .map(|lang| lang.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Table-markup detection (spec §4.1 step 3's table rule), grounded on the
/// teacher's two-heuristic `looks_like_table`: markdown pipes, or a run of
/// consecutive lines with a stable high token count suggesting columns.
pub fn looks_like_table(text: &str) -> bool {
    if text.contains('|') && text.lines().filter(|l| l.contains('|')).count() >= 2 {
        return true;
    }
    multi_space_column_run(text) >= 3
}

fn multi_space_column_run(text: &str) -> usize {
    let mut run = 0;
    let mut best = 0;
    for line in text.lines() {
        let multi_space_groups = line
            .split("  ")
            .filter(|s| !s.trim().is_empty())
            .count();
        if multi_space_groups >= 2 {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

pub fn to_paragraph(text: String) -> (String, ParagraphBlock) {
    (text, ParagraphBlock { is_continuation: false })
}

pub fn to_heading(text: String, level: u8, numbering: Option<String>) -> (String, HeadingBlock) {
    (
        text,
        HeadingBlock {
            level: level.min(6).max(1),
            bookmark_id: crate::document::BookmarkId::new(),
            numbering,
        },
    )
}

pub fn to_code(text: String, language: Option<String>) -> (String, CodeBlockBlock) {
    (text, CodeBlockBlock { language })
}

pub fn default_bbox() -> BoundingBox {
    BoundingBox { x: 0.0, y: 0.0, width: 0.0, height: 0.0 }
}
