//! Translation Strategy Router (spec §4.2): per-block strategy and model
//! tier assignment, plus the Paragraph complexity score the routing
//! threshold is tuned against.

use crate::config::{RoutingConfig, RoutingStrategy};
use crate::document::ContentBlock;
use std::sync::LazyLock;

static CITATION_MARKER: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\[\d+\]").unwrap());
static INLINE_MATH_MARKER: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$[^$\n]+\$").unwrap());

/// Words longer than this are treated as a proxy for rare/technical
/// glossary terms absent a curated glossary.
const RARE_TERM_MIN_LEN: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Preserve,
    SelfCorrecting,
    MarkdownAwareQuality,
    MarkdownAwareCost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Cost,
    Quality,
}

pub struct Routing {
    pub strategy: Strategy,
    pub tier: Option<ModelTier>,
}

/// Route one block per the spec's strategy table. `complexity_score` is
/// only consulted for `Paragraph` blocks.
pub fn route(block: &ContentBlock, routing: &RoutingConfig) -> Routing {
    match block {
        ContentBlock::MathFormula { .. } | ContentBlock::CodeBlock { .. } | ContentBlock::ImagePlaceholder { .. } => {
            Routing { strategy: Strategy::Preserve, tier: None }
        }
        ContentBlock::Table { .. } => Routing { strategy: Strategy::SelfCorrecting, tier: Some(ModelTier::Quality) },
        ContentBlock::Heading { .. } | ContentBlock::Footnote { .. } | ContentBlock::Caption { .. } => {
            Routing { strategy: Strategy::MarkdownAwareQuality, tier: Some(ModelTier::Quality) }
        }
        ContentBlock::Paragraph { .. } | ContentBlock::ListItem { .. } => {
            let score = complexity_score(block.original_text());
            let threshold = adjusted_threshold(routing);
            if score >= threshold {
                Routing { strategy: Strategy::MarkdownAwareQuality, tier: Some(ModelTier::Quality) }
            } else {
                Routing { strategy: Strategy::MarkdownAwareCost, tier: Some(ModelTier::Cost) }
            }
        }
    }
}

/// Weighted sum of word count, citation markers, inline math markers,
/// parenthetical depth, and long-word ("rare term") count.
pub fn complexity_score(text: &str) -> f64 {
    let word_count = text.split_whitespace().count() as f64;
    let citation_count = CITATION_MARKER.find_iter(text).count() as f64;
    let math_marker_count = INLINE_MATH_MARKER.find_iter(text).count() as f64;
    let parenthetical_depth = max_paren_depth(text) as f64;
    let rare_term_count = text
        .split_whitespace()
        .filter(|w| w.chars().filter(|c| c.is_alphabetic()).count() >= RARE_TERM_MIN_LEN)
        .count() as f64;

    word_count * 0.01 + citation_count * 0.5 + math_marker_count * 0.75 + parenthetical_depth * 0.3
        + rare_term_count * 0.4
}

fn max_paren_depth(text: &str) -> u32 {
    let mut depth: u32 = 0;
    let mut max_depth: u32 = 0;
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max_depth
}

/// The global strategy knob shifts the Paragraph routing threshold without
/// altering any preserve/self_correcting assignment.
fn adjusted_threshold(routing: &RoutingConfig) -> f64 {
    let base = routing.complexity_threshold;
    match routing.strategy {
        RoutingStrategy::CostOptimized => base * 1.5,
        RoutingStrategy::Balanced => base,
        RoutingStrategy::QualityFocused => base * 0.5,
        RoutingStrategy::SpeedFocused => base * 1.25,
    }
}

/// Resolve a [`ModelTier`] to the configured model identifier string.
pub fn model_for_tier(tier: ModelTier, routing: &RoutingConfig) -> &str {
    match tier {
        ModelTier::Cost => &routing.cost_model,
        ModelTier::Quality => &routing.quality_model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BlockId, BlockMetadata, BoundingBox, CodeBlockBlock, MathDisplayMode, MathFormulaBlock, ParagraphBlock};

    fn bbox() -> BoundingBox {
        BoundingBox { x: 0.0, y: 0.0, width: 100.0, height: 10.0 }
    }

    #[test]
    fn math_formula_always_preserved() {
        let block = ContentBlock::MathFormula {
            id: BlockId::new(),
            page_number: 1,
            bounding_box: bbox(),
            original_text: "$E=mc^2$".to_string(),
            translated_text: None,
            metadata: BlockMetadata::default(),
            math: MathFormulaBlock { latex: "E=mc^2".to_string(), display_mode: MathDisplayMode::Inline },
        };
        let routing = RoutingConfig::default();
        let r = route(&block, &routing);
        assert_eq!(r.strategy, Strategy::Preserve);
    }

    #[test]
    fn code_block_always_preserved_regardless_of_strategy() {
        let block = ContentBlock::CodeBlock {
            id: BlockId::new(),
            page_number: 1,
            bounding_box: bbox(),
            original_text: "fn main() {}".to_string(),
            translated_text: None,
            metadata: BlockMetadata::default(),
            code: CodeBlockBlock { language: Some("rust".to_string()) },
        };
        let mut routing = RoutingConfig::default();
        routing.strategy = RoutingStrategy::QualityFocused;
        assert_eq!(route(&block, &routing).strategy, Strategy::Preserve);
    }

    #[test]
    fn short_simple_paragraph_routes_to_cost_tier() {
        let block = ContentBlock::Paragraph {
            id: BlockId::new(),
            page_number: 1,
            bounding_box: bbox(),
            original_text: "The cat sat on the mat.".to_string(),
            translated_text: None,
            metadata: BlockMetadata::default(),
            paragraph: ParagraphBlock { is_continuation: false },
        };
        let routing = RoutingConfig::default();
        let r = route(&block, &routing);
        assert_eq!(r.strategy, Strategy::MarkdownAwareCost);
    }

    #[test]
    fn paragraph_with_citations_and_math_routes_to_quality_tier() {
        let text = "As shown in [1] and [2], the relation $E=mc^2$ holds (see also (nested (parens))).";
        let block = ContentBlock::Paragraph {
            id: BlockId::new(),
            page_number: 1,
            bounding_box: bbox(),
            original_text: text.to_string(),
            translated_text: None,
            metadata: BlockMetadata::default(),
            paragraph: ParagraphBlock { is_continuation: false },
        };
        let routing = RoutingConfig::default();
        let r = route(&block, &routing);
        assert_eq!(r.strategy, Strategy::MarkdownAwareQuality);
    }

    #[test]
    fn quality_focused_knob_lowers_threshold_for_paragraphs() {
        let text = "This is a moderately long paragraph with enough words in it to push \
            the complexity score above the lowered threshold but still below the \
            default balanced threshold used for ordinary routing decisions today."
            .to_string();
        let block = ContentBlock::Paragraph {
            id: BlockId::new(),
            page_number: 1,
            bounding_box: bbox(),
            original_text: text,
            translated_text: None,
            metadata: BlockMetadata::default(),
            paragraph: ParagraphBlock { is_continuation: false },
        };
        let routing_balanced = RoutingConfig::default();
        assert_eq!(route(&block, &routing_balanced).strategy, Strategy::MarkdownAwareCost);

        let mut routing_quality = RoutingConfig::default();
        routing_quality.strategy = RoutingStrategy::QualityFocused;
        assert_eq!(route(&block, &routing_quality).strategy, Strategy::MarkdownAwareQuality);
    }
}
