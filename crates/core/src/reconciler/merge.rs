use crate::document::{BlockId, ContentBlock, FootnoteBlock};
use crate::extractor::TextFragment;
use super::classify::Draft;

/// One classified fragment paired with its source positioning, carried
/// through the merge passes before becoming a [`ContentBlock`].
pub struct Classified {
    pub draft: Draft,
    pub fragment: TextFragment,
}

/// Paragraph merging (spec §4.1 step 5): consecutive Paragraph drafts whose
/// first spans the full line width and whose second begins unindented on
/// the next line, with no blank-line gap and no terminating punctuation on
/// the first, are merged. A `should_break_before`/`should_break_after` pair
/// would flag a break; here the absence of a break is the merge signal.
pub fn merge_paragraphs(items: Vec<Classified>, page_width: f64) -> Vec<Classified> {
    let mut merged: Vec<Classified> = Vec::new();
    for item in items {
        let should_merge = match (&item.draft, merged.last()) {
            (Draft::Paragraph { text: next_text }, Some(prev)) => match &prev.draft {
                Draft::Paragraph { text: prev_text } => {
                    spans_full_width(&prev.fragment, page_width)
                        && !ends_with_terminal_punctuation(prev_text)
                        && !starts_indented(&item.fragment)
                        && adjacent_lines(&prev.fragment, &item.fragment)
                        && !next_text.trim().is_empty()
                }
                _ => false,
            },
            _ => false,
        };

        if should_merge {
            let prev = merged.last_mut().unwrap();
            if let Draft::Paragraph { text } = &mut prev.draft {
                if let Draft::Paragraph { text: next_text } = &item.draft {
                    text.push(' ');
                    text.push_str(next_text.trim());
                }
            }
            prev.fragment.bbox.height += item.fragment.bbox.height;
        } else {
            merged.push(item);
        }
    }
    merged
}

fn spans_full_width(fragment: &TextFragment, page_width: f64) -> bool {
    page_width <= 0.0 || fragment.bbox.width >= page_width * 0.8
}

fn ends_with_terminal_punctuation(text: &str) -> bool {
    matches!(text.trim().chars().last(), Some('.') | Some('!') | Some('?') | Some(':'))
}

fn starts_indented(fragment: &TextFragment) -> bool {
    fragment.bbox.x > 5.0
}

fn adjacent_lines(prev: &TextFragment, next: &TextFragment) -> bool {
    prev.page_index == next.page_index
        && (next.bbox.y - (prev.bbox.y + prev.bbox.height)).abs() < prev.bbox.height * 0.6
}

/// Footnote extraction (step 6): candidate footnotes are removed from page
/// flow and attached to the Document as `Footnote` blocks; their inline
/// marker stays in the referencing paragraph text (untouched here — the
/// marker already lives in the paragraph's `original_text`).
pub fn extract_footnotes(items: Vec<Classified>) -> (Vec<Classified>, Vec<(TextFragment, String)>) {
    let mut kept = Vec::new();
    let mut footnotes = Vec::new();
    for item in items {
        match &item.draft {
            Draft::FootnoteCandidate { text } => {
                let reference_id = leading_marker_digits(text);
                footnotes.push((item.fragment.clone(), reference_id));
            }
            _ => kept.push(item),
        }
    }
    (kept, footnotes)
}

fn leading_marker_digits(text: &str) -> String {
    text.trim()
        .trim_start_matches(['[', '('])
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
}

/// Heading merge heuristic (step 7): two consecutive headings of the same
/// level, on the same or adjacent pages, where the first lacks terminal
/// punctuation and the second starts lowercase/preposition/conjunction, are
/// merged into one.
pub fn merge_adjacent_headings(items: Vec<Classified>) -> Vec<Classified> {
    let mut merged: Vec<Classified> = Vec::new();
    for item in items {
        let should_merge = match (&item.draft, merged.last()) {
            (Draft::Heading { text: next_text, level: next_level, .. }, Some(prev)) => {
                match &prev.draft {
                    Draft::Heading { text: prev_text, level: prev_level, .. } => {
                        prev_level == next_level
                            && pages_adjacent(&prev.fragment, &item.fragment)
                            && !ends_with_terminal_punctuation(prev_text)
                            && starts_with_continuation_word(next_text)
                    }
                    _ => false,
                }
            }
            _ => false,
        };

        if should_merge {
            let prev = merged.last_mut().unwrap();
            if let Draft::Heading { text, .. } = &mut prev.draft {
                if let Draft::Heading { text: next_text, .. } = &item.draft {
                    text.push(' ');
                    text.push_str(next_text.trim());
                }
            }
        } else {
            merged.push(item);
        }
    }
    merged
}

fn pages_adjacent(prev: &TextFragment, next: &TextFragment) -> bool {
    next.page_index == prev.page_index || next.page_index == prev.page_index + 1
}

const CONTINUATION_WORDS: &[&str] = &[
    "and", "or", "the", "of", "to", "in", "for", "with", "a", "an", "but",
];

fn starts_with_continuation_word(text: &str) -> bool {
    let trimmed = text.trim();
    let Some(first_char) = trimmed.chars().next() else {
        return false;
    };
    if first_char.is_lowercase() {
        return true;
    }
    let first_word = trimmed.split_whitespace().next().unwrap_or("").to_lowercase();
    CONTINUATION_WORDS.contains(&first_word.as_str())
}

/// Build a [`FootnoteBlock`] for a removed footnote candidate.
pub fn to_footnote_block(reference_id: String, origin_page: u32) -> FootnoteBlock {
    FootnoteBlock { reference_id, origin_page }
}

/// Returns true if `block` is a Paragraph whose text contains an inline
/// marker matching `reference_id`, used to validate invariant 2 after
/// reconciliation.
pub fn paragraph_references(block: &ContentBlock, reference_id: &str) -> bool {
    if let ContentBlock::Paragraph { original_text, .. } = block {
        crate::document::extract_footnote_markers(original_text)
            .iter()
            .any(|m| m == reference_id)
    } else {
        false
    }
}

pub fn block_id_for(_draft: &Draft) -> BlockId {
    BlockId::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BoundingBox;

    fn frag(text: &str, x: f64, y: f64, width: f64, height: f64, page: u32) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            bbox: BoundingBox { x, y, width, height },
            font_name: "Body".to_string(),
            font_size: 10.0,
            bold: false,
            italic: false,
            page_index: page,
        }
    }

    #[test]
    fn merges_unterminated_paragraph_with_unindented_continuation() {
        let items = vec![
            Classified {
                draft: Draft::Paragraph { text: "The quick brown fox".to_string() },
                fragment: frag("The quick brown fox", 0.0, 0.0, 90.0, 10.0, 0),
            },
            Classified {
                draft: Draft::Paragraph { text: "jumps over the lazy dog.".to_string() },
                fragment: frag("jumps over the lazy dog.", 0.0, 10.0, 90.0, 10.0, 0),
            },
        ];
        let merged = merge_paragraphs(items, 100.0);
        assert_eq!(merged.len(), 1);
        if let Draft::Paragraph { text } = &merged[0].draft {
            assert_eq!(text, "The quick brown fox jumps over the lazy dog.");
        } else {
            panic!("expected paragraph");
        }
    }

    #[test]
    fn does_not_merge_across_terminal_punctuation() {
        let items = vec![
            Classified {
                draft: Draft::Paragraph { text: "First sentence.".to_string() },
                fragment: frag("First sentence.", 0.0, 0.0, 90.0, 10.0, 0),
            },
            Classified {
                draft: Draft::Paragraph { text: "Second sentence.".to_string() },
                fragment: frag("Second sentence.", 0.0, 10.0, 90.0, 10.0, 0),
            },
        ];
        let merged = merge_paragraphs(items, 100.0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn extracts_footnote_candidates_out_of_flow() {
        let items = vec![
            Classified {
                draft: Draft::Paragraph { text: "Body text".to_string() },
                fragment: frag("Body text", 0.0, 0.0, 50.0, 10.0, 0),
            },
            Classified {
                draft: crate::reconciler::classify::Draft::FootnoteCandidate {
                    text: "[1] See Smith 2020.".to_string(),
                },
                fragment: frag("[1] See Smith 2020.", 0.0, 780.0, 50.0, 10.0, 1),
            },
        ];
        let (kept, footnotes) = extract_footnotes(items);
        assert_eq!(kept.len(), 1);
        assert_eq!(footnotes.len(), 1);
        assert_eq!(footnotes[0].1, "1");
    }
}
