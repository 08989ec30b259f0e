//! Output line-count -> page-number estimator (spec §4.7 Pass 1). Required
//! only to be *consistent* within a run, not calibrated against any real
//! renderer's pagination (spec §9 Open Question).

use crate::document::{ContentBlock, ListMarker, MathDisplayMode};

pub struct Estimator {
    chars_per_line: usize,
    lines_per_page: usize,
    running_lines: usize,
    current_page: u32,
}

impl Estimator {
    pub fn new(chars_per_line: usize, lines_per_page: usize) -> Self {
        Self { chars_per_line: chars_per_line.max(1), lines_per_page: lines_per_page.max(1), running_lines: 0, current_page: 1 }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Advance the running line count by `block`'s estimated rendered line
    /// weight, rolling the page counter forward every time the per-page
    /// threshold is crossed.
    pub fn advance(&mut self, block: &ContentBlock) {
        let weight = line_weight(block, self.chars_per_line);
        self.running_lines += weight;
        while self.running_lines >= self.lines_per_page {
            self.running_lines -= self.lines_per_page;
            self.current_page += 1;
        }
    }
}

fn rendered_text(block: &ContentBlock) -> &str {
    block.translated_text().unwrap_or_else(|| block.original_text())
}

/// Content-type-weighted line count (spec §4.7 Pass 1).
fn line_weight(block: &ContentBlock, chars_per_line: usize) -> usize {
    match block {
        ContentBlock::Heading { .. } => 4,
        ContentBlock::Paragraph { .. } | ContentBlock::Footnote { .. } | ContentBlock::Caption { .. } => {
            chars_lines(rendered_text(block), chars_per_line)
        }
        ContentBlock::ListItem { list_item, .. } => {
            let nesting_weight = match list_item.marker {
                ListMarker::Bullet | ListMarker::Number | ListMarker::Letter => list_item.nesting_level as usize,
            };
            chars_lines(rendered_text(block), chars_per_line) + nesting_weight
        }
        ContentBlock::Table { table, .. } => 2 + table.rows.len(),
        ContentBlock::MathFormula { math, .. } => match math.display_mode {
            MathDisplayMode::Inline => 1,
            MathDisplayMode::Block => 3,
        },
        ContentBlock::CodeBlock { original_text, .. } => original_text.lines().count().max(1) + 2,
        ContentBlock::ImagePlaceholder { .. } => 12,
    }
}

fn chars_lines(text: &str, chars_per_line: usize) -> usize {
    if text.is_empty() {
        return 1;
    }
    text.len().div_ceil(chars_per_line).max(1)
}
