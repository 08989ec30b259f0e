use crate::document::FontProfile;
use crate::extractor::TextFragment;
use std::collections::HashMap;

/// Global font analysis (spec §4.1 step 2): tally `(font-name, size,
/// bold/italic)` frequency across the whole document; the most frequent
/// style is body text. Any style with size >= `heading_min_font_ratio` times
/// body size, on short text, is eligible for a heading level, assigned by
/// size rank (largest first -> H1).
pub fn analyze(fragments: &[TextFragment], heading_min_font_ratio: f64) -> FontProfile {
    let mut tally: HashMap<(String, u64), (usize, bool, bool)> = HashMap::new();
    for frag in fragments {
        let key = (frag.font_name.clone(), frag.font_size.to_bits());
        let entry = tally.entry(key).or_insert((0, frag.bold, frag.italic));
        entry.0 += 1;
    }

    let body = tally
        .iter()
        .max_by_key(|(_, (count, _, _))| *count)
        .map(|((name, size_bits), _)| (name.clone(), f64::from_bits(*size_bits)));

    let (body_font_name, body_font_size) = body.unwrap_or(("default".to_string(), 12.0));

    let mut heading_sizes: Vec<f64> = tally
        .keys()
        .map(|(_, size_bits)| f64::from_bits(*size_bits))
        .filter(|&size| size >= body_font_size * heading_min_font_ratio)
        .collect();
    heading_sizes.sort_by(|a, b| b.partial_cmp(a).unwrap());
    heading_sizes.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);

    FontProfile {
        body_font_name,
        body_font_size,
        heading_sizes,
    }
}

/// A fragment is heading-*eligible* by size/length only; semantic keyword
/// eligibility is handled in `classify`. The length filter of step 4 is
/// applied by the caller after classification.
pub fn is_heading_sized(profile: &FontProfile, font_size: f64) -> bool {
    profile
        .heading_sizes
        .iter()
        .any(|&s| (s - font_size).abs() < f64::EPSILON)
}
