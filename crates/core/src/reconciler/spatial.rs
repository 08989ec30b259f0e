use crate::document::{AssetId, BoundingBox, ContentBlock, SpatialRelationship};
use crate::extractor::ExtractedImage;

/// Result of associating one extracted image with the text flow around it
/// (spec §4.1 step 8): the nearest content block on the same page by center
/// distance decides both the relationship label and the insertion point.
pub struct ImageAssociation {
    pub asset_id: AssetId,
    pub page_number: u32,
    pub bounding_box: BoundingBox,
    pub spatial_relationship: SpatialRelationship,
    /// Index into the page's block list the placeholder should be inserted
    /// before; `None` means append to the end of the page.
    pub insert_before_index: Option<usize>,
}

/// Associates each image with the nearest same-page block. An image with no
/// same-page text block at all is still emitted, anchored to the top of the
/// page (`Alongside`, insert at index 0) rather than silently dropped,
/// since invariant 4 requires every asset to surface as a block.
pub fn associate_images(
    images: &[ExtractedImage],
    page_blocks: &[ContentBlock],
    page_number: u32,
) -> Vec<ImageAssociation> {
    let same_page: Vec<&ExtractedImage> = images
        .iter()
        .filter(|img| img.page_index + 1 == page_number)
        .collect();

    let mut associations = Vec::with_capacity(same_page.len());
    for image in same_page {
        let nearest = page_blocks
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.bounding_box()
                    .distance_to(&image.bbox)
                    .partial_cmp(&b.bounding_box().distance_to(&image.bbox))
                    .unwrap()
            });

        let (relationship, insert_before_index) = match nearest {
            Some((idx, block)) => (relationship_to(&image.bbox, &block.bounding_box()), Some(idx)),
            None => (SpatialRelationship::Alongside, None),
        };

        associations.push(ImageAssociation {
            asset_id: AssetId::new(),
            page_number,
            bounding_box: image.bbox,
            spatial_relationship: relationship,
            insert_before_index,
        });
    }
    associations
}

fn relationship_to(image: &BoundingBox, text: &BoundingBox) -> SpatialRelationship {
    let (ix, iy) = image.center();
    let (tx, ty) = text.center();
    let dx = (ix - tx).abs();
    let dy = iy - ty;

    if dx > image.width.max(text.width) {
        return SpatialRelationship::Alongside;
    }
    if dy.abs() < image.height.min(text.height) * 0.5 {
        return SpatialRelationship::Wrapped;
    }
    if dy < 0.0 {
        SpatialRelationship::Before
    } else {
        SpatialRelationship::After
    }
}

/// Artifact filtering (spec §4.1 step 9): decorative/noise images below the
/// configured minimum dimensions or above the maximum aspect ratio are
/// dropped before association.
pub fn is_decorative(
    image: &ExtractedImage,
    min_width_px: u32,
    min_height_px: u32,
    max_aspect_ratio: f64,
) -> bool {
    let width = image.bbox.width as u32;
    let height = image.bbox.height as u32;
    width < min_width_px || height < min_height_px || image.aspect_ratio > max_aspect_ratio
        || image.aspect_ratio < 1.0 / max_aspect_ratio.max(1.0)
}

/// A text block is a repeating header/footer artifact if the same
/// normalized text appears on at least `min_repeat_pages` pages at a
/// near-identical vertical position (a frequency-based header/footer
/// stripping pass).
pub fn is_repeating_artifact(
    text: &str,
    bbox: &BoundingBox,
    page_height: f64,
    repeats: &std::collections::HashMap<(String, u32), usize>,
    min_repeat_pages: usize,
) -> bool {
    let band = if bbox.y <= page_height * 0.08 {
        0
    } else if bbox.y >= page_height * 0.92 {
        1
    } else {
        return false;
    };
    let key = (normalize_for_repeat_check(text), band);
    repeats.get(&key).copied().unwrap_or(0) >= min_repeat_pages
}

pub fn normalize_for_repeat_check(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A standalone integer in the top or bottom 10% of the page is a page
/// number, whether or not it repeats across pages (spec §4.1 step 9).
pub fn is_page_number_artifact(text: &str, bbox: &BoundingBox, page_height: f64) -> bool {
    let in_band = bbox.y <= page_height * 0.10 || bbox.y >= page_height * 0.90;
    in_band && text.trim().parse::<u64>().is_ok()
}

/// Boilerplate lines (copyright/confidentiality notices, bare URLs) are
/// stripped unconditionally, without requiring repetition across pages
/// (spec §4.1 step 9).
pub fn is_boilerplate_artifact(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("Copyright")
        || trimmed.starts_with('\u{00A9}')
        || trimmed.starts_with("Confidential")
        || trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BlockId, BlockMetadata, ParagraphBlock};

    fn text_block(x: f64, y: f64) -> ContentBlock {
        ContentBlock::Paragraph {
            id: BlockId::new(),
            page_number: 1,
            bounding_box: BoundingBox { x, y, width: 100.0, height: 10.0 },
            original_text: "body".to_string(),
            translated_text: None,
            metadata: BlockMetadata::default(),
            paragraph: ParagraphBlock { is_continuation: false },
        }
    }

    fn image(page_index: u32, x: f64, y: f64) -> ExtractedImage {
        ExtractedImage {
            binary: vec![],
            mime_type: "image/png".to_string(),
            bbox: BoundingBox { x, y, width: 80.0, height: 80.0 },
            page_index,
            min_dim_px: 80,
            aspect_ratio: 1.0,
        }
    }

    #[test]
    fn associates_image_above_text_as_before() {
        let blocks = vec![text_block(0.0, 100.0)];
        let images = vec![image(0, 0.0, 0.0)];
        let assoc = associate_images(&images, &blocks, 1);
        assert_eq!(assoc.len(), 1);
        assert_eq!(assoc[0].spatial_relationship, SpatialRelationship::Before);
    }

    #[test]
    fn skips_images_on_other_pages() {
        let blocks = vec![text_block(0.0, 100.0)];
        let images = vec![image(5, 0.0, 0.0)];
        assert!(associate_images(&images, &blocks, 1).is_empty());
    }

    #[test]
    fn decorative_image_below_minimum_dimensions_is_flagged() {
        let img = ExtractedImage {
            binary: vec![],
            mime_type: "image/png".to_string(),
            bbox: BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 },
            page_index: 0,
            min_dim_px: 10,
            aspect_ratio: 1.0,
        };
        assert!(is_decorative(&img, 50, 50, 20.0));
    }
}
