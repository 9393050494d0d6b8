/// A single displayable image in a gallery sequence.
///
/// The order of `GalleryImage` values inside their containing `Vec` is
/// significant: it defines grid placement and viewer navigation order.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryImage {
    /// Opaque identifier from the backend (portfolio item or album image id).
    pub id: String,
    /// Resolvable URL of the full-size image.
    pub url: String,
    /// Display title, when the backend provides one.
    pub title: Option<String>,
    /// Optional longer description shown in tooltips.
    pub description: Option<String>,
    /// Layout size hint in pixels. The API carries no dimensions, so these
    /// start as synthetic hints and only matter as an aspect ratio.
    pub width: u32,
    pub height: u32,
}

/// Tile heights cycled to give the portfolio grid its staggered look,
/// mirroring the studio site's masonry columns.
const HINT_HEIGHTS: [u32; 6] = [300, 400, 350, 450, 380, 320];
const HINT_WIDTH: u32 = 400;

impl GalleryImage {
    pub fn new(id: String, url: String) -> Self {
        Self {
            id,
            url,
            title: None,
            description: None,
            width: 0,
            height: 0,
        }
    }

    /// Assign the synthetic masonry size hint for an item at `index` in its
    /// sequence. Stable for a given index, varied across neighbors.
    pub fn with_masonry_hint(mut self, index: usize) -> Self {
        self.width = HINT_WIDTH;
        self.height = HINT_HEIGHTS[index % HINT_HEIGHTS.len()];
        self
    }

    /// Square hint used for album grids.
    pub fn with_square_hint(mut self) -> Self {
        self.width = HINT_WIDTH;
        self.height = HINT_WIDTH;
        self
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            // Unknown dimensions; assume a landscape photograph.
            1.5
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_fallback() {
        let img = GalleryImage::new("1".into(), "http://x/a.jpg".into());
        assert!((img.aspect_ratio() - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_masonry_hint_cycles() {
        let a = GalleryImage::new("1".into(), "u".into()).with_masonry_hint(0);
        let b = GalleryImage::new("2".into(), "u".into()).with_masonry_hint(6);
        assert_eq!(a.height, b.height);
        let c = GalleryImage::new("3".into(), "u".into()).with_masonry_hint(1);
        assert_ne!(a.height, c.height);
    }
}
