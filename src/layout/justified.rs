use crate::models::{GalleryImage, RowItem, RowModel};

/// Configuration for the gallery flow layout.
///
/// Items are placed left-to-right with a shared tile height and a small
/// gap. Width follows the source aspect ratio, so appended pages extend
/// the row list without disturbing rows already laid out.
#[derive(Debug, Clone)]
pub struct JustifiedLayout {
    /// Target row height in pixels (default: 280)
    pub target_height: f32,
    /// Minimum allowed row height in pixels (default: 1)
    pub min_height: f32,
    /// Maximum allowed row height in pixels (default: 10000)
    pub max_height: f32,
    /// Gap between items in a row in pixels (default: 12)
    pub gap: f32,
}

impl Default for JustifiedLayout {
    fn default() -> Self {
        Self {
            target_height: 280.0,
            min_height: 1.0,
            max_height: 10_000.0,
            gap: 12.0,
        }
    }
}

impl JustifiedLayout {
    fn clamp_tile_height(&self, h: f32) -> f32 {
        h.clamp(self.min_height, self.max_height).max(1.0)
    }

    fn tile_dimensions(&self, item: &GalleryImage) -> (f32, f32) {
        let ar = item.aspect_ratio().clamp(0.2, 5.0);
        let height = self.clamp_tile_height(self.target_height.max(1.0));
        let width = (height * ar).max(1.0);
        (width, height)
    }

    fn row_wrap_limit(&self, viewport_width: f32) -> f32 {
        viewport_width.max(1.0)
    }

    /// Creates a new JustifiedLayout with custom parameters.
    #[cfg(test)]
    pub fn new(target_height: f32, min_height: f32, max_height: f32, gap: f32) -> Self {
        Self {
            target_height,
            min_height,
            max_height,
            gap,
        }
    }

    /// Computes the fixed-height flow layout for a gallery sequence.
    ///
    /// # Algorithm
    /// 1. Compute per-item tile dimensions using a shared tile height.
    /// 2. Stream items left-to-right, wrapping at the viewport width.
    /// 3. Keep sequence order: item i always precedes item i+1.
    ///
    /// # Returns
    /// A vector of RowModels describing each row's height and item
    /// dimensions; `RowItem::image_index` points back into `items`.
    pub fn compute(&self, items: &[GalleryImage], viewport_width: f32) -> Vec<RowModel> {
        if items.is_empty() || viewport_width <= 0.0 {
            return Vec::new();
        }

        let mut rows = Vec::new();
        let mut row_index = 0u32;
        let mut pending_items: Vec<RowItem> = Vec::new();
        let mut row_width = 0.0f32;
        let mut row_height = 1.0f32;
        let row_wrap_limit = self.row_wrap_limit(viewport_width);

        for (image_index, item) in items.iter().enumerate() {
            let (item_w, item_h) = self.tile_dimensions(item);
            if !pending_items.is_empty() {
                let required_width = row_width + self.gap + item_w;
                if required_width > row_wrap_limit {
                    rows.push(RowModel::new(
                        row_index,
                        row_height,
                        std::mem::take(&mut pending_items),
                    ));
                    row_index += 1;
                    row_width = 0.0;
                    row_height = 1.0;
                }
            }

            if !pending_items.is_empty() {
                row_width += self.gap;
            }
            pending_items.push(RowItem {
                image_index,
                url: item.url.clone(),
                display_w: item_w,
                display_h: item_h,
                tooltip: tooltip_for(item),
            });
            row_width += item_w;
            row_height = row_height.max(item_h);
        }

        if !pending_items.is_empty() {
            rows.push(RowModel::new(row_index, row_height, pending_items));
        }

        rows
    }
}

fn tooltip_for(item: &GalleryImage) -> Option<String> {
    match (&item.title, &item.description) {
        (Some(title), Some(description)) => Some(format!("{title}\n{description}")),
        (Some(title), None) => Some(title.clone()),
        (None, Some(description)) => Some(description.clone()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_item(id: &str, width: u32, height: u32) -> GalleryImage {
        let mut item = GalleryImage::new(id.into(), format!("http://img/{id}.jpg"));
        item.width = width;
        item.height = height;
        item
    }

    #[test]
    fn test_empty_items() {
        let layout = JustifiedLayout::default();
        let rows = layout.compute(&[], 1920.0);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_single_item() {
        let layout = JustifiedLayout::default();
        let items = vec![make_item("a", 1920, 1080)];
        let rows = layout.compute(&items, 1920.0);

        assert_eq!(rows.len(), 1);
        let (_, expected_h) = layout.tile_dimensions(&items[0]);
        assert!((rows[0].height_px - expected_h).abs() < 0.01);
    }

    #[test]
    fn test_multiple_rows_keep_all_items() {
        let layout = JustifiedLayout::default();
        let items: Vec<GalleryImage> = (0..12)
            .map(|i| make_item(&i.to_string(), 1920, 1080))
            .collect();

        let rows = layout.compute(&items, 1920.0);

        assert!(rows.len() > 1, "Expected > 1 rows, got {}", rows.len());
        let total_items: usize = rows.iter().map(|r| r.items.len()).sum();
        assert_eq!(total_items, items.len());
    }

    #[test]
    fn test_indices_preserve_sequence_order() {
        let layout = JustifiedLayout::default();
        let items: Vec<GalleryImage> = (0..15)
            .map(|i| make_item(&i.to_string(), 1600, 900))
            .collect();

        let rows = layout.compute(&items, 1280.0);
        let flat: Vec<usize> = rows
            .iter()
            .flat_map(|r| r.items.iter().map(|i| i.image_index))
            .collect();
        let expected: Vec<usize> = (0..items.len()).collect();
        assert_eq!(flat, expected);
    }

    #[test]
    fn test_panorama_keeps_uniform_height() {
        let layout = JustifiedLayout::default();
        let viewport = 3000.0;
        let items = vec![make_item("pano", 12000, 1000)];
        let rows = layout.compute(&items, viewport);
        assert_eq!(rows.len(), 1);
        assert!(
            (rows[0].height_px - layout.target_height).abs() < 0.01,
            "expected panorama tile height to stay at target height"
        );
    }

    #[test]
    fn test_mixed_aspect_ratios_share_height() {
        let layout = JustifiedLayout::default();
        let items = vec![
            make_item("wide", 1920, 1080),
            make_item("square", 1000, 1000),
            make_item("tall", 1080, 1920),
            make_item("wide2", 2560, 1080),
        ];

        let rows = layout.compute(&items, 1920.0);

        let total_items: usize = rows.iter().map(|r| r.items.len()).sum();
        assert_eq!(total_items, items.len());

        for row in &rows {
            for item in &row.items {
                assert!((item.display_h - layout.target_height).abs() < 0.01);
            }
        }
    }

    #[test]
    fn test_rows_never_exceed_viewport_with_gap() {
        let layout = JustifiedLayout::new(220.0, 1.0, 10_000.0, 12.0);
        let items: Vec<GalleryImage> = (0..20)
            .map(|i| make_item(&i.to_string(), 1500, 1000))
            .collect();

        let viewport = 1600.0;
        let rows = layout.compute(&items, viewport);
        for row in &rows {
            let width: f32 = row.items.iter().map(|i| i.display_w).sum::<f32>()
                + layout.gap * (row.items.len().saturating_sub(1)) as f32;
            assert!(
                width <= viewport + 0.01 || row.items.len() == 1,
                "row width {width} exceeds viewport"
            );
        }
    }

    #[test]
    fn test_unknown_dimensions_use_fallback_aspect() {
        let layout = JustifiedLayout::default();
        let items = vec![make_item("unknown", 0, 0)];
        let rows = layout.compute(&items, 1920.0);
        assert_eq!(rows.len(), 1);
        let tile = &rows[0].items[0];
        assert!((tile.display_w / tile.display_h - 1.5).abs() < 0.01);
    }
}
