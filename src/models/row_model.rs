#[derive(Debug, Clone)]
pub struct RowItem {
    /// Index of the image in the flat gallery sequence.
    pub image_index: usize,
    /// URL used to resolve the tile texture.
    pub url: String,
    pub display_w: f32,
    pub display_h: f32,
    /// Tooltip text for the tile, when the item carries a title.
    pub tooltip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RowModel {
    pub row_index: u32,
    pub height_px: f32,
    pub items: Vec<RowItem>,
}

impl RowModel {
    pub fn new(row_index: u32, height_px: f32, items: Vec<RowItem>) -> Self {
        Self {
            row_index,
            height_px,
            items,
        }
    }
}
