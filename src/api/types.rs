//! Wire types for the studio API. Field names follow the JSON payloads;
//! unknown fields are ignored by serde's defaults.

use serde::{Deserialize, Serialize};

use crate::models::GalleryImage;

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Category as embedded inside a portfolio item (no id on the wire).
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRef {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioItem {
    pub id: i64,
    pub title: String,
    /// Full-size image URL.
    pub image: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
}

/// One page of the paginated portfolio listing. `next` is the DRF-style
/// next-page link; `null` signals end of data.
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioPage {
    pub results: Vec<PortfolioItem>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumImage {
    pub id: i64,
    pub image: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub images: Vec<AlbumImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PinVerification {
    pub valid: bool,
    #[serde(default)]
    pub album_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PinRequest<'a> {
    pub pin: &'a str,
    /// Omitted entirely for the PIN-only lookup; the response then names
    /// the album the PIN belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct DownloadRequest<'a> {
    pub album_id: &'a str,
    pub pin: &'a str,
}

impl PortfolioItem {
    /// Convert to the display model. `index` is the item's position in the
    /// whole sequence and seeds the masonry size hint.
    pub fn into_gallery_image(self, index: usize) -> GalleryImage {
        let mut img = GalleryImage::new(self.id.to_string(), self.image).with_masonry_hint(index);
        if !self.title.is_empty() {
            img.title = Some(self.title);
        }
        img.description = self.description;
        img
    }
}

impl AlbumImage {
    pub fn into_gallery_image(self, album_title: &str) -> GalleryImage {
        let mut img = GalleryImage::new(self.id.to_string(), self.image).with_square_hint();
        img.title = Some(album_title.to_string());
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portfolio_page_parses() {
        let raw = r#"{
            "results": [
                {"id": 7, "title": "Ana & Mihai", "image": "https://cdn/x.jpg",
                 "description": null, "category": {"name": "Weddings", "slug": "weddings"}}
            ],
            "next": "http://localhost:8000/api/portfolio/?page=2"
        }"#;
        let page: PortfolioPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].category.as_ref().unwrap().slug, "weddings");
        assert!(page.next.is_some());
    }

    #[test]
    fn test_next_null_is_end() {
        let raw = r#"{"results": [], "next": null}"#;
        let page: PortfolioPage = serde_json::from_str(raw).unwrap();
        assert!(page.next.is_none());
    }

    #[test]
    fn test_pin_verification_without_album_id() {
        let v: PinVerification = serde_json::from_str(r#"{"valid": false}"#).unwrap();
        assert!(!v.valid);
        assert!(v.album_id.is_none());
    }

    #[test]
    fn test_into_gallery_image_keeps_order_fields() {
        let item = PortfolioItem {
            id: 3,
            title: "Botez Maria".into(),
            image: "https://cdn/m.jpg".into(),
            description: Some("outdoor".into()),
            category: None,
        };
        let img = item.into_gallery_image(4);
        assert_eq!(img.id, "3");
        assert_eq!(img.url, "https://cdn/m.jpg");
        assert_eq!(img.title.as_deref(), Some("Botez Maria"));
        assert!(img.height > 0);
    }
}
