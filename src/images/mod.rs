//! HTTP image pipeline for the gallery.
//!
//! - `ImageCache` - disk layer for fetched bytes, memory layer of decoded
//!   textures with LRU eviction
//! - `ImagePipeline` - worker pool fetching, decoding and caching images

pub mod cache;
pub mod fetch;

pub use cache::{CachedImage, ImageCache};
pub use fetch::{FetchKind, FetchResult, ImagePipeline};
