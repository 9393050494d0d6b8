//! Image caching with both disk and memory layers.
//!
//! - Disk cache: fetched (still encoded) bytes in XDG_CACHE_HOME/obscura/images/
//! - Memory cache: LRU cache of GdkTexture with configurable size limit
//!
//! Filenames are based on xxhash of the image URL; the backend serves
//! immutable image URLs, so no further invalidation input is needed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use gdk4::Texture;
use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::fetch::FetchKind;

/// Default memory cache size in megabytes.
const DEFAULT_MAX_MEMORY_MB: usize = 192;

/// Minimum memory cache size in megabytes.
const MIN_MEMORY_MB: usize = 64;

/// Maximum memory cache size in megabytes.
const MAX_MEMORY_MB: usize = 512;

/// Estimated bytes per pixel for RGBA textures.
const BYTES_PER_PIXEL: usize = 4;

/// Bump when cache semantics change (e.g. decode size policy).
const CACHE_VERSION: u8 = 1;

/// Default capacity for the LRU cache (number of entries).
const DEFAULT_LRU_CAPACITY: usize = 2048;

/// Memory budget from `OBSCURA_CACHE_MB`, clamped on use.
pub fn max_memory_mb_from_env() -> usize {
    std::env::var("OBSCURA_CACHE_MB")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_MAX_MEMORY_MB)
}

/// A cached decoded image ready for display.
#[derive(Clone)]
pub struct CachedImage {
    pub texture: Texture,
    pub width: u32,
    pub height: u32,
    pub memory_bytes: usize,
}

impl CachedImage {
    pub fn new(texture: Texture, width: u32, height: u32) -> Self {
        let memory_bytes = (width as usize) * (height as usize) * BYTES_PER_PIXEL;
        Self {
            texture,
            width,
            height,
            memory_bytes,
        }
    }
}

/// Cache key for texture lookups: url plus the decode size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: u64,
}

impl CacheKey {
    pub fn new(url: &str, kind: FetchKind) -> Self {
        let mut data = Vec::with_capacity(url.len() + 2);
        data.push(CACHE_VERSION);
        data.push(kind as u8);
        data.extend_from_slice(url.as_bytes());
        Self {
            hash: xxh3_64(&data),
        }
    }

    /// Disk entries hold the fetched bytes, shared by both decode kinds.
    fn disk_hash(url: &str) -> u64 {
        let mut data = Vec::with_capacity(url.len() + 1);
        data.push(CACHE_VERSION);
        data.extend_from_slice(url.as_bytes());
        xxh3_64(&data)
    }

    pub fn disk_filename(url: &str) -> String {
        format!("{:016x}.img", Self::disk_hash(url))
    }
}

/// Image cache with disk and memory layers.
pub struct ImageCache {
    cache_dir: PathBuf,
    max_memory_bytes: usize,
    current_memory_bytes: Arc<RwLock<usize>>,
    memory_cache: Arc<RwLock<LruCache<CacheKey, CachedImage>>>,
}

impl ImageCache {
    pub fn new(cache_dir: PathBuf, max_memory_mb: usize) -> Self {
        let max_memory_mb = max_memory_mb.clamp(MIN_MEMORY_MB, MAX_MEMORY_MB);
        let max_memory_bytes = max_memory_mb * 1024 * 1024;

        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            warn!(?cache_dir, error = ?e, "Failed to create cache directory");
        }

        debug!(?cache_dir, max_memory_mb, "Initialized image cache");

        Self {
            cache_dir,
            max_memory_bytes,
            current_memory_bytes: Arc::new(RwLock::new(0)),
            memory_cache: Arc::new(RwLock::new(LruCache::new(
                std::num::NonZeroUsize::new(DEFAULT_LRU_CAPACITY).unwrap(),
            ))),
        }
    }

    /// Create an image cache using the default XDG cache directory.
    pub fn new_default(max_memory_mb: usize) -> Result<Self> {
        Ok(Self::new(Self::default_cache_dir()?, max_memory_mb))
    }

    pub fn default_cache_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "obscura")
            .context("Failed to determine project directories")?;
        Ok(proj_dirs.cache_dir().join("images"))
    }

    /// Get a decoded texture from the memory cache.
    pub fn get_memory(&self, url: &str, kind: FetchKind) -> Option<CachedImage> {
        self.memory_cache
            .write()
            .get(&CacheKey::new(url, kind))
            .cloned()
    }

    pub fn contains_memory(&self, url: &str, kind: FetchKind) -> bool {
        self.memory_cache
            .read()
            .contains(&CacheKey::new(url, kind))
    }

    /// Add an entry to the memory cache, evicting if necessary.
    pub fn insert_memory(&self, url: &str, kind: FetchKind, cached: CachedImage) {
        let new_size = cached.memory_bytes;
        self.evict_if_needed(new_size);

        let mut cache = self.memory_cache.write();
        if let Some(old) = cache.put(CacheKey::new(url, kind), cached) {
            let mut current = self.current_memory_bytes.write();
            *current = current.saturating_sub(old.memory_bytes);
        }
        *self.current_memory_bytes.write() += new_size;
    }

    fn evict_if_needed(&self, needed_bytes: usize) {
        let mut current = self.current_memory_bytes.write();
        if *current + needed_bytes <= self.max_memory_bytes {
            return;
        }

        let mut cache = self.memory_cache.write();
        while *current + needed_bytes > self.max_memory_bytes {
            if let Some((_, evicted)) = cache.pop_lru() {
                *current = current.saturating_sub(evicted.memory_bytes);
                trace!(
                    evicted_bytes = evicted.memory_bytes,
                    current_bytes = *current,
                    "Evicted texture from memory cache"
                );
            } else {
                break;
            }
        }
    }

    fn disk_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(CacheKey::disk_filename(url))
    }

    /// Read the fetched bytes for `url` from the disk layer.
    pub fn read_bytes(&self, url: &str) -> Option<Vec<u8>> {
        let path = self.disk_path(url);
        match std::fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => {
                trace!(url, "Disk cache hit");
                Some(bytes)
            }
            Ok(_) => {
                // Zero-length entries are leftovers of interrupted writes.
                let _ = std::fs::remove_file(&path);
                None
            }
            Err(_) => None,
        }
    }

    /// Store fetched bytes on disk. Written via a temp file so a crash
    /// mid-write never leaves a readable partial entry.
    pub fn write_bytes(&self, url: &str, bytes: &[u8]) -> Result<()> {
        let path = self.disk_path(url);
        let tmp = path.with_extension("part");
        std::fs::write(&tmp, bytes)
            .with_context(|| format!("Failed to write cache entry for {url}"))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to finalize cache entry for {url}"))?;
        Ok(())
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory_bytes
    }
}

impl Clone for ImageCache {
    fn clone(&self) -> Self {
        Self {
            cache_dir: self.cache_dir.clone(),
            max_memory_bytes: self.max_memory_bytes,
            current_memory_bytes: Arc::clone(&self.current_memory_bytes),
            memory_cache: Arc::clone(&self.memory_cache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_separates_kinds() {
        let url = "https://cdn/x.jpg";
        assert_eq!(
            CacheKey::new(url, FetchKind::Tile),
            CacheKey::new(url, FetchKind::Tile)
        );
        assert_ne!(
            CacheKey::new(url, FetchKind::Tile),
            CacheKey::new(url, FetchKind::Full)
        );
        assert_ne!(
            CacheKey::new(url, FetchKind::Tile),
            CacheKey::new("https://cdn/y.jpg", FetchKind::Tile)
        );
    }

    #[test]
    fn test_disk_filename_shape() {
        let filename = CacheKey::disk_filename("https://cdn/x.jpg");
        assert!(filename.ends_with(".img"));
        assert_eq!(filename.len(), 20); // 16 hex + ".img"
    }

    #[test]
    fn test_memory_limit_clamping() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ImageCache::new(dir.path().to_path_buf(), 10);
        assert_eq!(cache.max_memory(), MIN_MEMORY_MB * 1024 * 1024);

        let cache = ImageCache::new(dir.path().to_path_buf(), 1000);
        assert_eq!(cache.max_memory(), MAX_MEMORY_MB * 1024 * 1024);

        let cache = ImageCache::new(dir.path().to_path_buf(), 200);
        assert_eq!(cache.max_memory(), 200 * 1024 * 1024);
    }

    #[test]
    fn test_disk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ImageCache::new(dir.path().to_path_buf(), 64);
        let url = "https://cdn/a.jpg";

        assert!(cache.read_bytes(url).is_none());
        cache.write_bytes(url, b"jpeg-bytes").unwrap();
        assert_eq!(cache.read_bytes(url).as_deref(), Some(&b"jpeg-bytes"[..]));
        // Other URLs stay independent.
        assert!(cache.read_bytes("https://cdn/b.jpg").is_none());
    }
}
