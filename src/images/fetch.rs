//! Worker pool fetching and decoding gallery images.
//!
//! Requests go in over a bounded flume queue; a few tasks on the shared
//! I/O runtime pull them, consult the disk cache, fetch over HTTP on a
//! miss, decode on the blocking pool and publish textures back to the GTK
//! main loop over an async channel. A pending set keeps duplicate
//! requests (same url, same size class) from being queued twice.

use std::collections::HashSet;
use std::sync::Arc;

use gdk4::prelude::*;
use gdk4::Texture;
use image::GenericImageView;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::cache::{CachedImage, ImageCache};
use crate::api::{self, ApiClient};

/// Number of concurrent fetch workers.
const FETCH_WORKERS: usize = 3;

/// Maximum number of queued requests.
const MAX_QUEUE_SIZE: usize = 256;

/// Longest side for grid tile decodes. Full decodes keep source size.
const TILE_MAX_DIM: u32 = 640;

/// Decode size class. Tiles are downscaled aggressively; the viewer gets
/// the full decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FetchKind {
    Tile = 0,
    Full = 1,
}

#[derive(Debug, Clone)]
struct FetchRequest {
    url: String,
    kind: FetchKind,
}

/// Completed fetch published to the main loop.
pub struct FetchResult {
    pub url: String,
    pub kind: FetchKind,
    pub texture: Option<Texture>,
    pub width: u32,
    pub height: u32,
    pub error: Option<String>,
}

pub struct ImagePipeline {
    request_tx: flume::Sender<FetchRequest>,
    result_rx: async_channel::Receiver<FetchResult>,
    pending: Arc<RwLock<HashSet<(String, FetchKind)>>>,
    cache: ImageCache,
}

impl ImagePipeline {
    pub fn new(client: ApiClient, cache: ImageCache) -> Self {
        let (request_tx, request_rx) = flume::bounded::<FetchRequest>(MAX_QUEUE_SIZE);
        let (result_tx, result_rx) = async_channel::unbounded::<FetchResult>();
        let pending: Arc<RwLock<HashSet<(String, FetchKind)>>> =
            Arc::new(RwLock::new(HashSet::new()));

        for worker_id in 0..FETCH_WORKERS {
            let rx = request_rx.clone();
            let tx = result_tx.clone();
            let client = client.clone();
            let cache = cache.clone();
            let pending = Arc::clone(&pending);
            api::runtime().spawn(async move {
                worker_loop(worker_id, rx, tx, client, cache, pending).await;
            });
        }

        debug!(workers = FETCH_WORKERS, "Started image fetch pipeline");

        Self {
            request_tx,
            result_rx,
            pending,
            cache,
        }
    }

    /// The receiver the main loop drains for completed fetches.
    pub fn results(&self) -> async_channel::Receiver<FetchResult> {
        self.result_rx.clone()
    }

    /// Memory-cache lookup; no request is made.
    pub fn cached(&self, url: &str, kind: FetchKind) -> Option<CachedImage> {
        self.cache.get_memory(url, kind)
    }

    /// Queue a fetch unless the texture is cached or already pending.
    ///
    /// Returns true when a new request was queued.
    pub fn request(&self, url: &str, kind: FetchKind) -> bool {
        if self.cache.contains_memory(url, kind) {
            return false;
        }
        let key = (url.to_string(), kind);
        {
            let mut pending = self.pending.write();
            if !pending.insert(key.clone()) {
                trace!(url, "Fetch already pending");
                return false;
            }
        }
        let queued = self
            .request_tx
            .try_send(FetchRequest {
                url: url.to_string(),
                kind,
            })
            .is_ok();
        if !queued {
            // Queue full; drop the reservation so a later scroll retries.
            self.pending.write().remove(&key);
            warn!(url, "Image fetch queue full, dropping request");
        }
        queued
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: flume::Receiver<FetchRequest>,
    tx: async_channel::Sender<FetchResult>,
    client: ApiClient,
    cache: ImageCache,
    pending: Arc<RwLock<HashSet<(String, FetchKind)>>>,
) {
    trace!(worker_id, "Fetch worker running");
    while let Ok(request) = rx.recv_async().await {
        let result = process(&client, &cache, &request).await;
        pending
            .write()
            .remove(&(request.url.clone(), request.kind));
        if tx.send(result).await.is_err() {
            break;
        }
    }
    trace!(worker_id, "Fetch worker stopped");
}

async fn process(client: &ApiClient, cache: &ImageCache, request: &FetchRequest) -> FetchResult {
    let url = request.url.clone();
    let kind = request.kind;

    let bytes = match cache.read_bytes(&url) {
        Some(bytes) => bytes,
        None => match client.fetch_image(&url).await {
            Ok(bytes) => {
                if let Err(err) = cache.write_bytes(&url, &bytes) {
                    warn!(%url, error = ?err, "Failed to cache image bytes");
                }
                bytes
            }
            Err(err) => {
                return FetchResult {
                    url,
                    kind,
                    texture: None,
                    width: 0,
                    height: 0,
                    error: Some(err.to_string()),
                };
            }
        },
    };

    let decoded =
        tokio::task::spawn_blocking(move || decode_to_texture(&bytes, kind)).await;
    match decoded {
        Ok(Ok((texture, width, height))) => {
            cache.insert_memory(&url, kind, CachedImage::new(texture.clone(), width, height));
            FetchResult {
                url,
                kind,
                texture: Some(texture),
                width,
                height,
                error: None,
            }
        }
        Ok(Err(err)) => FetchResult {
            url,
            kind,
            texture: None,
            width: 0,
            height: 0,
            error: Some(err.to_string()),
        },
        Err(err) => FetchResult {
            url,
            kind,
            texture: None,
            width: 0,
            height: 0,
            error: Some(format!("decode task failed: {err}")),
        },
    }
}

/// Decode encoded bytes into a GPU-uploadable texture, downscaling tiles.
fn decode_to_texture(bytes: &[u8], kind: FetchKind) -> anyhow::Result<(Texture, u32, u32)> {
    use anyhow::Context;

    let img = image::load_from_memory(bytes).context("Failed to decode image")?;
    let img = match kind {
        FetchKind::Tile => img.thumbnail(TILE_MAX_DIM, TILE_MAX_DIM),
        FetchKind::Full => img,
    };
    let (width, height) = img.dimensions();
    let rgba = img.to_rgba8();
    let data = glib::Bytes::from_owned(rgba.into_raw());
    let texture = gdk4::MemoryTexture::new(
        width.max(1) as i32,
        height.max(1) as i32,
        gdk4::MemoryFormat::R8g8b8a8,
        &data,
        (width.max(1) as usize) * 4,
    )
    .upcast();
    Ok((texture, width.max(1), height.max(1)))
}
