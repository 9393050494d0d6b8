//! Client side of the studio's REST API.
//!
//! - `ApiClient` — typed requests over `reqwest`
//! - `ApiError` — error taxonomy that drives pagination/retry behavior
//! - wire types for portfolio, categories, albums and PIN verification
//! - `Content-Disposition` filename resolution for archive downloads

pub mod client;
pub mod disposition;
pub mod error;
pub mod types;

pub use client::ApiClient;
pub use error::ApiError;
pub use types::*;

use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Runtime};

/// Shared I/O runtime for all HTTP work. GTK owns the main thread; every
/// request is spawned here and the result crosses back over a channel.
static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("obscura-io")
        .enable_all()
        .build()
        .expect("Failed to build I/O runtime")
});

pub fn runtime() -> &'static Runtime {
    &RUNTIME
}
