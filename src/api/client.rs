//! Typed HTTP client for the studio API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use futures_util::StreamExt;
use reqwest::Response;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::disposition::archive_filename;
use super::error::ApiError;
use super::types::{Album, Category, DownloadRequest, PinRequest, PinVerification, PortfolioPage};
use crate::config::Config;

/// Timeout for JSON endpoints. Keeps a hung fetch from pinning the
/// pagination guard forever; the timeout surfaces as a transient error.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Image fetches can be larger; archive downloads get no overall deadline.
const IMAGE_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("obscura/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        info!(api_url = %config.api_url, "API client ready");
        Ok(Self {
            http,
            base: config.api_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
        response.json::<T>().await.map_err(ApiError::from)
    }

    /// `GET /portfolio/?category=<slug>&page=<n>`. Category is omitted for
    /// the unfiltered view, `page` only from 2 on (matching the site).
    pub async fn fetch_portfolio(
        &self,
        category: Option<&str>,
        page: u32,
    ) -> Result<PortfolioPage, ApiError> {
        let mut request = self.http.get(self.url("/portfolio/")).timeout(REQUEST_TIMEOUT);
        if let Some(slug) = category {
            request = request.query(&[("category", slug)]);
        }
        if page > 1 {
            request = request.query(&[("page", page.to_string().as_str())]);
        }
        debug!(?category, page, "Fetching portfolio page");
        Self::decode(request.send().await?).await
    }

    /// `GET /categories/`
    pub async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
        let request = self
            .http
            .get(self.url("/categories/"))
            .timeout(REQUEST_TIMEOUT);
        Self::decode(request.send().await?).await
    }

    /// `POST /verify-pin/`. `album_id` is optional: without it the server
    /// resolves which album the PIN unlocks.
    pub async fn verify_pin(
        &self,
        pin: &str,
        album_id: Option<&str>,
    ) -> Result<PinVerification, ApiError> {
        let request = self
            .http
            .post(self.url("/verify-pin/"))
            .json(&PinRequest { pin, album_id })
            .timeout(REQUEST_TIMEOUT);
        Self::decode(request.send().await?).await
    }

    /// `GET /albums/:id/`
    pub async fn fetch_album(&self, id: &str) -> Result<Album, ApiError> {
        let request = self
            .http
            .get(self.url(&format!("/albums/{id}/")))
            .timeout(REQUEST_TIMEOUT);
        Self::decode(request.send().await?).await
    }

    /// Fetch raw image bytes (grid tiles and viewer images).
    pub async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.http.get(url).timeout(IMAGE_TIMEOUT).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// `POST /download-album/`: stream the archive into `dest_dir`.
    ///
    /// The filename comes from the `Content-Disposition` header; the
    /// archive is written chunk by chunk, never buffered whole.
    pub async fn download_album(
        &self,
        album_id: &str,
        pin: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, ApiError> {
        let response = self
            .http
            .post(self.url("/download-album/"))
            .json(&DownloadRequest { album_id, pin })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let filename = archive_filename(disposition.as_deref(), album_id);
        let path = unique_destination(dest_dir, &filename);

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ApiError::Unexpected(format!("cannot create {}: {e}", path.display())))?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::Unexpected(format!("write failed: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::Unexpected(format!("write failed: {e}")))?;

        info!(album_id, bytes = written, path = %path.display(), "Album archive saved");
        Ok(path)
    }
}

/// Pick a destination that does not clobber an existing file: `name.zip`,
/// `name (1).zip`, `name (2).zip`, ...
fn unique_destination(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
        _ => (filename.to_string(), None),
    };
    for n in 1.. {
        let name = match &ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_destination_avoids_existing() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_destination(dir.path(), "album.zip");
        assert_eq!(first, dir.path().join("album.zip"));
        std::fs::write(&first, b"x").unwrap();

        let second = unique_destination(dir.path(), "album.zip");
        assert_eq!(second, dir.path().join("album (1).zip"));
        std::fs::write(&second, b"x").unwrap();

        let third = unique_destination(dir.path(), "album.zip");
        assert_eq!(third, dir.path().join("album (2).zip"));
    }

    #[test]
    fn test_unique_destination_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_destination(dir.path(), "archive");
        std::fs::write(&first, b"x").unwrap();
        let second = unique_destination(dir.path(), "archive");
        assert_eq!(second, dir.path().join("archive (1)"));
    }
}
