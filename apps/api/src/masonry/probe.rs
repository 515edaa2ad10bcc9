//! Intrinsic dimension discovery for image references.
//!
//! `HttpDimensionProbe` streams the response body into a `HeaderBuffer` and stops
//! reading once the `image` crate can report a size, or after `MAX_HEADER_BYTES`.
//! `CachedProbe` memoizes successful probes so repeated layouts of the same gallery
//! do not refetch. `measure_each` runs up to `MAX_CONCURRENT_PROBES` probes at once
//! and reports results in completion order, which is what a layout session expects.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::masonry::engine::Dimensions;
use crate::masonry::item::LayoutRecord;

/// Bytes read from one image before giving up on finding its size.
pub const MAX_HEADER_BYTES: usize = 512 * 1024;

/// Probes in flight at once within one `measure_each` call.
pub const MAX_CONCURRENT_PROBES: usize = 8;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image fetch failed (status {status}): {url}")]
    Status { status: u16, url: String },

    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image reported unusable dimensions {width}x{height}")]
    Unusable { width: u32, height: u32 },

    #[error("no image header found in the first {limit} bytes")]
    HeaderTooLarge { limit: usize },
}

/// Resolves an image reference to its intrinsic size.
///
/// Carried in `AppState` as `Arc<dyn DimensionProbe>`.
#[async_trait]
pub trait DimensionProbe: Send + Sync {
    async fn probe(&self, image_ref: &str) -> Result<Dimensions, ProbeError>;
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP backend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct HttpDimensionProbe {
    client: Client,
}

impl HttpDimensionProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build image probe HTTP client")?;
        Ok(Self { client })
    }

    async fn read_header(&self, url: &str) -> Result<Dimensions, ProbeError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut header = HeaderBuffer::new(MAX_HEADER_BYTES);
        while let Some(chunk) = response.chunk().await? {
            if let Some(dimensions) = header.push(&chunk)? {
                // dropping the response abandons the rest of the body
                return Ok(dimensions);
            }
        }
        header.finish()
    }
}

#[async_trait]
impl DimensionProbe for HttpDimensionProbe {
    async fn probe(&self, image_ref: &str) -> Result<Dimensions, ProbeError> {
        let dimensions = self.read_header(image_ref).await?;
        debug!(
            image_ref,
            width = dimensions.width,
            height = dimensions.height,
            "probed image"
        );
        Ok(dimensions)
    }
}

/// Accumulates the start of an encoded image until its size can be read.
pub struct HeaderBuffer {
    buf: BytesMut,
    limit: usize,
}

impl HeaderBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
        }
    }

    /// Appends a chunk and returns the size once the buffered prefix holds it.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<Dimensions>, ProbeError> {
        let room = self.limit.saturating_sub(self.buf.len());
        self.buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        match decode_dimensions(&self.buf) {
            Ok(dimensions) => Ok(Some(dimensions)),
            Err(e @ ProbeError::Unusable { .. }) => Err(e),
            Err(_) if self.buf.len() >= self.limit => {
                Err(ProbeError::HeaderTooLarge { limit: self.limit })
            }
            Err(_) => Ok(None),
        }
    }

    /// End of stream before the limit: the whole body is buffered.
    pub fn finish(self) -> Result<Dimensions, ProbeError> {
        decode_dimensions(&self.buf)
    }
}

/// Reads the pixel size from an encoded image header without decoding pixels.
pub fn decode_dimensions(bytes: &[u8]) -> Result<Dimensions, ProbeError> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    if width == 0 || height == 0 {
        return Err(ProbeError::Unusable { width, height });
    }
    Ok(Dimensions::new(width as f64, height as f64))
}

// ────────────────────────────────────────────────────────────────────────────
// Cache
// ────────────────────────────────────────────────────────────────────────────

/// Memoizes successful probes by image reference. Failures are never cached.
pub struct CachedProbe<P> {
    inner: P,
    cache: RwLock<HashMap<String, Dimensions>>,
}

impl<P: DimensionProbe> CachedProbe<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn cached(&self, image_ref: &str) -> Option<Dimensions> {
        self.cache.read().await.get(image_ref).copied()
    }
}

#[async_trait]
impl<P: DimensionProbe> DimensionProbe for CachedProbe<P> {
    async fn probe(&self, image_ref: &str) -> Result<Dimensions, ProbeError> {
        if let Some(hit) = self.cached(image_ref).await {
            return Ok(hit);
        }
        let dimensions = self.inner.probe(image_ref).await?;
        self.cache
            .write()
            .await
            .insert(image_ref.to_string(), dimensions);
        Ok(dimensions)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Batch measurement
// ────────────────────────────────────────────────────────────────────────────

/// Probes every record, at most `MAX_CONCURRENT_PROBES` at a time, calling
/// `on_measured(id, dimensions)` as each probe finishes. A failed probe reports `None`; the item falls back to the
/// record's stored dimensions, if any.
pub async fn measure_each<F>(
    probe: Arc<dyn DimensionProbe>,
    records: &[LayoutRecord],
    mut on_measured: F,
) where
    F: FnMut(String, Option<Dimensions>),
{
    let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_PROBES));
    let mut probes = JoinSet::new();
    for record in records {
        let probe = Arc::clone(&probe);
        let permits = Arc::clone(&permits);
        let id = record.id.clone();
        let image_ref = record.image_ref.clone();
        probes.spawn(async move {
            // held until the probe finishes
            let _permit = permits.acquire_owned().await.ok();
            let outcome = probe.probe(&image_ref).await;
            (id, image_ref, outcome)
        });
    }

    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok((id, _, Ok(dimensions))) => on_measured(id, Some(dimensions)),
            Ok((id, image_ref, Err(e))) => {
                warn!(id = %id, image_ref = %image_ref, "image probe failed: {e}");
                on_measured(id, None);
            }
            Err(e) => warn!("image probe task failed: {e}"),
        }
    }
}

/// Collects `measure_each` results in completion order.
pub async fn measure_all(
    probe: Arc<dyn DimensionProbe>,
    records: &[LayoutRecord],
) -> Vec<(String, Option<Dimensions>)> {
    let mut measured = Vec::with_capacity(records.len());
    measure_each(probe, records, |id, dimensions| measured.push((id, dimensions))).await;
    measured
}
