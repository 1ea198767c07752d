//! Admission control for user-supplied remote image URLs.
//!
//! A URL is admitted only after two bounded network phases:
//!
//! 1. a `HEAD` probe, rejected on a non-2xx status, a declared length above
//!    [`MAX_IMAGE_BYTES`] or a declared non-`image/*` content type;
//! 2. a `GET` that reads at most [`SNIFF_LIMIT`] bytes of the body and
//!    decodes only the image header to learn its pixel dimensions.
//!
//! Both phases share one deadline and the caller's cancellation token.
//! Anything the remote side does wrong is a `BadRequest`; only a failure to
//! build the HTTP client is `Internal`.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, ImageReader};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use super::parse_image_url;
use crate::context::RequestContext;
use crate::error::{BazaarError, Result};

/// Largest declared `Content-Length` accepted by the probe (5 MiB).
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
/// Body prefix read for header decoding, regardless of the declared length.
pub const SNIFF_LIMIT: usize = 512 * 1024;
/// Largest accepted width or height, in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 4096;

const ACCEPTED_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Gif];

/// What the metadata probe saw. Header values are `None` when absent or
/// unparsable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS, redirect or body read failure.
    #[error("image request failed: {0}")]
    Transport(String),

    #[error("image server answered {0}")]
    Status(u16),
}

/// Outbound HTTP used by [`ImageAdmission`].
///
/// Dropping a returned future must abort the request; admission relies on
/// that for deadlines and cancellation.
#[async_trait]
pub trait ImageFetcher: Send + Sync + fmt::Debug {
    /// `HEAD url`, without following the body.
    async fn probe(&self, url: &Url) -> std::result::Result<ProbeResponse, FetchError>;

    /// `GET url`, returning at most `limit` bytes of the body.
    async fn fetch_prefix(
        &self,
        url: &Url,
        limit: usize,
    ) -> std::result::Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestImageFetcher {
    client: reqwest::Client,
}

impl ReqwestImageFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bazaar/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(3))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| {
                BazaarError::internal(format!(
                    "failed to build image HTTP client: {err}"
                ))
            })?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn transport(err: reqwest::Error) -> FetchError {
    FetchError::Transport(err.to_string())
}

#[async_trait]
impl ImageFetcher for ReqwestImageFetcher {
    async fn probe(&self, url: &Url) -> std::result::Result<ProbeResponse, FetchError> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(transport)?;

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        // Read the header itself; a HEAD response has no body to size.
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            content_type,
            content_length,
        })
    }

    async fn fetch_prefix(
        &self,
        url: &Url,
        limit: usize,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let mut prefix = Vec::with_capacity(limit.min(64 * 1024));
        while prefix.len() < limit {
            let Some(chunk) = response.chunk().await.map_err(transport)? else {
                break;
            };
            let take = chunk.len().min(limit - prefix.len());
            prefix.extend_from_slice(&chunk[..take]);
        }

        // Dropping the response here closes the connection on any unread
        // remainder.
        Ok(prefix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionLimits {
    pub max_bytes: u64,
    pub sniff_limit: usize,
    pub max_dimension: u32,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            max_bytes: MAX_IMAGE_BYTES,
            sniff_limit: SNIFF_LIMIT,
            max_dimension: MAX_IMAGE_DIMENSION,
        }
    }
}

/// Facts gathered about an admitted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageProbeResult {
    pub content_type: Option<String>,
    pub declared_byte_length: Option<u64>,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

#[derive(Clone)]
pub struct ImageAdmission {
    fetcher: Arc<dyn ImageFetcher>,
    timeout: Duration,
    limits: AdmissionLimits,
}

impl fmt::Debug for ImageAdmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAdmission")
            .field("fetcher", &self.fetcher)
            .field("timeout", &self.timeout)
            .field("limits", &self.limits)
            .finish()
    }
}

impl ImageAdmission {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, timeout: Duration) -> Self {
        Self {
            fetcher,
            timeout,
            limits: AdmissionLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: AdmissionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Decide whether `raw_url` may be attached to a listing.
    #[instrument(
        name = "image.admit",
        skip(self, ctx, raw_url),
        fields(request_id = %ctx.request_id(), host = tracing::field::Empty),
        err(Display)
    )]
    pub async fn admit(
        &self,
        ctx: &RequestContext,
        raw_url: &str,
    ) -> Result<ImageProbeResult> {
        let url = parse_image_url(raw_url)?;
        tracing::Span::current().record("host", url.host_str());

        let checks = tokio::time::timeout(self.timeout, self.check(&url));

        tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => {
                Err(BazaarError::bad_request("image check cancelled"))
            }
            outcome = checks => match outcome {
                Ok(result) => result,
                Err(_) => Err(BazaarError::bad_request(format!(
                    "image did not respond within {:?}",
                    self.timeout
                ))),
            },
        }
    }

    async fn check(&self, url: &Url) -> Result<ImageProbeResult> {
        let probe = self.fetcher.probe(url).await.map_err(rejected)?;

        if !(200..300).contains(&probe.status) {
            return Err(rejected(FetchError::Status(probe.status)));
        }

        if let Some(length) = probe.content_length
            && length > self.limits.max_bytes
        {
            return Err(BazaarError::bad_request(format!(
                "image is {length} bytes, limit is {}",
                self.limits.max_bytes
            )));
        }

        if let Some(content_type) = probe.content_type.as_deref()
            && !content_type.to_ascii_lowercase().starts_with("image/")
        {
            return Err(BazaarError::bad_request(format!(
                "expected an image/* content type, got {content_type:?}"
            )));
        }

        let prefix = self
            .fetcher
            .fetch_prefix(url, self.limits.sniff_limit)
            .await
            .map_err(rejected)?;
        let (width, height) = sniff_dimensions(&prefix)?;
        debug!(width, height, read = prefix.len(), "image header decoded");

        let max = self.limits.max_dimension;
        if width > max || height > max {
            return Err(BazaarError::bad_request(format!(
                "image is {width}x{height}, limit is {max}x{max}"
            )));
        }

        Ok(ImageProbeResult {
            content_type: probe.content_type,
            declared_byte_length: probe.content_length,
            pixel_width: width,
            pixel_height: height,
        })
    }
}

fn rejected(err: FetchError) -> BazaarError {
    BazaarError::bad_request(err.to_string())
}

/// Read `(width, height)` from the header of a PNG, JPEG or GIF without
/// decoding pixel data.
pub fn sniff_dimensions(prefix: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(prefix))
        .with_guessed_format()
        .map_err(|err| {
            BazaarError::bad_request(format!("unreadable image: {err}"))
        })?;

    match reader.format() {
        Some(format) if ACCEPTED_FORMATS.contains(&format) => {}
        Some(format) => {
            return Err(BazaarError::bad_request(format!(
                "unsupported image format {format:?}"
            )));
        }
        None => {
            return Err(BazaarError::bad_request("unrecognised image format"));
        }
    }

    reader.into_dimensions().map_err(|err| {
        BazaarError::bad_request(format!("unreadable image header: {err}"))
    })
}
