//! Classified listings: the persisted entity, submission validation and the
//! remote image admission check run before a listing is stored.

pub mod image_admission;

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::UserId;
use crate::error::{BazaarError, Result};

pub use image_admission::{
    AdmissionLimits, FetchError, ImageAdmission, ImageFetcher,
    ImageProbeResult, ProbeResponse, ReqwestImageFetcher,
};

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MIN_CHARS: usize = 10;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const PRICE_MIN: f64 = 0.0;
pub const PRICE_MAX: f64 = 1_000_000_000.0;
pub const IMAGE_URL_MAX_BYTES: usize = 2048;

/// Path extensions accepted for listing images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

pub type AdvertisementId = i64;

/// A stored listing as returned to clients.
///
/// `author_login` and `is_mine` are derived at read time from the owning
/// user and the viewer's session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Advertisement {
    pub id: AdvertisementId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub price: f64,
    pub author_login: String,
    pub is_mine: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A listing submission, owned by `user_id`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewAdvertisement {
    #[serde(skip)]
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub price: f64,
}

impl NewAdvertisement {
    /// Trim text fields in place and check every field, reporting all
    /// violations in a single `BadRequest`.
    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        self.image_url = self.image_url.trim().to_string();

        let mut violations: Vec<(&str, String)> = Vec::new();

        let title_len = self.title.chars().count();
        if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len) {
            violations.push((
                "title",
                format!(
                    "must be {TITLE_MIN_CHARS} to {TITLE_MAX_CHARS} characters"
                ),
            ));
        }

        let description_len = self.description.chars().count();
        if !(DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS)
            .contains(&description_len)
        {
            violations.push((
                "description",
                format!(
                    "must be {DESCRIPTION_MIN_CHARS} to {DESCRIPTION_MAX_CHARS} characters"
                ),
            ));
        }

        if !self.price.is_finite() || !(PRICE_MIN..=PRICE_MAX).contains(&self.price)
        {
            violations.push((
                "price",
                format!("must be between {PRICE_MIN} and {PRICE_MAX}"),
            ));
        }

        if let Err(err) = parse_image_url(&self.image_url) {
            violations.push(("image_url", err.to_string()));
        }

        if self.user_id <= 0 {
            violations.push(("user_id", "must be positive".to_string()));
        }

        if violations.is_empty() {
            return Ok(());
        }

        let mut message = String::from("validation failed");
        for (field, reason) in violations {
            let _ = write!(message, "; {field}: {reason}");
        }
        Err(BazaarError::bad_request(message))
    }
}

/// Static checks on a listing image URL, done before any network I/O.
pub fn parse_image_url(raw: &str) -> Result<Url> {
    if raw.is_empty() {
        return Err(BazaarError::bad_request("image url is empty"));
    }
    if raw.len() > IMAGE_URL_MAX_BYTES {
        return Err(BazaarError::bad_request(format!(
            "image url longer than {IMAGE_URL_MAX_BYTES} bytes"
        )));
    }

    let url = Url::parse(raw).map_err(|err| {
        BazaarError::bad_request(format!("invalid image url: {err}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(BazaarError::bad_request(
            "image url must be an absolute http(s) url",
        ));
    }

    let extension = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(BazaarError::bad_request(format!(
            "unsupported image extension {extension:?}"
        )));
    }

    Ok(url)
}
