//! Test doubles for the persistence ports and outbound image fetches.
//!
//! Compiled for this crate's unit tests and, through the `testing` feature,
//! for integration tests of downstream crates.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use argon2::Params;
use async_trait::async_trait;
use chrono::Utc;
use image::{GrayImage, ImageFormat};
use parking_lot::Mutex;
use url::Url;

use crate::auth::UserId;
use crate::auth::crypto::{CredentialHasher, HASH_LENGTH};
use crate::context::RequestContext;
use crate::database::{
    AdvertisementRepository, ListingQuery, NewUser, SortField, SortOrder, User,
    UserRepository,
};
use crate::error::{BazaarError, Result};
use crate::kv::{KvError, KvResult, KvStore};
use crate::listing::{
    Advertisement, AdvertisementId, FetchError, ImageFetcher, NewAdvertisement,
    ProbeResponse,
};

/// Argon2id with minimal cost, so tests do not spend 64 MiB per hash.
pub fn fast_credential_hasher() -> CredentialHasher {
    let params = Params::new(1024, 1, 1, Some(HASH_LENGTH))
        .expect("minimal Argon2 parameters are valid");
    CredentialHasher::with_params(params)
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<Mutex<Vec<User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.lock().is_empty()
    }

    fn login_of(&self, id: UserId) -> Option<String> {
        self.users
            .lock()
            .iter()
            .find(|user| user.id == id)
            .map(|user| user.login.clone())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, _ctx: &RequestContext, user: NewUser) -> Result<User> {
        let mut users = self.users.lock();
        if users.iter().any(|existing| existing.login == user.login) {
            return Err(BazaarError::already_exists("login is already taken"));
        }

        let now = Utc::now();
        let stored = User {
            id: users.len() as UserId + 1,
            login: user.login,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.digest.hash.to_vec(),
            password_salt: user.digest.salt.to_vec(),
            created_at: now,
            updated_at: now,
        };
        users.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, _ctx: &RequestContext, id: UserId) -> Result<User> {
        self.users
            .lock()
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or_else(|| BazaarError::not_found(format!("user {id} not found")))
    }

    async fn find_by_login(
        &self,
        _ctx: &RequestContext,
        login: &str,
    ) -> Result<User> {
        self.users
            .lock()
            .iter()
            .find(|user| user.login == login)
            .cloned()
            .ok_or_else(|| BazaarError::not_found("user not found"))
    }
}

/// Listing store that resolves authors through an [`InMemoryUserRepository`].
#[derive(Debug, Clone)]
pub struct InMemoryAdvertisementRepository {
    users: InMemoryUserRepository,
    ads: Arc<Mutex<Vec<Advertisement>>>,
}

impl InMemoryAdvertisementRepository {
    pub fn new(users: InMemoryUserRepository) -> Self {
        Self {
            users,
            ads: Arc::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.ads.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ads.lock().is_empty()
    }

    fn view(ad: &Advertisement, viewer: Option<UserId>) -> Advertisement {
        Advertisement {
            is_mine: viewer == Some(ad.user_id),
            ..ad.clone()
        }
    }
}

#[async_trait]
impl AdvertisementRepository for InMemoryAdvertisementRepository {
    async fn create(
        &self,
        _ctx: &RequestContext,
        ad: &NewAdvertisement,
    ) -> Result<Advertisement> {
        let author_login = self
            .users
            .login_of(ad.user_id)
            .ok_or_else(|| BazaarError::bad_request("listing owner does not exist"))?;

        let mut ads = self.ads.lock();
        let now = Utc::now();
        let stored = Advertisement {
            id: ads.len() as AdvertisementId + 1,
            user_id: ad.user_id,
            title: ad.title.clone(),
            description: ad.description.clone(),
            image_url: ad.image_url.clone(),
            price: ad.price,
            author_login,
            is_mine: true,
            created_at: now,
            updated_at: now,
        };
        ads.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(
        &self,
        _ctx: &RequestContext,
        id: AdvertisementId,
        viewer: Option<UserId>,
    ) -> Result<Advertisement> {
        self.ads
            .lock()
            .iter()
            .find(|ad| ad.id == id)
            .map(|ad| Self::view(ad, viewer))
            .ok_or_else(|| {
                BazaarError::not_found(format!("advertisement {id} not found"))
            })
    }

    async fn list(
        &self,
        _ctx: &RequestContext,
        query: &ListingQuery,
        viewer: Option<UserId>,
    ) -> Result<Vec<Advertisement>> {
        let mut matching: Vec<Advertisement> = self
            .ads
            .lock()
            .iter()
            .filter(|ad| query.matches_price(ad.price))
            .map(|ad| Self::view(ad, viewer))
            .collect();

        matching.sort_by(|a, b| {
            let primary = match query.sort {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Price => a.price.total_cmp(&b.price),
            };
            primary.then(a.id.cmp(&b.id))
        });
        if query.order == SortOrder::Desc {
            matching.reverse();
        }

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(0);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

/// Canned remote image served by [`ScriptedFetcher`].
#[derive(Debug, Clone)]
pub struct ScriptedImage {
    pub status: u16,
    pub content_type: Option<String>,
    pub declared_length: Option<u64>,
    pub body: Vec<u8>,
    pub delay: Option<Duration>,
}

impl ScriptedImage {
    /// A 200 response whose declared length matches `body`.
    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.to_string()),
            declared_length: Some(body.len() as u64),
            body,
            delay: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_declared_length(mut self, length: u64) -> Self {
        self.declared_length = Some(length);
        self
    }

    pub fn without_content_type(mut self) -> Self {
        self.content_type = None;
        self
    }

    /// Delay applied to both the probe and the body fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// [`ImageFetcher`] that serves [`ScriptedImage`]s by exact URL and counts
/// calls. Unknown URLs fail as transport errors.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFetcher {
    images: Arc<Mutex<HashMap<String, ScriptedImage>>>,
    probes: Arc<AtomicUsize>,
    fetches: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, image: ScriptedImage) {
        self.images.lock().insert(url.to_string(), image);
    }

    pub fn probe_calls(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn lookup(&self, url: &Url) -> std::result::Result<ScriptedImage, FetchError> {
        let image = self.images.lock().get(url.as_str()).cloned();
        let image = image.ok_or_else(|| {
            FetchError::Transport(format!("connection refused: {url}"))
        })?;
        if let Some(delay) = image.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(image)
    }
}

#[async_trait]
impl ImageFetcher for ScriptedFetcher {
    async fn probe(&self, url: &Url) -> std::result::Result<ProbeResponse, FetchError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let image = self.lookup(url).await?;
        Ok(ProbeResponse {
            status: image.status,
            content_type: image.content_type,
            content_length: image.declared_length,
        })
    }

    async fn fetch_prefix(
        &self,
        url: &Url,
        limit: usize,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let image = self.lookup(url).await?;
        if !(200..300).contains(&image.status) {
            return Err(FetchError::Status(image.status));
        }
        let mut body = image.body;
        body.truncate(limit);
        Ok(body)
    }
}

/// [`KvStore`] whose every command fails, as when Redis is unreachable.
#[derive(Debug, Clone, Default)]
pub struct UnavailableKvStore;

impl UnavailableKvStore {
    fn fail<T>(command: &'static str) -> KvResult<T> {
        Err(KvError::command(command, "connection refused"))
    }
}

#[async_trait]
impl KvStore for UnavailableKvStore {
    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> KvResult<()> {
        Self::fail("SET")
    }

    async fn get(&self, _key: &str) -> KvResult<Option<String>> {
        Self::fail("GET")
    }

    async fn del(&self, _key: &str) -> KvResult<bool> {
        Self::fail("DEL")
    }

    async fn exists(&self, _key: &str) -> KvResult<bool> {
        Self::fail("EXISTS")
    }

    async fn sadd(&self, _key: &str, _member: &str) -> KvResult<()> {
        Self::fail("SADD")
    }

    async fn srem(&self, _key: &str, _member: &str) -> KvResult<()> {
        Self::fail("SREM")
    }

    async fn smembers(&self, _key: &str) -> KvResult<Vec<String>> {
        Self::fail("SMEMBERS")
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> KvResult<bool> {
        Self::fail("EXPIRE")
    }
}

/// A complete, decodable grayscale PNG of the given size.
pub fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    GrayImage::new(width, height)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("in-memory PNG encoding");
    bytes
}

/// PNG signature, `IHDR` declaring `width`x`height`, an empty `IDAT` and
/// `IEND`. Enough for header decoding without allocating pixel data.
pub fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    // 8-bit grayscale, deflate, adaptive filtering, no interlace.
    ihdr.extend_from_slice(&[8, 0, 0, 0, 0]);

    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    push_chunk(&mut png, b"IHDR", &ihdr);
    push_chunk(&mut png, b"IDAT", &[]);
    push_chunk(&mut png, b"IEND", &[]);
    png
}

fn push_chunk(png: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(kind);
    png.extend_from_slice(data);
    let mut crc = crc32fast::Hasher::new();
    crc.update(kind);
    crc.update(data);
    png.extend_from_slice(&crc.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_header_chunks_carry_valid_crcs() {
        let png = png_header(3, 5);
        // Every PNG ends with the same IEND chunk and CRC.
        assert!(png.ends_with(&[0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82]));

        let reader = image::ImageReader::new(Cursor::new(&png))
            .with_guessed_format()
            .unwrap();
        assert_eq!(reader.format(), Some(ImageFormat::Png));
        assert_eq!(reader.into_dimensions().unwrap(), (3, 5));
    }

    #[tokio::test]
    async fn in_memory_listing_orders_and_pages() {
        let ctx = RequestContext::new();
        let users = InMemoryUserRepository::new();
        let owner = users
            .create(
                &ctx,
                NewUser {
                    login: "seller".into(),
                    first_name: "Sam".into(),
                    last_name: "Seller".into(),
                    digest: fast_credential_hasher().hash("password1").unwrap(),
                },
            )
            .await
            .unwrap();
        let ads = InMemoryAdvertisementRepository::new(users);

        for price in [30.0, 10.0, 20.0] {
            let submission = NewAdvertisement {
                user_id: owner.id,
                title: format!("Item {price}"),
                description: "A perfectly fine item".into(),
                image_url: "https://example.com/a.png".into(),
                price,
            };
            ads.create(&ctx, &submission).await.unwrap();
        }

        let query = ListingQuery::from_params(
            Some(2),
            Some(0),
            Some("price"),
            Some("asc"),
            None,
            None,
        )
        .unwrap();
        let page = ads.list(&ctx, &query, None).await.unwrap();
        let prices: Vec<f64> = page.iter().map(|ad| ad.price).collect();
        assert_eq!(prices, vec![10.0, 20.0]);
        assert!(page.iter().all(|ad| !ad.is_mine));

        let mine = ads.list(&ctx, &query, Some(owner.id)).await.unwrap();
        assert!(mine.iter().all(|ad| ad.is_mine && ad.author_login == "seller"));
    }
}
