use std::fmt;
use std::sync::Arc;

use bazaar_core::auth::{CredentialHasher, CsrfGuard, SessionStore};
use bazaar_core::database::{AdvertisementRepository, UserRepository};
use bazaar_core::listing::ImageAdmission;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub advertisements: Arc<dyn AdvertisementRepository>,
    pub sessions: SessionStore,
    pub csrf: CsrfGuard,
    pub hasher: Arc<CredentialHasher>,
    pub image_admission: ImageAdmission,
    pub cookie_secure: bool,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.sessions)
            .field("cookie_secure", &self.cookie_secure)
            .finish_non_exhaustive()
    }
}
