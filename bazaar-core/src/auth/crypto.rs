use argon2::{Algorithm, Argon2, Params, Version};
use constant_time_eq::constant_time_eq;
use rand::{TryRngCore, rngs::OsRng};
use zeroize::Zeroizing;

use crate::error::{BazaarError, Result};

/// Length of the random per-credential salt, in bytes.
pub const SALT_LENGTH: usize = 8;
/// Length of the derived password digest, in bytes.
pub const HASH_LENGTH: usize = 32;

// Stored hashes depend on these; changing any of them requires a migration.
const TIME_COST: u32 = 2;
const MEMORY_COST_KIB: u32 = 64 * 1024; // 64 MiB
const PARALLELISM: u32 = 2;

/// Salt and digest pair persisted alongside a login.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest {
    pub salt: [u8; SALT_LENGTH],
    pub hash: [u8; HASH_LENGTH],
}

impl std::fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordDigest").finish_non_exhaustive()
    }
}

/// Argon2id password hashing with raw salt/hash storage.
///
/// The hasher holds only its parameter set. Every call to [`hash`] draws a
/// fresh salt from the operating system CSPRNG, so two hashes of the same
/// password never share a salt.
///
/// [`hash`]: CredentialHasher::hash
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    /// Build a hasher with the production parameters (t=2, m=64 MiB, p=2).
    pub fn new() -> Result<Self> {
        let params = Params::new(
            MEMORY_COST_KIB,
            TIME_COST,
            PARALLELISM,
            Some(HASH_LENGTH),
        )
        .map_err(|err| {
            BazaarError::internal(format!("invalid Argon2 parameters: {err}"))
        })?;
        Ok(Self::with_params(params))
    }

    /// Build a hasher with caller-specified parameters (useful for tests or
    /// constrained environments). The output length must be [`HASH_LENGTH`].
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Derive a digest for `password` under a freshly generated salt.
    pub fn hash(&self, password: &str) -> Result<PasswordDigest> {
        let mut salt = [0u8; SALT_LENGTH];
        OsRng.try_fill_bytes(&mut salt).map_err(|err| {
            BazaarError::internal(format!("random source unavailable: {err}"))
        })?;

        let mut hash = [0u8; HASH_LENGTH];
        self.argon2
            .hash_password_into(password.as_bytes(), &salt, &mut hash)
            .map_err(|err| {
                BazaarError::internal(format!("password hashing failed: {err}"))
            })?;

        Ok(PasswordDigest { salt, hash })
    }

    /// Check `password` against a stored hash/salt pair.
    ///
    /// Returns `false` for a wrong password and for malformed stored values
    /// alike; callers cannot tell the two apart.
    pub fn verify(&self, password: &str, hash: &[u8], salt: &[u8]) -> bool {
        if hash.len() != HASH_LENGTH || salt.len() != SALT_LENGTH {
            return false;
        }

        let mut candidate = Zeroizing::new([0u8; HASH_LENGTH]);
        if self
            .argon2
            .hash_password_into(password.as_bytes(), salt, &mut candidate[..])
            .is_err()
        {
            return false;
        }

        constant_time_eq(&candidate[..], hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fast_credential_hasher as test_hasher;

    #[test]
    fn hashes_passwords_and_verifies() {
        let hasher = CredentialHasher::new().unwrap();
        let digest = hasher.hash("correct_horse1").unwrap();

        assert!(hasher.verify("correct_horse1", &digest.hash, &digest.salt));
        assert!(!hasher.verify("battery_staple", &digest.hash, &digest.salt));
    }

    #[test]
    fn same_password_gets_new_salt_and_hash() {
        let hasher = test_hasher();
        let first = hasher.hash("s3cret_pass").unwrap();
        let second = hasher.hash("s3cret_pass").unwrap();

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
        assert!(hasher.verify("s3cret_pass", &first.hash, &first.salt));
        assert!(hasher.verify("s3cret_pass", &second.hash, &second.salt));
    }

    #[test]
    fn verify_rejects_swapped_salt() {
        let hasher = test_hasher();
        let first = hasher.hash("s3cret_pass").unwrap();
        let second = hasher.hash("s3cret_pass").unwrap();

        assert!(!hasher.verify("s3cret_pass", &first.hash, &second.salt));
    }

    #[test]
    fn malformed_stored_values_fail_closed() {
        let hasher = test_hasher();
        let digest = hasher.hash("s3cret_pass").unwrap();

        assert!(!hasher.verify("s3cret_pass", &digest.hash[..16], &digest.salt));
        assert!(!hasher.verify("s3cret_pass", &digest.hash, &[]));
        assert!(!hasher.verify("s3cret_pass", &[], &[]));
    }

    #[test]
    fn debug_output_hides_material() {
        let digest = test_hasher().hash("s3cret_pass").unwrap();
        assert_eq!(format!("{digest:?}"), "PasswordDigest { .. }");
    }
}
