use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::Arc;

use rand::{rngs::OsRng, RngCore};
use tracing::error;

use crate::{config::HashingConfig, error::AppError};

/// Argon2id hasher with a configurable work factor. Digests are PHC strings,
/// so the salt and parameters travel with the hash.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Digest with the configured work factor that no request password matches
    /// on purpose; verified against when there is no account to check.
    dummy: Arc<str>,
}

impl PasswordHasher {
    pub fn new(cfg: &HashingConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        let mut hasher = Self {
            params,
            dummy: Arc::from(""),
        };
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        hasher.dummy = Arc::from(hasher.hash(&hex::encode(seed))?);
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// `Ok(false)` on mismatch; `CorruptCredential` when `digest` is not a
    /// usable PHC string.
    pub fn verify(&self, plain: &str, digest: &str) -> Result<bool, AppError> {
        let parsed = PasswordHash::new(digest).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            AppError::CorruptCredential
        })?;
        // Parameters come from the digest itself, so older work factors still verify.
        match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                error!(error = %e, "argon2 verify error");
                Err(AppError::CorruptCredential)
            }
        }
    }

    /// Runs [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, plain: String) -> Result<String, AppError> {
        let hasher = self.clone();
        let digest = tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| anyhow::anyhow!("hash task failed: {e}"))??;
        Ok(digest)
    }

    /// Spends the same Argon2 work as a real check, for login attempts on
    /// identifiers that match no account. Always `false`.
    pub async fn verify_dummy_blocking(&self, plain: String) -> Result<bool, AppError> {
        let digest = self.dummy.to_string();
        self.verify_blocking(plain, digest).await.map(|_| false)
    }

    /// Runs [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(&self, plain: String, digest: String) -> Result<bool, AppError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &digest))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("verify task failed: {e}")))?
    }
}
