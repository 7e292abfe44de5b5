//! One-time password reset tokens.
//!
//! The plaintext goes to the user out of band; only its SHA-256 digest and
//! deadline are stored on the record.
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

use crate::users::repo_types::{ResetFields, User};

const TOKEN_BYTES: usize = 20;

#[derive(Debug, Clone)]
pub struct ResetToken {
    pub plain: String,
    pub fields: ResetFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResetCheckError {
    #[error("no reset token outstanding")]
    NotIssued,
    #[error("reset token expired")]
    Expired,
    #[error("reset token mismatch")]
    Mismatch,
}

pub fn hash_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

pub fn generate(now: OffsetDateTime, window: Duration) -> ResetToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let plain = hex::encode(bytes);
    ResetToken {
        fields: ResetFields {
            token_hash: hash_token(&plain),
            expires_at: now + window,
        },
        plain,
    }
}

/// Checks `supplied` against the token stored on `user` at instant `now`.
/// Returns the stored hash to clear on success; clearing happens in the
/// same store write that sets the new password.
pub fn check(user: &User, supplied: &str, now: OffsetDateTime) -> Result<String, ResetCheckError> {
    let (Some(stored), Some(expires_at)) = (
        user.reset_password_token.as_deref(),
        user.reset_password_expire,
    ) else {
        return Err(ResetCheckError::NotIssued);
    };
    let supplied_hash = hash_token(supplied);
    if !constant_time_eq(stored.as_bytes(), supplied_hash.as_bytes()) {
        return Err(ResetCheckError::Mismatch);
    }
    if now >= expires_at {
        return Err(ResetCheckError::Expired);
    }
    Ok(stored.to_string())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::{Role, DEFAULT_PROFILE_IMAGE};
    use uuid::Uuid;

    fn user_with(fields: Option<&ResetFields>) -> User {
        User {
            id: Uuid::new_v4(),
            user_name: "alice_1".into(),
            email: "a@b.com".into(),
            phone_number: None,
            role: Role::User,
            is_active: true,
            profile_image: DEFAULT_PROFILE_IMAGE.into(),
            password_hash: "x".into(),
            reset_password_token: fields.map(|f| f.token_hash.clone()),
            reset_password_expire: fields.map(|f| f.expires_at),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn generated_tokens_are_random_hex_and_hashed_at_rest() {
        let now = OffsetDateTime::now_utc();
        let a = generate(now, Duration::minutes(10));
        let b = generate(now, Duration::minutes(10));
        assert_ne!(a.plain, b.plain);
        assert_eq!(a.plain.len(), TOKEN_BYTES * 2);
        assert!(a.plain.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.fields.token_hash, a.plain);
        assert_eq!(a.fields.token_hash, hash_token(&a.plain));
        assert_eq!(a.fields.expires_at, now + Duration::minutes(10));
    }

    #[test]
    fn check_accepts_matching_token_before_deadline() {
        let now = OffsetDateTime::now_utc();
        let token = generate(now, Duration::minutes(10));
        let user = user_with(Some(&token.fields));
        let stored = check(&user, &token.plain, now + Duration::minutes(9)).unwrap();
        assert_eq!(stored, token.fields.token_hash);
    }

    #[test]
    fn check_rejects_at_and_after_deadline() {
        let now = OffsetDateTime::now_utc();
        let token = generate(now, Duration::minutes(10));
        let user = user_with(Some(&token.fields));
        assert_eq!(
            check(&user, &token.plain, token.fields.expires_at),
            Err(ResetCheckError::Expired)
        );
    }

    #[test]
    fn check_rejects_wrong_token() {
        let now = OffsetDateTime::now_utc();
        let token = generate(now, Duration::minutes(10));
        let user = user_with(Some(&token.fields));
        assert_eq!(
            check(&user, "deadbeef", now),
            Err(ResetCheckError::Mismatch)
        );
    }

    #[test]
    fn check_without_outstanding_token() {
        let user = user_with(None);
        assert_eq!(
            check(&user, "anything", OffsetDateTime::now_utc()),
            Err(ResetCheckError::NotIssued)
        );
    }
}
