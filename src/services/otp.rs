use mongodb::bson::DateTime;
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::UserUpdate;
use crate::models::User;

pub const CODE_TTL_MINUTES: i64 = 10;
pub const RESEND_INTERVAL_SECS: i64 = 60;
pub const RESET_TTL_MINUTES: i64 = 30;

const MINUTE_MS: i64 = 60 * 1000;

pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let code: u32 = rng.gen_range(100000..=999999);
    code.to_string()
}

/// A freshly generated email code. Only `hash` is persisted; `code` goes in the mail.
pub struct IssuedCode {
    pub code: String,
    pub hash: String,
    pub expires_at: DateTime,
    pub sent_at: DateTime,
}

impl IssuedCode {
    pub fn new(now: DateTime) -> Self {
        let code = generate_code();
        IssuedCode {
            hash: hash_secret(&code),
            code,
            expires_at: DateTime::from_millis(now.timestamp_millis() + CODE_TTL_MINUTES * MINUTE_MS),
            sent_at: now,
        }
    }

    pub fn update(&self) -> UserUpdate {
        UserUpdate::new()
            .set("emailVerificationCodeHash", self.hash.as_str())
            .set("emailVerificationExpires", self.expires_at)
            .set("emailVerificationLastSentAt", self.sent_at)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,
    Expired,
    Mismatch,
    Missing,
}

impl CodeCheck {
    /// Valid and expired codes must be cleared so they cannot be replayed.
    pub fn consumes_code(&self) -> bool {
        matches!(self, CodeCheck::Valid | CodeCheck::Expired)
    }
}

pub fn check_code(user: &User, code: &str, now: DateTime) -> CodeCheck {
    let (Some(hash), Some(expires)) = (
        user.email_verification_code_hash.as_deref(),
        user.email_verification_expires,
    ) else {
        return CodeCheck::Missing;
    };

    if expires.timestamp_millis() < now.timestamp_millis() {
        return CodeCheck::Expired;
    }

    if hash_secret(code.trim()) == hash {
        CodeCheck::Valid
    } else {
        CodeCheck::Mismatch
    }
}

pub fn clear_code() -> UserUpdate {
    UserUpdate::new()
        .unset("emailVerificationCodeHash")
        .unset("emailVerificationExpires")
}

/// Seconds the caller must wait before another code may be sent, if any.
pub fn resend_wait_secs(user: &User, now: DateTime) -> Option<i64> {
    let last = user.email_verification_last_sent_at?;
    let elapsed = (now.timestamp_millis() - last.timestamp_millis()) / 1000;
    if elapsed < RESEND_INTERVAL_SECS {
        Some(RESEND_INTERVAL_SECS - elapsed)
    } else {
        None
    }
}

/// Password reset token. The plain token is mailed; the stored value is its hash.
pub struct IssuedResetToken {
    pub token: String,
    pub hash: String,
    pub expires_at: DateTime,
}

impl IssuedResetToken {
    pub fn new(now: DateTime) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        IssuedResetToken {
            hash: hash_secret(&token),
            token,
            expires_at: DateTime::from_millis(now.timestamp_millis() + RESET_TTL_MINUTES * MINUTE_MS),
        }
    }

    pub fn update(&self) -> UserUpdate {
        UserUpdate::new()
            .set("resetPasswordToken", self.hash.as_str())
            .set("resetPasswordExpire", self.expires_at)
    }
}

pub fn reset_token_valid(user: &User, now: DateTime) -> bool {
    user.reset_password_expire
        .is_some_and(|expires| expires.timestamp_millis() >= now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn later(now: DateTime, ms: i64) -> DateTime {
        DateTime::from_millis(now.timestamp_millis() + ms)
    }

    fn user_with(issued: &IssuedCode) -> User {
        let mut user = User::new("Ada", "ada@example.com", "08031234567", Role::Investor);
        user.email_verification_code_hash = Some(issued.hash.clone());
        user.email_verification_expires = Some(issued.expires_at);
        user.email_verification_last_sent_at = Some(issued.sent_at);
        user
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_only_hash_is_persisted() {
        let issued = IssuedCode::new(DateTime::now());
        assert_ne!(issued.hash, issued.code);
        assert_eq!(issued.hash.len(), 64);
        let update = issued.update();
        assert_eq!(update.set.get_str("emailVerificationCodeHash").unwrap(), issued.hash);
        assert!(!update.set.values().any(|v| v.as_str() == Some(issued.code.as_str())));
    }

    #[test]
    fn test_correct_code_within_ttl_is_valid() {
        let now = DateTime::now();
        let issued = IssuedCode::new(now);
        let user = user_with(&issued);
        assert_eq!(check_code(&user, &issued.code, later(now, 5 * MINUTE_MS)), CodeCheck::Valid);
        assert_eq!(check_code(&user, "000000x", now), CodeCheck::Mismatch);
    }

    #[test]
    fn test_expired_code_fails_even_when_correct() {
        let now = DateTime::now();
        let issued = IssuedCode::new(now);
        let user = user_with(&issued);
        let result = check_code(&user, &issued.code, later(now, CODE_TTL_MINUTES * MINUTE_MS + 1));
        assert_eq!(result, CodeCheck::Expired);
        assert!(result.consumes_code());
    }

    #[test]
    fn test_cleared_code_cannot_be_reused() {
        let now = DateTime::now();
        let issued = IssuedCode::new(now);
        let mut user = user_with(&issued);
        assert_eq!(check_code(&user, &issued.code, now), CodeCheck::Valid);

        let cleared = clear_code();
        assert!(cleared.unset.contains(&"emailVerificationCodeHash".to_string()));
        user.email_verification_code_hash = None;
        user.email_verification_expires = None;

        assert_eq!(check_code(&user, &issued.code, now), CodeCheck::Missing);
    }

    #[test]
    fn test_resend_throttle() {
        let now = DateTime::now();
        let user = user_with(&IssuedCode::new(now));
        assert_eq!(resend_wait_secs(&user, later(now, 10_000)), Some(50));
        assert_eq!(resend_wait_secs(&user, later(now, 61_000)), None);

        let fresh = User::new("Ada", "ada@example.com", "08031234567", Role::Investor);
        assert_eq!(resend_wait_secs(&fresh, now), None);
    }

    #[test]
    fn test_reset_token_expiry() {
        let now = DateTime::now();
        let issued = IssuedResetToken::new(now);
        assert_eq!(issued.hash, hash_secret(&issued.token));

        let mut user = User::new("Ada", "ada@example.com", "08031234567", Role::Investor);
        user.reset_password_token = Some(issued.hash.clone());
        user.reset_password_expire = Some(issued.expires_at);
        assert!(reset_token_valid(&user, later(now, 29 * MINUTE_MS)));
        assert!(!reset_token_valid(&user, later(now, 31 * MINUTE_MS)));
    }
}
