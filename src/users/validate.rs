use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const PHONE_NUMBER_LEN: usize = 10;

lazy_static! {
    // Alphanumeric runs joined by single '_', '-' or ' '; no separator at either end.
    static ref USER_NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9]+(?:[ _-][A-Za-z0-9]+)*$").unwrap();
    static ref EMAIL_RE: Regex =
        Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").unwrap();
}

pub fn is_valid_user_name(user_name: &str) -> bool {
    USER_NAME_RE.is_match(user_name)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn user_name(value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::ValidationFailed("Please add a userName".into()));
    }
    if !is_valid_user_name(value) {
        return Err(AppError::ValidationFailed("Please add a valid UserName".into()));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::ValidationFailed("Please add an email".into()));
    }
    if !is_valid_email(value) {
        return Err(AppError::ValidationFailed("Please add valid email".into()));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::ValidationFailed("Please add a password".into()));
    }
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::ValidationFailed(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn phone_number(value: &str) -> Result<(), AppError> {
    if value.chars().count() != PHONE_NUMBER_LEN {
        return Err(AppError::ValidationFailed(format!(
            "Phone number must be {PHONE_NUMBER_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_name_rules() {
        for ok in ["alice_1", "Alice", "a-b c_d", "x1", "john doe"] {
            assert!(is_valid_user_name(ok), "{ok} should be accepted");
        }
        for bad in ["", "_alice", "alice_", "a__b", "a--b", "a  b", "a_-b", "al!ce", " a"] {
            assert!(!is_valid_user_name(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn email_rules() {
        for ok in ["a@b.com", "first.last@mail.example.org", "x-y@d.io"] {
            assert!(is_valid_email(ok), "{ok} should be accepted");
        }
        for bad in ["", "a@b", "@b.com", "a@.com", "a b@c.com", "a@b.comma"] {
            assert!(!is_valid_email(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn password_minimum_length() {
        assert!(password("secret1").is_ok());
        assert!(password("12345").is_err());
        assert!(matches!(password(""), Err(AppError::ValidationFailed(_))));
    }

    #[test]
    fn phone_number_length() {
        assert!(phone_number("0123456789").is_ok());
        assert!(phone_number("123").is_err());
    }
}
