/// Input validators for credentials
/// - Usernames and emails are trimmed and normalized to lowercase
/// - Length limits bound the work done per request
/// - Passwords are only length-checked; bcrypt ignores input past 72 bytes

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_USERNAME_LENGTH: usize = 64;
const MAX_PASSWORD_LENGTH: usize = 72;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*$"
    ).unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-z0-9._-]+$").unwrap();
}

/// Normalizes a username: trimmed, lowercase, `[a-z0-9._-]`, at most 64 characters
pub fn parse_username(username: &str) -> Result<String, ValidationError> {
    let normalized = username.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(ValidationError::EmptyField("username".to_string()));
    }

    if normalized.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username".to_string(), MAX_USERNAME_LENGTH));
    }

    if !USERNAME_REGEX.is_match(&normalized) {
        return Err(ValidationError::InvalidFormat("username".to_string()));
    }

    Ok(normalized)
}

/// Normalizes an email address: trimmed, lowercase, RFC 5322 simplified format
pub fn parse_email(email: &str) -> Result<String, ValidationError> {
    let normalized = email.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if normalized.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if normalized.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(&normalized) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    Ok(normalized)
}

pub fn check_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_LENGTH));
    }

    Ok(())
}
