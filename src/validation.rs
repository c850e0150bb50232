//! Input validation for user-facing fields
//!
//! Lengths are counted in bytes.

use thiserror::Error;
use validator::ValidateEmail;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("must contain from {min}-{max} characters")]
    Length { min: usize, max: usize },

    #[error("{0}")]
    Format(&'static str),
}

pub fn validate_string(
    value: &str,
    min_length: usize,
    max_length: usize,
) -> Result<(), ValidationError> {
    let n = value.len();
    if n < min_length || n > max_length {
        return Err(ValidationError::Length {
            min: min_length,
            max: max_length,
        });
    }
    Ok(())
}

pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    validate_string(value, 3, 100)?;
    if !value
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
    {
        return Err(ValidationError::Format(
            "must contain only lowercase letters, digits, or underscore",
        ));
    }
    Ok(())
}

pub fn validate_full_name(value: &str) -> Result<(), ValidationError> {
    validate_string(value, 3, 100)?;
    if !value.bytes().all(|b| b.is_ascii_alphabetic() || b == b' ') {
        return Err(ValidationError::Format("must contain only letters or spaces"));
    }
    Ok(())
}

pub fn validate_password(value: &str) -> Result<(), ValidationError> {
    validate_string(value, 6, 100)
}

pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    validate_string(value, 3, 200)?;
    if !value.validate_email() {
        return Err(ValidationError::Format("is not a valid email address"));
    }
    Ok(())
}

pub fn validate_email_id(value: i64) -> Result<(), ValidationError> {
    if value <= 0 {
        return Err(ValidationError::Format("must be a positive integer"));
    }
    Ok(())
}

pub fn validate_secret_code(value: &str) -> Result<(), ValidationError> {
    validate_string(value, 32, 128)
}
