//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates a player username: 3 to 32 characters, lowercase ASCII letters,
/// digits, `_`, `.` or `-`, starting with a letter or digit.
///
/// # Examples
///
/// ```ignore
/// validate_username("lucky_7")  // Ok
/// validate_username("Lucky")    // Err - uppercase
/// validate_username("_x1")      // Err - leading underscore
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let length = username.chars().count();
    if !(3..=32).contains(&length) {
        let mut err = ValidationError::new("username_length");
        err.message =
            Some(format!("Username must be 3 to 32 characters long (got {length})").into());
        return Err(err);
    }

    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'));
    let valid_start = username
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric());
    if !valid_chars || !valid_start {
        let mut err = ValidationError::new("username_format");
        err.message = Some(
            "Username must use lowercase letters, digits, '_', '.' or '-' and start with a letter or digit"
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Rejects names made only of whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}
