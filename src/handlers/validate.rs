//! Field-level request validation shared across handlers. Checks run
//! before any store mutation.

use crate::error::ApiError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn email(value: &str) -> Result<(), ApiError> {
    let parts: Vec<&str> = value.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() || !parts[1].contains('.') {
        return Err(ApiError::field_error("email", "Invalid email format"));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), ApiError> {
    if value.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::field_error(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }
    Ok(())
}

pub fn non_empty(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::field_error(field, "Must not be empty"));
    }
    Ok(())
}

pub fn price_cents(value: i64) -> Result<(), ApiError> {
    if value <= 0 {
        return Err(ApiError::field_error("price_cents", "Price must be greater than 0"));
    }
    Ok(())
}

pub fn rating(value: Option<i32>) -> Result<(), ApiError> {
    if let Some(r) = value {
        if !(1..=5).contains(&r) {
            return Err(ApiError::field_error("rating", "Rating must be between 1 and 5"));
        }
    }
    Ok(())
}

pub fn one_of(field: &'static str, value: &str, allowed: &[&str]) -> Result<(), ApiError> {
    if !allowed.contains(&value) {
        return Err(ApiError::field_error(
            field,
            format!("Must be one of: {}", allowed.join(", ")),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(email("buyer@example.com").is_ok());
        assert!(email("no-at-sign").is_err());
        assert!(email("@example.com").is_err());
        assert!(email("user@nodot").is_err());
    }

    #[test]
    fn rating_bounds() {
        assert!(rating(None).is_ok());
        assert!(rating(Some(1)).is_ok());
        assert!(rating(Some(5)).is_ok());
        assert!(rating(Some(0)).is_err());
        assert!(rating(Some(6)).is_err());
    }

    #[test]
    fn price_must_be_positive() {
        assert!(price_cents(1).is_ok());
        assert!(price_cents(0).is_err());
        assert!(price_cents(-499).is_err());
    }
}
