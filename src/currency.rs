//! Supported account currencies

pub const USD: &str = "USD";
pub const EUR: &str = "EUR";
pub const INR: &str = "INR";
pub const CAD: &str = "CAD";

pub const SUPPORTED_CURRENCIES: [&str; 4] = [USD, EUR, INR, CAD];

/// Exact, case-sensitive match against [`SUPPORTED_CURRENCIES`]
pub fn is_supported_currency(currency: &str) -> bool {
    SUPPORTED_CURRENCIES.contains(&currency)
}

/// `validator` custom rule for `#[validate(custom(function = "..."))]`
pub fn validate_currency(currency: &str) -> Result<(), validator::ValidationError> {
    if is_supported_currency(currency) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("unsupported_currency"))
    }
}
