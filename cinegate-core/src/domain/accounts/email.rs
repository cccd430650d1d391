use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

const MAX_EMAIL_LENGTH: usize = 254;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid email address: {0:?}")]
pub struct InvalidEmail(pub String);

/// Trim and lowercase `raw`, then check it looks like an address.
pub fn normalize_email(raw: &str) -> Result<String, InvalidEmail> {
    let normalized = raw.trim().to_lowercase();
    if normalized.len() > MAX_EMAIL_LENGTH
        || !EMAIL_PATTERN.is_match(&normalized)
    {
        return Err(InvalidEmail(raw.to_string()));
    }
    Ok(normalized)
}
