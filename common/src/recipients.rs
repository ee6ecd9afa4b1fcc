// Recipient list validation

use crate::errors::ValidationError;
use crate::models::split_recipients;
use regex::Regex;

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").expect("valid email regex");
}

/// Syntactic check of a single address
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_REGEX.is_match(address)
}

/// Validate a comma-separated recipient list and return the addresses
///
/// Every entry is trimmed; the error lists all invalid entries in input
/// order so the submitter can fix them in one go.
pub fn validate_recipients(raw: &str) -> Result<Vec<String>, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::InvalidRecipients(
            "Recipients are required.".to_string(),
        ));
    }

    let entries: Vec<String> = raw.split(',').map(|e| e.trim().to_string()).collect();
    let invalid: Vec<&str> = entries
        .iter()
        .filter(|e| !is_valid_email(e))
        .map(|e| if e.is_empty() { "<empty>" } else { e.as_str() })
        .collect();

    if !invalid.is_empty() {
        return Err(ValidationError::InvalidRecipients(format!(
            "Invalid emails: {}",
            invalid.join(", ")
        )));
    }

    // Entries are known non-empty here, so this matches `entries`
    Ok(split_recipients(raw))
}
