//! Email comparison
//!
//! Addresses coming from the user, from the identity provider and from the
//! certify request are compared only through [`emails_match`]. The provider
//! may hand back a normalized form of what the user typed, so comparison is
//! case-insensitive and ignores surrounding whitespace.

/// Normalize an email address for comparison.
///
/// Returns `None` for absent or blank input.
pub fn normalize(email: &str) -> Option<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Check whether two email addresses refer to the same account.
///
/// Absent or blank values never match anything, not even each other.
pub fn emails_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.and_then(normalize), b.and_then(normalize)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
