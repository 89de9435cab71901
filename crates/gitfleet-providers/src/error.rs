//! Mapping of HTTP-layer failures onto the GitFleet error taxonomy.

use gitfleet_core::Error;

pub use gitfleet_core::{ErrorKind, Result};

/// Longest body excerpt carried inside a provider error message.
const MAX_BODY_EXCERPT: usize = 200;

/// Classify a raw reqwest failure.
pub(crate) fn from_reqwest(err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::transport(format!("request timed out: {err}"))
    } else if err.is_connect() {
        Error::transport(format!("connection failed: {err}"))
    } else if err.is_decode() {
        Error::protocol(format!("undecodable response body: {err}"))
    } else {
        Error::transport(err.to_string())
    }
}

/// Compress a response body into a single-line excerpt for error messages.
pub(crate) fn body_excerpt(body: &str) -> String {
    let flattened: String = body
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let trimmed = flattened.trim();
    if trimmed.len() <= MAX_BODY_EXCERPT {
        trimmed.to_string()
    } else {
        let mut cut = MAX_BODY_EXCERPT;
        while !trimmed.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &trimmed[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_flattens_and_truncates() {
        assert_eq!(body_excerpt("  short\nbody  "), "short body");
        let long = "x".repeat(500);
        let excerpt = body_excerpt(&long);
        assert_eq!(excerpt.len(), MAX_BODY_EXCERPT + 3);
        assert!(excerpt.ends_with("..."));
    }
}
