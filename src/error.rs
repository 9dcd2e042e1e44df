//! Error and diagnostic kinds.
//!
//! Only [`AcquisitionError`] ever reaches a caller. The extraction kinds in
//! [`ExtractionIssue`] are logged and folded into an empty or partially
//! filled result.

use std::fmt;
use thiserror::Error;

/// The results page could not be obtained from a page source.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("page appears to be blocked")]
    Blocked,

    #[error("webdriver error: {0}")]
    WebDriver(String),

    #[error("timed out waiting for page")]
    Timeout,
}

/// Non-fatal outcomes of an extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionIssue {
    NoStructuralMatch,
    NoTextualMatch,
    PartialRecord,
}

impl fmt::Display for ExtractionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtractionIssue::NoStructuralMatch => "no_structural_match",
            ExtractionIssue::NoTextualMatch => "no_textual_match",
            ExtractionIssue::PartialRecord => "partial_record",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message() {
        let err = AcquisitionError::Status(503);
        assert_eq!(err.to_string(), "unexpected HTTP status 503");
    }

    #[test]
    fn test_issue_display() {
        assert_eq!(ExtractionIssue::NoTextualMatch.to_string(), "no_textual_match");
    }
}
