//! Log line parsing module.
//!
//! This module is responsible for pulling a camera identifier and an
//! event token out of raw log lines. The grammar belongs to the log
//! producer and has changed between producer versions, so extraction
//! is a replaceable strategy behind the `EventExtractor` trait.

mod regex_extractor;

pub use regex_extractor::{RegexExtractor, DEFAULT_PATTERN};

use crate::domain::EventKind;

/// Camera and event token found in a log line.
///
/// Both fields are empty when the line carries no motion event, which
/// is the case for most lines in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub camera_id: String,
    pub token: String,
}

impl Extraction {
    pub fn new(camera_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            camera_id: camera_id.into(),
            token: token.into(),
        }
    }

    /// The result for a line that did not match.
    pub fn unmatched() -> Self {
        Self::default()
    }

    pub fn is_unmatched(&self) -> bool {
        self.camera_id.is_empty() && self.token.is_empty()
    }

    /// The event kind, if the token is one we dispatch on.
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_token(&self.token)
    }
}

/// Strategy for extracting camera events from log lines.
pub trait EventExtractor: Send + Sync {
    /// Extract the camera and event token from `line`.
    ///
    /// Never fails: a line that does not match yields
    /// `Extraction::unmatched()`.
    fn extract(&self, line: &str) -> Extraction;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_is_empty() {
        let extraction = Extraction::unmatched();
        assert!(extraction.is_unmatched());
        assert_eq!(extraction.camera_id, "");
        assert_eq!(extraction.kind(), None);
    }

    #[test]
    fn test_kind_from_token() {
        assert_eq!(Extraction::new("A", "start").kind(), Some(EventKind::Start));
        assert_eq!(Extraction::new("A", "stop").kind(), Some(EventKind::Stop));
        assert_eq!(Extraction::new("A", "motion").kind(), None);
        assert!(!Extraction::new("A", "motion").is_unmatched());
    }
}
