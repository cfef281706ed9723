//! Regex-based event extraction.

use regex::Regex;

use super::{EventExtractor, Extraction};
use crate::error::ConfigError;

/// Pattern matching the camera motion lines of the NVR application log,
/// for example:
///
/// ```text
/// 1548877926.436 2019-01-30 12:52:06.436/MST: INFO   Camera[F09FC22F4D1D] type:start event:8078 clock:10895263924 (Front Door) in ApplicationEvtBus-0
/// ```
pub const DEFAULT_PATTERN: &str = r"Camera\[(.+?)\] type:(\w+)";

/// Extracts events using a regular expression.
///
/// Capture group 1 is the camera identifier and group 2 is the event
/// token. Only the first match in a line is used.
#[derive(Debug, Clone)]
pub struct RegexExtractor {
    regex: Regex,
}

impl RegexExtractor {
    /// Compile an extractor from `pattern`.
    ///
    /// The pattern must have at least two capture groups.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        // captures_len counts the implicit whole-match group
        if regex.captures_len() < 3 {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "expected two capture groups (camera, event type)".to_string(),
            });
        }

        Ok(Self { regex })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl Default for RegexExtractor {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_PATTERN).expect("default pattern is valid"),
        }
    }
}

impl EventExtractor for RegexExtractor {
    fn extract(&self, line: &str) -> Extraction {
        let Some(caps) = self.regex.captures(line) else {
            return Extraction::unmatched();
        };

        match (caps.get(1), caps.get(2)) {
            (Some(camera), Some(token)) => Extraction::new(camera.as_str(), token.as_str()),
            _ => Extraction::unmatched(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventKind;

    const START_LINE: &str = "1548877926.436 2019-01-30 12:52:06.436/MST: INFO   Camera[F09FC22F4D1D] type:start event:8078 clock:10895263924 (Front Door) in ApplicationEvtBus-0";
    const STOP_LINE: &str = "1548877946.785 2019-01-30 12:52:26.785/MST: INFO   Camera[F09FC22F4D1D] type:stop event:8078 clock:10895284314 (Front Door) in ApplicationEvtBus-9";

    #[test]
    fn test_extract_start() {
        let extraction = RegexExtractor::default().extract(START_LINE);
        assert_eq!(extraction.camera_id, "F09FC22F4D1D");
        assert_eq!(extraction.token, "start");
        assert_eq!(extraction.kind(), Some(EventKind::Start));
    }

    #[test]
    fn test_extract_stop() {
        let extraction = RegexExtractor::default().extract(STOP_LINE);
        assert_eq!(extraction.camera_id, "F09FC22F4D1D");
        assert_eq!(extraction.kind(), Some(EventKind::Stop));
    }

    #[test]
    fn test_unrelated_line_is_unmatched() {
        let line = "1548877926.436 2019-01-30 12:52:06.436/MST: INFO   Starting recording service";
        assert!(RegexExtractor::default().extract(line).is_unmatched());
        assert!(RegexExtractor::default().extract("").is_unmatched());
    }

    #[test]
    fn test_unknown_event_word_extracts_but_has_no_kind() {
        let line = "INFO   Camera[ABC123] type:pause event:1 ";
        let extraction = RegexExtractor::default().extract(line);
        assert_eq!(extraction.camera_id, "ABC123");
        assert_eq!(extraction.token, "pause");
        assert_eq!(extraction.kind(), None);
    }

    #[test]
    fn test_first_match_wins() {
        let line = "Camera[ONE] type:start Camera[TWO] type:stop";
        let extraction = RegexExtractor::default().extract(line);
        assert_eq!(extraction, Extraction::new("ONE", "start"));
    }

    #[test]
    fn test_custom_pattern() {
        let extractor = RegexExtractor::new(r"motion (\w+) on cam=(\S+)").unwrap();
        // Group order is positional: group 1 is always the camera
        let extraction = extractor.extract("motion start on cam=garage");
        assert_eq!(extraction, Extraction::new("start", "garage"));

        let extractor = RegexExtractor::new(r"cam=(\S+) motion=(\w+)").unwrap();
        let extraction = extractor.extract("2024-05-01 cam=garage motion=stop");
        assert_eq!(extraction, Extraction::new("garage", "stop"));
    }

    #[test]
    fn test_optional_group_missing_is_unmatched() {
        let extractor = RegexExtractor::new(r"cam=(\S+)(?: motion=(\w+))?").unwrap();
        assert!(extractor.extract("cam=garage").is_unmatched());
    }

    #[test]
    fn test_pattern_needs_two_groups() {
        let result = RegexExtractor::new(r"Camera\[(.+?)\]");
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let result = RegexExtractor::new(r"Camera\[(.+");
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_default_pattern() {
        assert_eq!(RegexExtractor::default().pattern(), DEFAULT_PATTERN);
    }
}
