use std::fmt;

use thiserror::Error;

use crate::config::CheckMode;

/// Normalized operational state of a monitored page.
///
/// Aggregated-report pages classify into `Operational`, `PossibleIssues`,
/// `OutageDetected` or `Unknown`; keyword pages into `Operational` or
/// `PotentialOutage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Operational,
    PossibleIssues,
    OutageDetected,
    Unknown,
    PotentialOutage,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Operational => "OPERATIONAL",
            Status::PossibleIssues => "POSSIBLE ISSUES",
            Status::OutageDetected => "OUTAGE DETECTED",
            Status::Unknown => "UNKNOWN",
            Status::PotentialOutage => "POTENTIAL OUTAGE",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("keyword mode requires at least one keyword")]
    EmptyKeywords,
}

// Indicator phrases on aggregated-report pages. "possible problems" can
// appear alongside "indicate problems" in the same report summary, so the
// checks below run in priority order, not text order.
const NO_PROBLEMS: &str = "indicate no current problems";
const POSSIBLE_PROBLEMS: &str = "possible problems";
const PROBLEMS: &str = "indicate problems";

/// Classifies page content according to the target's check mode.
///
/// Pure function of its inputs. `content` must already be lowercased by the
/// caller; matching is plain substring containment.
pub fn classify(mode: &CheckMode, content: &str) -> Result<Status, ClassifyError> {
    match mode {
        CheckMode::Aggregated => Ok(classify_aggregated(content)),
        CheckMode::Keyword { keywords } => classify_keyword(content, keywords),
    }
}

fn classify_aggregated(content: &str) -> Status {
    if content.contains(NO_PROBLEMS) {
        Status::Operational
    } else if content.contains(POSSIBLE_PROBLEMS) {
        Status::PossibleIssues
    } else if content.contains(PROBLEMS) {
        Status::OutageDetected
    } else {
        Status::Unknown
    }
}

fn classify_keyword(content: &str, keywords: &[String]) -> Result<Status, ClassifyError> {
    if keywords.is_empty() {
        return Err(ClassifyError::EmptyKeywords);
    }

    if keywords
        .iter()
        .any(|keyword| content.contains(&keyword.to_lowercase()))
    {
        Ok(Status::Operational)
    } else {
        Ok(Status::PotentialOutage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregated_no_problems() {
        let content = "user reports indicate no current problems at roblox";
        assert_eq!(classify_aggregated(content), Status::Operational);
    }

    #[test]
    fn aggregated_possible_problems() {
        let content = "user reports indicate possible problems at roblox";
        assert_eq!(classify_aggregated(content), Status::PossibleIssues);
    }

    #[test]
    fn aggregated_problems() {
        let content = "user reports indicate problems at roblox";
        assert_eq!(classify_aggregated(content), Status::OutageDetected);
    }

    #[test]
    fn aggregated_unrecognized_content() {
        assert_eq!(classify_aggregated("<html>loading...</html>"), Status::Unknown);
    }

    #[test]
    fn aggregated_priority_beats_text_position() {
        // Both phrases present: the benign phrase wins even though the
        // problem phrase appears later in the page.
        let content = "reports indicate no current problems today, \
                       though some users indicate problems occasionally";
        assert_eq!(classify_aggregated(content), Status::Operational);
    }

    #[test]
    fn keyword_match_is_case_insensitive_on_keywords() {
        let content = "all systems operational";
        let keywords = vec!["Operational".to_string()];
        let status = classify_keyword(content, &keywords).unwrap();
        assert_eq!(status, Status::Operational);
    }

    #[test]
    fn keyword_no_match_is_potential_outage() {
        let content = "partial outage";
        let keywords = vec!["operational".to_string()];
        let status = classify_keyword(content, &keywords).unwrap();
        assert_eq!(status, Status::PotentialOutage);
    }

    #[test]
    fn keyword_empty_list_is_an_error() {
        let result = classify_keyword("all systems operational", &[]);
        assert!(matches!(result, Err(ClassifyError::EmptyKeywords)));
    }

    #[test]
    fn classify_dispatches_on_mode() {
        let aggregated = classify(&CheckMode::Aggregated, "indicate problems").unwrap();
        assert_eq!(aggregated, Status::OutageDetected);

        let keyword_mode = CheckMode::Keyword {
            keywords: vec!["operational".to_string()],
        };
        let keyword = classify(&keyword_mode, "all systems operational").unwrap();
        assert_eq!(keyword, Status::Operational);
    }
}
