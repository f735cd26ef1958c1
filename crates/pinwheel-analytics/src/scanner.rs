use pinwheel_protocol::{
    LeagueError, LeagueResult, MirrorId, MirrorType, PrescriptiveScan, ReportContent,
};
use regex::Regex;
use tracing::debug;

/// Directive phrases, longest first so that "governors should" is one match
/// rather than a phrase match plus a modal match.
const PRESCRIPTIVE_PHRASES: &[&str] = &[
    "it is imperative that",
    "governors should",
    "ought to",
    "need to",
    "have to",
    "should",
    "must",
    "shall",
];

/// Counts directive language in mirror reports.
///
/// Matching is case-insensitive on whole words. Overlapping phrases are
/// counted once: the scan walks the text left to right and never reuses
/// characters that already matched.
#[derive(Debug, Clone)]
pub struct ContentScanner {
    pattern: Regex,
}

impl ContentScanner {
    pub fn new() -> LeagueResult<Self> {
        let alternation = PRESCRIPTIVE_PHRASES
            .iter()
            .map(|phrase| regex::escape(phrase).replace(' ', r"\s+"))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).map_err(|error| {
            LeagueError::validation(format!("invalid prescriptive pattern: {error}"))
        })?;
        Ok(Self { pattern })
    }

    /// Reduce a report to its directive-language count.
    pub fn scan_prescriptive(
        &self,
        content: &ReportContent,
        report_id: &MirrorId,
        report_type: MirrorType,
    ) -> PrescriptiveScan {
        let count = self.pattern.find_iter(content.reveal()).count();
        let prescriptive_count = u32::try_from(count).unwrap_or(u32::MAX);
        debug!(
            report_id = %report_id,
            report_type = %report_type,
            prescriptive_count,
            "report scanned"
        );
        PrescriptiveScan {
            report_id: report_id.clone(),
            report_type,
            prescriptive_count,
            flagged: prescriptive_count > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> PrescriptiveScan {
        ContentScanner::new().unwrap().scan_prescriptive(
            &ReportContent::new(text),
            &MirrorId::from("r1"),
            MirrorType::Governance,
        )
    }

    #[test]
    fn governors_should_counts_once() {
        let result = scan("Governors should vote now.");
        assert_eq!(result.prescriptive_count, 1);
        assert!(result.flagged);
        assert_eq!(result.report_id.as_str(), "r1");
        assert_eq!(result.report_type, MirrorType::Governance);
    }

    #[test]
    fn scan_output_never_carries_text() {
        let result = scan("Governors should vote now.");
        let rendered = format!("{result:?}");
        assert!(!rendered.contains("should"));
        assert!(!rendered.contains("vote now"));
    }

    #[test]
    fn every_pattern_is_case_insensitive() {
        let text = "IT IS IMPERATIVE THAT you MUST act. You Ought To listen. \
                    They need to, we have to, thou shalt not but we shall.";
        assert_eq!(scan(text).prescriptive_count, 6);
    }

    #[test]
    fn words_containing_modals_do_not_match() {
        let result = scan("The mustard was unshallow; shoulders are mustered.");
        assert_eq!(result.prescriptive_count, 0);
        assert!(!result.flagged);
    }

    #[test]
    fn descriptive_report_is_not_flagged() {
        let result = scan("The league passed three rules this round and voted mostly yes.");
        assert_eq!(result.prescriptive_count, 0);
        assert!(!result.flagged);
    }

    #[test]
    fn repeated_directives_add_up() {
        let result = scan("You should vote. You should propose. You must trade.");
        assert_eq!(result.prescriptive_count, 3);
    }

    #[test]
    fn phrase_spanning_line_break_still_counts() {
        let result = scan("Governors\nshould rest.");
        assert_eq!(result.prescriptive_count, 1);
    }
}
