use std::path::PathBuf;

use pinwheel_analytics::ShiftThreshold;
use pinwheel_protocol::TokenAllotment;

/// League configuration, read once at startup and handed to each component.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Ledger database file. `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    /// Rounds a trade stays open after the round it was offered in. It can
    /// be expired from the round after that.
    pub trade_window_rounds: u32,
    pub shift_threshold: ShiftThreshold,
    /// Rows fetched per page by event queries.
    pub query_page_size: usize,
    /// Tokens granted to every governor when they enroll in a season.
    pub default_allotment: TokenAllotment,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            trade_window_rounds: 3,
            shift_threshold: ShiftThreshold::default(),
            query_page_size: 256,
            default_allotment: TokenAllotment::default(),
        }
    }
}

impl Settings {
    pub fn new(database_path: Option<PathBuf>) -> Self {
        Self {
            database_path,
            ..Self::default()
        }
    }

    pub fn trade_window_rounds(mut self, rounds: u32) -> Self {
        self.trade_window_rounds = rounds;
        self
    }

    pub fn shift_threshold(mut self, threshold: ShiftThreshold) -> Self {
        self.shift_threshold = threshold;
        self
    }

    pub fn query_page_size(mut self, page_size: usize) -> Self {
        self.query_page_size = page_size;
        self
    }

    pub fn default_allotment(mut self, allotment: TokenAllotment) -> Self {
        self.default_allotment = allotment;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_league_rules() {
        let settings = Settings::default();
        assert!(settings.database_path.is_none());
        assert_eq!(settings.trade_window_rounds, 3);
        assert_eq!(settings.default_allotment, TokenAllotment::default());
        assert_eq!(settings.shift_threshold.absolute, 1.0);
    }

    #[test]
    fn builders_override_single_fields() {
        let settings = Settings::new(Some("league.db".into()))
            .trade_window_rounds(5)
            .query_page_size(16);
        assert_eq!(settings.trade_window_rounds, 5);
        assert_eq!(settings.query_page_size, 16);
        assert_eq!(settings.shift_threshold, ShiftThreshold::default());
    }
}
