//! Analytics over the season log.
//!
//! [`BehavioralAnalyzer`] works on event counts only and never reads mirror
//! text. [`ContentScanner`] is the one component that sees report text, and
//! what it hands back is a [`PrescriptiveScan`](pinwheel_protocol::PrescriptiveScan)
//! holding an integer count.

mod behavior;
mod scanner;

pub use behavior::{BehavioralAnalyzer, ShiftResult, ShiftThreshold};
pub use scanner::ContentScanner;
