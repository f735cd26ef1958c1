//! Write-side services of a Pinwheel league.
//!
//! [`SeasonLifecycle`] creates seasons, carries rosters forward and moves
//! season status; [`Governance`] records proposals and votes and pays for
//! them with tokens; [`MirrorDesk`] stores mirror reports, scans them once
//! and records only the scan. All of them take an explicit [`Settings`].

mod governance;
mod lifecycle;
mod mirrors;
mod settings;

pub use governance::{Governance, ProposalPayload, VotePayload};
pub use lifecycle::{RulesetAmendedPayload, SeasonLifecycle};
pub use mirrors::MirrorDesk;
pub use settings::Settings;
