//! Typed identifiers for league entities.
//!
//! IDs are opaque String wrappers (serde-transparent). New IDs are UUID v4;
//! IDs read back from storage or supplied by a boundary layer are accepted
//! verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a new ID using UUID v4 (random).
            pub fn new_uuid() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// View as string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the id is empty or whitespace only.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new_uuid()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Unique identifier for a ledger event.
    EventId
);
typed_id!(
    /// Unique identifier for a league.
    LeagueId
);
typed_id!(
    /// Unique identifier for a season.
    SeasonId
);
typed_id!(
    /// Unique identifier for a team within one season.
    TeamId
);
typed_id!(
    /// Unique identifier for a hooper within one season.
    HooperId
);
typed_id!(
    /// Identifier of a governor (player). Stable across seasons.
    GovernorId
);
typed_id!(
    /// Unique identifier for a token trade.
    TradeId
);
typed_id!(
    /// Unique identifier for a governance proposal.
    ProposalId
);
typed_id!(
    /// Unique identifier for a mirror report.
    MirrorId
);
