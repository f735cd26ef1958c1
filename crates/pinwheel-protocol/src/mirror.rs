//! Mirror reports and the privacy boundary around their text.
//!
//! Report text lives in [`ReportContent`], which implements
//! neither `Display` nor `Serialize` and redacts itself under `Debug`. Event
//! payloads are built with serde, so report text cannot be placed into the
//! ledger or a log line. What analytics may keep is a [`PrescriptiveScan`]:
//! ids, the report type and an integer count.

use crate::error::{LeagueError, LeagueResult};
use crate::ids::{GovernorId, MirrorId, SeasonId, TeamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorType {
    Simulation,
    Governance,
    Private,
    Tiebreaker,
    Series,
    Season,
    Offseason,
    StateOfTheLeague,
}

impl MirrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simulation => "simulation",
            Self::Governance => "governance",
            Self::Private => "private",
            Self::Tiebreaker => "tiebreaker",
            Self::Series => "series",
            Self::Season => "season",
            Self::Offseason => "offseason",
            Self::StateOfTheLeague => "state_of_the_league",
        }
    }
}

impl fmt::Display for MirrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MirrorType {
    type Err = LeagueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "simulation" => Self::Simulation,
            "governance" => Self::Governance,
            "private" => Self::Private,
            "tiebreaker" => Self::Tiebreaker,
            "series" => Self::Series,
            "season" => Self::Season,
            "offseason" => Self::Offseason,
            "state_of_the_league" => Self::StateOfTheLeague,
            other => {
                return Err(LeagueError::validation(format!(
                    "unknown mirror type {other:?}"
                )));
            }
        })
    }
}

/// Report text. Readable only through [`ReportContent::reveal`], which the
/// scanner and the recipient's read path use.
#[derive(Clone, PartialEq, Eq)]
pub struct ReportContent(String);

impl ReportContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn reveal(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ReportContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReportContent(<redacted {} bytes>)", self.0.len())
    }
}

/// A stored mirror report.
#[derive(Debug, Clone, PartialEq)]
pub struct Mirror {
    pub id: MirrorId,
    pub season_id: SeasonId,
    pub mirror_type: MirrorType,
    pub round_number: u32,
    pub team_id: Option<TeamId>,
    pub governor_id: Option<GovernorId>,
    pub content: ReportContent,
    pub created_at: DateTime<Utc>,
}

impl Mirror {
    /// Private mirrors are addressed to exactly one governor; the other
    /// types are league-wide and carry no recipient.
    pub fn validate(&self) -> LeagueResult<()> {
        match (self.mirror_type, &self.governor_id) {
            (MirrorType::Private, None) => Err(LeagueError::validation(
                "private mirror requires a governor_id",
            )),
            (MirrorType::Private, Some(_)) => Ok(()),
            (_, Some(_)) => Err(LeagueError::validation(format!(
                "{} mirror cannot target a governor",
                self.mirror_type
            ))),
            (_, None) => Ok(()),
        }
    }
}

/// The only artifact of a report that crosses into analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptiveScan {
    pub report_id: MirrorId,
    pub report_type: MirrorType,
    pub prescriptive_count: u32,
    pub flagged: bool,
}

/// Payload of `mirror.delivered`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorDeliveredPayload {
    pub mirror_id: MirrorId,
    pub mirror_type: MirrorType,
    pub prescriptive_count: u32,
    pub flagged: bool,
}

impl From<PrescriptiveScan> for MirrorDeliveredPayload {
    fn from(scan: PrescriptiveScan) -> Self {
        Self {
            mirror_id: scan.report_id,
            mirror_type: scan.report_type,
            prescriptive_count: scan.prescriptive_count,
            flagged: scan.flagged,
        }
    }
}
