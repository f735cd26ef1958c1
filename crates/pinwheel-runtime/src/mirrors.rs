use std::sync::Arc;

use pinwheel_analytics::ContentScanner;
use pinwheel_protocol::{
    AggregateType, GovernorId, LeagueError, LeagueRepository, LeagueResult, Mirror,
    MirrorDeliveredPayload, MirrorId, MirrorType, NewEvent, PrescriptiveScan, RosterWrite,
    WriteBatch, event_types,
};
use tracing::{info, instrument};

/// Stores mirror reports and records their delivery.
///
/// A report is scanned exactly once, when it is delivered. The stored row
/// keeps the text for its reader; the `mirror.delivered` event keeps only
/// the scan.
#[derive(Clone)]
pub struct MirrorDesk {
    repo: Arc<dyn LeagueRepository>,
    scanner: ContentScanner,
}

impl MirrorDesk {
    pub fn new(repo: Arc<dyn LeagueRepository>, scanner: ContentScanner) -> Self {
        Self { repo, scanner }
    }

    #[instrument(
        skip(self, mirror),
        fields(
            mirror_id = %mirror.id,
            season_id = %mirror.season_id,
            mirror_type = %mirror.mirror_type
        )
    )]
    pub async fn deliver_mirror(&self, mirror: Mirror) -> LeagueResult<PrescriptiveScan> {
        mirror.validate()?;
        if self.repo.get_season(&mirror.season_id).await?.is_none() {
            return Err(LeagueError::invalid_argument(format!(
                "season {} does not exist",
                mirror.season_id
            )));
        }

        let scan = self
            .scanner
            .scan_prescriptive(&mirror.content, &mirror.id, mirror.mirror_type);
        let mut delivered = NewEvent::new(
            event_types::MIRROR_DELIVERED,
            AggregateType::Mirror,
            mirror.id.as_str(),
            mirror.season_id.clone(),
            mirror.round_number,
        )
        .with_payload(&MirrorDeliveredPayload::from(scan.clone()))?;
        delivered.governor_id = mirror.governor_id.clone();

        let mut batch = WriteBatch::new();
        batch
            .write(RosterWrite::InsertMirror(mirror))
            .event(delivered);
        self.repo.commit(batch).await?;
        info!(
            prescriptive_count = scan.prescriptive_count,
            flagged = scan.flagged,
            "mirror delivered"
        );
        Ok(scan)
    }

    /// Fetch a mirror for `reader`. A private mirror exists only for its
    /// recipient; anyone else gets `NotFound`.
    pub async fn read_mirror(
        &self,
        mirror_id: &MirrorId,
        reader: &GovernorId,
    ) -> LeagueResult<Mirror> {
        let not_found = || LeagueError::NotFound(format!("mirror {mirror_id}"));
        let mirror = self.repo.get_mirror(mirror_id).await?.ok_or_else(not_found)?;
        if mirror.mirror_type == MirrorType::Private && mirror.governor_id.as_ref() != Some(reader)
        {
            return Err(not_found());
        }
        Ok(mirror)
    }
}
