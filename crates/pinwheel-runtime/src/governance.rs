use std::sync::Arc;

use pinwheel_economy::{TokenEconomy, TokenSpend};
use pinwheel_events::EventStore;
use pinwheel_protocol::{
    AggregateType, EventFilter, EventId, GovernorId, LeagueError, LeagueRepository, LeagueResult,
    NewEvent, ProposalId, SeasonId, SeasonStatus, TokenKind, event_types,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Payload of `proposal.submitted` and `proposal.amended`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalPayload {
    pub proposal_id: ProposalId,
    pub text: String,
}

/// Payload of `vote.cast`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotePayload {
    pub proposal_id: ProposalId,
    /// `true` is a yes vote.
    pub vote: bool,
    #[serde(default)]
    pub boosted: bool,
}

/// Proposals and votes, paid for with governance tokens.
///
/// Only enrolled governors of an active season may act. Every token-backed
/// action appends its `token.spent` and the action event in one batch.
#[derive(Clone)]
pub struct Governance {
    store: Arc<dyn EventStore>,
    repo: Arc<dyn LeagueRepository>,
    economy: TokenEconomy,
}

impl Governance {
    pub fn new(
        store: Arc<dyn EventStore>,
        repo: Arc<dyn LeagueRepository>,
        economy: TokenEconomy,
    ) -> Self {
        Self {
            store,
            repo,
            economy,
        }
    }

    /// Submit a new proposal, spending one PROPOSE token.
    #[instrument(skip(self, text), fields(season_id = %season_id, governor_id = %governor_id))]
    pub async fn submit_proposal(
        &self,
        season_id: &SeasonId,
        governor_id: &GovernorId,
        text: &str,
        round_number: u32,
    ) -> LeagueResult<ProposalId> {
        self.require_active_governor(season_id, governor_id).await?;
        if text.trim().is_empty() {
            return Err(LeagueError::validation("proposal text is empty"));
        }
        let proposal_id = ProposalId::new_uuid();
        let event = proposal_event(
            event_types::PROPOSAL_SUBMITTED,
            season_id,
            governor_id,
            round_number,
            ProposalPayload {
                proposal_id: proposal_id.clone(),
                text: text.to_owned(),
            },
        )?;
        self.economy
            .spend(
                season_id,
                round_number,
                TokenSpend::one(governor_id.clone(), TokenKind::Propose, "proposal submitted"),
                vec![event],
            )
            .await?;
        info!(proposal_id = %proposal_id, "proposal submitted");
        Ok(proposal_id)
    }

    /// Amend an existing proposal, spending one AMEND token.
    #[instrument(
        skip(self, text),
        fields(season_id = %season_id, governor_id = %governor_id, proposal_id = %proposal_id)
    )]
    pub async fn amend_proposal(
        &self,
        season_id: &SeasonId,
        governor_id: &GovernorId,
        proposal_id: &ProposalId,
        text: &str,
        round_number: u32,
    ) -> LeagueResult<EventId> {
        self.require_active_governor(season_id, governor_id).await?;
        self.require_proposal(season_id, proposal_id).await?;
        if text.trim().is_empty() {
            return Err(LeagueError::validation("amendment text is empty"));
        }
        let event = proposal_event(
            event_types::PROPOSAL_AMENDED,
            season_id,
            governor_id,
            round_number,
            ProposalPayload {
                proposal_id: proposal_id.clone(),
                text: text.to_owned(),
            },
        )?;
        let ids = self
            .economy
            .spend(
                season_id,
                round_number,
                TokenSpend::one(governor_id.clone(), TokenKind::Amend, "proposal amended"),
                vec![event],
            )
            .await?;
        info!("proposal amended");
        last_id(ids)
    }

    /// Cast a yes/no vote. A boosted vote also spends one BOOST token. Each
    /// governor votes at most once per proposal.
    #[instrument(
        skip(self),
        fields(season_id = %season_id, governor_id = %governor_id, proposal_id = %proposal_id)
    )]
    pub async fn cast_vote(
        &self,
        season_id: &SeasonId,
        governor_id: &GovernorId,
        proposal_id: &ProposalId,
        vote: bool,
        boosted: bool,
        round_number: u32,
    ) -> LeagueResult<EventId> {
        self.require_active_governor(season_id, governor_id).await?;
        self.require_proposal(season_id, proposal_id).await?;

        let _guard = self.economy.locks().acquire(season_id).await;
        self.store
            .require_current_round(season_id, round_number)
            .await
            .inspect_err(|error| warn!(%error, "vote rejected"))?;
        let previous = self
            .store
            .read(
                season_id,
                EventFilter::all()
                    .event_type(event_types::VOTE_CAST)
                    .aggregate(proposal_id.as_str())
                    .governor(governor_id.clone()),
            )
            .await?;
        if !previous.is_empty() {
            let error = LeagueError::invalid_argument(format!(
                "governor {governor_id} already voted on proposal {proposal_id}"
            ));
            warn!(%error, "vote rejected");
            return Err(error);
        }

        let event = NewEvent::new(
            event_types::VOTE_CAST,
            AggregateType::Proposal,
            proposal_id.as_str(),
            season_id.clone(),
            round_number,
        )
        .governor(governor_id.clone())
        .with_payload(&VotePayload {
            proposal_id: proposal_id.clone(),
            vote,
            boosted,
        })?;

        let event_id = if boosted {
            let spend = TokenSpend::one(governor_id.clone(), TokenKind::Boost, "vote boosted");
            let ids = self
                .economy
                .spend_under_lock(season_id, round_number, spend, vec![event])
                .await?;
            last_id(ids)?
        } else {
            self.store.append(event).await?
        };
        info!(vote, boosted, "vote cast");
        Ok(event_id)
    }

    async fn require_active_governor(
        &self,
        season_id: &SeasonId,
        governor_id: &GovernorId,
    ) -> LeagueResult<()> {
        let season = self
            .repo
            .get_season(season_id)
            .await?
            .ok_or_else(|| LeagueError::NotFound(format!("season {season_id}")))?;
        if season.status != SeasonStatus::Active {
            return Err(LeagueError::invalid_argument(format!(
                "season {season_id} is {}, governance is closed",
                season.status
            )));
        }
        if self
            .repo
            .get_enrollment(season_id, governor_id)
            .await?
            .is_none()
        {
            return Err(LeagueError::invalid_argument(format!(
                "governor {governor_id} is not enrolled in season {season_id}"
            )));
        }
        Ok(())
    }

    async fn require_proposal(
        &self,
        season_id: &SeasonId,
        proposal_id: &ProposalId,
    ) -> LeagueResult<()> {
        let submitted = self
            .store
            .read(
                season_id,
                EventFilter::all()
                    .event_type(event_types::PROPOSAL_SUBMITTED)
                    .aggregate(proposal_id.as_str()),
            )
            .await?;
        if submitted.is_empty() {
            return Err(LeagueError::NotFound(format!("proposal {proposal_id}")));
        }
        Ok(())
    }
}

fn proposal_event(
    event_type: &str,
    season_id: &SeasonId,
    governor_id: &GovernorId,
    round_number: u32,
    payload: ProposalPayload,
) -> LeagueResult<NewEvent> {
    NewEvent::new(
        event_type,
        AggregateType::Proposal,
        payload.proposal_id.as_str(),
        season_id.clone(),
        round_number,
    )
    .governor(governor_id.clone())
    .with_payload(&payload)
}

// The paid-for action is always the last event of a spend batch.
fn last_id(ids: Vec<EventId>) -> LeagueResult<EventId> {
    ids.into_iter()
        .last()
        .ok_or_else(|| LeagueError::Persistence("spend batch returned no event ids".into()))
}
