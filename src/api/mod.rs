use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    CampaignPost, ElectionType, Event, Nominee, PendingNominee, TallyCounts, VerificationCode,
    Voter, VotingMode,
};

mod http;

pub use http::HttpApi;

/// Fields for a new event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub election_type: ElectionType,
    pub voting_mode: VotingMode,
    pub reg_end: DateTime<Utc>,
    pub vote_start: DateTime<Utc>,
    pub vote_end: DateTime<Utc>,
    pub code_rotation_minutes: Option<u32>,
}

/// Replacement schedule for an existing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTimes {
    pub reg_end: DateTime<Utc>,
    pub vote_start: DateTime<Utc>,
    pub vote_end: DateTime<Utc>,
}

impl EventTimes {
    pub fn of(event: &Event) -> Self {
        Self {
            reg_end: event.reg_end,
            vote_start: event.vote_start,
            vote_end: event.vote_end,
        }
    }

    /// The event's current schedule shifted by per-timestamp minute deltas.
    pub fn shifted(event: &Event, reg_end: i64, vote_start: i64, vote_end: i64) -> Self {
        Self {
            reg_end: event.reg_end + chrono::Duration::minutes(reg_end),
            vote_start: event.vote_start + chrono::Duration::minutes(vote_start),
            vote_end: event.vote_end + chrono::Duration::minutes(vote_end),
        }
    }
}

/// The remote election service, as seen by the console. Transport is an
/// implementation detail; the console only ever holds a trait object.
#[async_trait]
pub trait ElectionApi: Send + Sync {
    async fn list_events(&self) -> Result<Vec<Event>, ApiError>;

    async fn get_tally(&self, event_id: Uuid) -> Result<TallyCounts, ApiError>;

    async fn get_pending_nominees(&self, event_id: Uuid) -> Result<Vec<PendingNominee>, ApiError>;

    async fn approve_nominee(&self, event_id: Uuid, nominee_id: Uuid) -> Result<(), ApiError>;

    async fn get_voters(&self, event_id: Uuid) -> Result<Vec<Voter>, ApiError>;

    async fn get_nominees(&self, event_id: Uuid) -> Result<Vec<Nominee>, ApiError>;

    async fn list_campaign_posts(&self, event_id: Uuid) -> Result<Vec<CampaignPost>, ApiError>;

    async fn delete_campaign_post(&self, event_id: Uuid, post_id: Uuid) -> Result<(), ApiError>;

    async fn delete_campaign_comment(
        &self,
        event_id: Uuid,
        comment_id: Uuid,
    ) -> Result<(), ApiError>;

    async fn current_code(&self, event_id: Uuid) -> Result<VerificationCode, ApiError>;

    async fn rotate_code(&self, event_id: Uuid) -> Result<(), ApiError>;

    async fn create_event(&self, fields: NewEvent) -> Result<Event, ApiError>;

    async fn update_event_times(&self, event_id: Uuid, times: EventTimes) -> Result<(), ApiError>;
}
