use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionType {
    Single,
    MultiVote,
    Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VotingMode {
    Online,
    OnCampus,
}

/// A timed election event. The schedule invariant
/// `reg_end < vote_start < vote_end` is assumed, not enforced; classification
/// stays well-defined either way (see `phase::classify`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub election_type: ElectionType,
    pub voting_mode: VotingMode,
    pub reg_end: DateTime<Utc>,
    pub vote_start: DateTime<Utc>,
    pub vote_end: DateTime<Utc>,
    /// Rotation interval for the on-campus verification code. `None` for
    /// online events.
    pub code_rotation_minutes: Option<u32>,
}

/// One nominee's aggregate for one event: a vote count for `Single` and
/// `MultiVote` elections, a rank score (lower is better) for `Rank`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NomineeTally {
    pub nominee_id: Uuid,
    pub name: String,
    pub tally: i64,
}

/// Raw tally fetch result. Only one of the two lists is meaningful for a
/// given event; `TallyBoard::build` picks by election type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyCounts {
    pub vote_counts: Vec<NomineeTally>,
    pub rank_scores: Vec<NomineeTally>,
}

/// Cached copy of the rotating on-campus code. The expiry is authoritative
/// on the server; this copy is trusted no further than `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNominee {
    pub user_id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub user_id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nominee {
    pub user_id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignPost {
    pub id: Uuid,
    pub author_name: String,
    pub content: String,
    pub likes: u32,
    pub dislikes: u32,
    pub created_at: DateTime<Utc>,
    pub comments: Vec<CampaignComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignComment {
    pub id: Uuid,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
