//! In-memory collaborator fakes shared by the async tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::{ElectionApi, EventTimes, NewEvent};
use crate::error::{ApiError, FeedError};
use crate::feed::{FeedNotice, NoticeSender, VoteFeed, notice_channel};
use crate::models::{
    CampaignPost, ElectionType, Event, Nominee, NomineeTally, PendingNominee, TallyCounts,
    VerificationCode, Voter, VotingMode,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

/// An event in its voting phase at `t0`, running for another hour.
pub fn voting_event(election_type: ElectionType, mode: VotingMode) -> Event {
    Event {
        id: Uuid::new_v4(),
        title: "Student Council Election".to_string(),
        description: None,
        election_type,
        voting_mode: mode,
        reg_end: t0() - chrono::Duration::minutes(30),
        vote_start: t0() - chrono::Duration::minutes(10),
        vote_end: t0() + chrono::Duration::minutes(60),
        code_rotation_minutes: matches!(mode, VotingMode::OnCampus).then_some(15),
    }
}

/// An event still in its registration phase at `t0`.
pub fn upcoming_event() -> Event {
    Event {
        id: Uuid::new_v4(),
        title: "Alumni Board Election".to_string(),
        description: None,
        election_type: ElectionType::Single,
        voting_mode: VotingMode::Online,
        reg_end: t0() + chrono::Duration::minutes(10),
        vote_start: t0() + chrono::Duration::minutes(20),
        vote_end: t0() + chrono::Duration::minutes(30),
        code_rotation_minutes: None,
    }
}

pub fn counts(entries: &[(&str, i64)]) -> TallyCounts {
    TallyCounts {
        vote_counts: entries
            .iter()
            .map(|&(name, tally)| NomineeTally {
                nominee_id: Uuid::new_v4(),
                name: name.to_string(),
                tally,
            })
            .collect(),
        rank_scores: vec![],
    }
}

#[derive(Default)]
pub struct MockApi {
    pub events: Mutex<Vec<Event>>,
    pub tallies: Mutex<HashMap<Uuid, TallyCounts>>,
    pub pending: Mutex<HashMap<Uuid, Vec<PendingNominee>>>,
    pub posts: Mutex<HashMap<Uuid, Vec<CampaignPost>>>,
    pub codes: Mutex<HashMap<Uuid, VerificationCode>>,
    pub tally_delays: Mutex<HashMap<Uuid, Duration>>,
    pub code_delay: Mutex<Option<Duration>>,
    pub tally_calls: AtomicUsize,
    pub code_calls: AtomicUsize,
    pub rotations: AtomicUsize,
    pub fail_mutations: AtomicBool,
    pub fail_event_reads: AtomicBool,
}

impl MockApi {
    pub fn with_events(events: Vec<Event>) -> Self {
        let api = Self::default();
        *api.events.lock().unwrap() = events;
        api
    }

    pub fn set_tally(&self, event_id: Uuid, counts: TallyCounts) {
        self.tallies.lock().unwrap().insert(event_id, counts);
    }

    pub fn set_pending(&self, event_id: Uuid, entries: Vec<PendingNominee>) {
        self.pending.lock().unwrap().insert(event_id, entries);
    }

    pub fn set_posts(&self, event_id: Uuid, entries: Vec<CampaignPost>) {
        self.posts.lock().unwrap().insert(event_id, entries);
    }

    pub fn set_code(&self, event_id: Uuid, code: &str, expires_at: DateTime<Utc>) {
        self.codes.lock().unwrap().insert(
            event_id,
            VerificationCode {
                code: code.to_string(),
                expires_at,
            },
        );
    }

    /// Adds artificial latency to tally fetches for one event.
    pub fn delay_tally(&self, event_id: Uuid, delay: Duration) {
        self.tally_delays.lock().unwrap().insert(event_id, delay);
    }

    pub fn delay_codes(&self, delay: Duration) {
        *self.code_delay.lock().unwrap() = Some(delay);
    }

    fn mutation_gate(&self) -> Result<(), ApiError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ApiError::Remote {
                status: 500,
                message: "mutation rejected".to_string(),
            });
        }
        Ok(())
    }

    fn read_gate(&self) -> Result<(), ApiError> {
        if self.fail_event_reads.load(Ordering::SeqCst) {
            return Err(ApiError::Remote {
                status: 502,
                message: "read failed".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ElectionApi for MockApi {
    async fn list_events(&self) -> Result<Vec<Event>, ApiError> {
        Ok(self.events.lock().unwrap().clone())
    }

    async fn get_tally(&self, event_id: Uuid) -> Result<TallyCounts, ApiError> {
        self.tally_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.tally_delays.lock().unwrap().get(&event_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.read_gate()?;
        Ok(self
            .tallies
            .lock()
            .unwrap()
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_pending_nominees(&self, event_id: Uuid) -> Result<Vec<PendingNominee>, ApiError> {
        self.read_gate()?;
        Ok(self
            .pending
            .lock()
            .unwrap()
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn approve_nominee(&self, event_id: Uuid, nominee_id: Uuid) -> Result<(), ApiError> {
        self.mutation_gate()?;
        if let Some(entries) = self.pending.lock().unwrap().get_mut(&event_id) {
            entries.retain(|p| p.user_id != nominee_id);
        }
        Ok(())
    }

    async fn get_voters(&self, _event_id: Uuid) -> Result<Vec<Voter>, ApiError> {
        self.read_gate()?;
        Ok(vec![])
    }

    async fn get_nominees(&self, _event_id: Uuid) -> Result<Vec<Nominee>, ApiError> {
        self.read_gate()?;
        Ok(vec![])
    }

    async fn list_campaign_posts(&self, event_id: Uuid) -> Result<Vec<CampaignPost>, ApiError> {
        self.read_gate()?;
        Ok(self
            .posts
            .lock()
            .unwrap()
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_campaign_post(&self, event_id: Uuid, post_id: Uuid) -> Result<(), ApiError> {
        self.mutation_gate()?;
        if let Some(posts) = self.posts.lock().unwrap().get_mut(&event_id) {
            posts.retain(|p| p.id != post_id);
        }
        Ok(())
    }

    async fn delete_campaign_comment(
        &self,
        event_id: Uuid,
        comment_id: Uuid,
    ) -> Result<(), ApiError> {
        self.mutation_gate()?;
        if let Some(posts) = self.posts.lock().unwrap().get_mut(&event_id) {
            for post in posts {
                post.comments.retain(|c| c.id != comment_id);
            }
        }
        Ok(())
    }

    async fn current_code(&self, event_id: Uuid) -> Result<VerificationCode, ApiError> {
        self.code_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.code_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.codes
            .lock()
            .unwrap()
            .get(&event_id)
            .cloned()
            .ok_or(ApiError::EventNotFound)
    }

    async fn rotate_code(&self, _event_id: Uuid) -> Result<(), ApiError> {
        self.mutation_gate()?;
        self.rotations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_event(&self, fields: NewEvent) -> Result<Event, ApiError> {
        self.mutation_gate()?;
        let event = Event {
            id: Uuid::new_v4(),
            title: fields.title,
            description: fields.description,
            election_type: fields.election_type,
            voting_mode: fields.voting_mode,
            reg_end: fields.reg_end,
            vote_start: fields.vote_start,
            vote_end: fields.vote_end,
            code_rotation_minutes: fields.code_rotation_minutes,
        };
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn update_event_times(&self, event_id: Uuid, times: EventTimes) -> Result<(), ApiError> {
        self.mutation_gate()?;
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(ApiError::EventNotFound)?;
        event.reg_end = times.reg_end;
        event.vote_start = times.vote_start;
        event.vote_end = times.vote_end;
        Ok(())
    }
}

pub struct MockFeed {
    notices: NoticeSender,
    joined: Mutex<Vec<Uuid>>,
    left: Mutex<Vec<Uuid>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self {
            notices: notice_channel(),
            joined: Mutex::new(vec![]),
            left: Mutex::new(vec![]),
        }
    }

    pub fn notify(&self, event_id: Uuid) {
        let _ = self.notices.send(FeedNotice { event_id });
    }

    pub fn joined(&self) -> Vec<Uuid> {
        self.joined.lock().unwrap().clone()
    }

    pub fn left(&self) -> Vec<Uuid> {
        self.left.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoteFeed for MockFeed {
    async fn join(&self, event_id: Uuid) -> Result<(), FeedError> {
        self.joined.lock().unwrap().push(event_id);
        Ok(())
    }

    async fn leave(&self, event_id: Uuid) -> Result<(), FeedError> {
        self.left.lock().unwrap().push(event_id);
        Ok(())
    }

    fn notices(&self) -> broadcast::Receiver<FeedNotice> {
        self.notices.subscribe()
    }
}
