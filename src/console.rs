use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ElectionApi, EventTimes, NewEvent};
use crate::code::{CODE_POLL_SECS, CodeReconciler};
use crate::countdown::{self, Clock, Ticker};
use crate::error::{ApiError, ConsoleError};
use crate::feed::{FeedNotice, VoteFeed};
use crate::live::LiveSubscription;
use crate::moderation::Mutation;
use crate::models::{
    CampaignPost, Event, Nominee, PendingNominee, TallyCounts, Voter, VotingMode,
};
use crate::phase::{self, EventMetrics, Phase};
use crate::tally::TallyBoard;

/// Everything cached for the client's view. Advisory copies only: nothing
/// here outlives the fetch or push delivery that produced it, and nothing
/// but the console task ever mutates it.
#[derive(Default)]
struct ViewState {
    events: Vec<Event>,
    active: Option<Event>,
    loading: bool,
    stale: bool,
    board: Option<TallyBoard>,
    pending: Vec<PendingNominee>,
    voters: Vec<Voter>,
    nominees: Vec<Nominee>,
    posts: Vec<CampaignPost>,
}

struct EventBundle {
    counts: TallyCounts,
    pending: Vec<PendingNominee>,
    voters: Vec<Voter>,
    nominees: Vec<Nominee>,
    posts: Vec<CampaignPost>,
}

/// Completed background work. Every variant that belongs to one event
/// carries the id it was issued for, checked against the active event on
/// arrival.
enum Completion {
    Events(Vec<Event>),
    Bundle {
        event_id: Uuid,
        bundle: Box<EventBundle>,
    },
    BundleFailed {
        event_id: Uuid,
    },
    Tally {
        event_id: Uuid,
        counts: TallyCounts,
    },
    TallyFailed {
        event_id: Uuid,
    },
    Code {
        event_id: Uuid,
        code: crate::models::VerificationCode,
    },
    Rotated {
        event_id: Uuid,
    },
    Moderated {
        event_id: Uuid,
        mutation: Mutation,
    },
    ListDirty,
}

enum Command {
    Select {
        event_id: Uuid,
        reply: oneshot::Sender<Result<(), ConsoleError>>,
    },
    Deselect {
        reply: oneshot::Sender<()>,
    },
    ReloadEvents {
        reply: oneshot::Sender<()>,
    },
    RefreshTally {
        reply: oneshot::Sender<Result<(), ConsoleError>>,
    },
    Moderate {
        mutation: Mutation,
        reply: oneshot::Sender<Result<(), ConsoleError>>,
    },
    RotateCode {
        reply: oneshot::Sender<Result<(), ConsoleError>>,
    },
    CreateEvent {
        fields: NewEvent,
        reply: oneshot::Sender<Result<Event, ConsoleError>>,
    },
    UpdateEventTimes {
        event_id: Uuid,
        times: EventTimes,
        reply: oneshot::Sender<Result<(), ConsoleError>>,
    },
    Snapshot {
        reply: oneshot::Sender<ViewSnapshot>,
    },
}

/// Point-in-time copy of the view, with the derived pieces (phase, counts,
/// countdown renderings) computed for the snapshot instant.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub now: DateTime<Utc>,
    pub metrics: EventMetrics,
    pub events: Vec<Event>,
    pub active: Option<ActiveView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveView {
    pub event: Event,
    pub phase: Phase,
    /// `HH:MM:SS` to the instant the current phase runs toward; `00:00:00`
    /// once finished.
    pub countdown: String,
    pub loading: bool,
    pub stale: bool,
    pub board: Option<TallyBoard>,
    pub pending: Vec<PendingNominee>,
    pub voters: Vec<Voter>,
    pub nominees: Vec<Nominee>,
    pub posts: Vec<CampaignPost>,
    pub code: Option<CodeStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeStatus {
    pub code: String,
    pub remaining: i64,
    pub display: String,
}

/// The view task. Owns the `ViewState` exclusively and serializes every
/// mutation through its loop; timers and the push feed only ever trigger
/// fetches whose completions come back here as messages.
pub struct Console {
    api: Arc<dyn ElectionApi>,
    feed: Arc<dyn VoteFeed>,
    clock: Clock,
    state: ViewState,
    reconciler: CodeReconciler,
    live: Option<LiveSubscription>,
    code_scope: Option<Uuid>,
    code_poll: Option<Interval>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    notice_tx: mpsc::UnboundedSender<FeedNotice>,
    notices: mpsc::UnboundedReceiver<FeedNotice>,
    ticks: broadcast::Receiver<DateTime<Utc>>,
}

/// Cloneable front door to a running console task.
#[derive(Clone)]
pub struct ConsoleHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl Console {
    pub fn spawn(
        api: Arc<dyn ElectionApi>,
        feed: Arc<dyn VoteFeed>,
        ticker: &Ticker,
    ) -> ConsoleHandle {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (notice_tx, notices) = mpsc::unbounded_channel();
        let console = Console {
            api,
            feed,
            clock: ticker.clock().clone(),
            state: ViewState::default(),
            reconciler: CodeReconciler::new(),
            live: None,
            code_scope: None,
            code_poll: None,
            commands,
            completions_tx,
            completions,
            notice_tx,
            notices,
            ticks: ticker.subscribe(),
        };
        tokio::spawn(console.run());
        ConsoleHandle {
            commands: command_tx,
        }
    }

    async fn run(mut self) {
        info!("console started");
        self.spawn_events_fetch();
        loop {
            tokio::select! {
                biased;

                Some(done) = self.completions.recv() => self.on_completion(done).await,
                Some(notice) = self.notices.recv() => self.on_notice(notice),
                Some(_) = poll_tick(&mut self.code_poll) => {
                    if let Some(event_id) = self.code_scope {
                        self.spawn_code_fetch(event_id);
                    }
                }
                tick = self.ticks.recv() => match tick {
                    Ok(now) => self.on_tick(now).await,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd).await,
                    None => break,
                },
            }
        }
        if let Some(sub) = self.live.take() {
            sub.close().await;
        }
        debug!("console stopped");
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Select { event_id, reply } => {
                let _ = reply.send(self.select_event(event_id).await);
            }
            Command::Deselect { reply } => {
                self.clear_active();
                self.reconcile().await;
                let _ = reply.send(());
            }
            Command::ReloadEvents { reply } => {
                self.spawn_events_fetch();
                let _ = reply.send(());
            }
            Command::RefreshTally { reply } => match self.active_id() {
                Some(event_id) => {
                    self.spawn_tally_fetch(event_id);
                    let _ = reply.send(Ok(()));
                }
                None => {
                    let _ = reply.send(Err(ConsoleError::NoActiveEvent));
                }
            },
            Command::Moderate { mutation, reply } => {
                let Some(event_id) = self.active_id() else {
                    let _ = reply.send(Err(ConsoleError::NoActiveEvent));
                    return;
                };
                let api = self.api.clone();
                let tx = self.completions_tx.clone();
                tokio::spawn(async move {
                    let result = mutation.commit(api.as_ref(), event_id).await;
                    if result.is_ok() {
                        let _ = tx.send(Completion::Moderated { event_id, mutation });
                    }
                    let _ = reply.send(result.map_err(ConsoleError::from));
                });
            }
            Command::RotateCode { reply } => {
                let Some(event_id) = self.active_id() else {
                    let _ = reply.send(Err(ConsoleError::NoActiveEvent));
                    return;
                };
                let api = self.api.clone();
                let tx = self.completions_tx.clone();
                tokio::spawn(async move {
                    let result = api.rotate_code(event_id).await;
                    if result.is_ok() {
                        let _ = tx.send(Completion::Rotated { event_id });
                    }
                    let _ = reply.send(result.map_err(ConsoleError::from));
                });
            }
            Command::CreateEvent { fields, reply } => {
                let api = self.api.clone();
                let tx = self.completions_tx.clone();
                tokio::spawn(async move {
                    let result = api.create_event(fields).await;
                    if result.is_ok() {
                        let _ = tx.send(Completion::ListDirty);
                    }
                    let _ = reply.send(result.map_err(ConsoleError::from));
                });
            }
            Command::UpdateEventTimes {
                event_id,
                times,
                reply,
            } => {
                let api = self.api.clone();
                let tx = self.completions_tx.clone();
                tokio::spawn(async move {
                    let result = api.update_event_times(event_id, times).await;
                    if result.is_ok() {
                        let _ = tx.send(Completion::ListDirty);
                    }
                    let _ = reply.send(result.map_err(ConsoleError::from));
                });
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn on_completion(&mut self, done: Completion) {
        match done {
            Completion::Events(events) => {
                self.state.events = events;
                if let Some(active) = self.state.active.as_ref() {
                    // Rebind the active copy to the refreshed record, or drop
                    // the view if the event vanished remotely.
                    match self
                        .state
                        .events
                        .iter()
                        .find(|e| e.id == active.id)
                        .cloned()
                    {
                        Some(updated) => self.state.active = Some(updated),
                        None => self.clear_active(),
                    }
                }
                self.reconcile().await;
            }
            Completion::Bundle { event_id, bundle } => self.apply_bundle(event_id, *bundle),
            Completion::BundleFailed { event_id } | Completion::TallyFailed { event_id } => {
                if self.is_active(event_id) {
                    // Keep whatever the last successful fetch produced.
                    self.state.loading = false;
                    self.state.stale = true;
                }
            }
            Completion::Tally { event_id, counts } => {
                let Some(active) = self.state.active.as_ref() else {
                    return;
                };
                if active.id != event_id {
                    // Issued for an event no longer viewed; never leaks into
                    // this view.
                    return;
                }
                // Applied in completion order: the last-completed fetch wins.
                self.state.board = Some(TallyBoard::build(active.election_type, counts));
                self.state.stale = false;
            }
            Completion::Code { event_id, code } => {
                if self.code_scope == Some(event_id) {
                    self.reconciler.on_code(code, self.clock.now());
                }
            }
            Completion::Rotated { event_id } => {
                if self.code_scope == Some(event_id) {
                    self.reconciler.on_rotated();
                    self.spawn_code_fetch(event_id);
                }
            }
            Completion::Moderated { event_id, mutation } => {
                if self.is_active(event_id) {
                    mutation.apply(&mut self.state.pending, &mut self.state.posts);
                }
            }
            Completion::ListDirty => self.spawn_events_fetch(),
        }
    }

    fn on_notice(&mut self, notice: FeedNotice) {
        // Dirty flag only: the notice says the ledger moved, the numbers
        // come from a fresh fetch.
        if self.is_active(notice.event_id) {
            self.spawn_tally_fetch(notice.event_id);
        }
    }

    async fn on_tick(&mut self, now: DateTime<Utc>) {
        if self.reconciler.on_tick(now) {
            if let Some(event_id) = self.code_scope {
                debug!(%event_id, "verification code expired, forcing re-fetch");
                self.spawn_code_fetch(event_id);
            }
        }
        self.reconcile().await;
    }

    async fn select_event(&mut self, event_id: Uuid) -> Result<(), ConsoleError> {
        let Some(event) = self
            .state
            .events
            .iter()
            .find(|e| e.id == event_id)
            .cloned()
        else {
            return Err(ApiError::EventNotFound.into());
        };
        info!(%event_id, title = %event.title, "switching active event");
        // The previous view is discarded wholesale; nothing is patched
        // across a switch.
        self.clear_active();
        self.state.active = Some(event);
        self.state.loading = true;
        self.reconcile().await;
        self.spawn_bundle_fetch(event_id);
        Ok(())
    }

    fn clear_active(&mut self) {
        self.state.active = None;
        self.state.loading = false;
        self.state.stale = false;
        self.state.board = None;
        self.state.pending.clear();
        self.state.voters.clear();
        self.state.nominees.clear();
        self.state.posts.clear();
        self.reconciler.reset();
    }

    /// Aligns the live subscription and the code-reconciliation scope with
    /// the active event's phase. Phase is recomputed on every call, never
    /// cached.
    async fn reconcile(&mut self) {
        let now = self.clock.now();

        let want_live = self
            .state
            .active
            .as_ref()
            .filter(|e| e.phase(now) == Phase::Voting)
            .map(|e| e.id);
        if self.live.as_ref().map(LiveSubscription::event_id) != want_live {
            if let Some(sub) = self.live.take() {
                // Fully closed before any replacement opens: at most one
                // subscription exists at a time.
                sub.close().await;
            }
            if let Some(event_id) = want_live {
                debug!(%event_id, "joining live vote feed");
                self.live = Some(
                    LiveSubscription::open(self.feed.clone(), event_id, self.notice_tx.clone())
                        .await,
                );
            }
        }

        let want_code = self
            .state
            .active
            .as_ref()
            .filter(|e| e.voting_mode == VotingMode::OnCampus && e.phase(now) == Phase::Voting)
            .map(|e| e.id);
        if self.code_scope != want_code {
            self.code_scope = want_code;
            self.reconciler.reset();
            match want_code {
                Some(event_id) => {
                    debug!(%event_id, "verification code reconciliation active");
                    let period = Duration::from_secs(CODE_POLL_SECS);
                    let mut poll = interval_at(Instant::now() + period, period);
                    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.code_poll = Some(poll);
                    self.spawn_code_fetch(event_id);
                }
                None => {
                    // The poll timer dies with the scope; none survives an
                    // event switch.
                    self.code_poll = None;
                }
            }
        }
    }

    fn apply_bundle(&mut self, event_id: Uuid, bundle: EventBundle) {
        let Some(active) = self.state.active.as_ref() else {
            return;
        };
        if active.id != event_id {
            return;
        }
        self.state.board = Some(TallyBoard::build(active.election_type, bundle.counts));
        self.state.pending = bundle.pending;
        self.state.voters = bundle.voters;
        self.state.nominees = bundle.nominees;
        self.state.posts = bundle.posts;
        self.state.loading = false;
        self.state.stale = false;
    }

    fn active_id(&self) -> Option<Uuid> {
        self.state.active.as_ref().map(|e| e.id)
    }

    fn is_active(&self, event_id: Uuid) -> bool {
        self.active_id() == Some(event_id)
    }

    fn spawn_events_fetch(&self) {
        let api = self.api.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            match api.list_events().await {
                Ok(events) => {
                    let _ = tx.send(Completion::Events(events));
                }
                Err(e) => warn!("event list fetch failed: {e}"),
            }
        });
    }

    fn spawn_bundle_fetch(&self, event_id: Uuid) {
        let api = self.api.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let (counts, pending, voters, nominees, posts) = tokio::join!(
                api.get_tally(event_id),
                api.get_pending_nominees(event_id),
                api.get_voters(event_id),
                api.get_nominees(event_id),
                api.list_campaign_posts(event_id),
            );
            let bundle = (|| {
                Ok::<_, ApiError>(EventBundle {
                    counts: counts?,
                    pending: pending?,
                    voters: voters?,
                    nominees: nominees?,
                    posts: posts?,
                })
            })();
            match bundle {
                Ok(bundle) => {
                    let _ = tx.send(Completion::Bundle {
                        event_id,
                        bundle: Box::new(bundle),
                    });
                }
                Err(e) => {
                    warn!(%event_id, "event data fetch failed: {e}");
                    let _ = tx.send(Completion::BundleFailed { event_id });
                }
            }
        });
    }

    fn spawn_tally_fetch(&self, event_id: Uuid) {
        let api = self.api.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            match api.get_tally(event_id).await {
                Ok(counts) => {
                    let _ = tx.send(Completion::Tally { event_id, counts });
                }
                Err(e) => {
                    warn!(%event_id, "tally fetch failed: {e}");
                    let _ = tx.send(Completion::TallyFailed { event_id });
                }
            }
        });
    }

    fn spawn_code_fetch(&self, event_id: Uuid) {
        let api = self.api.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            match api.current_code(event_id).await {
                Ok(code) => {
                    let _ = tx.send(Completion::Code { event_id, code });
                }
                // The cached code stays up; the freshness floor retries.
                Err(e) => debug!(%event_id, "verification code fetch failed: {e}"),
            }
        });
    }

    fn snapshot(&self) -> ViewSnapshot {
        let now = self.clock.now();
        let active = self.state.active.as_ref().map(|event| {
            let countdown = match event.countdown_target(now) {
                Some(target) => countdown::format_hms(target, now),
                None => "00:00:00".to_string(),
            };
            let code = self.reconciler.code().map(|code| CodeStatus {
                code: code.code.clone(),
                remaining: self.reconciler.remaining().unwrap_or(0),
                display: self
                    .reconciler
                    .display()
                    .unwrap_or_else(|| "00:00".to_string()),
            });
            ActiveView {
                event: event.clone(),
                phase: event.phase(now),
                countdown,
                loading: self.state.loading,
                stale: self.state.stale,
                board: self.state.board.clone(),
                pending: self.state.pending.clone(),
                voters: self.state.voters.clone(),
                nominees: self.state.nominees.clone(),
                posts: self.state.posts.clone(),
                code,
            }
        });
        ViewSnapshot {
            now,
            metrics: phase::metrics(&self.state.events, now),
            events: self.state.events.clone(),
            active,
        }
    }
}

async fn poll_tick(poll: &mut Option<Interval>) -> Option<Instant> {
    match poll {
        Some(interval) => Some(interval.tick().await),
        None => None,
    }
}

impl ConsoleHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ConsoleError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| ConsoleError::Closed)?;
        rx.await.map_err(|_| ConsoleError::Closed)
    }

    /// Makes `event_id` the viewed event and starts its fetches. The
    /// previous view, its subscription, and its timers are torn down first.
    pub async fn select_event(&self, event_id: Uuid) -> Result<(), ConsoleError> {
        self.request(|reply| Command::Select { event_id, reply })
            .await?
    }

    pub async fn deselect(&self) -> Result<(), ConsoleError> {
        self.request(|reply| Command::Deselect { reply }).await
    }

    /// Re-fetches the event list in the background.
    pub async fn reload_events(&self) -> Result<(), ConsoleError> {
        self.request(|reply| Command::ReloadEvents { reply }).await
    }

    /// Manual tally refresh for the viewed event.
    pub async fn refresh_tally(&self) -> Result<(), ConsoleError> {
        self.request(|reply| Command::RefreshTally { reply }).await?
    }

    pub async fn approve_nominee(&self, user_id: Uuid) -> Result<(), ConsoleError> {
        self.request(|reply| Command::Moderate {
            mutation: Mutation::ApproveNominee { user_id },
            reply,
        })
        .await?
    }

    pub async fn delete_post(&self, post_id: Uuid) -> Result<(), ConsoleError> {
        self.request(|reply| Command::Moderate {
            mutation: Mutation::DeletePost { post_id },
            reply,
        })
        .await?
    }

    pub async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<(), ConsoleError> {
        self.request(|reply| Command::Moderate {
            mutation: Mutation::DeleteComment {
                post_id,
                comment_id,
            },
            reply,
        })
        .await?
    }

    pub async fn rotate_code(&self) -> Result<(), ConsoleError> {
        self.request(|reply| Command::RotateCode { reply }).await?
    }

    pub async fn create_event(&self, fields: NewEvent) -> Result<Event, ConsoleError> {
        self.request(|reply| Command::CreateEvent { fields, reply })
            .await?
    }

    pub async fn update_event_times(
        &self,
        event_id: Uuid,
        times: EventTimes,
    ) -> Result<(), ConsoleError> {
        self.request(|reply| Command::UpdateEventTimes {
            event_id,
            times,
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self) -> Result<ViewSnapshot, ConsoleError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}
