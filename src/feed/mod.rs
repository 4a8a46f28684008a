use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::FeedError;

mod ws;

pub use ws::WsFeed;

/// A vote landed for this event. Dirty-flag only: the notice carries no
/// tally data, so the channel can never diverge from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedNotice {
    pub event_id: Uuid,
}

pub type NoticeSender = broadcast::Sender<FeedNotice>;

pub fn notice_channel() -> NoticeSender {
    broadcast::channel(100).0
}

/// The push side of the election service: register interest per event,
/// receive `FeedNotice`s for it.
#[async_trait]
pub trait VoteFeed: Send + Sync {
    async fn join(&self, event_id: Uuid) -> Result<(), FeedError>;

    async fn leave(&self, event_id: Uuid) -> Result<(), FeedError>;

    fn notices(&self) -> broadcast::Receiver<FeedNotice>;
}
