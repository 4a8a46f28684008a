use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::feed::{FeedNotice, VoteFeed};

/// Notices for one event only, whatever else shares the channel. Traffic
/// for events this client is not viewing is dropped here, before it can
/// touch the view.
fn scoped_notices(
    mut rx: broadcast::Receiver<FeedNotice>,
    event_id: Uuid,
) -> impl Stream<Item = FeedNotice> {
    stream! {
        loop {
            match rx.recv().await {
                Ok(notice) if notice.event_id == event_id => yield notice,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Fine to drop: the next notice forces a full re-fetch
                    // anyway, the notices carry nothing.
                    warn!(skipped, "live feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// The per-event push subscription.
///
/// The console holds at most one of these. Opening registers interest for
/// exactly one event id; matching notices are forwarded to the console,
/// which answers each with a full tally re-fetch. `close` releases interest
/// and stops forwarding, and completes before any replacement is opened.
pub struct LiveSubscription {
    event_id: Uuid,
    feed: Arc<dyn VoteFeed>,
    task: JoinHandle<()>,
}

impl LiveSubscription {
    pub async fn open(
        feed: Arc<dyn VoteFeed>,
        event_id: Uuid,
        out: mpsc::UnboundedSender<FeedNotice>,
    ) -> Self {
        // Subscribe to the fan-out before registering interest so no notice
        // can slip between the two.
        let rx = feed.notices();
        if let Err(e) = feed.join(event_id).await {
            // Degrades to the polling floor; the view keeps whatever the
            // last successful fetch produced.
            warn!(%event_id, "live feed join failed: {e}");
        }
        let task = tokio::spawn(async move {
            let mut notices = Box::pin(scoped_notices(rx, event_id));
            while let Some(notice) = notices.next().await {
                if out.send(notice).is_err() {
                    break;
                }
            }
        });
        Self {
            event_id,
            feed,
            task,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub async fn close(self) {
        self.task.abort();
        if let Err(e) = self.feed.leave(self.event_id).await {
            debug!(event_id = %self.event_id, "live feed leave failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::testutil::MockFeed;

    #[tokio::test(start_paused = true)]
    async fn forwards_matching_notices_and_drops_the_rest() {
        let feed = Arc::new(MockFeed::new());
        let viewed = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sub = LiveSubscription::open(feed.clone(), viewed, tx).await;
        assert_eq!(feed.joined(), vec![viewed]);

        feed.notify(other);
        feed.notify(viewed);
        feed.notify(other);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(rx.recv().await.unwrap().event_id, viewed);
        assert!(rx.try_recv().is_err(), "unrelated notices leaked through");

        sub.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn close_releases_interest_and_stops_forwarding() {
        let feed = Arc::new(MockFeed::new());
        let viewed = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sub = LiveSubscription::open(feed.clone(), viewed, tx).await;
        sub.close().await;
        assert_eq!(feed.left(), vec![viewed]);

        feed.notify(viewed);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err(), "closed subscription still forwards");
    }
}
