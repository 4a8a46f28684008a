use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::FeedError;
use crate::feed::{FeedNotice, NoticeSender, VoteFeed, notice_channel};

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    JoinEvent { event_id: Uuid },
    #[serde(rename_all = "camelCase")]
    LeaveEvent { event_id: Uuid },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    VoteUpdate { event_id: Uuid },
    #[serde(other)]
    Other,
}

/// WebSocket vote feed. One socket per process; interest is registered and
/// released per event with `joinEvent`/`leaveEvent` frames, and incoming
/// `voteUpdate` frames fan out to every subscriber.
///
/// A dropped socket is not reconnected here; consumers degrade to their
/// polling floor.
pub struct WsFeed {
    outbound: mpsc::UnboundedSender<ClientFrame>,
    notices: NoticeSender,
}

impl WsFeed {
    pub async fn connect(url: &str) -> Result<Self, FeedError> {
        let (socket, _) = connect_async(url).await?;
        let (mut sink, mut stream) = socket.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientFrame>();
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("failed to encode feed frame: {e}");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    warn!("feed connection closed while sending");
                    break;
                }
            }
        });

        let notices = notice_channel();
        let tx = notices.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
                        Ok(ServerFrame::VoteUpdate { event_id }) => {
                            let _ = tx.send(FeedNotice { event_id });
                        }
                        Ok(ServerFrame::Other) => debug!("ignoring feed frame: {text}"),
                        Err(e) => warn!("bad feed frame: {e}"),
                    },
                    Ok(Message::Close(_)) => {
                        debug!("feed closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("feed read error: {e}");
                        break;
                    }
                }
            }
        });

        Ok(Self { outbound, notices })
    }
}

#[async_trait]
impl VoteFeed for WsFeed {
    async fn join(&self, event_id: Uuid) -> Result<(), FeedError> {
        self.outbound
            .send(ClientFrame::JoinEvent { event_id })
            .map_err(|_| FeedError::Closed)
    }

    async fn leave(&self, event_id: Uuid) -> Result<(), FeedError> {
        self.outbound
            .send(ClientFrame::LeaveEvent { event_id })
            .map_err(|_| FeedError::Closed)
    }

    fn notices(&self) -> broadcast::Receiver<FeedNotice> {
        self.notices.subscribe()
    }
}
