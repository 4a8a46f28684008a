use std::sync::Arc;
use std::time::Duration;

use evote_console::api::{ElectionApi, HttpApi};
use evote_console::config::Config;
use evote_console::console::{Console, ViewSnapshot};
use evote_console::countdown::{Clock, Ticker};
use evote_console::feed::{VoteFeed, WsFeed};
use evote_console::phase::{Category, categorize};

#[macro_use]
extern crate tracing;

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "INFO");
        }
    }
    tracing_subscriber::fmt::init();
    let _ = dotenvy::dotenv();

    let config = Config::from_env().expect("invalid configuration");

    let api: Arc<dyn ElectionApi> = Arc::new(HttpApi::new(&config.api_base));
    let feed: Arc<dyn VoteFeed> = Arc::new(
        WsFeed::connect(&config.feed_url)
            .await
            .expect("unable to connect to the vote feed"),
    );
    let ticker = Ticker::spawn(Clock::system());
    let console = Console::spawn(api, feed, &ticker);

    // Give the initial event list a moment to land, then pick a view.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let snapshot = console.snapshot().await.expect("console died during startup");
    info!(
        total = snapshot.metrics.total,
        running = snapshot.metrics.running,
        upcoming = snapshot.metrics.upcoming,
        finished = snapshot.metrics.previous,
        "event list loaded"
    );

    let watched = config.watch_event.or_else(|| {
        snapshot
            .events
            .iter()
            .find(|e| categorize(e, snapshot.now) == Category::Running)
            .map(|e| e.id)
    });
    match watched {
        Some(event_id) => {
            if let Err(e) = console.select_event(event_id).await {
                error!(%event_id, "could not select event: {e}");
            }
        }
        None => info!("no running event to watch"),
    }

    let mut report = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = report.tick() => {
                let Ok(snapshot) = console.snapshot().await else { break };
                report_view(&snapshot);
            }
        }
    }
    info!("shutting down");
}

fn report_view(snapshot: &ViewSnapshot) {
    let Some(active) = &snapshot.active else {
        return;
    };
    info!(
        event = %active.event.title,
        phase = active.phase.as_str(),
        countdown = %active.countdown,
        stale = active.stale,
        "view"
    );
    if let Some(board) = &active.board {
        for (rank, entry) in board.leaderboard().iter().enumerate() {
            info!(rank = rank + 1, name = %entry.name, tally = entry.tally, "standing");
        }
    }
    if let Some(code) = &active.code {
        info!(code = %code.code, remaining = %code.display, "verification code");
    }
}
