use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;

/// Time source for everything that renders a countdown. The manual variant
/// exists so timer-driven behavior can be steered deterministically.
#[derive(Clone)]
pub struct Clock {
    manual: Option<Arc<Mutex<DateTime<Utc>>>>,
}

impl Clock {
    pub fn system() -> Self {
        Self { manual: None }
    }

    pub fn manual(start: DateTime<Utc>) -> Self {
        Self {
            manual: Some(Arc::new(Mutex::new(start))),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match &self.manual {
            None => Utc::now(),
            Some(m) => *m.lock().expect("clock lock poisoned"),
        }
    }

    /// Advances a manual clock; no-op on the system clock.
    pub fn advance(&self, by: chrono::Duration) {
        if let Some(m) = &self.manual {
            *m.lock().expect("clock lock poisoned") += by;
        }
    }
}

/// Seconds until `target`, clamped at zero.
pub fn remaining_seconds(target: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (target - now).num_seconds().max(0)
}

/// Zero-padded `HH:MM:SS` until `target`. Past targets render `00:00:00`.
pub fn format_hms(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total = remaining_seconds(target, now);
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Zero-padded `MM:SS` for the verification-code countdown; minutes are not
/// wrapped at the hour.
pub fn format_mmss(seconds: i64) -> String {
    let total = seconds.max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// The single shared one-second tick source. Every on-screen countdown
/// subscribes here; per-countdown timers would drift apart.
pub struct Ticker {
    tx: broadcast::Sender<DateTime<Utc>>,
    clock: Clock,
    task: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn(clock: Clock) -> Self {
        let (tx, _) = broadcast::channel(16);
        let sender = tx.clone();
        let source = clock.clone();
        let task = tokio::spawn(async move {
            let mut ticks = IntervalStream::new(interval(Duration::from_secs(1)));
            while ticks.next().await.is_some() {
                // A send error just means nobody is watching right now.
                let _ = sender.send(source.now());
            }
        });
        Self { tx, clock, task }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DateTime<Utc>> {
        self.tx.subscribe()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
