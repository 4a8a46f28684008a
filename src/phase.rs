use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Event;

/// Where an event sits in its lifecycle. Always derived from the schedule
/// and the current time, never stored on the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Registration,
    Waiting,
    Voting,
    Finished,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Registration => "registration",
            Phase::Waiting => "waiting",
            Phase::Voting => "voting",
            Phase::Finished => "finished",
        }
    }

    /// Display label for the event list.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Registration => "Registration Open",
            Phase::Waiting => "Waiting to Vote",
            Phase::Voting => "Voting Live",
            Phase::Finished => "Finished",
        }
    }
}

/// Classify an event schedule against `now`.
///
/// The precedence order is load-bearing: a passed `vote_end` wins over
/// everything else, so an out-of-order schedule still classifies, and it
/// degrades to `Finished`, the most conservative answer.
pub fn classify(
    reg_end: DateTime<Utc>,
    vote_start: DateTime<Utc>,
    vote_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Phase {
    if now >= vote_end {
        Phase::Finished
    } else if now >= vote_start {
        Phase::Voting
    } else if now >= reg_end {
        Phase::Waiting
    } else {
        Phase::Registration
    }
}

impl Event {
    pub fn phase(&self, now: DateTime<Utc>) -> Phase {
        classify(self.reg_end, self.vote_start, self.vote_end, now)
    }

    /// The instant the current phase's countdown runs toward, if any.
    pub fn countdown_target(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.phase(now) {
            Phase::Registration => Some(self.reg_end),
            Phase::Waiting => Some(self.vote_start),
            Phase::Voting => Some(self.vote_end),
            Phase::Finished => None,
        }
    }
}

/// Coarser grouping of the event list for navigation and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Upcoming,
    Running,
    Previous,
}

pub fn categorize(event: &Event, now: DateTime<Utc>) -> Category {
    if now >= event.vote_end {
        Category::Previous
    } else if now >= event.vote_start {
        Category::Running
    } else {
        Category::Upcoming
    }
}

/// Dashboard headline counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventMetrics {
    pub total: usize,
    pub running: usize,
    pub upcoming: usize,
    pub previous: usize,
}

pub fn metrics(events: &[Event], now: DateTime<Utc>) -> EventMetrics {
    let mut out = EventMetrics {
        total: events.len(),
        ..EventMetrics::default()
    };
    for event in events {
        match categorize(event, now) {
            Category::Running => out.running += 1,
            Category::Upcoming => out.upcoming += 1,
            Category::Previous => out.previous += 1,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    use crate::models::{ElectionType, VotingMode};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn event(reg_end: DateTime<Utc>, vote_start: DateTime<Utc>, vote_end: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Board Election".to_string(),
            description: None,
            election_type: ElectionType::Single,
            voting_mode: VotingMode::Online,
            reg_end,
            vote_start,
            vote_end,
            code_rotation_minutes: None,
        }
    }

    #[test]
    fn classify_walks_all_four_phases() {
        let t = base();
        let reg_end = t + Duration::minutes(10);
        let vote_start = t + Duration::minutes(20);
        let vote_end = t + Duration::minutes(30);

        assert_eq!(
            classify(reg_end, vote_start, vote_end, t + Duration::minutes(5)),
            Phase::Registration
        );
        assert_eq!(
            classify(reg_end, vote_start, vote_end, t + Duration::minutes(15)),
            Phase::Waiting
        );
        assert_eq!(
            classify(reg_end, vote_start, vote_end, t + Duration::minutes(25)),
            Phase::Voting
        );
        assert_eq!(
            classify(reg_end, vote_start, vote_end, t + Duration::minutes(35)),
            Phase::Finished
        );
    }

    #[test]
    fn phase_boundaries_are_inclusive() {
        let t = base();
        let reg_end = t + Duration::minutes(10);
        let vote_start = t + Duration::minutes(20);
        let vote_end = t + Duration::minutes(30);

        assert_eq!(classify(reg_end, vote_start, vote_end, reg_end), Phase::Waiting);
        assert_eq!(classify(reg_end, vote_start, vote_end, vote_start), Phase::Voting);
        assert_eq!(classify(reg_end, vote_start, vote_end, vote_end), Phase::Finished);
    }

    #[test]
    fn phase_is_monotonic_in_now() {
        let t = base();
        let reg_end = t + Duration::minutes(10);
        let vote_start = t + Duration::minutes(20);
        let vote_end = t + Duration::minutes(30);

        let order = |p: Phase| match p {
            Phase::Registration => 0,
            Phase::Waiting => 1,
            Phase::Voting => 2,
            Phase::Finished => 3,
        };

        let mut last = 0;
        for minute in 0..45 {
            let phase = classify(reg_end, vote_start, vote_end, t + Duration::minutes(minute));
            let rank = order(phase);
            assert!(rank >= last, "phase went backward at minute {minute}");
            last = rank;
        }
    }

    #[test]
    fn out_of_order_schedule_degrades_to_finished() {
        let t = base();
        // vote_end before vote_start: a retroactively mangled schedule.
        let reg_end = t + Duration::minutes(10);
        let vote_start = t + Duration::minutes(30);
        let vote_end = t + Duration::minutes(20);

        assert_eq!(
            classify(reg_end, vote_start, vote_end, t + Duration::minutes(25)),
            Phase::Finished
        );
    }

    #[test]
    fn countdown_target_follows_phase() {
        let t = base();
        let e = event(
            t + Duration::minutes(10),
            t + Duration::minutes(20),
            t + Duration::minutes(30),
        );

        assert_eq!(e.countdown_target(t), Some(e.reg_end));
        assert_eq!(e.countdown_target(t + Duration::minutes(15)), Some(e.vote_start));
        assert_eq!(e.countdown_target(t + Duration::minutes(25)), Some(e.vote_end));
        assert_eq!(e.countdown_target(t + Duration::minutes(35)), None);
    }

    #[test]
    fn each_event_lands_in_exactly_one_category() {
        let t = base();
        let upcoming = event(
            t + Duration::minutes(10),
            t + Duration::minutes(20),
            t + Duration::minutes(30),
        );
        let running = event(
            t - Duration::minutes(30),
            t - Duration::minutes(10),
            t + Duration::minutes(10),
        );
        let previous = event(
            t - Duration::minutes(30),
            t - Duration::minutes(20),
            t - Duration::minutes(10),
        );

        assert_eq!(categorize(&upcoming, t), Category::Upcoming);
        assert_eq!(categorize(&running, t), Category::Running);
        assert_eq!(categorize(&previous, t), Category::Previous);

        let m = metrics(&[upcoming, running, previous], t);
        assert_eq!(m.total, 3);
        assert_eq!(m.running, 1);
        assert_eq!(m.upcoming, 1);
        assert_eq!(m.previous, 1);
    }
}
