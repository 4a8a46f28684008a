use chrono::{DateTime, Utc};

use crate::countdown;
use crate::models::VerificationCode;

/// Freshness floor for the cached verification code, independent of its
/// expiry.
pub const CODE_POLL_SECS: u64 = 30;

/// Reconciles the locally cached on-campus verification code against its
/// authoritative server-side expiry. Active only while the viewed event is
/// on-campus and in the voting phase; the console resets it on every scope
/// change so no countdown survives an event switch.
///
/// The reconciler itself never fetches. It only reports when a forced
/// re-fetch is due, and the console issues it.
#[derive(Debug, Default)]
pub struct CodeReconciler {
    cached: Option<VerificationCode>,
    remaining: Option<i64>,
}

impl CodeReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh authoritative code arrived.
    pub fn on_code(&mut self, code: VerificationCode, now: DateTime<Utc>) {
        self.remaining = Some(countdown::remaining_seconds(code.expires_at, now));
        self.cached = Some(code);
    }

    /// Shared one-second tick. Returns `true` when the countdown just hit
    /// zero and an immediate re-fetch must be issued.
    ///
    /// Edge-triggered: once fired, later ticks at zero stay quiet, so a
    /// re-fetch that takes longer than a tick is issued exactly once and the
    /// freshness floor covers a re-fetch that failed.
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> bool {
        let Some(code) = &self.cached else {
            return false;
        };
        let next = countdown::remaining_seconds(code.expires_at, now);
        let previous = self.remaining.replace(next);
        next == 0 && previous.is_some_and(|r| r > 0)
    }

    /// Remote rotation confirmed: the old code is dead, drop it. The caller
    /// issues the follow-up fetch; until it lands nothing is displayed.
    /// A failed rotation never reaches this point, so the previous code and
    /// countdown stay on screen unchanged.
    pub fn on_rotated(&mut self) {
        self.cached = None;
        self.remaining = None;
    }

    /// Leaving the on-campus voting scope.
    pub fn reset(&mut self) {
        self.cached = None;
        self.remaining = None;
    }

    pub fn code(&self) -> Option<&VerificationCode> {
        self.cached.as_ref()
    }

    pub fn remaining(&self) -> Option<i64> {
        self.remaining
    }

    /// `MM:SS` rendering of the countdown, if a code is cached.
    pub fn display(&self) -> Option<String> {
        self.remaining.map(countdown::format_mmss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn code(expires_in: i64) -> VerificationCode {
        VerificationCode {
            code: "483920".to_string(),
            expires_at: base() + Duration::seconds(expires_in),
        }
    }

    #[test]
    fn counts_down_against_the_cached_expiry() {
        let mut r = CodeReconciler::new();
        r.on_code(code(90), base());
        assert_eq!(r.remaining(), Some(90));
        assert_eq!(r.display().as_deref(), Some("01:30"));

        assert!(!r.on_tick(base() + Duration::seconds(1)));
        assert_eq!(r.remaining(), Some(89));
    }

    #[test]
    fn fires_exactly_once_when_the_countdown_hits_zero() {
        let mut r = CodeReconciler::new();
        r.on_code(code(3), base());

        assert!(!r.on_tick(base() + Duration::seconds(1)));
        assert!(!r.on_tick(base() + Duration::seconds(2)));
        assert!(r.on_tick(base() + Duration::seconds(3)));

        // The re-fetch is still in flight; stay quiet.
        assert!(!r.on_tick(base() + Duration::seconds(4)));
        assert!(!r.on_tick(base() + Duration::seconds(5)));
    }

    #[test]
    fn a_fresh_code_rearms_the_zero_trigger() {
        let mut r = CodeReconciler::new();
        r.on_code(code(2), base());
        assert!(r.on_tick(base() + Duration::seconds(2)));

        r.on_code(code(10), base() + Duration::seconds(3));
        assert!(!r.on_tick(base() + Duration::seconds(4)));
        assert!(r.on_tick(base() + Duration::seconds(10)));
    }

    #[test]
    fn a_code_already_expired_on_arrival_does_not_fire() {
        let mut r = CodeReconciler::new();
        r.on_code(code(-5), base());
        assert_eq!(r.remaining(), Some(0));
        // Zero on arrival is not a transition; the freshness floor handles it.
        assert!(!r.on_tick(base() + Duration::seconds(1)));
    }

    #[test]
    fn rotation_drops_the_cache_and_reset_clears_everything() {
        let mut r = CodeReconciler::new();
        r.on_code(code(60), base());

        r.on_rotated();
        assert!(r.code().is_none());
        assert!(r.display().is_none());
        assert!(!r.on_tick(base() + Duration::seconds(1)));

        r.on_code(code(60), base());
        r.reset();
        assert!(r.code().is_none());
        assert_eq!(r.remaining(), None);
    }
}
