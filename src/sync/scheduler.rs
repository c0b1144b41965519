//! Upload scheduling as an explicit state machine.
//!
//! ```text
//! idle -> pending -> in-flight -> settling -> idle
//!            ^                        |
//!            +------ (edited) --------+
//! ```
//!
//! Every edit restarts the debounce window, so a burst of edits produces one
//! upload of the latest state. Once an upload starts, its outcome is held back
//! until the syncing status has been visible for the minimum duration. The
//! scheduler owns no timers: the caller feeds it the current instant and
//! sleeps until [`UploadScheduler::next_deadline`].

use tokio::time::Instant;

use super::SyncConfig;

/// How a scheduled upload ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Offline,
}

/// What the caller must do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    StartUpload,
    Report(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pending {
        fire_at: Instant,
    },
    InFlight {
        visible_until: Instant,
        edited_at: Option<Instant>,
    },
    Settling {
        until: Instant,
        outcome: Outcome,
        edited_at: Option<Instant>,
    },
    /// Upload came due while offline
    Deferred,
}

#[derive(Debug)]
pub struct UploadScheduler {
    config: SyncConfig,
    phase: Phase,
}

impl UploadScheduler {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
        }
    }

    /// Level content changed at `now`
    pub fn content_changed(&mut self, now: Instant) {
        self.phase = match self.phase {
            Phase::Idle | Phase::Pending { .. } | Phase::Deferred => Phase::Pending {
                fire_at: now + self.config.debounce,
            },
            Phase::InFlight { visible_until, .. } => Phase::InFlight {
                visible_until,
                edited_at: Some(now),
            },
            Phase::Settling { until, outcome, .. } => Phase::Settling {
                until,
                outcome,
                edited_at: Some(now),
            },
        };
    }

    /// Advance past every deadline that has been reached
    pub fn poll(&mut self, now: Instant, offline: bool) -> Vec<Step> {
        match self.phase {
            Phase::Pending { fire_at } if now >= fire_at => {
                if offline {
                    self.phase = Phase::Deferred;
                    vec![Step::Report(Outcome::Offline)]
                } else {
                    self.phase = Phase::InFlight {
                        visible_until: now + self.config.min_visible,
                        edited_at: None,
                    };
                    vec![Step::StartUpload]
                }
            }
            Phase::Settling {
                until,
                outcome,
                edited_at,
            } if now >= until => {
                self.phase = match edited_at {
                    Some(at) => Phase::Pending {
                        fire_at: (at + self.config.debounce).max(now),
                    },
                    None => Phase::Idle,
                };
                let mut steps = vec![Step::Report(outcome)];
                // An edit made long enough ago may already be due.
                steps.extend(self.poll(now, offline));
                steps
            }
            _ => Vec::new(),
        }
    }

    /// The upload started by [`Step::StartUpload`] completed
    pub fn upload_finished(&mut self, now: Instant, success: bool, offline: bool) -> Vec<Step> {
        if let Phase::InFlight {
            visible_until,
            edited_at,
        } = self.phase
        {
            self.phase = Phase::Settling {
                until: visible_until,
                outcome: if success {
                    Outcome::Success
                } else {
                    Outcome::Failure
                },
                edited_at,
            };
        }
        self.poll(now, offline)
    }

    /// Connectivity came back; a deferred upload fires right away
    pub fn network_restored(&mut self, now: Instant) {
        if self.phase == Phase::Deferred {
            self.phase = Phase::Pending { fire_at: now };
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Pending { fire_at } => Some(fire_at),
            Phase::Settling { until, .. } => Some(until),
            _ => None,
        }
    }

    /// Drop any pending work
    pub fn cancel(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Neither waiting to upload nor reporting one
    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle | Phase::Deferred)
    }

    pub fn is_deferred(&self) -> bool {
        self.phase == Phase::Deferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scheduler() -> UploadScheduler {
        UploadScheduler::new(SyncConfig::default())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_debounce_coalesces_edits() {
        let t0 = Instant::now();
        let mut s = scheduler();

        s.content_changed(t0);
        s.content_changed(t0 + ms(300));
        assert!(s.poll(t0 + ms(500), false).is_empty());
        assert_eq!(s.next_deadline(), Some(t0 + ms(800)));
        assert_eq!(s.poll(t0 + ms(800), false), vec![Step::StartUpload]);
        assert!(s.poll(t0 + ms(900), false).is_empty());
    }

    #[test]
    fn test_fast_upload_stays_visible() {
        let t0 = Instant::now();
        let mut s = scheduler();
        s.content_changed(t0);
        s.poll(t0 + ms(500), false);

        assert!(s.upload_finished(t0 + ms(600), true, false).is_empty());
        assert_eq!(s.next_deadline(), Some(t0 + ms(1500)));
        assert_eq!(
            s.poll(t0 + ms(1500), false),
            vec![Step::Report(Outcome::Success)]
        );
        assert!(s.is_idle());
    }

    #[test]
    fn test_slow_upload_reports_immediately() {
        let t0 = Instant::now();
        let mut s = scheduler();
        s.content_changed(t0);
        s.poll(t0 + ms(500), false);

        assert_eq!(
            s.upload_finished(t0 + ms(3000), false, false),
            vec![Step::Report(Outcome::Failure)]
        );
        assert!(s.is_idle());
    }

    #[test]
    fn test_edit_during_upload_schedules_another() {
        let t0 = Instant::now();
        let mut s = scheduler();
        s.content_changed(t0);
        s.poll(t0 + ms(500), false);

        s.content_changed(t0 + ms(700));
        s.upload_finished(t0 + ms(800), true, false);
        assert_eq!(
            s.poll(t0 + ms(1500), false),
            vec![Step::Report(Outcome::Success), Step::StartUpload]
        );
    }

    #[test]
    fn test_offline_defers_until_restored() {
        let t0 = Instant::now();
        let mut s = scheduler();
        s.content_changed(t0);

        assert_eq!(
            s.poll(t0 + ms(500), true),
            vec![Step::Report(Outcome::Offline)]
        );
        assert!(s.is_deferred());
        assert_eq!(s.next_deadline(), None);

        s.network_restored(t0 + ms(2000));
        assert_eq!(s.poll(t0 + ms(2000), false), vec![Step::StartUpload]);
    }

    #[test]
    fn test_cancel_clears_pending_upload() {
        let t0 = Instant::now();
        let mut s = scheduler();
        s.content_changed(t0);
        s.cancel();
        assert!(s.is_idle());
        assert!(s.poll(t0 + ms(10_000), false).is_empty());
    }
}
