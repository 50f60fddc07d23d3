//! Post-add recheck tracking and the auto-resume decision.
//!
//! The monitor holds no timer; callers poll at their own cadence. It leaves
//! `Pending` only once the client reports checking, or once progress has moved
//! away from the value seen before the recheck was requested (a check that
//! finished between polls). Stale pre-recheck states never decide the outcome.

use seedlink_torrent_core::{ClientTorrentState, TorrentClient, TorrentError, TorrentHash};
use tracing::{info, warn};

use crate::error::{CrossSeedError, CrossSeedResult};

/// Default auto-resume threshold in percent.
pub const DEFAULT_RECHECK_THRESHOLD: f64 = 95.0;

/// Monitor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecheckState {
    /// Recheck requested, not yet observed.
    Pending,
    /// Client is verifying pieces.
    Checking,
    /// Threshold met and the torrent was resumed.
    AutoResumed,
    /// Threshold missed; the torrent stays paused for the operator.
    StayingPaused,
}

impl RecheckState {
    /// Whether the monitor has reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::AutoResumed | Self::StayingPaused)
    }
}

/// Decision taken once the recheck finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecheckOutcome {
    /// Enough data verified; resume.
    AutoResume,
    /// Too little data verified; leave paused.
    StayPaused,
}

impl RecheckOutcome {
    /// Classify observed progress against an inclusive threshold.
    #[must_use]
    pub fn classify(progress: f64, threshold: f64) -> Self {
        if progress >= threshold {
            Self::AutoResume
        } else {
            Self::StayPaused
        }
    }

    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AutoResume => "auto_resumed",
            Self::StayPaused => "staying_paused",
        }
    }
}

/// Tracks one torrent's recheck.
#[derive(Debug, Clone, PartialEq)]
pub struct RecheckMonitor {
    hash: TorrentHash,
    threshold: f64,
    state: RecheckState,
    baseline: Option<f64>,
    last_progress: Option<f64>,
}

impl RecheckMonitor {
    /// Monitor for `hash` resuming at `threshold` percent or more.
    #[must_use]
    pub const fn new(hash: TorrentHash, threshold: f64) -> Self {
        Self {
            hash,
            threshold,
            state: RecheckState::Pending,
            baseline: None,
            last_progress: None,
        }
    }

    /// Progress the client reported before the recheck was requested.
    #[must_use]
    pub const fn with_baseline(mut self, progress: f64) -> Self {
        self.baseline = Some(progress);
        self
    }

    /// Progress a finished check must differ from while still `Pending`.
    #[must_use]
    pub const fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    /// Torrent being monitored.
    #[must_use]
    pub const fn hash(&self) -> &TorrentHash {
        &self.hash
    }

    /// Auto-resume threshold in percent.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> RecheckState {
        self.state
    }

    /// Progress seen by the latest observation.
    #[must_use]
    pub const fn last_progress(&self) -> Option<f64> {
        self.last_progress
    }

    /// Feed a client state; returns the outcome when the recheck has just finished.
    ///
    /// While `Pending`, an idle state only completes the recheck when its
    /// progress differs from the baseline; the first idle state becomes the
    /// baseline when none was given. Terminal monitors ignore further input.
    pub fn observe(&mut self, state: &ClientTorrentState) -> Option<RecheckOutcome> {
        if self.state.is_terminal() {
            return None;
        }
        self.last_progress = Some(state.progress);
        if state.activity.is_checking() {
            self.state = RecheckState::Checking;
            return None;
        }
        if self.state == RecheckState::Pending {
            match self.baseline {
                None => {
                    self.baseline = Some(state.progress);
                    return None;
                }
                Some(baseline) if (state.progress - baseline).abs() <= f64::EPSILON => return None,
                Some(_) => {}
            }
        }
        let outcome = RecheckOutcome::classify(state.progress, self.threshold);
        self.state = match outcome {
            RecheckOutcome::AutoResume => RecheckState::AutoResumed,
            RecheckOutcome::StayPaused => RecheckState::StayingPaused,
        };
        Some(outcome)
    }

    /// Poll the client once and resume the torrent when the threshold is met.
    ///
    /// # Errors
    ///
    /// Returns [`CrossSeedError::Client`] when the client call fails or no longer
    /// knows the torrent.
    pub async fn poll<C>(&mut self, client: &C) -> CrossSeedResult<Option<RecheckOutcome>>
    where
        C: TorrentClient + ?Sized,
    {
        if self.state.is_terminal() {
            return Ok(None);
        }
        let state = client
            .torrent_state(&self.hash)
            .await
            .map_err(|err| CrossSeedError::client("torrent_state", &self.hash, err))?
            .ok_or_else(|| CrossSeedError::Client {
                source: TorrentError::NotFound {
                    hash: self.hash.to_string(),
                },
            })?;

        let Some(outcome) = self.observe(&state) else {
            return Ok(None);
        };
        match outcome {
            RecheckOutcome::AutoResume => {
                client
                    .resume(&self.hash)
                    .await
                    .map_err(|err| CrossSeedError::client("resume", &self.hash, err))?;
                info!(
                    hash = %self.hash,
                    progress = state.progress,
                    threshold = self.threshold,
                    "recheck passed; torrent resumed"
                );
            }
            RecheckOutcome::StayPaused => {
                warn!(
                    hash = %self.hash,
                    progress = state.progress,
                    threshold = self.threshold,
                    "recheck below threshold; torrent left paused"
                );
            }
        }
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedlink_torrent_core::TorrentActivity;

    fn state(progress: f64, activity: TorrentActivity) -> ClientTorrentState {
        ClientTorrentState {
            hash: TorrentHash::from_bytes(&[3; 20]),
            progress,
            activity,
            files: Vec::new(),
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(RecheckOutcome::classify(95.0, 95.0), RecheckOutcome::AutoResume);
        assert_eq!(RecheckOutcome::classify(94.9, 95.0), RecheckOutcome::StayPaused);
        assert_eq!(RecheckOutcome::classify(100.0, DEFAULT_RECHECK_THRESHOLD), RecheckOutcome::AutoResume);
    }

    #[test]
    fn monitor_walks_the_state_machine() {
        let mut monitor = RecheckMonitor::new(TorrentHash::from_bytes(&[3; 20]), 95.0);
        assert_eq!(monitor.state(), RecheckState::Pending);
        assert_eq!(monitor.observe(&state(40.0, TorrentActivity::CheckingFiles)), None);
        assert_eq!(monitor.state(), RecheckState::Checking);
        assert_eq!(
            monitor.observe(&state(94.9, TorrentActivity::Paused)),
            Some(RecheckOutcome::StayPaused)
        );
        assert_eq!(monitor.state(), RecheckState::StayingPaused);
        assert_eq!(monitor.last_progress(), Some(94.9));
        assert_eq!(monitor.observe(&state(100.0, TorrentActivity::Paused)), None);
        assert_eq!(monitor.state(), RecheckState::StayingPaused);
    }

    #[test]
    fn stale_idle_state_waits_for_checking() {
        let mut monitor = RecheckMonitor::new(TorrentHash::from_bytes(&[3; 20]), 95.0);
        assert_eq!(monitor.observe(&state(0.0, TorrentActivity::Paused)), None);
        assert_eq!(monitor.state(), RecheckState::Pending);
        assert_eq!(monitor.baseline(), Some(0.0));
        assert_eq!(monitor.observe(&state(0.0, TorrentActivity::Paused)), None);
        assert_eq!(monitor.observe(&state(100.0, TorrentActivity::CheckingFiles)), None);
        assert_eq!(monitor.state(), RecheckState::Checking);
        assert_eq!(
            monitor.observe(&state(100.0, TorrentActivity::Paused)),
            Some(RecheckOutcome::AutoResume)
        );
        assert_eq!(monitor.state(), RecheckState::AutoResumed);
    }

    #[test]
    fn check_finished_between_polls_is_detected_from_baseline() {
        let mut monitor = RecheckMonitor::new(TorrentHash::from_bytes(&[3; 20]), 95.0).with_baseline(100.0);
        assert_eq!(monitor.observe(&state(100.0, TorrentActivity::Paused)), None);
        assert_eq!(monitor.state(), RecheckState::Pending);
        assert_eq!(
            monitor.observe(&state(97.5, TorrentActivity::Paused)),
            Some(RecheckOutcome::AutoResume)
        );
        assert_eq!(monitor.state(), RecheckState::AutoResumed);
    }
}
