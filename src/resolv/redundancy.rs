//! Deciding whether to query backup servers.
//!
//! The [`Controller`] keeps track of whether the primary servers can be
//! trusted. In [`Mode::Normal`] only the primary servers are asked. As
//! soon as they fail to produce a satisfactory answer within the patience
//! timeout, the controller switches to [`Mode::Redundant`] in which every
//! query is raced against all backup servers as well. Only after the
//! primary has won a number of consecutive races, the redemption
//! threshold, does the controller trust it alone again.
//!
//! A single slow answer thus suffices to distrust the primary while a
//! sustained run of fast answers is needed to trust it again, avoiding
//! flapping between the modes.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::resolv::options::Options;

//------------ Mode ----------------------------------------------------------

/// The dispatch mode for queries.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Mode {
    /// Only the primary servers are queried.
    Normal,

    /// The primary servers are raced against the backup servers.
    Redundant,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Mode::Normal => "normal",
            Mode::Redundant => "redundant",
        })
    }
}

//------------ RedundancyState -----------------------------------------------

/// A snapshot of the controller’s state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RedundancyState {
    /// The current mode.
    pub mode: Mode,

    /// The number of consecutive races the primary has won.
    ///
    /// This is only ever non-zero in redundant mode.
    pub consecutive_primary_wins: u32,
}

impl Default for RedundancyState {
    fn default() -> Self {
        RedundancyState {
            mode: Mode::Normal,
            consecutive_primary_wins: 0,
        }
    }
}

//------------ RoundOutcome --------------------------------------------------

/// What happened during one query round.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoundOutcome {
    /// Whether backup servers were queried during the round.
    pub used_backup: bool,

    /// How long the primary took to produce its answer.
    ///
    /// This is `None` if the primary failed or had not answered by the
    /// time the round was decided.
    pub primary_elapsed: Option<Duration>,

    /// Whether the primary’s answer was accepted as the round’s result.
    pub primary_accepted: bool,
}

impl RoundOutcome {
    /// The outcome of a round in which the primary let us down.
    pub fn primary_failed() -> Self {
        RoundOutcome {
            used_backup: false,
            primary_elapsed: None,
            primary_accepted: false,
        }
    }

    /// The outcome of a primary-only round that went fine.
    pub fn primary_only(elapsed: Duration) -> Self {
        RoundOutcome {
            used_backup: false,
            primary_elapsed: Some(elapsed),
            primary_accepted: true,
        }
    }

    /// The outcome of a race.
    pub fn raced(primary_elapsed: Option<Duration>, primary_accepted: bool) -> Self {
        RoundOutcome {
            used_backup: true,
            primary_elapsed,
            primary_accepted,
        }
    }
}

//------------ Controller ----------------------------------------------------

/// The redundancy controller.
///
/// All updates happen under a mutex so concurrently completing queries
/// cannot corrupt the win counter.
#[derive(Debug)]
pub struct Controller {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: RedundancyState,
    patience: Duration,
    redemption: u32,
}

impl Controller {
    /// Creates a controller in normal mode.
    pub fn new(patience: Duration, redemption: u32) -> Self {
        Controller {
            inner: Mutex::new(Inner {
                state: RedundancyState::default(),
                patience,
                redemption,
            }),
        }
    }

    /// Creates a controller using the given options.
    pub fn from_options(options: &Options) -> Self {
        Self::new(options.patience, options.redemption)
    }

    /// Returns the mode to use for the next query.
    pub fn decide_mode(&self) -> Mode {
        self.inner.lock().state.mode
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> RedundancyState {
        self.inner.lock().state
    }

    /// Returns the patience timeout.
    pub fn patience(&self) -> Duration {
        self.inner.lock().patience
    }

    /// Sets the patience timeout.
    pub fn set_patience(&self, patience: Duration) {
        self.inner.lock().patience = patience
    }

    /// Returns the redemption threshold.
    pub fn redemption(&self) -> u32 {
        self.inner.lock().redemption
    }

    /// Sets the redemption threshold.
    ///
    /// A threshold of zero behaves like one.
    pub fn set_redemption(&self, redemption: u32) {
        self.inner.lock().redemption = redemption
    }

    /// Updates the state after a round and returns the new state.
    pub fn record_outcome(&self, outcome: RoundOutcome) -> RedundancyState {
        let mut inner = self.inner.lock();
        let patience = inner.patience;
        let threshold = inner.redemption.max(1);
        let state = &mut inner.state;
        let in_time = outcome
            .primary_elapsed
            .map(|elapsed| elapsed < patience)
            .unwrap_or(false);

        if !outcome.used_backup {
            if !(outcome.primary_accepted && in_time) {
                if state.mode == Mode::Normal {
                    info!(
                        patience_ms = patience.as_millis() as u64,
                        "primary too slow or unsatisfactory, \
                         entering redundant mode"
                    );
                }
                state.mode = Mode::Redundant;
                state.consecutive_primary_wins = 0;
            }
            return *state;
        }

        if state.mode != Mode::Redundant {
            // Raced while the mode was switched back concurrently. The
            // round says nothing about a redemption in progress.
            return *state;
        }
        if outcome.primary_accepted && in_time {
            state.consecutive_primary_wins += 1;
            if state.consecutive_primary_wins >= threshold {
                info!(
                    rounds = threshold,
                    "primary redeemed, returning to normal mode"
                );
                state.mode = Mode::Normal;
                state.consecutive_primary_wins = 0;
            }
        } else {
            state.consecutive_primary_wins = 0;
        }
        *state
    }

    /// Forces normal mode and clears the counter.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        if inner.state.mode == Mode::Redundant {
            info!("redundancy state reset, returning to normal mode");
        }
        inner.state = RedundancyState::default();
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::from_options(&Options::default())
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;

    const FAST: Duration = Duration::from_millis(20);
    const SLOW: Duration = Duration::from_millis(2000);

    fn redundant_controller() -> Controller {
        let controller = Controller::default();
        controller.record_outcome(RoundOutcome::primary_failed());
        controller
    }

    #[test]
    fn starts_normal() {
        let controller = Controller::default();
        assert_eq!(controller.decide_mode(), Mode::Normal);
        controller.record_outcome(RoundOutcome::primary_only(FAST));
        assert_eq!(controller.state(), RedundancyState::default());
    }

    #[test]
    fn slow_primary_enters_redundant() {
        let controller = Controller::default();
        let state = controller.record_outcome(RoundOutcome {
            used_backup: false,
            primary_elapsed: Some(SLOW),
            primary_accepted: true,
        });
        assert_eq!(state.mode, Mode::Redundant);
        assert_eq!(state.consecutive_primary_wins, 0);
    }

    #[test]
    fn redemption_after_threshold() {
        let controller = redundant_controller();
        for wins in 1..3 {
            let state =
                controller.record_outcome(RoundOutcome::raced(Some(FAST), true));
            assert_eq!(state.mode, Mode::Redundant);
            assert_eq!(state.consecutive_primary_wins, wins);
        }
        let state =
            controller.record_outcome(RoundOutcome::raced(Some(FAST), true));
        assert_eq!(state, RedundancyState::default());
    }

    #[test]
    fn backup_win_resets_counter() {
        let controller = redundant_controller();
        controller.record_outcome(RoundOutcome::raced(Some(FAST), true));
        controller.record_outcome(RoundOutcome::raced(Some(FAST), true));
        let state = controller.record_outcome(RoundOutcome::raced(None, false));
        assert_eq!(state.mode, Mode::Redundant);
        assert_eq!(state.consecutive_primary_wins, 0);
    }

    #[test]
    fn late_primary_win_does_not_count() {
        let controller = redundant_controller();
        controller.record_outcome(RoundOutcome::raced(Some(FAST), true));
        let state =
            controller.record_outcome(RoundOutcome::raced(Some(SLOW), true));
        assert_eq!(state.consecutive_primary_wins, 0);
    }

    #[test]
    fn primary_failure_in_redundant_mode_resets() {
        let controller = redundant_controller();
        controller.record_outcome(RoundOutcome::raced(Some(FAST), true));
        let state = controller.record_outcome(RoundOutcome::primary_failed());
        assert_eq!(state.mode, Mode::Redundant);
        assert_eq!(state.consecutive_primary_wins, 0);
    }

    #[test]
    fn zero_threshold_acts_like_one() {
        let controller = Controller::new(Duration::from_millis(1500), 0);
        controller.record_outcome(RoundOutcome::primary_failed());
        let state =
            controller.record_outcome(RoundOutcome::raced(Some(FAST), true));
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn reset() {
        let controller = redundant_controller();
        controller.record_outcome(RoundOutcome::raced(Some(FAST), true));
        controller.record_outcome(RoundOutcome::raced(Some(FAST), true));
        assert_eq!(controller.state().consecutive_primary_wins, 2);
        controller.reset();
        assert_eq!(controller.state(), RedundancyState::default());
    }

    #[test]
    fn tuning() {
        let controller = Controller::default();
        controller.set_patience(Duration::from_millis(100));
        controller.set_redemption(1);
        assert_eq!(controller.patience(), Duration::from_millis(100));
        assert_eq!(controller.redemption(), 1);
        controller.record_outcome(RoundOutcome::primary_only(
            Duration::from_millis(150),
        ));
        assert_eq!(controller.decide_mode(), Mode::Redundant);
    }
}
