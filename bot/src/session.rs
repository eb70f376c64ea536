//! Session orchestration.
//!
//! A session checks the blackout gate, loads the quota and eligibility, then plays rounds
//! one after another until the quota is spent, the service reports no passes left, or too
//! many rounds fail in a row.

use crate::{
    api::{GameApi, ProfileSource},
    backoff::{ErrorBackoff, DEFAULT_FAILURE_THRESHOLD},
    gate::{BlackoutHours, Clock, TimeWindowGate, MINUTES_PER_DAY},
    round::{DwellPolicy, RewardPolicy, RoundAttempt, RoundOutcome},
    solver::ChallengeSolver,
};
use rand::{rngs::StdRng, SeedableRng};
use std::time::Duration;
use tracing::{error, info, warn};

/// Pause before every round.
pub const DEFAULT_PACING: Duration = Duration::from_secs(2);

/// Why a session stopped playing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// Local quota reached zero.
    QuotaDrained,
    /// Service said no passes remain.
    PassesExhausted,
    TooManyFailures,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Draining(EndReason),
}

/// Bookkeeping for one session.
#[derive(Clone, Debug)]
pub struct Session {
    remaining_rounds: u32,
    claimed: u32,
    eligible: bool,
    backoff: ErrorBackoff,
    state: SessionState,
}

impl Session {
    pub fn new(rounds: u32, eligible: bool, backoff: ErrorBackoff) -> Self {
        let state = if rounds == 0 {
            SessionState::Draining(EndReason::QuotaDrained)
        } else {
            SessionState::Running
        };
        Self {
            remaining_rounds: rounds,
            claimed: 0,
            eligible,
            backoff,
            state,
        }
    }

    pub fn remaining_rounds(&self) -> u32 {
        self.remaining_rounds
    }

    pub fn claimed(&self) -> u32 {
        self.claimed
    }

    pub fn eligible(&self) -> bool {
        self.eligible
    }

    pub fn backoff(&self) -> &ErrorBackoff {
        &self.backoff
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Why the session stopped, once it is draining.
    pub fn end_reason(&self) -> Option<EndReason> {
        match self.state {
            SessionState::Running => None,
            SessionState::Draining(reason) => Some(reason),
        }
    }

    /// Apply a round outcome. Outcomes arriving after the session started draining are ignored.
    pub fn record(&mut self, outcome: &RoundOutcome) -> SessionState {
        if !self.is_running() {
            return self.state;
        }

        match outcome {
            RoundOutcome::QuotaExhausted => {
                // The service's count wins over ours
                self.remaining_rounds = 0;
                self.state = SessionState::Draining(EndReason::PassesExhausted);
            }
            RoundOutcome::Claimed { .. } => {
                self.backoff.record_success();
                self.remaining_rounds = self.remaining_rounds.saturating_sub(1);
                self.claimed += 1;
                if self.remaining_rounds == 0 {
                    self.state = SessionState::Draining(EndReason::QuotaDrained);
                }
            }
            RoundOutcome::PlayFailed | RoundOutcome::ClaimFailed => {
                self.backoff.record_failure();
                if self.backoff.should_abort() {
                    self.state = SessionState::Draining(EndReason::TooManyFailures);
                }
            }
            RoundOutcome::Played { .. } => {}
        }
        self.state
    }
}

/// Summary of a session that got past the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub starting_rounds: u32,
    pub remaining_rounds: u32,
    pub claimed: u32,
    pub attempts: u32,
    pub eligible: bool,
    pub reason: EndReason,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Play is not allowed right now; try again after `wait_minutes`.
    Blackout { wait_minutes: u32 },
    /// Session ran; no extra wait is needed.
    Completed(SessionReport),
}

impl SessionOutcome {
    pub fn wait_minutes(&self) -> Option<u32> {
        match self {
            SessionOutcome::Blackout { wait_minutes } => Some(*wait_minutes),
            SessionOutcome::Completed(_) => None,
        }
    }

    pub fn report(&self) -> Option<&SessionReport> {
        match self {
            SessionOutcome::Blackout { .. } => None,
            SessionOutcome::Completed(report) => Some(report),
        }
    }
}

/// Tunables for a session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub blackout: BlackoutHours,
    pub pacing: Duration,
    pub dwell: DwellPolicy,
    pub rewards: RewardPolicy,
    pub failure_threshold: u32,
    /// Suffix used when logging rewards.
    pub currency: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            blackout: BlackoutHours::default(),
            pacing: DEFAULT_PACING,
            dwell: DwellPolicy::default(),
            rewards: RewardPolicy::default(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            currency: "BP".to_string(),
        }
    }
}

/// Drives sessions for one account.
pub struct SessionLoop<G, P, S, C> {
    api: G,
    profile: P,
    solver: S,
    gate: TimeWindowGate<C>,
    config: SessionConfig,
    rng: StdRng,
}

impl<G, P, S, C> SessionLoop<G, P, S, C>
where
    G: GameApi,
    P: ProfileSource,
    S: ChallengeSolver,
    C: Clock,
{
    pub fn new(api: G, profile: P, solver: S, clock: C, config: SessionConfig) -> Self {
        Self {
            api,
            profile,
            solver,
            gate: TimeWindowGate::new(clock),
            config,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Run one session.
    ///
    /// `known_passes` is used when the profile cannot be loaded. Never fails: problems are
    /// logged and folded into the returned outcome.
    pub async fn run(&mut self, known_passes: u32) -> SessionOutcome {
        // Respect blackout hours
        if !self.gate.is_play_allowed(&self.config.blackout) {
            let wait_minutes = match self.gate.minutes_until_next_allowed(&self.config.blackout) {
                Ok(minutes) => minutes,
                Err(err) => {
                    error!(%err, "No playable hour configured");
                    MINUTES_PER_DAY
                }
            };
            info!(wait_minutes, "Skipping play during blackout hours");
            return SessionOutcome::Blackout { wait_minutes };
        }

        // Load quota and eligibility
        let starting_rounds = match self.profile.play_passes().await {
            Ok(passes) => passes,
            Err(err) => {
                warn!(%err, known_passes, "Failed to load profile, using last known play passes");
                known_passes
            }
        };
        let eligible = match self.api.eligibility().await {
            Ok(eligible) => eligible,
            Err(err) => {
                warn!(%err, "Failed to check drop eligibility");
                false
            }
        };
        info!(play_passes = starting_rounds, eligible, "Play passes available");

        // Play rounds until the session drains
        let mut session = Session::new(
            starting_rounds,
            eligible,
            ErrorBackoff::new(self.config.failure_threshold),
        );
        let attempt = RoundAttempt::new(&self.api, &self.solver, &self.config.currency);
        let mut attempts = 0;
        let reason = loop {
            if let Some(reason) = session.end_reason() {
                break reason;
            }

            tokio::time::sleep(self.config.pacing).await;
            let dwell = self.config.dwell.draw(&mut self.rng);
            let reward = self.config.rewards.draw(&mut self.rng, session.eligible());

            let outcome = attempt.run(dwell, reward).await;
            attempts += 1;
            session.record(&outcome);
            if outcome.is_failure() {
                warn!(
                    failures = session.backoff().failures(),
                    remaining = session.remaining_rounds(),
                    "Round failed"
                );
            }
        };

        match reason {
            EndReason::TooManyFailures => warn!(
                failures = session.backoff().failures(),
                forfeited = session.remaining_rounds(),
                "Too many consecutive failures, ending session"
            ),
            EndReason::QuotaDrained | EndReason::PassesExhausted if starting_rounds > 0 => info!(
                claimed = session.claimed(),
                "Used all play passes"
            ),
            _ => {}
        }

        SessionOutcome::Completed(SessionReport {
            starting_rounds,
            remaining_rounds: session.remaining_rounds(),
            claimed: session.claimed(),
            attempts,
            eligible,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::mocks::{MockGame, Play, StaticProfile},
        gate::at,
        solver::mocks::EchoSolver,
    };
    use chrono::{DateTime, FixedOffset};
    use dropplay_types::RewardSpec;
    use tokio::time::Instant;

    type TestLoop = SessionLoop<MockGame, StaticProfile, EchoSolver, DateTime<FixedOffset>>;

    fn blackout(hours: &[u8]) -> BlackoutHours {
        BlackoutHours::new(hours.iter().copied()).unwrap()
    }

    fn session_loop(game: &MockGame, passes: Option<u32>, solver: &EchoSolver) -> TestLoop {
        SessionLoop::new(
            game.clone(),
            StaticProfile(passes),
            solver.clone(),
            at(14, 20, 0),
            SessionConfig {
                blackout: blackout(&[9, 10, 11]),
                ..Default::default()
            },
        )
        .with_rng(StdRng::seed_from_u64(42))
    }

    fn completed(outcome: SessionOutcome) -> SessionReport {
        *outcome.report().expect("session should have run")
    }

    #[test]
    fn test_session_counts_down_on_claims_only() {
        let mut session = Session::new(3, false, ErrorBackoff::default());
        let claimed = RoundOutcome::Claimed {
            reward: RewardSpec {
                points: 150,
                dogs: None,
            },
        };

        session.record(&RoundOutcome::PlayFailed);
        assert_eq!(session.remaining_rounds(), 3);
        session.record(&RoundOutcome::ClaimFailed);
        assert_eq!(session.remaining_rounds(), 3);
        assert_eq!(session.backoff().failures(), 2);

        session.record(&claimed);
        assert_eq!(session.remaining_rounds(), 2);
        assert_eq!(session.backoff().failures(), 0);

        session.record(&claimed);
        assert_eq!(session.record(&claimed), SessionState::Draining(EndReason::QuotaDrained));
        assert_eq!(session.remaining_rounds(), 0);

        // Nothing moves once draining
        session.record(&claimed);
        assert_eq!(session.remaining_rounds(), 0);
        assert_eq!(session.claimed(), 3);
    }

    #[test]
    fn test_session_drains_on_fourth_failure() {
        let mut session = Session::new(5, false, ErrorBackoff::default());
        for _ in 0..3 {
            assert_eq!(session.record(&RoundOutcome::PlayFailed), SessionState::Running);
        }
        assert_eq!(
            session.record(&RoundOutcome::ClaimFailed),
            SessionState::Draining(EndReason::TooManyFailures)
        );
        assert_eq!(session.remaining_rounds(), 5);
    }

    #[test]
    fn test_session_quota_exhausted_overrides_local_count() {
        let mut session = Session::new(10, true, ErrorBackoff::default());
        assert_eq!(
            session.record(&RoundOutcome::QuotaExhausted),
            SessionState::Draining(EndReason::PassesExhausted)
        );
        assert_eq!(session.remaining_rounds(), 0);
        assert!(session.eligible());
    }

    #[test]
    fn test_session_without_rounds_starts_drained() {
        let session = Session::new(0, false, ErrorBackoff::default());
        assert_eq!(session.state(), SessionState::Draining(EndReason::QuotaDrained));
        assert_eq!(session.end_reason(), Some(EndReason::QuotaDrained));
    }

    #[test]
    fn test_end_reason_follows_state() {
        let mut session = Session::new(2, false, ErrorBackoff::new(0));
        assert!(session.is_running());
        assert_eq!(session.end_reason(), None);

        session.record(&RoundOutcome::PlayFailed);
        assert!(!session.is_running());
        assert_eq!(session.end_reason(), Some(EndReason::TooManyFailures));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blackout_returns_wait_without_network() {
        let game = MockGame::new(vec![], vec![]);
        let solver = EchoSolver::default();
        let mut session = SessionLoop::new(
            game.clone(),
            StaticProfile(Some(5)),
            solver,
            at(10, 0, 0),
            SessionConfig {
                blackout: blackout(&[9, 10, 11]),
                ..Default::default()
            },
        );

        let outcome = session.run(5).await;
        assert_eq!(outcome, SessionOutcome::Blackout { wait_minutes: 120 });
        assert_eq!(outcome.wait_minutes(), Some(120));
        assert_eq!(game.plays(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_day_blackout_waits_a_day() {
        let game = MockGame::new(vec![], vec![]);
        let mut session = SessionLoop::new(
            game.clone(),
            StaticProfile(Some(5)),
            EchoSolver::default(),
            at(3, 0, 0),
            SessionConfig {
                blackout: BlackoutHours::new(0..24).unwrap(),
                ..Default::default()
            },
        );

        let outcome = session.run(5).await;
        assert_eq!(outcome.wait_minutes(), Some(MINUTES_PER_DAY));
        assert_eq!(game.plays(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_rounds_claimed() {
        let game = MockGame::new(vec![], vec![]);
        let solver = EchoSolver::default();
        let mut session = session_loop(&game, Some(3), &solver);

        let started = Instant::now();
        let report = completed(session.run(0).await);
        assert_eq!(
            report,
            SessionReport {
                starting_rounds: 3,
                remaining_rounds: 0,
                claimed: 3,
                attempts: 3,
                eligible: false,
                reason: EndReason::QuotaDrained,
            }
        );
        assert_eq!(game.plays(), 3);
        assert_eq!(game.claims(), 3);

        // Every claim asked for a plain reward
        let rewards = solver.rewards.lock().unwrap();
        assert_eq!(rewards.len(), 3);
        assert!(rewards.iter().all(|reward| reward.dogs.is_none()));
        assert!(rewards.iter().all(|reward| (150..190).contains(&reward.points)));

        // Pacing plus at least 35s of dwell per round
        assert!(started.elapsed() >= Duration::from_secs(3 * 37));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_passes_ends_after_first_attempt() {
        let game = MockGame::new(vec![Play::NoPasses], vec![]);
        let solver = EchoSolver::default();
        let mut session = session_loop(&game, Some(2), &solver);

        let report = completed(session.run(0).await);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.remaining_rounds, 0);
        assert_eq!(report.reason, EndReason::PassesExhausted);
        assert_eq!(game.claims(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_passes_overrides_large_quota() {
        let game = MockGame::new(vec![Play::NoPasses], vec![]);
        let solver = EchoSolver::default();
        let mut session = session_loop(&game, Some(10), &solver);

        let report = completed(session.run(0).await);
        assert_eq!(game.plays(), 1);
        assert_eq!(report.claimed, 0);
        assert_eq!(report.remaining_rounds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_four_failures_stop_without_fifth_call() {
        let game = MockGame::new(vec![Play::Fail; 4], vec![]);
        let solver = EchoSolver::default();
        let mut session = session_loop(&game, Some(10), &solver);

        let report = completed(session.run(0).await);
        assert_eq!(game.plays(), 4);
        assert_eq!(report.reason, EndReason::TooManyFailures);
        assert_eq!(report.remaining_rounds, 10);
        assert_eq!(report.claimed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_failures_count_toward_backoff() {
        let game = MockGame::new(vec![], vec![false, false, false, false]);
        let solver = EchoSolver::default();
        let mut session = session_loop(&game, Some(10), &solver);

        let report = completed(session.run(0).await);
        assert_eq!(game.plays(), 4);
        assert_eq!(game.claims(), 4);
        assert_eq!(report.reason, EndReason::TooManyFailures);
        assert_eq!(report.remaining_rounds, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_streak() {
        let game = MockGame::new(
            vec![
                Play::Fail,
                Play::Fail,
                Play::Fail,
                Play::Start,
                Play::Fail,
                Play::Fail,
                Play::Fail,
                Play::Fail,
            ],
            vec![],
        );
        let solver = EchoSolver::default();
        let mut session = session_loop(&game, Some(10), &solver);

        let report = completed(session.run(0).await);
        assert_eq!(game.plays(), 8);
        assert_eq!(report.claimed, 1);
        assert_eq!(report.remaining_rounds, 9);
        assert_eq!(report.reason, EndReason::TooManyFailures);
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_failure_uses_known_passes() {
        let game = MockGame::new(vec![], vec![]);
        let solver = EchoSolver::default();
        let mut session = session_loop(&game, None, &solver);

        let report = completed(session.run(2).await);
        assert_eq!(report.starting_rounds, 2);
        assert_eq!(report.claimed, 2);
        assert_eq!(game.plays(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_passes_plays_nothing() {
        let game = MockGame::new(vec![], vec![]);
        let solver = EchoSolver::default();
        let mut session = session_loop(&game, Some(0), &solver);

        let report = completed(session.run(7).await);
        assert_eq!(report.attempts, 0);
        assert_eq!(report.reason, EndReason::QuotaDrained);
        assert_eq!(game.plays(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eligible_account_requests_bonus() {
        let game = MockGame::new(vec![], vec![]).with_eligibility(Some(true));
        let solver = EchoSolver::default();
        let mut session = session_loop(&game, Some(2), &solver);

        let report = completed(session.run(0).await);
        assert!(report.eligible);
        let rewards = solver.rewards.lock().unwrap();
        assert_eq!(rewards.len(), 2);
        assert!(rewards.iter().all(|reward| reward.dogs.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eligibility_failure_means_not_eligible() {
        let game = MockGame::new(vec![], vec![]).with_eligibility(None);
        let solver = EchoSolver::default();
        let mut session = session_loop(&game, Some(1), &solver);

        let report = completed(session.run(0).await);
        assert!(!report.eligible);
        assert_eq!(report.claimed, 1);
        assert!(solver.rewards.lock().unwrap()[0].dogs.is_none());
    }
}
