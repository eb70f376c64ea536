pub mod api;
pub mod backoff;
pub mod config;
pub mod gate;
pub mod round;
pub mod session;
pub mod solver;

pub use api::{GameApi, ProfileSource};
pub use backoff::ErrorBackoff;
pub use config::{AccountConfig, Config, ConfigError};
pub use gate::{BlackoutHours, Clock, SystemClock, TimeWindowGate};
pub use round::{RoundAttempt, RoundOutcome};
pub use session::{EndReason, SessionConfig, SessionLoop, SessionOutcome, SessionReport};
pub use solver::{ChallengeSolver, Solver, SolverConfig, SolverError};

use std::time::Duration;
use tracing::info;

/// Run sessions for one account until `once` is set or the task is dropped.
///
/// After a blackout the next session starts when the window opens; after a completed
/// session it starts after `idle`.
pub async fn drive<G, P, S, C>(
    mut sessions: SessionLoop<G, P, S, C>,
    mut known_passes: u32,
    idle: Duration,
    once: bool,
) -> SessionOutcome
where
    G: GameApi,
    P: ProfileSource,
    S: ChallengeSolver,
    C: Clock,
{
    loop {
        let outcome = sessions.run(known_passes).await;
        if let Some(report) = outcome.report() {
            known_passes = report.remaining_rounds;
        }
        if once {
            return outcome;
        }

        let wait = next_wait(&outcome, idle);
        info!(wait_secs = wait.as_secs(), "Next session scheduled");
        tokio::time::sleep(wait).await;
    }
}

fn next_wait(outcome: &SessionOutcome, idle: Duration) -> Duration {
    match outcome.wait_minutes() {
        Some(minutes) => Duration::from_secs(u64::from(minutes) * 60),
        None => idle,
    }
}
