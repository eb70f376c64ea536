use crate::{api::GameApi, solver::ChallengeSolver};
use dropplay_types::{PlayStart, RewardSpec, RoundId};
use rand::Rng;
use std::{ops::Range, time::Duration};
use tracing::{error, info};

/// Result of one step of a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Round started; the claim must wait `wait` first.
    Played { round_id: RoundId, wait: Duration },
    /// Server reports no passes left.
    QuotaExhausted,
    PlayFailed,
    Claimed { reward: RewardSpec },
    ClaimFailed,
}

impl RoundOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RoundOutcome::PlayFailed | RoundOutcome::ClaimFailed)
    }
}

/// How long a round is "played" before it is claimed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DwellPolicy {
    pub base: Duration,
    /// Extra whole seconds, drawn uniformly.
    pub jitter_secs: Range<u64>,
}

impl Default for DwellPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(30),
            jitter_secs: 5..10,
        }
    }
}

impl DwellPolicy {
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.jitter_secs.is_empty() {
            return self.base;
        }
        self.base
            .saturating_add(Duration::from_secs(rng.gen_range(self.jitter_secs.clone())))
    }
}

/// Reward amounts requested per claim.
#[derive(Clone, Debug, PartialEq)]
pub struct RewardPolicy {
    pub points: Range<u32>,
    /// Fraction of `points` granted as the eligibility bonus.
    pub bonus_factor: Range<f64>,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            points: 150..190,
            bonus_factor: 0.10..0.20,
        }
    }
}

impl RewardPolicy {
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, eligible: bool) -> RewardSpec {
        let points = if self.points.is_empty() {
            self.points.start
        } else {
            rng.gen_range(self.points.clone())
        };
        let dogs = eligible.then(|| {
            let factor = if self.bonus_factor.is_empty() {
                self.bonus_factor.start
            } else {
                rng.gen_range(self.bonus_factor.clone())
            };
            (f64::from(points) * factor).floor() as u32
        });
        RewardSpec { points, dogs }
    }
}

/// One play / dwell / claim cycle against the service.
///
/// Failures are logged and turned into outcomes; nothing here returns an error.
pub struct RoundAttempt<'a, G, S> {
    api: &'a G,
    solver: &'a S,
    currency: &'a str,
}

impl<'a, G: GameApi, S: ChallengeSolver> RoundAttempt<'a, G, S> {
    pub fn new(api: &'a G, solver: &'a S, currency: &'a str) -> Self {
        Self {
            api,
            solver,
            currency,
        }
    }

    pub async fn start(&self, dwell: Duration) -> RoundOutcome {
        match self.api.play().await {
            Ok(PlayStart::Started(round_id)) => {
                info!(round = %round_id, dwell_secs = dwell.as_secs(), "Started round");
                RoundOutcome::Played {
                    round_id,
                    wait: dwell,
                }
            }
            Ok(PlayStart::NoPasses) => {
                info!("No play passes left");
                RoundOutcome::QuotaExhausted
            }
            Err(err) => {
                error!(%err, "Failed to start round");
                RoundOutcome::PlayFailed
            }
        }
    }

    pub async fn claim(&self, round_id: &RoundId, reward: RewardSpec) -> RoundOutcome {
        let payload = match self.solver.solve(round_id, &reward).await {
            Ok(payload) => payload,
            Err(err) => {
                error!(round = %round_id, %err, "Failed to build claim payload");
                return RoundOutcome::ClaimFailed;
            }
        };

        match self.api.claim(&payload).await {
            Ok(()) => {
                info!(
                    round = %round_id,
                    points = reward.points,
                    currency = self.currency,
                    dogs = ?reward.dogs,
                    "Claimed round"
                );
                RoundOutcome::Claimed { reward }
            }
            Err(err) => {
                error!(round = %round_id, %err, "Failed to claim round");
                RoundOutcome::ClaimFailed
            }
        }
    }

    /// Start a round, wait out `dwell`, then claim it.
    ///
    /// The dwell always runs to completion.
    pub async fn run(&self, dwell: Duration, reward: RewardSpec) -> RoundOutcome {
        let round_id = match self.start(dwell).await {
            RoundOutcome::Played { round_id, wait } => {
                tokio::time::sleep(wait).await;
                round_id
            }
            other => return other,
        };
        self.claim(&round_id, reward).await
    }
}
