pub mod api;
pub use api::{ClaimRequest, EligibilityResponse, ErrorBody, PlayResponse, Profile};
pub mod game;
pub use game::{Payload, PlayStart, RewardSpec, RoundId};

/// Server message returned by `game/play` once the account has no passes left.
pub const NOT_ENOUGH_PLAY_PASSES: &str = "not enough play passes";

/// Path used to start a round.
pub const PLAY_PATH: &str = "game/play";

/// Path used to claim a started round.
pub const CLAIM_PATH: &str = "game/claim";

/// Path used to query the bonus drop eligibility.
pub const ELIGIBILITY_PATH: &str = "game/eligibility/dogs_drop";

/// Default path of the profile endpoint.
pub const PROFILE_PATH: &str = "user/me";
