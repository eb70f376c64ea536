use dropplay_types::{Payload, PlayStart};
use std::future::Future;

/// Game endpoints a session drives.
pub trait GameApi: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start a round.
    fn play(&self) -> impl Future<Output = Result<PlayStart, Self::Error>> + Send;

    /// Claim a started round with its payload.
    fn claim(&self, payload: &Payload) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Whether the account qualifies for the eligibility bonus.
    fn eligibility(&self) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}

/// Source of the account's current play-pass quota.
pub trait ProfileSource: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn play_passes(&self) -> impl Future<Output = Result<u32, Self::Error>> + Send;
}

impl GameApi for dropplay_client::Client {
    type Error = dropplay_client::Error;

    async fn play(&self) -> Result<PlayStart, Self::Error> {
        self.play_game().await
    }

    async fn claim(&self, payload: &Payload) -> Result<(), Self::Error> {
        self.claim_game(payload).await
    }

    async fn eligibility(&self) -> Result<bool, Self::Error> {
        self.dogs_drop_eligibility().await
    }
}

impl ProfileSource for dropplay_client::Client {
    type Error = dropplay_client::Error;

    async fn play_passes(&self) -> Result<u32, Self::Error> {
        Ok(self.profile().await?.play_passes)
    }
}
