use crate::{Client, Error, Result};
use dropplay_types::{
    ClaimRequest, EligibilityResponse, Payload, PlayResponse, PlayStart, Profile, CLAIM_PATH,
    ELIGIBILITY_PATH, NOT_ENOUGH_PLAY_PASSES, PLAY_PATH,
};
use serde_json::json;

impl Client {
    /// Start a round.
    ///
    /// Running out of passes is reported as [PlayStart::NoPasses] rather than an error.
    pub async fn play_game(&self) -> Result<PlayStart> {
        let response = match self.post_json(PLAY_PATH, &json!({})).await {
            Ok(response) => response,
            Err(err) if err.server_message() == Some(NOT_ENOUGH_PLAY_PASSES) => {
                return Ok(PlayStart::NoPasses);
            }
            Err(err) => return Err(err),
        };

        let body = response.text().await?;
        let play: PlayResponse = serde_json::from_str(&body)
            .map_err(|_| Error::UnexpectedResponse(body.clone()))?;
        if play.game_id.as_str().is_empty() {
            return Err(Error::UnexpectedResponse(body));
        }
        Ok(PlayStart::Started(play.game_id))
    }

    /// Submit the payload proving a round was played.
    ///
    /// The service acknowledges a claim with a non-empty body; an empty 2xx reply means the
    /// claim was not recorded.
    pub async fn claim_game(&self, payload: &Payload) -> Result<()> {
        let request = ClaimRequest {
            payload: payload.clone(),
        };
        let response = self.post_json(CLAIM_PATH, &request).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(Error::UnexpectedResponse(body));
        }
        Ok(())
    }

    /// Whether the account qualifies for the bonus drop.
    pub async fn dogs_drop_eligibility(&self) -> Result<bool> {
        let response = self.get(ELIGIBILITY_PATH).await?;
        let body: EligibilityResponse = response.json().await?;
        Ok(body.eligible)
    }

    pub async fn profile(&self) -> Result<Profile> {
        let response = self.get(&self.profile_path).await?;
        Ok(response.json().await?)
    }
}
