use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the service assigns to a started round.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(String);

impl RoundId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoundId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RoundId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque, server-verifiable proof submitted to claim a round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(String);

impl Payload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Reward amounts a claim asks for.
///
/// `dogs` is the eligibility bonus and is only present when the account
/// qualified for the drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSpec {
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dogs: Option<u32>,
}

/// Result of asking the service to start a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayStart {
    Started(RoundId),
    /// The service has no passes left for this account.
    NoPasses,
}
