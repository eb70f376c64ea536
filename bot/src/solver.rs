//! Claim payload construction.
//!
//! The payload is an opaque proof the service verifies. How it is produced is a deployment
//! choice: either an external program or a payload service reached over HTTP. Both speak the
//! same JSON request and are selected through [SolverConfig].

use dropplay_types::{Payload, RewardSpec, RoundId};
use serde::{Deserialize, Serialize};
use std::{future::Future, io, process::Stdio, time::Duration};
use thiserror::Error;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::debug;
use url::Url;

const DEFAULT_SOLVER_TIMEOUT_SECS: u64 = 30;

/// Produces the payload that claims a round.
pub trait ChallengeSolver: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn solve(
        &self,
        round_id: &RoundId,
        reward: &RewardSpec,
    ) -> impl Future<Output = Result<Payload, Self::Error>> + Send;
}

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("failed to spawn solver: {0}")]
    Spawn(io::Error),
    #[error("solver io error: {0}")]
    Io(#[from] io::Error),
    #[error("solver exited with {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },
    #[error("solver timed out after {0:?}")]
    Timeout(Duration),
    #[error("solver returned an empty payload")]
    EmptyPayload,
    #[error("invalid solver request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("payload service error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payload service failed: {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// JSON handed to every solver strategy.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest<'a> {
    pub game_id: &'a RoundId,
    pub reward: &'a RewardSpec,
}

#[derive(Debug, Deserialize)]
struct SolveResponse {
    payload: Payload,
}

fn non_empty(payload: Payload) -> Result<Payload, SolverError> {
    if payload.is_empty() {
        return Err(SolverError::EmptyPayload);
    }
    Ok(payload)
}

/// Runs an external program per claim: request on stdin, payload on stdout.
#[derive(Clone, Debug)]
pub struct CommandSolver {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSolver {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

impl ChallengeSolver for CommandSolver {
    type Error = SolverError;

    async fn solve(&self, round_id: &RoundId, reward: &RewardSpec) -> Result<Payload, SolverError> {
        let request = serde_json::to_vec(&SolveRequest {
            game_id: round_id,
            reward,
        })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SolverError::Spawn)?;

        // Programs that ignore stdin may close it before we finish writing
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&request).await {
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {}
                result => result?,
            }
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SolverError::Timeout(self.timeout))??;
        if !output.status.success() {
            return Err(SolverError::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let payload = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(round = %round_id, len = payload.len(), "Solved challenge");
        non_empty(Payload::from(payload))
    }
}

/// Posts the request to a payload service and reads `{ "payload": ... }` back.
#[derive(Clone, Debug)]
pub struct HttpSolver {
    http_client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpSolver {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            url,
            timeout,
        }
    }
}

impl ChallengeSolver for HttpSolver {
    type Error = SolverError;

    async fn solve(&self, round_id: &RoundId, reward: &RewardSpec) -> Result<Payload, SolverError> {
        let response = self
            .http_client
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(&SolveRequest {
                game_id: round_id,
                reward,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SolverError::Rejected { status, body });
        }
        let body: SolveResponse = response.json().await?;
        non_empty(body.payload)
    }
}

/// Solver strategy selected by configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolverConfig {
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_solver_timeout_secs")]
        timeout_secs: u64,
    },
    Http {
        url: Url,
        #[serde(default = "default_solver_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_solver_timeout_secs() -> u64 {
    DEFAULT_SOLVER_TIMEOUT_SECS
}

impl SolverConfig {
    pub fn build(&self) -> Solver {
        match self {
            SolverConfig::Command {
                program,
                args,
                timeout_secs,
            } => Solver::Command(CommandSolver::new(
                program.clone(),
                args.clone(),
                Duration::from_secs(*timeout_secs),
            )),
            SolverConfig::Http { url, timeout_secs } => {
                Solver::Http(HttpSolver::new(url.clone(), Duration::from_secs(*timeout_secs)))
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum Solver {
    Command(CommandSolver),
    Http(HttpSolver),
}

impl ChallengeSolver for Solver {
    type Error = SolverError;

    async fn solve(&self, round_id: &RoundId, reward: &RewardSpec) -> Result<Payload, SolverError> {
        match self {
            Solver::Command(solver) => solver.solve(round_id, reward).await,
            Solver::Http(solver) => solver.solve(round_id, reward).await,
        }
    }
}
