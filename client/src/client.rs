use crate::{Error, Result};
use dropplay_types::{ErrorBody, PROFILE_PATH};
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Per-request timeout applied to every call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Authenticated client for one account.
#[derive(Clone)]
pub struct Client {
    pub(crate) base_url: Url,
    pub(crate) http_client: reqwest::Client,
    pub(crate) profile_path: String,
    token: String,
    request_timeout: Duration,
}

impl Client {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }

        // Relative joins drop the last segment unless the path ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            http_client: reqwest::Client::new(),
            profile_path: PROFILE_PATH.to_string(),
            token: token.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_profile_path(mut self, path: impl Into<String>) -> Self {
        self.profile_path = path.into();
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
    }

    pub(crate) async fn get(&self, path: &str) -> Result<Response> {
        let url = self.endpoint(path)?;
        trace!(%url, "GET");
        let response = self.authorize(self.http_client.get(url)).send().await?;
        check_status(response).await
    }

    pub(crate) async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response> {
        let url = self.endpoint(path)?;
        trace!(%url, "POST");
        let response = self
            .authorize(self.http_client.post(url))
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }
}

/// Turn non-2xx responses into errors, keeping the service's message when it sent one.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody { message }) if !message.is_empty() => {
            Err(Error::Rejected { status, message })
        }
        _ => Err(Error::FailedWithBody { status, body }),
    }
}
