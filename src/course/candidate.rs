//! External check run before a user is added as a course instructor.
//!
//! The lookup is not an authorization decision: it only has to succeed.
//! Any transport error, non-success status or empty payload aborts the
//! enrollment with [`KnownErrors::ExternalLookup`].

use crate::authority::UserId;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const DEFAULT_LOOKUP_URL: &str = "https://randomuser.me/api/";
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

pub trait CandidateLookup: Clone + Send + Sync + 'static {
    async fn check_candidate(&self, user_id: UserId) -> AppResult<()>;
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct HttpCandidateLookup {
    url: Url,
    http: reqwest::Client,
}

impl HttpCandidateLookup {
    pub fn new(url: Url, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(KnownErrors::internal)?;
        Ok(Self { url, http })
    }
}

fn lookup_failed(context: impl ToString) -> KnownErrors {
    KnownErrors::ExternalLookup {
        context: context.to_string(),
    }
}

impl CandidateLookup for HttpCandidateLookup {
    async fn check_candidate(&self, user_id: UserId) -> AppResult<()> {
        tracing::debug!(%user_id, url = %self.url, "looking up instructor candidate");

        let response = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .map_err(lookup_failed)?
            .error_for_status()
            .map_err(lookup_failed)?;

        let body: LookupResponse = response.json().await.map_err(lookup_failed)?;
        if body.results.is_empty() {
            tracing::warn!(%user_id, "candidate lookup returned no results");
            return Err(lookup_failed("no candidate returned"));
        }

        Ok(())
    }
}
