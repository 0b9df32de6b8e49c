//! Authenticated platform account probe.
//!
//! Calling the account endpoint with the API token is what keeps the
//! account registered as active; the response body also tells us which
//! account the token belongs to.

use super::{Probe, ProbeKind, ProbeOutcome};
use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use std::time::Instant;

/// Default account endpoint polled by the primary check.
pub const DEFAULT_API_URL: &str = "https://api.vercel.com/v2/user";

pub struct AccountProbe {
    client: Client,
    token: String,
}

impl AccountProbe {
    pub fn new(client: Client, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl Probe for AccountProbe {
    async fn run(&self, target: &str) -> Result<ProbeOutcome> {
        let start = Instant::now();
        let response = self
            .client
            .get(target)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let status = response.status();
        let detail = if status.is_success() {
            // A body we can't parse still counts as a successful check.
            response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| account_identity(&body))
        } else {
            None
        };

        Ok(ProbeOutcome {
            kind: ProbeKind::Account,
            target: target.to_string(),
            status: status.as_u16(),
            latency_ms,
            success: status.is_success(),
            detail,
        })
    }
}

/// Pick the most recognisable identifier out of an account response.
pub fn account_identity(body: &Value) -> Option<String> {
    ["/user/email", "/user/username", "/user/name"]
        .iter()
        .find_map(|ptr| body.pointer(ptr).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
