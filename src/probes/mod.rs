use anyhow::Result;
use reqwest::Client;
use std::time::Duration;

pub mod http;
pub mod platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Authenticated request against the platform API.
    Account,
    /// Plain GET against the application URL.
    Http,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeKind::Account => write!(f, "account"),
            ProbeKind::Http => write!(f, "http"),
        }
    }
}

/// What a probe observed. Only transport failures are errors; any HTTP
/// response, including 4xx/5xx, is an outcome.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub kind: ProbeKind,
    pub target: String,
    pub status: u16,
    pub latency_ms: f64,
    pub success: bool,
    /// Identifying detail pulled from the response, if the probe extracts one.
    pub detail: Option<String>,
}

/// Trait for all active probes
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Run the probe against a target URL
    async fn run(&self, target: &str) -> Result<ProbeOutcome>;
}

/// Build the HTTP client shared by both probes.
///
/// `timeout` of `None` leaves reqwest's default (no overall timeout).
pub fn build_client(timeout: Option<Duration>) -> reqwest::Result<Client> {
    let mut builder =
        Client::builder().user_agent(concat!("keepalive/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}
