use super::{Probe, ProbeKind, ProbeOutcome};
use anyhow::Result;
use reqwest::Client;
use std::time::Instant;

/// Unauthenticated GET, checking status code and round-trip time
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn run(&self, target: &str) -> Result<ProbeOutcome> {
        let url = if target.starts_with("http") {
            target.to_string()
        } else {
            format!("https://{}", target)
        };

        let start = Instant::now();
        let response = self.client.get(&url).send().await?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        Ok(ProbeOutcome {
            kind: ProbeKind::Http,
            target: url,
            status: response.status().as_u16(),
            latency_ms,
            success: response.status().is_success(),
            detail: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_reports_non_success_status_as_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Client::new());
        let outcome = probe.run(&server.uri()).await.unwrap();

        assert_eq!(outcome.kind, ProbeKind::Http);
        assert_eq!(outcome.status, 503);
        assert!(!outcome.success);
        assert!(outcome.latency_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_connection_refused_is_error() {
        let probe = HttpProbe::new(Client::new());
        assert!(probe.run("http://127.0.0.1:1/").await.is_err());
    }
}
