//! API client for the risk engine service

use anyhow::{Context, Result};
use reqwest::Client;
use risk_lib::{Assessment, MetricSample, ModelMetadata, ModelStatus, RiskReport, TrainRequest};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the risk engine
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

/// Error body returned by the service
#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackResponse {
    pub rolled_back: bool,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
}

#[derive(Debug, Clone, Serialize)]
struct RetrainBody {
    use_synthetic: bool,
}

#[derive(Debug, Clone, Serialize)]
struct AssessBody<'a> {
    sample: &'a MetricSample,
    window: &'a [MetricSample],
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid API URL: {}", base_url);
        }

        Ok(Self { client, base_url })
    }

    /// Base URL with the given path segments appended, each one percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Invalid API URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, segments: &[&str], body: &B) -> Result<T> {
        let url = self.endpoint(segments)?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ErrorBody>(&body) {
                Ok(err) => anyhow::bail!("API error ({} {}): {}", status, err.code, err.error),
                Err(_) => anyhow::bail!("API error ({}): {}", status, body),
            }
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn model_status(&self) -> Result<ModelStatus> {
        self.get(&["api", "v1", "model", "status"]).await
    }

    pub async fn train(&self, request: TrainRequest) -> Result<ModelMetadata> {
        self.post(&["api", "v1", "model", "train"], &request).await
    }

    pub async fn retrain(&self, use_synthetic: bool) -> Result<ModelMetadata> {
        self.post(&["api", "v1", "model", "retrain"], &RetrainBody { use_synthetic })
            .await
    }

    pub async fn rollback(&self) -> Result<RollbackResponse> {
        self.post(&["api", "v1", "model", "rollback"], &serde_json::json!({}))
            .await
    }

    pub async fn device_risk(&self, device_id: &str) -> Result<Assessment> {
        self.get(&["api", "v1", "devices", device_id, "risk"]).await
    }

    /// Score an ad-hoc sample with the service's ensemble
    pub async fn assess(&self, sample: &MetricSample, window: &[MetricSample]) -> Result<RiskReport> {
        self.post(&["api", "v1", "assess"], &AssessBody { sample, window })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn test_endpoint_encodes_device_id() {
        let client = ApiClient::new("http://localhost:8080/").unwrap();
        let url = client.endpoint(&["api", "v1", "devices", "rack 1/node", "risk"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v1/devices/rack%201%2Fnode/risk"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = ApiClient::new("http://gateway/risk").unwrap();
        let url = client.endpoint(&["api", "v1", "model", "status"]).unwrap();
        assert_eq!(url.as_str(), "http://gateway/risk/api/v1/model/status");
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(ApiClient::new("mailto:ops@example.com").is_err());
        assert!(ApiClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_model_status_without_model() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/model/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"loaded": false}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let status = client.model_status().await.unwrap();

        assert!(!status.loaded);
        assert!(status.metadata.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/model/train")
            .match_body(Matcher::Json(serde_json::json!({
                "use_synthetic": false,
                "use_db": true
            })))
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error": "insufficient training data: 5 usable rows, need at least 10", "code": "INSUFFICIENT_DATA"}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .train(TrainRequest {
                use_synthetic: false,
                use_db: true,
            })
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("INSUFFICIENT_DATA"), "{}", message);
        assert!(message.contains("need at least 10"), "{}", message);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rollback_with_nothing_to_restore() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/model/rollback")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"rolled_back": false}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response = client.rollback().await.unwrap();

        assert!(!response.rolled_back);
        assert!(response.metadata.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_plain_text_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/devices/edge-7/risk")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.device_risk("edge-7").await.unwrap_err();
        assert!(err.to_string().contains("bad gateway"));
    }
}
