//! HTTP implementation of the remote job protocol.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::RemoteServiceConfig;
use super::error::ClientError;
use super::traits::ConversionService;
use super::types::{parse_json_lenient, JobMetadata, JobTicket, StatusReport};
use crate::health::{HealthState, HealthStatus};
use crate::job::SourceFile;

/// Client for a service implementing `/conversions/{type}/...`.
pub struct HttpConversionClient {
    client: Client,
    base_url: String,
}

impl HttpConversionClient {
    /// Create a new client. Cookies are kept across requests.
    pub fn new(config: &RemoteServiceConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(ClientError::from_reqwest)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolves a path or URL handed back by the service.
    ///
    /// Absolute `http(s)://` URLs are used unchanged; anything else is
    /// joined onto the base URL.
    pub fn resolve(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("{}/{}", self.base_url, target.trim_start_matches('/'))
        }
    }

    fn upload_headers(file: &SourceFile, extra: &HashMap<String, String>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(file.content_type()) {
            headers.insert(CONTENT_TYPE, value);
        }
        for (name, value) in extra {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Skipping invalid upload header from service: {}", name),
            }
        }
        headers
    }
}

#[async_trait]
impl ConversionService for HttpConversionClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn check_health(&self, resource_type: &str) -> HealthStatus {
        let url = self.resolve(&format!("/conversions/{}/health", resource_type));
        let start = Instant::now();

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Health check to {} failed: {}", url, e);
                let message = if e.is_timeout() {
                    "Health check timed out".to_string()
                } else {
                    format!("Unable to reach conversion service: {}", e)
                };
                return HealthStatus::unreachable(message);
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let latency_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            return HealthStatus::unhealthy(
                latency_ms,
                format!("Health check failed with status {}", status.as_u16()),
            );
        }

        let data = parse_json_lenient(&body);
        let state = data
            .get("status")
            .and_then(|s| s.as_str())
            .map(HealthState::from_reported)
            .unwrap_or(HealthState::Unknown);
        let message = data
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default();

        HealthStatus::new(state, Some(latency_ms), message).with_limits(data.get("limits").cloned())
    }

    async fn create_job(
        &self,
        resource_type: &str,
        metadata: &JobMetadata,
    ) -> Result<JobTicket, ClientError> {
        let url = self.resolve(&format!("/conversions/{}/jobs", resource_type));
        debug!("Creating conversion job for {} at {}", metadata.filename, url);

        let response = self
            .client
            .post(&url)
            .json(metadata)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(ClientError::from_reqwest)?;
        let data = parse_json_lenient(&body);

        if !status.is_success() {
            let message = data
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("service responded with status {}", status.as_u16()));
            return Err(ClientError::JobCreation(message));
        }

        JobTicket::from_body(&data).map_err(|field| {
            ClientError::JobCreation(format!("response missing required field `{}`", field))
        })
    }

    async fn upload_artifact(
        &self,
        upload_target: &str,
        file: &SourceFile,
        headers: &HashMap<String, String>,
    ) -> Result<(), ClientError> {
        let url = self.resolve(upload_target);
        debug!("Uploading {} ({} bytes)", file.name, file.size);

        let response = self
            .client
            .put(&url)
            .headers(Self::upload_headers(file, headers))
            .body(file.bytes().clone())
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(ClientError::Upload {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }

    async fn poll_status(
        &self,
        status_target: &str,
        cancel: &CancellationToken,
    ) -> Result<StatusReport, ClientError> {
        let url = self.resolve(status_target);

        let request = async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(ClientError::from_reqwest)?;

            if response.status() == StatusCode::NOT_FOUND {
                return Err(ClientError::JobNotFound);
            }
            if !response.status().is_success() {
                debug!("Status poll returned {}", response.status());
            }

            let body = response.text().await.map_err(ClientError::from_reqwest)?;
            Ok(StatusReport::from_body(&parse_json_lenient(&body)))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = request => result,
        }
    }

    async fn fetch_result(&self, download_target: &str) -> Result<Bytes, ClientError> {
        let url = self.resolve(download_target);
        debug!("Downloading conversion result from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(ClientError::Download {
                status: response.status().as_u16(),
            });
        }

        response.bytes().await.map_err(ClientError::from_reqwest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> HttpConversionClient {
        HttpConversionClient::new(&RemoteServiceConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let client = client("https://tools.example/api/");
        assert_eq!(
            client.resolve("/conversions/document/health"),
            "https://tools.example/api/conversions/document/health"
        );
        assert_eq!(
            client.resolve("jobs/1"),
            "https://tools.example/api/jobs/1"
        );
        assert_eq!(
            client.resolve("https://bucket.example/upload?sig=1"),
            "https://bucket.example/upload?sig=1"
        );
    }

    #[test]
    fn test_upload_headers_override_content_type() {
        let file = SourceFile::new("a.pdf", "application/pdf", vec![1u8]);
        let mut extra = HashMap::new();
        extra.insert("Content-Type".to_string(), "binary/octet-stream".to_string());
        extra.insert("x-upload-token".to_string(), "abc".to_string());
        extra.insert("bad header".to_string(), "x".to_string());

        let headers = HttpConversionClient::upload_headers(&file, &extra);
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "binary/octet-stream");
        assert_eq!(headers.get("x-upload-token").unwrap(), "abc");
        assert_eq!(headers.len(), 2);
    }
}
