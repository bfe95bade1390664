//! Gotenberg-style one-shot conversion client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use super::config::{DirectResourceKind, DirectServiceConfig};
use super::error::DirectClientError;
use super::traits::DirectConversionService;
use crate::health::{HealthState, HealthStatus};
use crate::job::{ConversionOptions, SourceFile, TargetFormat};

const DEFAULT_IMAGE_QUALITY: f64 = 85.0;
const DEFAULT_PNG_COMPRESSION: &str = "6";

type QueryParams = Vec<(&'static str, String)>;

/// Client for a Gotenberg instance (or anything with the same routes).
pub struct GotenbergClient {
    client: Client,
    base_url: String,
    kind: DirectResourceKind,
}

impl GotenbergClient {
    pub fn new(config: &DirectServiceConfig) -> Result<Self, DirectClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(DirectClientError::from_reqwest)?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            kind: config.resource_type,
        })
    }

    pub fn kind(&self) -> DirectResourceKind {
        self.kind
    }

    /// Converts an office/text/html document.
    pub async fn convert_document(
        &self,
        file: &SourceFile,
        target_format: &TargetFormat,
        options: &ConversionOptions,
    ) -> Result<Bytes, DirectClientError> {
        let (endpoint, params) = document_request(target_format, options);
        let form = Form::new().part("files", file_part(file)?);
        self.post_form(endpoint, &params, form).await
    }

    /// Converts a raster image through `/convert/image`.
    pub async fn convert_image(
        &self,
        file: &SourceFile,
        target_format: &TargetFormat,
        options: &ConversionOptions,
    ) -> Result<Bytes, DirectClientError> {
        let params = image_params(target_format, options)?;
        let form = Form::new().part("file", file_part(file)?);
        self.post_form("/convert/image", &params, form).await
    }

    async fn post_form(
        &self,
        endpoint: &str,
        params: &QueryParams,
        form: Form,
    ) -> Result<Bytes, DirectClientError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Posting conversion to {} with {:?}", url, params);

        let response = self
            .client
            .post(&url)
            .query(params)
            .multipart(form)
            .send()
            .await
            .map_err(DirectClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("no response body").to_string()
            } else {
                body
            };
            return Err(DirectClientError::ConversionFailed {
                status: status.as_u16(),
                body,
            });
        }

        response.bytes().await.map_err(DirectClientError::from_reqwest)
    }
}

fn file_part(file: &SourceFile) -> Result<Part, DirectClientError> {
    Part::bytes(file.bytes().to_vec())
        .file_name(file.name.clone())
        .mime_str(file.content_type())
        .map_err(|e| DirectClientError::InvalidRequest(e.to_string()))
}

fn bool_param(options: &ConversionOptions, key: &str) -> String {
    options.flag(key).to_string()
}

/// Endpoint and query for a document conversion.
fn document_request(target_format: &TargetFormat, options: &ConversionOptions) -> (&'static str, QueryParams) {
    let format = target_format.extension();
    let mut params = vec![("outputFormat", format.clone())];

    if format == "pdf" {
        params.push(("singlePage", bool_param(options, "singlePage")));
        params.push((
            "pdfFormat",
            options.text("pdfFormat").unwrap_or_else(|| "A4".to_string()),
        ));
        params.push(("pdfA", bool_param(options, "pdfA")));
    }

    let endpoint = if format == "html" {
        "/convert/html"
    } else {
        "/convert/office"
    };
    (endpoint, params)
}

fn image_params(
    target_format: &TargetFormat,
    options: &ConversionOptions,
) -> Result<QueryParams, DirectClientError> {
    let quality = || {
        let q = options.number("quality").unwrap_or(DEFAULT_IMAGE_QUALITY);
        (q.clamp(1.0, 100.0).round() as u8).to_string()
    };

    let mut params = match target_format.extension().as_str() {
        "jpg" | "jpeg" => vec![("format", "jpg".to_string()), ("quality", quality())],
        "webp" => vec![("format", "webp".to_string()), ("quality", quality())],
        "png" => vec![
            ("format", "png".to_string()),
            (
                "compression",
                options
                    .text("compression")
                    .unwrap_or_else(|| DEFAULT_PNG_COMPRESSION.to_string()),
            ),
        ],
        other => {
            return Err(DirectClientError::InvalidRequest(format!(
                "unsupported image format: {}",
                other
            )))
        }
    };

    for key in ["width", "height"] {
        if let Some(value) = options.text(key) {
            params.push((key, value));
        }
    }
    Ok(params)
}

#[async_trait]
impl DirectConversionService for GotenbergClient {
    fn name(&self) -> &str {
        "gotenberg"
    }

    async fn check_health(&self) -> HealthStatus {
        let url = format!("{}/health", self.base_url);
        let start = Instant::now();
        let result = self.client.get(&url).send().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(response) if response.status().is_success() => {
                HealthStatus::healthy(latency_ms, "Conversion service is operational")
            }
            Ok(response) => HealthStatus::unhealthy(
                latency_ms,
                format!("Health check failed with status {}", response.status().as_u16()),
            ),
            Err(e) => HealthStatus::new(
                HealthState::Unreachable,
                Some(latency_ms),
                format!("Unable to reach conversion service: {}", e),
            ),
        }
    }

    async fn convert(
        &self,
        file: &SourceFile,
        target_format: &TargetFormat,
        options: &ConversionOptions,
    ) -> Result<Bytes, DirectClientError> {
        match self.kind {
            DirectResourceKind::Document => {
                self.convert_document(file, target_format, options).await
            }
            DirectResourceKind::Image => self.convert_image(file, target_format, options).await,
        }
    }
}
