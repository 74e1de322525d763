use super::{GenerationService, ServiceError};
use crate::model::{OutlineItem, WorkflowConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TITLES_PATH: &str = "/api/get-titles";
const OUTLINES_PATH: &str = "/api/get-outlines";
const CONTENT_PATH: &str = "/api/generate-content";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TitlesRequest<'a> {
    sitemap_url: &'a str,
}

#[derive(Serialize)]
struct OutlinesRequest<'a> {
    titles: &'a [String],
}

#[derive(Serialize)]
struct ContentRequest<'a> {
    outline: &'a str,
}

#[derive(Deserialize)]
struct TitlesPayload {
    titles: Vec<Option<String>>,
}

#[derive(Deserialize)]
struct WireOutline {
    title: String,
    // The service sends null when generating a single outline failed.
    #[serde(default)]
    outline: Option<String>,
}

#[derive(Deserialize)]
struct OutlinesPayload {
    outlines: Vec<WireOutline>,
}

#[derive(Deserialize)]
struct ContentPayload {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for the SEO generation backend.
pub struct SeoServiceClient {
    pub http: reqwest::Client,
    base_url: String,
}

impl SeoServiceClient {
    pub fn new(cfg: &WorkflowConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(cfg.connect_timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        tracing::debug!(%url, "POST");
        let resp = self.http.post(&url).json(body).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        tracing::debug!(%url, status = status.as_u16(), len = bytes.len(), "response");
        decode_envelope(status, &bytes)
    }
}

/// Decode the service's `{payload} | {"error": ..}` envelope.
///
/// The backend reports application errors with 4xx/5xx statuses and an `error` field,
/// so the body is inspected before the status.
fn decode_envelope<T: DeserializeOwned>(
    status: reqwest::StatusCode,
    bytes: &[u8],
) -> Result<T, ServiceError> {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            if !status.is_success() {
                return Err(ServiceError::Status(status));
            }
            return Err(ServiceError::Malformed(format!("invalid JSON: {e}")));
        }
    };

    if let Some(err) = value.get("error").filter(|v| !v.is_null()) {
        let msg = match err {
            Value::String(s) => s.clone(),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string()),
            other => other.to_string(),
        };
        return Err(ServiceError::Service(msg));
    }

    if !status.is_success() {
        return Err(ServiceError::Status(status));
    }

    serde_json::from_value(value).map_err(|e| ServiceError::Malformed(e.to_string()))
}

#[async_trait]
impl GenerationService for SeoServiceClient {
    async fn extract_titles(&self, sitemap_url: &str) -> Result<Vec<Option<String>>, ServiceError> {
        let payload: TitlesPayload = self.post(TITLES_PATH, &TitlesRequest { sitemap_url }).await?;
        Ok(payload.titles)
    }

    async fn generate_outlines(&self, titles: &[String]) -> Result<Vec<OutlineItem>, ServiceError> {
        let payload: OutlinesPayload = self.post(OUTLINES_PATH, &OutlinesRequest { titles }).await?;
        Ok(payload
            .outlines
            .into_iter()
            .map(|o| OutlineItem::new(o.title, o.outline.unwrap_or_default()))
            .collect())
    }

    async fn generate_content(&self, outline: &str) -> Result<String, ServiceError> {
        let payload: ContentPayload = self.post(CONTENT_PATH, &ContentRequest { outline }).await?;
        payload
            .content
            .ok_or_else(|| ServiceError::Malformed("`content` is null".into()))
    }
}
