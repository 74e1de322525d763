//! Collaborator interface for the SEO generation service.
//!
//! The workflow only ever talks to a [`GenerationService`]; the HTTP client in
//! [`http`] is the production implementation.

mod error;
pub mod http;

pub use error::ServiceError;
pub use http::SeoServiceClient;

use crate::model::{CallKind, OutlineItem};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Raw titles for every page in the sitemap. Entries may be null.
    async fn extract_titles(&self, sitemap_url: &str) -> Result<Vec<Option<String>>, ServiceError>;

    /// One outline per title, in request order.
    async fn generate_outlines(&self, titles: &[String]) -> Result<Vec<OutlineItem>, ServiceError>;

    async fn generate_content(&self, outline: &str) -> Result<String, ServiceError>;
}

/// A single call to the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ExtractTitles { sitemap_url: String },
    GenerateOutlines { titles: Vec<String> },
    GenerateContent { outline: String },
}

impl Request {
    pub fn kind(&self) -> CallKind {
        match self {
            Request::ExtractTitles { .. } => CallKind::ExtractTitles,
            Request::GenerateOutlines { .. } => CallKind::GenerateOutlines,
            Request::GenerateContent { .. } => CallKind::GenerateContent,
        }
    }
}

/// Successful payload of a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Titles(Vec<Option<String>>),
    Outlines(Vec<OutlineItem>),
    Content(String),
}

/// Run one request against the service.
pub async fn execute<S>(service: &S, request: Request) -> Result<Response, ServiceError>
where
    S: GenerationService + ?Sized,
{
    match request {
        Request::ExtractTitles { sitemap_url } => service
            .extract_titles(&sitemap_url)
            .await
            .map(Response::Titles),
        Request::GenerateOutlines { titles } => service
            .generate_outlines(&titles)
            .await
            .map(Response::Outlines),
        Request::GenerateContent { outline } => service
            .generate_content(&outline)
            .await
            .map(Response::Content),
    }
}

/// Run one request, giving up when `deadline` elapses or `cancel` fires.
pub async fn execute_with_deadline<S>(
    service: &S,
    request: Request,
    deadline: Duration,
    cancel: CancellationToken,
) -> Result<Response, ServiceError>
where
    S: GenerationService + ?Sized,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(ServiceError::Cancelled),
        res = tokio::time::timeout(deadline, execute(service, request)) => {
            res.unwrap_or(Err(ServiceError::TimedOut(deadline)))
        }
    }
}
