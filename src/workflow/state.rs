//! Workflow data and pure stage transitions.
//!
//! `begin_*` functions apply the "call issued" effects and hand back the request to run;
//! [`WorkflowState::resolve`] applies the outcome. Nothing here performs I/O.

use crate::model::{CallKind, OutlineItem, Stage};
use crate::service::{Request, Response, ServiceError};
use std::collections::BTreeMap;

/// Identifies the call currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub id: u64,
    pub kind: CallKind,
}

/// A call the state has committed to; the caller must run it and resolve `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCall {
    pub id: u64,
    pub request: Request,
}

#[derive(Debug, Clone)]
pub struct WorkflowState {
    stage: Stage,
    sitemap_url: String,
    titles: Vec<String>,
    selected: Vec<String>,
    outlines: Vec<OutlineItem>,
    generated_content: Option<String>,
    content_by_outline: BTreeMap<String, String>,
    last_error: Option<String>,
    in_flight: Option<InFlight>,
    // Outline text of the content call in flight.
    pending_outline: Option<String>,
    next_call_id: u64,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            stage: Stage::SitemapInput,
            sitemap_url: String::new(),
            titles: Vec::new(),
            selected: Vec::new(),
            outlines: Vec::new(),
            generated_content: None,
            content_by_outline: BTreeMap::new(),
            last_error: None,
            in_flight: None,
            pending_outline: None,
            next_call_id: 1,
        }
    }
}

/// Drop null and blank entries from a raw title list.
pub fn sanitize_titles(raw: Vec<Option<String>>) -> Vec<String> {
    raw.into_iter()
        .flatten()
        .filter(|t| !t.trim().is_empty())
        .collect()
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn sitemap_url(&self) -> &str {
        &self.sitemap_url
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    /// Selected titles in the order they were checked.
    pub fn selected_titles(&self) -> &[String] {
        &self.selected
    }

    pub fn is_selected(&self, title: &str) -> bool {
        self.selected.iter().any(|t| t == title)
    }

    pub fn outlines(&self) -> &[OutlineItem] {
        &self.outlines
    }

    /// Content from the most recent successful content call.
    pub fn generated_content(&self) -> Option<&str> {
        self.generated_content.as_deref()
    }

    /// Content generated from this outline text, if any.
    pub fn content_for(&self, outline: &str) -> Option<&str> {
        self.content_by_outline.get(outline).map(String::as_str)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<InFlight> {
        self.in_flight
    }

    pub fn set_sitemap_url(&mut self, url: impl Into<String>) {
        self.sitemap_url = url.into();
    }

    /// Flip membership of `title` in the selection. Returns false when the title is not
    /// offered on the current stage.
    pub fn toggle_title(&mut self, title: &str) -> bool {
        if self.stage != Stage::TitleSelection || !self.titles.iter().any(|t| t == title) {
            return false;
        }
        if let Some(pos) = self.selected.iter().position(|t| t == title) {
            self.selected.remove(pos);
        } else {
            self.selected.push(title.to_string());
        }
        true
    }

    pub fn can_submit_sitemap(&self) -> bool {
        self.stage == Stage::SitemapInput
            && !self.is_busy()
            && !self.sitemap_url.trim().is_empty()
    }

    pub fn can_generate_outlines(&self) -> bool {
        self.stage == Stage::TitleSelection && !self.is_busy() && !self.selected.is_empty()
    }

    pub fn can_generate_content(&self, outline: &str) -> bool {
        self.stage == Stage::OutlineAndContent
            && !self.is_busy()
            && !outline.is_empty()
            && self.outlines.iter().any(|o| o.outline == outline)
    }

    pub fn begin_submit_sitemap(&mut self) -> Option<IssuedCall> {
        if !self.can_submit_sitemap() {
            return None;
        }
        let sitemap_url = self.sitemap_url.trim().to_string();
        Some(self.issue(Request::ExtractTitles { sitemap_url }))
    }

    pub fn begin_generate_outlines(&mut self) -> Option<IssuedCall> {
        if !self.can_generate_outlines() {
            return None;
        }
        let titles = self.selected.clone();
        Some(self.issue(Request::GenerateOutlines { titles }))
    }

    pub fn begin_generate_content(&mut self, outline: &str) -> Option<IssuedCall> {
        if !self.can_generate_content(outline) {
            return None;
        }
        self.pending_outline = Some(outline.to_string());
        Some(self.issue(Request::GenerateContent {
            outline: outline.to_string(),
        }))
    }

    fn issue(&mut self, request: Request) -> IssuedCall {
        let id = self.next_call_id;
        self.next_call_id += 1;
        self.in_flight = Some(InFlight {
            id,
            kind: request.kind(),
        });
        self.last_error = None;
        IssuedCall { id, request }
    }

    /// Apply the outcome of call `id`. Returns false (and changes nothing) when `id` is not
    /// the call in flight.
    pub fn resolve(&mut self, id: u64, result: Result<Response, ServiceError>) -> bool {
        let Some(in_flight) = self.in_flight.filter(|f| f.id == id) else {
            tracing::warn!(call_id = id, "ignoring resolution for a call that is not in flight");
            return false;
        };
        self.in_flight = None;

        match (in_flight.kind, result) {
            (CallKind::ExtractTitles, Ok(Response::Titles(raw))) => {
                self.titles = sanitize_titles(raw);
                self.selected.clear();
                self.stage = Stage::TitleSelection;
            }
            (CallKind::GenerateOutlines, Ok(Response::Outlines(outlines))) => {
                self.outlines = outlines;
                self.stage = Stage::OutlineAndContent;
            }
            (CallKind::GenerateContent, Ok(Response::Content(content))) => {
                if let Some(outline) = self.pending_outline.take() {
                    self.content_by_outline.insert(outline, content.clone());
                }
                self.generated_content = Some(content);
            }
            (kind, Ok(other)) => {
                tracing::warn!(?kind, ?other, "response does not match the call");
                self.last_error = Some(kind.fallback_message().to_string());
            }
            (kind, Err(e)) => {
                self.last_error = Some(
                    e.user_message()
                        .unwrap_or_else(|| kind.fallback_message().to_string()),
                );
            }
        }
        self.pending_outline = None;
        true
    }
}
