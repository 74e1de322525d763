use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings shared by the HTTP client and the workflow controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub base_url: String,
    #[serde(default)]
    pub sitemap_url: Option<String>,
    /// Deadline applied to every generation call.
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    pub user_agent: String,
}

/// Workflow step. Ordering follows the pipeline, so `a < b` means `a` comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    SitemapInput,
    TitleSelection,
    OutlineAndContent,
}

impl Stage {
    /// 1-based step number shown by presentation layers.
    pub fn number(self) -> usize {
        match self {
            Stage::SitemapInput => 1,
            Stage::TitleSelection => 2,
            Stage::OutlineAndContent => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::SitemapInput => "Enter Competitor's Sitemap",
            Stage::TitleSelection => "Select Titles",
            Stage::OutlineAndContent => "Outlines and Content",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineItem {
    pub title: String,
    pub outline: String,
}

impl OutlineItem {
    pub fn new(title: impl Into<String>, outline: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            outline: outline.into(),
        }
    }
}

/// The three external generation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    ExtractTitles,
    GenerateOutlines,
    GenerateContent,
}

impl CallKind {
    /// Message shown when a failure carries no message of its own.
    pub fn fallback_message(self) -> &'static str {
        match self {
            CallKind::ExtractTitles => "Error fetching titles",
            CallKind::GenerateOutlines => "Error generating outlines",
            CallKind::GenerateContent => "Error generating content",
        }
    }

    /// Progress text for busy indicators.
    pub fn progress_label(self) -> &'static str {
        match self {
            CallKind::ExtractTitles => "Processing...",
            CallKind::GenerateOutlines => "Generating Outlines...",
            CallKind::GenerateContent => "Generating Content...",
        }
    }
}

/// Events emitted by the command loop and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    // Box to keep the event small; the state carries every list.
    StateChanged(Box<crate::workflow::WorkflowState>),
    Info(String),
}

/// One outline together with the content generated from it, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutline {
    pub title: String,
    pub outline: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Serializable record of a workflow run, used for JSON output and exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    #[serde(default)]
    pub timestamp_utc: String,
    pub config: WorkflowConfig,
    pub stage: Stage,
    pub sitemap_url: String,
    pub titles: Vec<String>,
    pub selected_titles: Vec<String>,
    pub outlines: Vec<ReportOutline>,
    #[serde(default)]
    pub latest_content: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}
