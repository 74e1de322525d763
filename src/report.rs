//! Report building for CLI output and exports.
//!
//! Turns the final workflow state into a serializable [`WorkflowReport`] and formats
//! human-readable lines for text mode.

use crate::model::{ReportOutline, WorkflowConfig, WorkflowReport};
use crate::workflow::WorkflowState;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_report(cfg: &WorkflowConfig, state: &WorkflowState) -> WorkflowReport {
    WorkflowReport {
        timestamp_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        config: cfg.clone(),
        stage: state.stage(),
        sitemap_url: state.sitemap_url().to_string(),
        titles: state.titles().to_vec(),
        selected_titles: state.selected_titles().to_vec(),
        outlines: state
            .outlines()
            .iter()
            .map(|o| ReportOutline {
                title: o.title.clone(),
                outline: o.outline.clone(),
                content: state.content_for(&o.outline).map(str::to_string),
            })
            .collect(),
        latest_content: state.generated_content().map(str::to_string),
        last_error: state.last_error().map(str::to_string),
    }
}

/// Build a text summary from a finished report.
pub(crate) fn build_text_summary(report: &WorkflowReport) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("Sitemap: {}", report.sitemap_url));
    lines.push(format!(
        "Stage: {} ({})",
        report.stage.number(),
        report.stage.label()
    ));
    lines.push(format!(
        "Titles: {} found, {} selected",
        report.titles.len(),
        report.selected_titles.len()
    ));
    for title in &report.titles {
        let mark = if report.selected_titles.contains(title) {
            "[x]"
        } else {
            "[ ]"
        };
        lines.push(format!("  {mark} {title}"));
    }

    for (i, item) in report.outlines.iter().enumerate() {
        lines.push(String::new());
        lines.push(format!("== Outline {}: {} ==", i + 1, item.title));
        if item.outline.is_empty() {
            lines.push("(no outline returned)".into());
        } else {
            lines.extend(item.outline.lines().map(str::to_string));
        }
        if let Some(content) = item.content.as_deref() {
            lines.push(String::new());
            lines.push(format!("-- Content: {} --", item.title));
            lines.extend(content.lines().map(str::to_string));
        }
    }

    if let Some(err) = report.last_error.as_deref() {
        lines.push(String::new());
        lines.push(format!("Last error: {err}"));
    }

    TextSummary { lines }
}

/// Write the report as pretty JSON, creating parent directories as needed.
pub(crate) fn export_json(path: &Path, report: &WorkflowReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("serialize report")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Default export file name in the current directory.
pub(crate) fn default_export_path(report: &WorkflowReport) -> Result<PathBuf> {
    let name = format!(
        "seo-workflow-{}.json",
        report.timestamp_utc.replace(':', "-").replace('T', "_")
    );
    let current_dir = std::env::current_dir().context("get current directory")?;
    Ok(current_dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stage;
    use std::time::Duration;

    fn report() -> WorkflowReport {
        WorkflowReport {
            timestamp_utc: "2026-10-16T08:30:00Z".into(),
            config: WorkflowConfig {
                base_url: "http://127.0.0.1:5000".into(),
                sitemap_url: Some("https://x.com/sitemap.xml".into()),
                call_timeout: Duration::from_secs(600),
                connect_timeout: Duration::from_secs(10),
                user_agent: "seo-workflow/test".into(),
            },
            stage: Stage::OutlineAndContent,
            sitemap_url: "https://x.com/sitemap.xml".into(),
            titles: vec!["Foo".into(), "Bar".into()],
            selected_titles: vec!["Foo".into()],
            outlines: vec![ReportOutline {
                title: "Foo".into(),
                outline: "1. Intro\n2. Body".into(),
                content: Some("Full article".into()),
            }],
            latest_content: Some("Full article".into()),
            last_error: None,
        }
    }

    #[test]
    fn summary_marks_selection_and_content() {
        let lines = build_text_summary(&report()).lines;
        assert!(lines.contains(&"Stage: 3 (Outlines and Content)".to_string()));
        assert!(lines.contains(&"  [x] Foo".to_string()));
        assert!(lines.contains(&"  [ ] Bar".to_string()));
        assert!(lines.contains(&"2. Body".to_string()));
        assert!(lines.contains(&"Full article".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("Last error")));
    }

    #[test]
    fn export_writes_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        export_json(&path, &report()).unwrap();

        let back: WorkflowReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.outlines[0].content.as_deref(), Some("Full article"));
        assert_eq!(back.config.call_timeout, Duration::from_secs(600));
    }

    #[test]
    fn default_name_is_filesystem_safe() {
        let p = default_export_path(&report()).unwrap();
        let name = p.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, "seo-workflow-2026-10-16_08-30-00Z.json");
    }
}
