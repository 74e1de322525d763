use crate::model::{OutlineItem, Stage};
use crate::workflow::WorkflowState;
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};

pub struct UiState {
    pub tab: usize,
    pub info: String,
    // Sitemap URL being typed on step 1
    pub input: String,
    pub title_cursor: usize,
    pub outline_cursor: usize,
    pub content_scroll: u16,
    pub spinner: usize,
    pub workflow: WorkflowState,
    pub last_exported_path: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            info: String::new(),
            input: String::new(),
            title_cursor: 0,
            outline_cursor: 0,
            content_scroll: 0,
            spinner: 0,
            workflow: WorkflowState::new(),
            last_exported_path: None,
        }
    }
}

impl UiState {
    pub fn stage(&self) -> Stage {
        self.workflow.stage()
    }

    pub fn is_busy(&self) -> bool {
        self.workflow.is_busy()
    }

    /// Replace the workflow snapshot, keeping cursors inside the new lists.
    pub fn apply_workflow(&mut self, next: WorkflowState) {
        if next.stage() != self.workflow.stage() {
            self.title_cursor = 0;
            self.outline_cursor = 0;
            self.content_scroll = 0;
        }
        self.workflow = next;
        self.title_cursor = clamp_cursor(self.title_cursor, self.workflow.titles().len());
        self.outline_cursor = clamp_cursor(self.outline_cursor, self.workflow.outlines().len());
    }

    /// Move the cursor of the list shown on the current stage.
    pub fn move_cursor(&mut self, delta: isize) {
        match self.stage() {
            Stage::SitemapInput => {}
            Stage::TitleSelection => {
                self.title_cursor =
                    step_cursor(self.title_cursor, delta, self.workflow.titles().len());
            }
            Stage::OutlineAndContent => {
                let before = self.outline_cursor;
                self.outline_cursor =
                    step_cursor(self.outline_cursor, delta, self.workflow.outlines().len());
                if before != self.outline_cursor {
                    self.content_scroll = 0;
                }
            }
        }
    }

    pub fn current_title(&self) -> Option<&str> {
        self.workflow
            .titles()
            .get(self.title_cursor)
            .map(String::as_str)
    }

    pub fn current_outline(&self) -> Option<&OutlineItem> {
        self.workflow.outlines().get(self.outline_cursor)
    }

    /// Content generated for the outline under the cursor.
    pub fn shown_content(&self) -> Option<&str> {
        self.current_outline()
            .and_then(|o| self.workflow.content_for(&o.outline))
    }

    pub fn scroll_content(&mut self, delta: i32) {
        let next = (self.content_scroll as i32 + delta).max(0);
        self.content_scroll = next.min(u16::MAX as i32) as u16;
    }
}

fn clamp_cursor(cursor: usize, len: usize) -> usize {
    cursor.min(len.saturating_sub(1))
}

fn step_cursor(cursor: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = cursor as isize + delta;
    next.clamp(0, len as isize - 1) as usize
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    value_style: Style,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::styled(line_text, value_style),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(line_text, value_style),
            ]));
        }

        remaining = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Response;

    fn on_titles(titles: &[&str]) -> WorkflowState {
        let mut s = WorkflowState::new();
        s.set_sitemap_url("https://x.com/sitemap.xml");
        let call = s.begin_submit_sitemap().unwrap();
        let raw = titles.iter().map(|t| Some(t.to_string())).collect();
        s.resolve(call.id, Ok(Response::Titles(raw)));
        s
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut ui = UiState::default();
        ui.apply_workflow(on_titles(&["A", "B", "C"]));
        ui.move_cursor(-1);
        assert_eq!(ui.title_cursor, 0);
        ui.move_cursor(10);
        assert_eq!(ui.title_cursor, 2);
        assert_eq!(ui.current_title(), Some("C"));
    }

    #[test]
    fn stage_change_resets_cursors() {
        let mut ui = UiState::default();
        ui.title_cursor = 7;
        ui.apply_workflow(on_titles(&["A", "B"]));
        assert_eq!(ui.title_cursor, 0);
    }

    #[test]
    fn wrapped_lines_fit_width() {
        let mut out = Vec::new();
        push_wrapped_status_kv(&mut out, "Error", &"x".repeat(50), Style::default(), 24);
        assert!(out.len() > 1);
        for line in &out {
            assert!(line.width() <= 20);
        }
        let mut none = Vec::new();
        push_wrapped_status_kv(&mut none, "Error", "   ", Style::default(), 24);
        assert!(none.is_empty());
    }
}
