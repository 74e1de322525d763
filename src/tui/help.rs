use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(action),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit (q only outside the URL input)"),
        ]),
        key_line("Enter", 7, "Run the current step"),
        key_line("Esc", 9, "Cancel the request in flight"),
        key_line("tab", 9, "Toggle this help"),
        Line::from(""),
        Line::from("Step 1 (sitemap):"),
        key_line("type", 8, "Edit the sitemap URL"),
        key_line("Backspace", 3, "Delete a character"),
        Line::from(""),
        Line::from("Step 2 (titles):"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("↑/↓", Style::default().fg(Color::Magenta)),
            Span::raw(" or "),
            Span::styled("j/k", Style::default().fg(Color::Magenta)),
            Span::raw("  Navigate"),
        ]),
        key_line("space", 7, "Select / unselect title"),
        Line::from(""),
        Line::from("Step 3 (outlines):"),
        key_line("↑/↓", 9, "Choose outline"),
        key_line("PgUp/PgDn", 3, "Scroll content"),
        key_line("y", 11, "Copy content to clipboard"),
        key_line("s", 11, "Save JSON report"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
