mod export;
mod help;
mod state;

use crate::cli::{build_config, Cli};
use crate::model::{Stage, WorkflowConfig, WorkflowEvent};
use crate::service::SeoServiceClient;
use crate::workflow::{self, UiCommand, WorkflowController};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Terminal,
};
use state::{push_wrapped_status_kv, UiState};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    // Build the client before touching the terminal so setup errors print normally.
    let client = Arc::new(SeoServiceClient::new(&cfg)?);
    tracing::info!(base_url = client.base_url(), "starting TUI");
    let controller = WorkflowController::new(client, &cfg);

    // Unbounded channels keep the UI thread from ever blocking on the controller.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_cfg = cfg.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_cfg, event_rx, cmd_tx));

    let res = workflow::run_controller(controller, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    let final_state = res?;
    if let Some(p) = args.export_json.as_deref() {
        let report = crate::report::build_report(&cfg, &final_state);
        crate::report::export_json(p, &report)?;
        eprintln!("Exported: {}", p.display());
    }
    Ok(())
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    cfg: WorkflowConfig,
    mut event_rx: UnboundedReceiver<WorkflowEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; the controller sends snapshots.
    let mut state = UiState::default();
    if let Some(url) = cfg.sitemap_url.as_deref() {
        state.input = url.to_string();
        let _ = cmd_tx.send(UiCommand::SetSitemapUrl(state.input.clone()));
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            match ev {
                WorkflowEvent::StateChanged(s) => state.apply_workflow(*s),
                WorkflowEvent::Info(msg) => state.info = msg,
            }
        }

        if last_tick.elapsed() >= tick_rate {
            state.spinner = state.spinner.wrapping_add(1);
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&cfg, &mut state, k, &cmd_tx) {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Apply one key press. Returns true when the user asked to quit.
fn handle_key(
    cfg: &WorkflowConfig,
    state: &mut UiState,
    k: KeyEvent,
    cmd_tx: &UnboundedSender<UiCommand>,
) -> bool {
    match (k.modifiers, k.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => return true,
        (_, KeyCode::Tab) => {
            state.tab = (state.tab + 1) % 2;
            return false;
        }
        (_, KeyCode::Esc) => {
            if state.is_busy() {
                let _ = cmd_tx.send(UiCommand::Cancel);
            } else {
                state.tab = 0;
            }
            return false;
        }
        _ => {}
    }

    if state.tab == 1 {
        return matches!(k.code, KeyCode::Char('q'));
    }

    match state.stage() {
        Stage::SitemapInput => match k.code {
            KeyCode::Char(c) if !k.modifiers.contains(KeyModifiers::CONTROL) => {
                state.input.push(c);
                let _ = cmd_tx.send(UiCommand::SetSitemapUrl(state.input.clone()));
            }
            KeyCode::Backspace => {
                state.input.pop();
                let _ = cmd_tx.send(UiCommand::SetSitemapUrl(state.input.clone()));
            }
            KeyCode::Enter => {
                if state.input.trim().is_empty() {
                    state.info = "Enter a sitemap URL first".into();
                } else if !state.is_busy() {
                    let _ = cmd_tx.send(UiCommand::SubmitSitemap);
                }
            }
            _ => {}
        },
        Stage::TitleSelection => match k.code {
            KeyCode::Char('q') => return true,
            KeyCode::Up | KeyCode::Char('k') => state.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => state.move_cursor(1),
            KeyCode::Char(' ') => {
                if let Some(title) = state.current_title() {
                    let _ = cmd_tx.send(UiCommand::ToggleTitle(title.to_string()));
                }
            }
            KeyCode::Enter => {
                if state.workflow.selected_titles().is_empty() {
                    state.info = "Select at least one title".into();
                } else if !state.is_busy() {
                    let _ = cmd_tx.send(UiCommand::GenerateOutlines);
                }
            }
            _ => {}
        },
        Stage::OutlineAndContent => match k.code {
            KeyCode::Char('q') => return true,
            KeyCode::Up | KeyCode::Char('k') => state.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => state.move_cursor(1),
            KeyCode::PageDown => state.scroll_content(10),
            KeyCode::PageUp => state.scroll_content(-10),
            KeyCode::Enter => {
                let outline = state.current_outline().map(|o| o.outline.clone());
                match outline {
                    Some(o) if o.is_empty() => {
                        state.info = "No outline was returned for this title".into();
                    }
                    Some(o) if !state.is_busy() => {
                        let _ = cmd_tx.send(UiCommand::GenerateContent(o));
                    }
                    _ => {}
                }
            }
            KeyCode::Char('y') => match state.shown_content().map(str::to_string) {
                Some(content) => {
                    state.info = match export::copy_to_clipboard(&content) {
                        Ok(()) => format!("✓ Copied {} chars to clipboard", content.chars().count()),
                        Err(e) => format!("Clipboard copy failed: {e:#}"),
                    };
                }
                None => state.info = "No content for this outline yet".into(),
            },
            KeyCode::Char('s') => export::save_and_show_path(cfg, state),
            _ => {}
        },
    }
    false
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(5),
        ])
        .split(area);

    draw_steps(chunks[0], f, state);
    if state.tab == 1 {
        help::draw_help(chunks[1], f);
    } else {
        match state.stage() {
            Stage::SitemapInput => draw_sitemap_input(chunks[1], f, state),
            Stage::TitleSelection => draw_title_selection(chunks[1], f, state),
            Stage::OutlineAndContent => draw_outlines(chunks[1], f, state),
        }
    }
    draw_status(chunks[2], f, state);
}

fn draw_steps(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let current = state.stage().number();
    let mut spans = Vec::new();
    for n in 1..=3 {
        let style = if current >= n {
            Style::default().fg(Color::White).bg(Color::Blue)
        } else {
            Style::default().fg(Color::Black).bg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {n} "), style));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(
        format!(" Step {current}: {}", state.stage().label()),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    let p = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("seo-workflow"));
    f.render_widget(p, area);
}

fn action_line(label: &str, state: &UiState, enabled: bool) -> Line<'static> {
    if let Some(flight) = state.workflow.in_flight() {
        let frame = SPINNER[state.spinner % SPINNER.len()];
        return Line::from(Span::styled(
            format!("{frame} {}", flight.kind.progress_label()),
            Style::default().fg(Color::Yellow),
        ));
    }
    let style = if enabled {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Line::from(Span::styled(format!("[Enter] {label}"), style))
}

fn draw_sitemap_input(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let input = if state.input.is_empty() {
        Span::styled(
            "Enter sitemap URL (e.g., https://example.com/sitemap.xml)",
            Style::default().fg(Color::DarkGray),
        )
    } else {
        Span::raw(state.input.clone())
    };
    let lines = vec![
        Line::from(vec![Span::raw("> "), input, Span::raw("▏")]),
        Line::from(""),
        action_line(
            "Analyze Sitemap",
            state,
            state.workflow.can_submit_sitemap(),
        ),
    ];
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Competitor sitemap"));
    f.render_widget(p, area);
}

fn draw_title_selection(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let titles = state.workflow.titles();
    let mut lines: Vec<Line> = Vec::with_capacity(titles.len() + 2);
    if titles.is_empty() {
        lines.push(Line::from(Span::styled(
            "The sitemap yielded no titles.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for (i, title) in titles.iter().enumerate() {
        let mark = if state.workflow.is_selected(title) {
            "[x]"
        } else {
            "[ ]"
        };
        let style = if i == state.title_cursor {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(format!("{mark} {title}"), style)));
    }

    // Keep the cursor visible: borders take 2 rows, the action line and spacer 2 more.
    let visible = area.height.saturating_sub(4) as usize;
    let scroll = state.title_cursor.saturating_sub(visible.saturating_sub(1));
    let mut body: Vec<Line> = lines.into_iter().skip(scroll).take(visible.max(1)).collect();
    body.push(Line::from(""));
    let selected = state.workflow.selected_titles().len();
    body.push(action_line(
        &format!("Generate Outlines ({selected} selected)"),
        state,
        state.workflow.can_generate_outlines(),
    ));

    let title = format!("Titles ({})  [space] select", titles.len());
    let p = Paragraph::new(body).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_outlines(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    let items: Vec<Line> = state
        .workflow
        .outlines()
        .iter()
        .enumerate()
        .map(|(i, o)| {
            let done = if state.workflow.content_for(&o.outline).is_some() {
                "✓ "
            } else {
                "  "
            };
            let style = if i == state.outline_cursor {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default()
            };
            Line::from(Span::styled(format!("{done}{}", o.title), style))
        })
        .collect();
    let list = Paragraph::new(items)
        .block(Block::default().borders(Borders::ALL).title("Outlines"));
    f.render_widget(list, cols[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(cols[1]);

    let (outline_title, mut outline_lines): (String, Vec<Line>) = match state.current_outline() {
        Some(o) if !o.outline.is_empty() => (
            o.title.clone(),
            o.outline.lines().map(|l| Line::from(l.to_string())).collect(),
        ),
        Some(o) => (
            o.title.clone(),
            vec![Line::from(Span::styled(
                "(no outline returned)",
                Style::default().fg(Color::DarkGray),
            ))],
        ),
        None => ("Outline".to_string(), Vec::new()),
    };
    outline_lines.push(Line::from(""));
    let can_generate = state
        .current_outline()
        .map(|o| state.workflow.can_generate_content(&o.outline))
        .unwrap_or(false);
    outline_lines.push(action_line("Generate Content", state, can_generate));
    let outline = Paragraph::new(outline_lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(outline_title));
    f.render_widget(outline, right[0]);

    let content_lines: Vec<Line> = match state.shown_content() {
        Some(c) => c.lines().map(|l| Line::from(l.to_string())).collect(),
        None => vec![Line::from(Span::styled(
            "Press Enter to generate an article from this outline.",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    let content = Paragraph::new(content_lines)
        .wrap(Wrap { trim: false })
        .scroll((state.content_scroll, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Content  [PgUp/PgDn] scroll  [y] copy"),
        );
    f.render_widget(content, right[1]);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    if let Some(err) = state.workflow.last_error() {
        push_wrapped_status_kv(
            &mut lines,
            "Error",
            err,
            Style::default().fg(Color::Red),
            area.width,
        );
    }
    push_wrapped_status_kv(&mut lines, "Info", &state.info, Style::default(), area.width);
    if let Some(path) = &state.last_exported_path {
        if !state.info.contains(path.as_str()) {
            push_wrapped_status_kv(
                &mut lines,
                "Report",
                path,
                Style::default().fg(Color::DarkGray),
                area.width,
            );
        }
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "tab: help  Esc: cancel request  Ctrl-C: quit",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}
