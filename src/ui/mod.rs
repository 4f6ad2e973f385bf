// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Terminal UI for melodygen.
//!
//! Provides a ratatui-based form for the generation parameters with a
//! status line. Generation runs on the UI thread; the screen shows
//! "Generating..." until it finishes.

mod form;

pub use form::{cursor_position, field_layout, Field, FormAction, FormState, FormWidget};

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};
use tracing::info;

use crate::bundle::list_bundles;
use crate::config::Settings;
use crate::generator::GeneratorMap;
use crate::pipeline::run_to_status;
use crate::request::GenerationRequest;

/// Poll interval for terminal events
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Run generation with the form's current values and return the status text
pub fn generate_from_form(form: &FormState, settings: &Settings, map: &GeneratorMap) -> String {
    match GenerationRequest::from_form(&form.input, settings) {
        Ok(request) => run_to_status(map, &request),
        Err(e) => format!("Error: {}", e),
    }
}

/// Terminal UI application
pub struct App {
    /// Form contents
    form: FormState,
    /// Defaults for blank fields
    settings: Settings,
    /// Generator registry
    map: GeneratorMap,
    /// Terminal handle
    terminal: Terminal<CrosstermBackend<Stdout>>,
    /// Whether to continue running
    running: bool,
}

impl App {
    /// Create a new app, taking over the terminal
    pub fn new(settings: Settings, map: GeneratorMap) -> io::Result<Self> {
        let bundles = list_bundles(&settings.checkpoints_folder);
        let form = FormState::new(&settings, bundles);

        let terminal = setup_terminal()?;

        Ok(Self {
            form,
            settings,
            map,
            terminal,
            running: true,
        })
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop the app
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Event loop; returns when the user quits
    pub fn run(&mut self) -> io::Result<()> {
        while self.running {
            self.draw()?;

            let Some(Event::Key(key)) = self.poll_event()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match self.form.handle_key(key.code, key.modifiers) {
                FormAction::Quit => self.quit(),
                FormAction::Generate => self.generate()?,
                FormAction::None => {}
            }
        }
        Ok(())
    }

    /// Poll for events with timeout
    fn poll_event(&self) -> io::Result<Option<Event>> {
        if event::poll(POLL_INTERVAL)? {
            Ok(Some(event::read()?))
        } else {
            Ok(None)
        }
    }

    /// Run generation synchronously, redrawing the status first
    fn generate(&mut self) -> io::Result<()> {
        self.form.set_status("Generating...");
        self.draw()?;

        let status = generate_from_form(&self.form, &self.settings, &self.map);
        info!("{}", status);
        self.form.set_status(status);
        Ok(())
    }

    /// Draw the UI
    pub fn draw(&mut self) -> io::Result<()> {
        let form = &self.form;
        self.terminal.draw(|frame| render(frame, form))?;
        Ok(())
    }

    /// Restore the terminal
    fn cleanup(&mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Enter raw mode and the alternate screen, undoing both if a later step fails
fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    or_restore(execute!(stdout, EnterAlternateScreen), restore_terminal)?;
    or_restore(Terminal::new(CrosstermBackend::new(stdout)), restore_terminal)
}

/// Best-effort restore used when setup fails before an `App` exists
fn restore_terminal() {
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Run `restore` if `result` is an error
fn or_restore<T>(result: io::Result<T>, restore: impl FnOnce()) -> io::Result<T> {
    if result.is_err() {
        restore();
    }
    result
}

/// Render the whole screen
pub fn render(frame: &mut Frame, form: &FormState) {
    let area = frame.area();

    // Main layout: form, status, footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),   // Form
            Constraint::Length(3), // Status
            Constraint::Length(1), // Key hints
        ])
        .split(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            " Melody Generator ",
            Style::default().add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(chunks[0]);
    frame.render_widget(block, chunks[0]);
    frame.render_widget(FormWidget::new(form), inner);

    if let Some((x, y)) = cursor_position(form, inner) {
        frame.set_cursor_position((x, y));
    }

    render_status(frame, chunks[1], form.status.as_deref());
    render_key_hints(frame, chunks[2]);

    if form.show_help {
        render_help_overlay(frame, area);
    }
}

/// Render status section
fn render_status(frame: &mut Frame, area: Rect, status: Option<&str>) {
    let style = match status {
        Some(s) if s.starts_with("Error") => Style::default().fg(Color::Red),
        Some("Generating...") => Style::default().fg(Color::Yellow),
        Some(_) => Style::default().fg(Color::Green),
        None => Style::default().fg(Color::DarkGray),
    };

    let widget = Paragraph::new(status.unwrap_or("Ready"))
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(" Status "));
    frame.render_widget(widget, area);
}

/// Render key hints
fn render_key_hints(frame: &mut Frame, area: Rect) {
    let text = Span::styled(
        " Tab/↑↓: Move | ←→: Bundle | Enter: Next/Generate | Ctrl+G: Generate | F1: Help | Esc: Quit",
        Style::default().fg(Color::DarkGray),
    );
    frame.render_widget(Paragraph::new(text), area);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, area: Rect) {
    // Calculate centered area
    let width = 52.min(area.width.saturating_sub(4));
    let height = 14.min(area.height.saturating_sub(4));
    let x = (area.width - width) / 2;
    let y = (area.height - height) / 2;
    let help_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, help_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(Style::default().bg(Color::Black));

    let inner = block.inner(help_area);
    frame.render_widget(block, help_area);

    let help_text = vec![
        Line::from(Span::styled("Navigation", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  Tab / Down    Next field"),
        Line::from("  Shift+Tab/Up  Previous field"),
        Line::from("  Left/Right    Cycle bundle files"),
        Line::from(""),
        Line::from(Span::styled("Editing", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  Backspace     Delete character"),
        Line::from("  Ctrl+U        Clear field (blank = default)"),
        Line::from(""),
        Line::from(Span::styled("Other", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  Ctrl+G        Generate melodies"),
        Line::from("  F1 / Esc      Toggle help / Quit"),
    ];

    frame.render_widget(Paragraph::new(help_text), inner);
}
