// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Generation form state and widget.

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::config::Settings;
use crate::request::FormInput;

/// Height of one field row, borders included
const FIELD_HEIGHT: u16 = 3;

/// Focusable form elements, top to bottom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Bundle,
    Primer,
    OutputDir,
    NumOutputs,
    NumSteps,
    Temperature,
    Generate,
}

impl Field {
    /// All fields in display order
    pub const ALL: [Field; 7] = [
        Field::Bundle,
        Field::Primer,
        Field::OutputDir,
        Field::NumOutputs,
        Field::NumSteps,
        Field::Temperature,
        Field::Generate,
    ];

    /// Label shown on the field border
    pub fn label(&self) -> &'static str {
        match self {
            Field::Bundle => "Bundle File",
            Field::Primer => "Primer MIDI File",
            Field::OutputDir => "Output Folder",
            Field::NumOutputs => "Number of Outputs",
            Field::NumSteps => "Number of Steps",
            Field::Temperature => "Temperature",
            Field::Generate => "Generate Melody",
        }
    }

    fn index(&self) -> usize {
        Field::ALL.iter().position(|f| f == self).unwrap_or(0)
    }

    /// Next field, wrapping around
    pub fn next(&self) -> Field {
        Field::ALL[(self.index() + 1) % Field::ALL.len()]
    }

    /// Previous field, wrapping around
    pub fn prev(&self) -> Field {
        Field::ALL[(self.index() + Field::ALL.len() - 1) % Field::ALL.len()]
    }

    /// Whether the field holds editable text
    pub fn is_text(&self) -> bool {
        !matches!(self, Field::Generate)
    }
}

/// Result of handling a key press
#[derive(Debug, Clone, PartialEq)]
pub enum FormAction {
    /// No action needed
    None,
    /// Quit the application
    Quit,
    /// Run generation with the current values
    Generate,
}

/// Editable form contents
#[derive(Debug, Clone)]
pub struct FormState {
    /// Current field text
    pub input: FormInput,
    /// Bundle files offered for the bundle field
    pub bundles: Vec<PathBuf>,
    /// Index into `bundles` of the selected entry
    bundle_index: Option<usize>,
    /// Focused element
    pub focus: Field,
    /// Last status message
    pub status: Option<String>,
    /// Help text visible
    pub show_help: bool,
}

impl FormState {
    /// Form pre-filled from settings with the given bundle choices
    pub fn new(settings: &Settings, bundles: Vec<PathBuf>) -> Self {
        let bundle_index = bundles.iter().position(|b| *b == settings.bundle_file);
        Self {
            input: FormInput::from_settings(settings),
            bundles,
            bundle_index,
            focus: Field::Bundle,
            status: None,
            show_help: false,
        }
    }

    /// Text of a field, `None` for the button
    pub fn value(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Bundle => &self.input.bundle_file,
            Field::Primer => &self.input.primer_midi,
            Field::OutputDir => &self.input.output_dir,
            Field::NumOutputs => &self.input.num_outputs,
            Field::NumSteps => &self.input.num_steps,
            Field::Temperature => &self.input.temperature,
            Field::Generate => return None,
        };
        Some(value.as_str())
    }

    fn value_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Bundle => Some(&mut self.input.bundle_file),
            Field::Primer => Some(&mut self.input.primer_midi),
            Field::OutputDir => Some(&mut self.input.output_dir),
            Field::NumOutputs => Some(&mut self.input.num_outputs),
            Field::NumSteps => Some(&mut self.input.num_steps),
            Field::Temperature => Some(&mut self.input.temperature),
            Field::Generate => None,
        }
    }

    /// Position of the selected bundle as (1-based index, count)
    pub fn bundle_position(&self) -> Option<(usize, usize)> {
        self.bundle_index.map(|i| (i + 1, self.bundles.len()))
    }

    /// Select the next or previous bundle choice
    pub fn cycle_bundle(&mut self, forward: bool) {
        if self.bundles.is_empty() {
            return;
        }
        let count = self.bundles.len();
        let index = match (self.bundle_index, forward) {
            (None, true) => 0,
            (None, false) => count - 1,
            (Some(i), true) => (i + 1) % count,
            (Some(i), false) => (i + count - 1) % count,
        };
        self.bundle_index = Some(index);
        self.input.bundle_file = self.bundles[index].display().to_string();
    }

    /// Replace the status message
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    /// Handle a key event
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> FormAction {
        match (code, modifiers) {
            // Quit
            (KeyCode::Esc, _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => FormAction::Quit,

            // Generate from anywhere
            (KeyCode::Char('g'), KeyModifiers::CONTROL) => FormAction::Generate,

            // Help
            (KeyCode::F(1), _) => {
                self.show_help = !self.show_help;
                FormAction::None
            }

            // Focus
            (KeyCode::Tab, _) | (KeyCode::Down, _) => {
                self.focus = self.focus.next();
                FormAction::None
            }
            (KeyCode::BackTab, _) | (KeyCode::Up, _) => {
                self.focus = self.focus.prev();
                FormAction::None
            }
            (KeyCode::Enter, _) => {
                if self.focus == Field::Generate {
                    FormAction::Generate
                } else {
                    self.focus = self.focus.next();
                    FormAction::None
                }
            }
            (KeyCode::Char(' '), _) if self.focus == Field::Generate => FormAction::Generate,

            // Bundle choices
            (KeyCode::Left, _) | (KeyCode::Right, _) if self.focus == Field::Bundle => {
                self.cycle_bundle(code == KeyCode::Right);
                FormAction::None
            }

            // Editing
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                if let Some(value) = self.value_mut(self.focus) {
                    value.clear();
                }
                self.bundle_edited();
                FormAction::None
            }
            (KeyCode::Backspace, _) => {
                if let Some(value) = self.value_mut(self.focus) {
                    value.pop();
                }
                self.bundle_edited();
                FormAction::None
            }
            (KeyCode::Char(c), KeyModifiers::NONE) | (KeyCode::Char(c), KeyModifiers::SHIFT) => {
                if let Some(value) = self.value_mut(self.focus) {
                    value.push(c);
                }
                self.bundle_edited();
                FormAction::None
            }

            _ => FormAction::None,
        }
    }

    /// Typed text no longer matches a listed bundle
    fn bundle_edited(&mut self) {
        if self.focus == Field::Bundle {
            let typed = PathBuf::from(&self.input.bundle_file);
            self.bundle_index = self.bundles.iter().position(|b| *b == typed);
        }
    }
}

/// Split `area` into one row per field
pub fn field_layout(area: Rect) -> Vec<Rect> {
    let mut constraints: Vec<Constraint> = Field::ALL
        .iter()
        .map(|_| Constraint::Length(FIELD_HEIGHT))
        .collect();
    constraints.push(Constraint::Min(0));

    Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area)
        .iter()
        .take(Field::ALL.len())
        .copied()
        .collect()
}

/// Cursor position at the end of the focused field's text
pub fn cursor_position(state: &FormState, area: Rect) -> Option<(u16, u16)> {
    let value = state.value(state.focus)?;
    let rect = field_layout(area).get(state.focus.index()).copied()?;
    if rect.width < 3 || rect.height < 3 {
        return None;
    }
    let max_x = rect.x + rect.width - 2;
    let x = (rect.x + 1).saturating_add(value.chars().count() as u16).min(max_x);
    Some((x, rect.y + 1))
}

/// Form widget rendering every field and the generate button
pub struct FormWidget<'a> {
    state: &'a FormState,
}

impl<'a> FormWidget<'a> {
    /// Create a new form widget
    pub fn new(state: &'a FormState) -> Self {
        Self { state }
    }
}

impl Widget for FormWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows = field_layout(area);

        for (field, rect) in Field::ALL.iter().zip(rows) {
            let focused = *field == self.state.focus;
            let border_style = if focused {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            match self.state.value(*field) {
                Some(value) => {
                    let mut title = format!(" {} ", field.label());
                    if *field == Field::Bundle && !self.state.bundles.is_empty() {
                        let hint = match self.state.bundle_position() {
                            Some((n, count)) => format!("◀ {}/{} ▶ ", n, count),
                            None => format!("◀ {} found ▶ ", self.state.bundles.len()),
                        };
                        title.push_str(&hint);
                    }

                    let block = Block::default()
                        .borders(Borders::ALL)
                        .border_style(border_style)
                        .title(title);
                    Paragraph::new(value)
                        .block(block)
                        .style(Style::default().fg(Color::White))
                        .render(rect, buf);
                }
                None => {
                    let style = if focused {
                        Style::default().fg(Color::Black).bg(Color::Green).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default().fg(Color::Green)
                    };
                    let label = Line::from(Span::styled(format!("[ {} ]", field.label()), style));
                    Paragraph::new(label)
                        .block(Block::default().borders(Borders::ALL).border_style(border_style))
                        .alignment(Alignment::Center)
                        .render(rect, buf);
                }
            }
        }
    }
}
