use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent<T> {
  /// Enter pressed with non-empty text; carries the purpose the prompt was opened for
  Submitted(T, String),
  Cancelled,
}

/// Labeled single-line input overlay, opened for a specific purpose `T`
#[derive(Debug, Clone)]
pub struct Prompt<T> {
  input: TextInput,
  open: Option<(T, &'static str)>,
}

impl<T> Default for Prompt<T> {
  fn default() -> Self {
    Self {
      input: TextInput::new(),
      open: None,
    }
  }
}

impl<T: Clone> Prompt<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.open.is_some()
  }

  pub fn open(&mut self, purpose: T, label: &'static str) {
    self.input.clear();
    self.open = Some((purpose, label));
  }

  fn close(&mut self) {
    self.input.clear();
    self.open = None;
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptEvent<T>> {
    let Some((purpose, _)) = self.open.clone() else {
      return KeyResult::NotHandled;
    };

    match self.input.handle_key(key) {
      InputResult::Submitted(value) => {
        self.close();
        let value = value.trim().to_string();
        if value.is_empty() {
          KeyResult::Event(PromptEvent::Cancelled)
        } else {
          KeyResult::Event(PromptEvent::Submitted(purpose, value))
        }
      }
      InputResult::Cancelled => {
        self.close();
        KeyResult::Event(PromptEvent::Cancelled)
      }
      // Swallow everything else while open
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some((_, label)) = &self.open else {
      return;
    };

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, 3.min(area.height));

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", label));

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let (before, after) = self.input.split_at_cursor();
    let line = Line::from(vec![
      Span::styled("> ", Style::default().fg(Color::Yellow)),
      Span::raw(before),
      Span::styled("_", Style::default().fg(Color::Yellow)),
      Span::raw(after),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
  }
}
