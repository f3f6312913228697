use crate::api::JobStatus;
use crate::sync::{Mutation, ResourceKey, SubscriptionHandle, SyncStore};
use crate::ui::renderfns::{format_time, status_color};
use crate::ui::view::{watch, RedrawFlag, ShortcutInfo, View, ViewAction};
use crate::ui::views::ResultsView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};

/// Live progress of one job. Polling runs while this view is on the stack.
pub struct JobProgressView {
  job_id: String,
  subscription: Option<SubscriptionHandle>,
}

impl JobProgressView {
  pub fn new(job_id: String, store: &mut SyncStore, redraw: &RedrawFlag) -> Self {
    let subscription = Some(watch(store, ResourceKey::job(job_id.as_str()), redraw));
    Self {
      job_id,
      subscription,
    }
  }

  fn render_progress(&self, frame: &mut Frame, area: Rect, store: &SyncStore) {
    let view = store.job(&self.job_id);

    let title = match view.data {
      Some(job) => format!(" {} [{}] ", self.job_id, job.status.label()),
      None if view.is_loading => format!(" {} (loading...) ", self.job_id),
      None => format!(" {} ", self.job_id),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(job) = view.data else {
      let (text, color) = match view.error {
        Some(e) => (format!("Error: {}\n\nPress 'r' to retry.", e), Color::Red),
        None if view.is_loading => ("Loading job...".to_string(), Color::DarkGray),
        None => ("Job no longer exists.".to_string(), Color::DarkGray),
      };
      frame.render_widget(Paragraph::new(text).style(Style::default().fg(color)), inner);
      return;
    };

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Gauge
        Constraint::Length(1), // Spacer
        Constraint::Length(3), // Timestamps
        Constraint::Min(1),    // Message / error
      ])
      .split(inner);

    let gauge = Gauge::default()
      .gauge_style(Style::default().fg(status_color(job.status)))
      .percent(u16::from(job.progress.min(100)))
      .label(format!("{}%", job.progress));
    frame.render_widget(gauge, chunks[0]);

    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::DarkGray));
    let mut meta = vec![Line::from(vec![
      label("Created:   "),
      Span::raw(format_time(job.created_at)),
    ])];
    if let Some(done) = job.completed_at {
      meta.push(Line::from(vec![
        label("Completed: "),
        Span::raw(format_time(done)),
      ]));
    }
    if let Some(e) = view.error {
      meta.push(Line::from(vec![
        label("Sync:      "),
        Span::styled(e.to_string(), Style::default().fg(Color::Yellow)),
      ]));
    }
    frame.render_widget(Paragraph::new(meta), chunks[2]);

    let body = match (job.status, &job.error) {
      (JobStatus::Failed, Some(error)) => {
        Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red))
      }
      (JobStatus::Completed, _) => Paragraph::new(format!(
        "{}\n\nPress Enter to view results.",
        job.message
      )),
      _ => Paragraph::new(job.message.as_str()),
    };
    frame.render_widget(body.wrap(Wrap { trim: true }), chunks[3]);
  }
}

impl View for JobProgressView {
  fn handle_key(&mut self, key: KeyEvent, store: &mut SyncStore) -> ViewAction {
    match key.code {
      KeyCode::Enter => {
        let done = store
          .job(&self.job_id)
          .data
          .is_some_and(|job| job.status == JobStatus::Completed);
        if done {
          return ViewAction::Push(Box::new(ResultsView::new(self.job_id.clone())));
        }
        ViewAction::None
      }
      KeyCode::Char('r') => {
        store.refresh(&ResourceKey::job(self.job_id.as_str()));
        ViewAction::None
      }
      KeyCode::Char('d') => ViewAction::Mutate(Mutation::DeleteJob(self.job_id.clone())),
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, store: &SyncStore) {
    self.render_progress(frame, area, store);
  }

  fn breadcrumb_label(&self) -> String {
    self.job_id.clone()
  }

  fn detach(&mut self, store: &mut SyncStore) {
    if let Some(handle) = self.subscription.take() {
      store.unsubscribe(handle);
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("enter", "results").with_priority(20),
      ShortcutInfo::new("d", "delete").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(50),
    ]
  }
}
