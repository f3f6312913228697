use crate::api::Job;
use crate::sync::{Mutation, ResourceKey, SubscriptionHandle, SyncStore};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_time, status_color, truncate};
use crate::ui::view::{watch, RedrawFlag, ShortcutInfo, View, ViewAction};
use crate::ui::views::JobProgressView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// All jobs known to the backend, newest first
pub struct JobListView {
  redraw: RedrawFlag,
  subscription: Option<SubscriptionHandle>,
  list_state: ListState,
}

impl JobListView {
  pub fn new(store: &mut SyncStore, redraw: &RedrawFlag) -> Self {
    Self {
      redraw: redraw.clone(),
      subscription: Some(watch(store, ResourceKey::job_list(), redraw)),
      list_state: ListState::default(),
    }
  }

  fn selected<'a>(&self, store: &'a SyncStore) -> Option<&'a Job> {
    let jobs = store.job_list().data?;
    jobs.get(self.list_state.selected()?)
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect, store: &SyncStore) {
    let view = store.job_list();
    let jobs = view.data.unwrap_or(&[]);
    ensure_valid_selection(&mut self.list_state, jobs.len());

    let title = match (&view.error, view.is_loading) {
      (Some(e), _) => format!(" Jobs (error: {}) ", e),
      (None, true) if view.data.is_none() => " Jobs (loading...) ".to_string(),
      _ => format!(" Jobs ({}) ", jobs.len()),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if jobs.is_empty() {
      let content = if view.is_loading {
        "Loading jobs..."
      } else if view.is_error {
        "Failed to load jobs. Press 'r' to retry."
      } else {
        "No jobs yet. Use :submit to start an analysis."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = jobs
      .iter()
      .map(|job| {
        let line = Line::from(vec![
          Span::styled(
            format!("{:<14}", truncate(&job.id, 14)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", job.status.label()),
            Style::default().fg(status_color(job.status)),
          ),
          Span::raw(format!("{:>4}% ", job.progress)),
          Span::styled(
            format!("{:<17}", format_time(job.created_at)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(truncate(&job.message, 60)),
        ]);
        ListItem::new(line)
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for JobListView {
  fn handle_key(&mut self, key: KeyEvent, store: &mut SyncStore) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('r') => store.refresh(&ResourceKey::job_list()),
      KeyCode::Char('d') => {
        if let Some(job) = self.selected(store) {
          return ViewAction::Mutate(Mutation::DeleteJob(job.id.clone()));
        }
      }
      KeyCode::Enter => {
        if let Some(job) = self.selected(store) {
          let id = job.id.clone();
          return ViewAction::Push(Box::new(JobProgressView::new(id, store, &self.redraw)));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, store: &SyncStore) {
    self.render_list(frame, area, store);
  }

  fn breadcrumb_label(&self) -> String {
    "Jobs".to_string()
  }

  fn detach(&mut self, store: &mut SyncStore) {
    if let Some(handle) = self.subscription.take() {
      store.unsubscribe(handle);
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("enter", "open").with_priority(20),
      ShortcutInfo::new("d", "delete").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
    ]
  }
}
