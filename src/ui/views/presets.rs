use crate::builder::SubredditConfig;
use crate::sync::{ResourceKey, SubscriptionHandle, SyncStore};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{watch, RedrawFlag, ShortcutInfo, View, ViewAction};
use crate::ui::views::SharedDraft;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

/// Suggested subreddits and phrases; picks are added to the draft
pub struct PresetsView {
  draft: SharedDraft,
  subscriptions: Vec<SubscriptionHandle>,
  list_state: ListState,
  notice: Option<String>,
}

impl PresetsView {
  pub fn new(draft: SharedDraft, store: &mut SyncStore, redraw: &RedrawFlag) -> Self {
    let subscriptions = vec![
      watch(store, ResourceKey::subreddit_presets(), redraw),
      watch(store, ResourceKey::phrase_presets(), redraw),
    ];
    Self {
      draft,
      subscriptions,
      list_state: ListState::default(),
      notice: None,
    }
  }

  fn add_selected(&mut self, store: &SyncStore) {
    let Some(preset) = store
      .subreddit_presets()
      .data
      .zip(self.list_state.selected())
      .and_then(|(presets, idx)| presets.get(idx))
    else {
      return;
    };
    let added = self
      .draft
      .borrow_mut()
      .add_subreddit(SubredditConfig::named(preset.name.as_str()));
    self.notice = Some(if added {
      format!("Added r/{}", preset.name)
    } else {
      format!("r/{} is already in the draft", preset.name)
    });
  }

  fn add_phrases(&mut self, store: &SyncStore) {
    let Some(phrases) = store.phrase_presets().data else {
      return;
    };
    let mut draft = self.draft.borrow_mut();
    let mut added = 0;
    for phrase in &phrases.include {
      added += usize::from(draft.add_include_phrase(phrase));
    }
    for phrase in &phrases.exclude {
      added += usize::from(draft.add_exclude_phrase(phrase));
    }
    self.notice = Some(format!("Added {} phrases", added));
  }

  fn render_subreddits(&mut self, frame: &mut Frame, area: Rect, store: &SyncStore) {
    let view = store.subreddit_presets();
    let presets = view.data.unwrap_or(&[]);
    ensure_valid_selection(&mut self.list_state, presets.len());

    let block = Block::default()
      .title(" Subreddits ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if presets.is_empty() {
      let text = match view.error {
        Some(e) => format!("Error: {}", e),
        None if view.is_loading => "Loading presets...".to_string(),
        None => "No presets.".to_string(),
      };
      frame.render_widget(
        Paragraph::new(text)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    }

    let items: Vec<ListItem> = presets
      .iter()
      .map(|preset| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("r/{:<20}", preset.name),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(
            truncate(&preset.description, 60),
            Style::default().fg(Color::DarkGray),
          ),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn render_phrases(&self, frame: &mut Frame, area: Rect, store: &SyncStore) {
    let block = Block::default()
      .title(" Phrases ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let mut lines = Vec::new();
    match store.phrase_presets().data {
      Some(phrases) => {
        lines.push(Line::from(Span::styled("include", Style::default().fg(Color::Green))));
        lines.extend(phrases.include.iter().map(|p| Line::from(format!("  {}", p))));
        lines.push(Line::from(Span::styled("exclude", Style::default().fg(Color::Red))));
        lines.extend(phrases.exclude.iter().map(|p| Line::from(format!("  {}", p))));
      }
      None => lines.push(Line::from("Loading phrases...")),
    }
    if let Some(notice) = &self.notice {
      lines.push(Line::default());
      lines.push(Line::from(Span::styled(
        notice.clone(),
        Style::default().fg(Color::Yellow),
      )));
    }

    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
      area,
    );
  }
}

impl View for PresetsView {
  fn handle_key(&mut self, key: KeyEvent, store: &mut SyncStore) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('a') | KeyCode::Enter => self.add_selected(store),
      KeyCode::Char('p') => self.add_phrases(store),
      KeyCode::Char('r') => {
        store.refresh(&ResourceKey::subreddit_presets());
        store.refresh(&ResourceKey::phrase_presets());
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, store: &SyncStore) {
    let chunks = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
      .split(area);
    self.render_subreddits(frame, chunks[0], store);
    self.render_phrases(frame, chunks[1], store);
  }

  fn breadcrumb_label(&self) -> String {
    "Presets".to_string()
  }

  fn detach(&mut self, store: &mut SyncStore) {
    for handle in self.subscriptions.drain(..) {
      store.unsubscribe(handle);
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("a", "add subreddit").with_priority(20),
      ShortcutInfo::new("p", "add phrases").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(40),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeBackend;
  use crate::builder::{AnalysisConfiguration, ConfigBuilder, FiltersConfig};
  use crate::sync::SyncOptions;
  use crossterm::event::KeyModifiers;
  use std::cell::RefCell;
  use std::rc::Rc;
  use std::sync::Arc;

  #[tokio::test]
  async fn test_picks_land_in_draft() {
    let backend = Arc::new(FakeBackend::new());
    let mut store = SyncStore::new(backend, SyncOptions::default());
    let empty = AnalysisConfiguration {
      filters: FiltersConfig {
        include_phrases: Vec::new(),
        exclude_phrases: Vec::new(),
        ..Default::default()
      },
      ..Default::default()
    };
    let draft: SharedDraft = Rc::new(RefCell::new(ConfigBuilder::from_config(empty)));
    let mut view = PresetsView::new(draft.clone(), &mut store, &RedrawFlag::new());

    for _ in 0..100 {
      tokio::task::yield_now().await;
      store.tick();
      if store.in_flight_count() == 0 && store.phrase_presets().data.is_some() {
        break;
      }
    }

    view.list_state.select(Some(0));
    let press = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
    view.handle_key(press('a'), &mut store);
    view.handle_key(press('a'), &mut store);
    view.handle_key(press('p'), &mut store);

    let draft = draft.borrow();
    assert_eq!(draft.config().subreddits.len(), 1);
    assert_eq!(draft.config().subreddits[0].name, "ADHD");
    assert!(draft
      .config()
      .filters
      .include_phrases
      .contains(&"I struggle".to_string()));
    assert_eq!(draft.config().filters.exclude_phrases, vec!["rant".to_string()]);
    assert_eq!(view.notice.as_deref(), Some("Added 2 phrases"));
  }
}
