use std::cell::RefCell;
use std::rc::Rc;

use crate::builder::{ConfigBuilder, SubredditConfig};
use crate::sync::{Mutation, SyncStore};
use crate::ui::components::{KeyResult, Prompt, PromptEvent};
use crate::ui::ensure_valid_selection;
use crate::ui::view::{RedrawFlag, ShortcutInfo, View, ViewAction};
use crate::ui::views::PresetsView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

/// The job draft, shared between the draft and presets views and the app
pub type SharedDraft = Rc<RefCell<ConfigBuilder>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Subreddit,
  Include,
  Exclude,
  ClientId,
  ClientSecret,
  Username,
  Password,
  ClusterRange,
}

/// Editor for the next job request
pub struct DraftView {
  draft: SharedDraft,
  redraw: RedrawFlag,
  prompt: Prompt<Field>,
  list_state: ListState,
  notice: Option<String>,
}

impl DraftView {
  pub fn new(draft: SharedDraft, redraw: &RedrawFlag) -> Self {
    Self {
      draft,
      redraw: redraw.clone(),
      prompt: Prompt::new(),
      list_state: ListState::default(),
      notice: None,
    }
  }

  fn apply(&mut self, field: Field, value: String) {
    let mut draft = self.draft.borrow_mut();
    let notice = match field {
      Field::Subreddit => {
        if draft.add_subreddit(SubredditConfig::named(value.as_str())) {
          format!("Added {}", value)
        } else {
          format!("{} is already in the draft", value)
        }
      }
      Field::Include => added_phrase(draft.add_include_phrase(&value), &value),
      Field::Exclude => added_phrase(draft.add_exclude_phrase(&value), &value),
      Field::ClientId => {
        draft.reddit_mut().client_id = value;
        "Client id set".to_string()
      }
      Field::ClientSecret => {
        draft.reddit_mut().client_secret = value;
        "Client secret set".to_string()
      }
      Field::Username => {
        draft.reddit_mut().username = value;
        "Username set".to_string()
      }
      Field::Password => {
        draft.reddit_mut().password = value;
        "Password set".to_string()
      }
      Field::ClusterRange => match parse_range(&value) {
        Some((k_min, k_max)) => {
          let clustering = draft.clustering_mut();
          clustering.k_min = k_min;
          clustering.k_max = k_max;
          format!("Cluster range {}-{}", k_min, k_max)
        }
        None => format!("Not a range: {} (expected e.g. 5-20)", value),
      },
    };
    self.notice = Some(notice);
  }

  fn remove_selected(&mut self) {
    let Some(idx) = self.list_state.selected() else {
      return;
    };
    let mut draft = self.draft.borrow_mut();
    let name = draft.config().subreddits.get(idx).map(|s| s.name.clone());
    if let Some(name) = name {
      draft.remove_subreddit(&name);
      self.notice = Some(format!("Removed {}", name));
    }
  }

  fn render_subreddits(&mut self, frame: &mut Frame, area: Rect) {
    let draft = self.draft.borrow();
    let subs = &draft.config().subreddits;
    ensure_valid_selection(&mut self.list_state, subs.len());

    let block = Block::default()
      .title(format!(" Subreddits ({}) ", subs.len()))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if subs.is_empty() {
      frame.render_widget(
        Paragraph::new("No subreddits. Press 'a' to add one or 'p' for presets.")
          .block(block)
          .style(Style::default().fg(Color::DarkGray))
          .wrap(Wrap { trim: true }),
        area,
      );
      return;
    }

    let items: Vec<ListItem> = subs
      .iter()
      .map(|sub| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("r/{:<20}", sub.name), Style::default().fg(Color::Cyan)),
          Span::styled(
            format!(
              "{}d  >={} votes  {} posts",
              sub.period_days, sub.min_upvotes, sub.max_posts
            ),
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

  fn render_summary(&self, frame: &mut Frame, area: Rect) {
    let draft = self.draft.borrow();
    let config = draft.config();
    let dim = Style::default().fg(Color::DarkGray);
    let set = |value: &str| if value.trim().is_empty() { "unset" } else { "set" };

    let mut lines = vec![
      Line::from(vec![
        Span::styled("client id  ", dim),
        Span::raw(if config.reddit.client_id.is_empty() {
          "unset".to_string()
        } else {
          config.reddit.client_id.clone()
        }),
      ]),
      Line::from(vec![
        Span::styled("secret     ", dim),
        Span::raw(set(&config.reddit.client_secret)),
      ]),
      Line::from(vec![
        Span::styled("username   ", dim),
        Span::raw(set(&config.reddit.username)),
        Span::styled("  password ", dim),
        Span::raw(set(&config.reddit.password)),
      ]),
      Line::from(vec![
        Span::styled("clusters   ", dim),
        Span::raw(format!(
          "{}-{} ({:?})",
          config.clustering.k_min, config.clustering.k_max, config.clustering.method
        )),
      ]),
      Line::from(vec![
        Span::styled("cache      ", dim),
        Span::raw(if config.use_cache { "on" } else { "off" }),
      ]),
      Line::from(vec![
        Span::styled("include    ", dim),
        Span::raw(config.filters.include_phrases.join(", ")),
      ]),
      Line::from(vec![
        Span::styled("exclude    ", dim),
        Span::raw(config.filters.exclude_phrases.join(", ")),
      ]),
      Line::default(),
    ];

    match draft.validate() {
      Ok(()) => lines.push(Line::from(Span::styled(
        "Ready to submit (Enter)",
        Style::default().fg(Color::Green),
      ))),
      Err(e) => lines.push(Line::from(Span::styled(
        e.to_string(),
        Style::default().fg(Color::Red),
      ))),
    }
    for warning in draft.warnings() {
      lines.push(Line::from(Span::styled(
        format!("! {}", warning),
        Style::default().fg(Color::Yellow),
      )));
    }
    if let Some(notice) = &self.notice {
      lines.push(Line::from(Span::styled(notice.clone(), dim)));
    }

    let block = Block::default()
      .title(" Request ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
      area,
    );
  }
}

impl View for DraftView {
  fn handle_key(&mut self, key: KeyEvent, store: &mut SyncStore) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(field, value)) => {
        self.apply(field, value);
        return ViewAction::None;
      }
      KeyResult::Event(PromptEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('a') => self.prompt.open(Field::Subreddit, "Add subreddit"),
      KeyCode::Char('x') => self.remove_selected(),
      KeyCode::Char('i') => self.prompt.open(Field::Include, "Include phrase"),
      KeyCode::Char('e') => self.prompt.open(Field::Exclude, "Exclude phrase"),
      KeyCode::Char('n') => self.prompt.open(Field::ClientId, "Reddit client id"),
      KeyCode::Char('s') => self.prompt.open(Field::ClientSecret, "Reddit client secret"),
      KeyCode::Char('u') => self.prompt.open(Field::Username, "Reddit username"),
      KeyCode::Char('w') => self.prompt.open(Field::Password, "Reddit password"),
      KeyCode::Char('K') => self.prompt.open(Field::ClusterRange, "Cluster range (min-max)"),
      KeyCode::Char('c') => {
        let mut draft = self.draft.borrow_mut();
        let use_cache = !draft.config().use_cache;
        draft.set_use_cache(use_cache);
      }
      KeyCode::Char('p') => {
        return ViewAction::Push(Box::new(PresetsView::new(
          self.draft.clone(),
          store,
          &self.redraw,
        )));
      }
      // Validation happens when the mutation is prepared; failures show in the footer
      KeyCode::Enter => {
        return ViewAction::Mutate(Mutation::StartJob(self.draft.borrow().build_request()));
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, _store: &SyncStore) {
    let chunks = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
      .split(area);
    self.render_subreddits(frame, chunks[0]);
    self.render_summary(frame, chunks[1]);
    self.prompt.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Draft".to_string()
  }

  fn detach(&mut self, _store: &mut SyncStore) {}

  fn captures_input(&self) -> bool {
    self.prompt.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("a/x", "subreddit").with_priority(10),
      ShortcutInfo::new("i/e", "phrase").with_priority(20),
      ShortcutInfo::new("p", "presets").with_priority(30),
      ShortcutInfo::new("enter", "submit").with_priority(40),
    ]
  }
}

fn added_phrase(added: bool, phrase: &str) -> String {
  if added {
    format!("Added \"{}\"", phrase)
  } else {
    format!("\"{}\" is already listed", phrase)
  }
}

/// `"5-20"` or `"5 20"`
fn parse_range(value: &str) -> Option<(u32, u32)> {
  let (min, max) = value
    .split_once('-')
    .or_else(|| value.split_once(char::is_whitespace))?;
  Some((min.trim().parse().ok()?, max.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeBackend;
  use crate::builder::RedditCredentials;
  use crate::sync::SyncOptions;
  use crossterm::event::KeyModifiers;
  use std::sync::Arc;

  fn type_keys(view: &mut DraftView, store: &mut SyncStore, keys: &str) {
    for c in keys.chars() {
      let code = if c == '\n' { KeyCode::Enter } else { KeyCode::Char(c) };
      view.handle_key(KeyEvent::new(code, KeyModifiers::NONE), store);
    }
  }

  fn setup() -> (DraftView, SharedDraft, SyncStore) {
    let store = SyncStore::new(Arc::new(FakeBackend::new()), SyncOptions::default());
    let draft: SharedDraft = Rc::new(RefCell::new(ConfigBuilder::new()));
    let view = DraftView::new(draft.clone(), &RedrawFlag::new());
    (view, draft, store)
  }

  #[test]
  fn test_parse_range() {
    assert_eq!(parse_range("5-20"), Some((5, 20)));
    assert_eq!(parse_range("3 9"), Some((3, 9)));
    assert_eq!(parse_range("five-20"), None);
  }

  #[tokio::test]
  async fn test_prompts_edit_the_shared_draft() {
    let (mut view, draft, mut store) = setup();
    type_keys(&mut view, &mut store, "ar/ADHD\n");
    type_keys(&mut view, &mut store, "aadhd\n");
    type_keys(&mut view, &mut store, "iI keep forgetting\n");
    type_keys(&mut view, &mut store, "K20-5\n");

    let draft = draft.borrow();
    let config = draft.config();
    assert_eq!(config.subreddits.len(), 1);
    assert_eq!(config.subreddits[0].name, "ADHD");
    assert!(config
      .filters
      .include_phrases
      .contains(&"I keep forgetting".to_string()));
    assert_eq!((config.clustering.k_min, config.clustering.k_max), (20, 5));
    assert!(draft.validate().is_err());
  }

  #[tokio::test]
  async fn test_enter_submits_normalized_request() {
    let (mut view, draft, mut store) = setup();
    draft.borrow_mut().add_subreddit(SubredditConfig::named("ADHD"));
    *draft.borrow_mut().reddit_mut() = RedditCredentials {
      client_id: "id".into(),
      client_secret: "secret".into(),
      ..Default::default()
    };

    match view.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE), &mut store) {
      ViewAction::Mutate(Mutation::StartJob(config)) => {
        assert_eq!(config, draft.borrow().build_request());
      }
      _ => panic!("expected a start mutation"),
    }
  }

  #[tokio::test]
  async fn test_open_prompt_swallows_navigation_keys() {
    let (mut view, draft, mut store) = setup();
    type_keys(&mut view, &mut store, "aq");
    assert!(view.prompt.is_active());
    type_keys(&mut view, &mut store, "\n");
    assert_eq!(draft.borrow().config().subreddits[0].name, "q");
  }
}
