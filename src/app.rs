use crate::api::Backend;
use crate::builder::{
  load_stored_credentials, save_stored_credentials, ConfigBuilder, StoredCredentials,
};
use crate::config::Config;
use crate::db::LocalStore;
use crate::event::{Event, EventHandler};
use crate::sync::{
  Mutation, MutationOutcome, MutationResponse, ResourceKey, SubscriptionHandle, SyncStore,
};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::StatusLevel;
use crate::ui::view::{RedrawFlag, View, ViewAction};
use crate::ui::views::{DraftView, JobListView, JobProgressView, PresetsView, SharedDraft};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::cell::RefCell;
use std::io::stdout;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Main application state
pub struct App {
  /// Owns the cache, the poller and the mutation executor
  store: SyncStore,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Set by subscription callbacks and input handling
  redraw: RedrawFlag,

  /// Header resources, watched for the whole session
  header_subscriptions: Vec<SubscriptionHandle>,

  command_input: CommandInput,

  /// Last message shown in the footer
  status: Option<(StatusLevel, String)>,

  title: String,
  tick_rate: Duration,

  /// Job request being edited
  draft: SharedDraft,

  /// Durable credential storage; None if it could not be opened
  local_store: Option<LocalStore>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(
    config: &Config,
    backend: Arc<dyn Backend>,
    draft: ConfigBuilder,
    local_store: Option<LocalStore>,
  ) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut store = SyncStore::new(backend, config.sync_options());
    let redraw = RedrawFlag::new();

    let header_subscriptions = vec![
      ui::view::watch(&mut store, ResourceKey::health(), &redraw),
      ui::view::watch(&mut store, ResourceKey::cache_stats(), &redraw),
    ];
    let root = JobListView::new(&mut store, &redraw);

    Self {
      store,
      view_stack: vec![Box::new(root)],
      redraw,
      header_subscriptions,
      command_input: CommandInput::new(),
      status: None,
      title: config.display_title(),
      tick_rate: config.polling.tick_rate(),
      draft: Rc::new(RefCell::new(draft)),
      local_store,
      event_tx: tx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(self.tick_rate);
    self.event_tx = events.sender();
    info!(title = %self.title, "started");

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    self.shutdown();
    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      if self.redraw.take() {
        terminal.draw(|frame| ui::draw(frame, self))?;
      }

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  /// Release every subscription so polling stops
  fn shutdown(&mut self) {
    while let Some(mut view) = self.view_stack.pop() {
      view.detach(&mut self.store);
    }
    for handle in self.header_subscriptions.drain(..) {
      self.store.unsubscribe(handle);
    }
    info!("stopped");
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => {
        self.handle_key(key);
        self.redraw.request();
      }
      Event::Tick => {
        self.store.tick();
      }
      Event::Mutation(outcome) => {
        self.handle_mutation(outcome);
        self.redraw.request();
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let typing = self.view_stack.last().is_some_and(|v| v.captures_input());
    if !typing {
      match self.command_input.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted { name, arg }) => {
          self.execute_command(&name, arg.as_deref());
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key, &mut self.store),
      None => return,
    };
    self.handle_action(action);
  }

  fn handle_action(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => self.pop_view(),
      ViewAction::Mutate(mutation) => self.dispatch(mutation),
    }
  }

  fn pop_view(&mut self) {
    if self.view_stack.len() > 1 {
      if let Some(mut view) = self.view_stack.pop() {
        view.detach(&mut self.store);
      }
    } else {
      self.should_quit = true;
    }
  }

  /// Replace the whole stack with `root`
  fn reset_stack(&mut self, root: Box<dyn View>) {
    while let Some(mut view) = self.view_stack.pop() {
      view.detach(&mut self.store);
    }
    self.view_stack.push(root);
  }

  // ============================================================================
  // Mutations
  // ============================================================================

  /// Mark the affected keys, then run the remote call off the UI task
  fn dispatch(&mut self, mutation: Mutation) {
    let label = mutation.label();
    match self.store.prepare(mutation) {
      Ok(pending) => {
        self.set_status(StatusLevel::Info, format!("Running {}...", label));
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
          let _ = tx.send(Event::Mutation(pending.run().await));
        });
      }
      Err(e) => self.set_status(StatusLevel::Error, format!("Cannot {}: {}", label, e)),
    }
  }

  fn handle_mutation(&mut self, outcome: MutationOutcome) {
    let label = outcome.label();
    // Saved only if this very request is accepted
    let credentials = outcome.submitted_credentials().cloned();
    match self.store.apply(outcome) {
      Ok(MutationResponse::Started(job)) => {
        if let Some(credentials) = &credentials {
          self.remember_credentials(credentials);
        }
        self.set_status(StatusLevel::Info, format!("Started job {}", job.id));
        let view = JobProgressView::new(job.id, &mut self.store, &self.redraw);
        self.view_stack.push(Box::new(view));
      }
      Ok(MutationResponse::Deleted(job_id)) => {
        self.set_status(StatusLevel::Info, format!("Deleted job {}", job_id));
      }
      Ok(MutationResponse::Cleared(cleared)) => {
        self.set_status(
          StatusLevel::Info,
          format!("Cleared {} cached files", cleared.files_deleted),
        );
      }
      Err(e) => {
        warn!(mutation = label, error = %e, "mutation failed");
        self.set_status(StatusLevel::Error, format!("Failed to {}: {}", label, e));
      }
    }
  }

  fn remember_credentials(&self, credentials: &StoredCredentials) {
    let Some(local) = &self.local_store else {
      return;
    };
    if let Err(e) = save_stored_credentials(local, credentials) {
      warn!(error = %e, "could not save credentials");
    }
  }

  // ============================================================================
  // Commands
  // ============================================================================

  fn execute_command(&mut self, name: &str, arg: Option<&str>) {
    match name {
      "jobs" => {
        let root = JobListView::new(&mut self.store, &self.redraw);
        self.reset_stack(Box::new(root));
      }
      "submit" => {
        if let Some(path) = arg {
          if let Err(e) = self.load_draft(Path::new(path)) {
            self.set_status(StatusLevel::Error, e.to_string());
            return;
          }
        }
        self.open_draft();
      }
      "presets" => {
        let view = PresetsView::new(self.draft.clone(), &mut self.store, &self.redraw);
        self.view_stack.push(Box::new(view));
      }
      "clear-cache" => self.dispatch(Mutation::ClearBackendCache),
      "refresh" => {
        self.store.refresh(&ResourceKey::health());
        self.store.refresh(&ResourceKey::cache_stats());
        self.store.refresh(&ResourceKey::job_list());
      }
      "quit" => self.should_quit = true,
      "" => {}
      other => self.set_status(StatusLevel::Error, format!("Unknown command: {}", other)),
    }
  }

  /// Replace the draft with a job file, keeping stored and environment secrets
  fn load_draft(&mut self, path: &Path) -> Result<()> {
    let mut builder = ConfigBuilder::load_draft(path)?;
    if let Some(stored) = self
      .local_store
      .as_ref()
      .and_then(|local| load_stored_credentials(local))
    {
      builder.seed_credentials(&stored);
    }
    builder.apply_env_overrides();
    *self.draft.borrow_mut() = builder;
    self.set_status(StatusLevel::Info, format!("Loaded {}", path.display()));
    Ok(())
  }

  /// Show the draft editor on top of the stack
  pub fn open_draft(&mut self) {
    let view = DraftView::new(self.draft.clone(), &self.redraw);
    self.view_stack.push(Box::new(view));
  }

  fn set_status(&mut self, level: StatusLevel, message: String) {
    self.status = Some((level, message));
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub(crate) fn render_view(&mut self, frame: &mut Frame, area: Rect) {
    if let Some(view) = self.view_stack.last_mut() {
      view.render(frame, area, &self.store);
    }
  }

  pub fn store(&self) -> &SyncStore {
    &self.store
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  pub fn status(&self) -> Option<(StatusLevel, &str)> {
    self
      .status
      .as_ref()
      .map(|(level, message)| (*level, message.as_str()))
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}
