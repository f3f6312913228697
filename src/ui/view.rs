use std::cell::Cell;
use std::rc::Rc;

use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use crate::sync::{CacheEntry, Mutation, ResourceKey, SubscriptionHandle, SyncStore};

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Set by subscription callbacks, cleared by the app after drawing
#[derive(Debug, Clone)]
pub struct RedrawFlag(Rc<Cell<bool>>);

impl RedrawFlag {
  pub fn new() -> Self {
    Self(Rc::new(Cell::new(true)))
  }

  pub fn request(&self) {
    self.0.set(true);
  }

  /// Returns whether a redraw was requested and resets the flag
  pub fn take(&self) -> bool {
    self.0.replace(false)
  }

  /// Change callback for `SyncStore::subscribe`
  pub fn on_change(&self) -> impl FnMut(&ResourceKey, Option<&CacheEntry>) + 'static {
    let flag = self.clone();
    move |_, _| flag.request()
  }
}

impl Default for RedrawFlag {
  fn default() -> Self {
    Self::new()
  }
}

/// Subscribe `key` so that every change to it requests a redraw
pub fn watch(store: &mut SyncStore, key: ResourceKey, redraw: &RedrawFlag) -> SubscriptionHandle {
  store.subscribe(key, redraw.on_change())
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
  /// Run a mutation; the outcome is reported in the footer
  Mutate(Mutation),
}

/// Trait for view behavior
///
/// Views subscribe to the resources they show when they are created and read
/// them from the store on every render. They never write the cache; changes go
/// through `ViewAction::Mutate` or `SyncStore::refresh`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent, store: &mut SyncStore) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect, store: &SyncStore);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Release subscriptions. Called once, when the view leaves the stack.
  fn detach(&mut self, store: &mut SyncStore);

  /// True while the view is reading text, so `:` must not open the command line
  fn captures_input(&self) -> bool {
    false
  }

  /// Get keyboard shortcuts to display in the header
  /// Override this to provide view-specific shortcuts
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_redraw_flag() {
    let flag = RedrawFlag::new();
    assert!(flag.take());
    assert!(!flag.take());

    let mut callback = flag.on_change();
    callback(&ResourceKey::health(), None);
    assert!(flag.take());
  }
}
