//! In-memory resource cache: the single source of truth every view reads from.
//!
//! The cache is a pure store. Reads never fetch; the poller and the mutation
//! executor are the only writers. Every write synchronously notifies the
//! listeners registered for that exact key.

use std::collections::HashMap;

use tracing::trace;

use super::entry::{CacheEntry, FetchStatus, Resource};
use super::key::ResourceKey;
use crate::error::SyncError;

/// Change callback. Receives the entry after the write, or None if it was removed.
pub type Listener = Box<dyn FnMut(&ResourceKey, Option<&CacheEntry>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct ResourceCache {
  entries: HashMap<ResourceKey, CacheEntry>,
  listeners: HashMap<ResourceKey, Vec<(ListenerId, Listener)>>,
  /// Bumped on every reconciled write; survives removal of the entry
  generations: HashMap<ResourceKey, u64>,
  /// Mutations prepared but not yet applied, per affected key
  pending: HashMap<ResourceKey, usize>,
  next_listener: u64,
  /// Keys written inside the current batch, in first-touch order
  batch: Option<Vec<ResourceKey>>,
}

impl ResourceCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, key: &ResourceKey) -> Option<&CacheEntry> {
    self.entries.get(key)
  }

  pub fn contains(&self, key: &ResourceKey) -> bool {
    self.entries.contains_key(key)
  }

  pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
    self.entries.keys()
  }

  pub fn put(&mut self, key: &ResourceKey, value: Resource, status: FetchStatus) {
    self
      .entries
      .entry(key.clone())
      .or_insert_with(CacheEntry::new)
      .set_value(value, status);
    self.notify(key);
  }

  pub fn mark_error(&mut self, key: &ResourceKey, error: SyncError) {
    self
      .entries
      .entry(key.clone())
      .or_insert_with(CacheEntry::new)
      .set_error(error);
    self.notify(key);
  }

  pub fn mark_loading(&mut self, key: &ResourceKey) {
    self
      .entries
      .entry(key.clone())
      .or_insert_with(CacheEntry::new)
      .set_status(FetchStatus::Loading);
    self.notify(key);
  }

  /// Demote the entry to stale so the poller refetches it. No-op for unknown keys.
  pub fn invalidate(&mut self, key: &ResourceKey) {
    if let Some(entry) = self.entries.get_mut(key) {
      trace!(key = %key, "invalidate");
      entry.set_status(FetchStatus::Stale);
      self.notify(key);
    }
  }

  /// Drop the entry. Listeners observe None: the resource no longer exists.
  pub fn remove(&mut self, key: &ResourceKey) -> Option<CacheEntry> {
    let removed = self.entries.remove(key);
    if removed.is_some() {
      self.notify(key);
    }
    removed
  }

  /// Confirm the cached value without replacing it
  pub(crate) fn touch(&mut self, key: &ResourceKey) {
    if let Some(entry) = self.entries.get_mut(key) {
      entry.touch();
      self.notify(key);
    }
  }

  /// Put a status back without touching value or error
  pub(crate) fn restore_status(&mut self, key: &ResourceKey, status: FetchStatus) {
    if let Some(entry) = self.entries.get_mut(key) {
      entry.set_status(status);
      self.notify(key);
    }
  }

  /// Edit the value in place. Returns false (and does not notify) if there is no value
  /// or `edit` reports no change.
  pub(crate) fn modify<F>(&mut self, key: &ResourceKey, edit: F) -> bool
  where
    F: FnOnce(&mut Resource) -> bool,
  {
    let changed = self
      .entries
      .get_mut(key)
      .and_then(|entry| entry.value_mut())
      .map(edit)
      .unwrap_or(false);
    if changed {
      self.notify(key);
    }
    changed
  }

  pub fn subscribe_on_change<F>(&mut self, key: &ResourceKey, callback: F) -> ListenerId
  where
    F: FnMut(&ResourceKey, Option<&CacheEntry>) + 'static,
  {
    let id = ListenerId(self.next_listener);
    self.next_listener += 1;
    self
      .listeners
      .entry(key.clone())
      .or_default()
      .push((id, Box::new(callback)));
    id
  }

  pub fn remove_listener(&mut self, key: &ResourceKey, id: ListenerId) {
    if let Some(list) = self.listeners.get_mut(key) {
      list.retain(|(lid, _)| *lid != id);
      if list.is_empty() {
        self.listeners.remove(key);
      }
    }
  }

  /// Run several writes as one unit. Listeners are called once per touched key,
  /// after all writes, so no intermediate state is observable.
  pub fn batch<R>(&mut self, writes: impl FnOnce(&mut Self) -> R) -> R {
    if self.batch.is_some() {
      return writes(self);
    }

    self.batch = Some(Vec::new());
    let result = writes(self);
    let touched = self.batch.take().unwrap_or_default();
    for key in &touched {
      self.deliver(key);
    }
    result
  }

  pub fn generation(&self, key: &ResourceKey) -> u64 {
    self.generations.get(key).copied().unwrap_or(0)
  }

  pub(crate) fn bump_generation(&mut self, key: &ResourceKey) {
    *self.generations.entry(key.clone()).or_insert(0) += 1;
  }

  pub(crate) fn begin_mutation(&mut self, key: &ResourceKey) {
    *self.pending.entry(key.clone()).or_insert(0) += 1;
  }

  pub(crate) fn end_mutation(&mut self, key: &ResourceKey) {
    if let Some(count) = self.pending.get_mut(key) {
      *count = count.saturating_sub(1);
      if *count == 0 {
        self.pending.remove(key);
      }
    }
  }

  /// Whether a prepared mutation may still rewrite this key
  pub fn is_mutating(&self, key: &ResourceKey) -> bool {
    self.pending.contains_key(key)
  }

  fn notify(&mut self, key: &ResourceKey) {
    match &mut self.batch {
      Some(touched) => {
        if !touched.contains(key) {
          touched.push(key.clone());
        }
      }
      None => self.deliver(key),
    }
  }

  fn deliver(&mut self, key: &ResourceKey) {
    if let Some(listeners) = self.listeners.get_mut(key) {
      let entry = self.entries.get(key);
      for (_, listener) in listeners.iter_mut() {
        listener(key, entry);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::Health;
  use std::cell::RefCell;
  use std::rc::Rc;

  fn health(version: &str) -> Resource {
    Resource::Health(Health {
      status: "ok".into(),
      service: "painminer-api".into(),
      version: version.into(),
    })
  }

  type Seen = Rc<RefCell<Vec<(String, Option<FetchStatus>)>>>;

  fn recorder(cache: &mut ResourceCache, key: &ResourceKey) -> (Seen, ListenerId) {
    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let id = cache.subscribe_on_change(key, move |k, entry| {
      sink
        .borrow_mut()
        .push((k.to_string(), entry.map(|e| e.status())));
    });
    (seen, id)
  }

  #[test]
  fn test_put_and_get() {
    let mut cache = ResourceCache::new();
    let key = ResourceKey::health();
    assert!(cache.get(&key).is_none());

    cache.put(&key, health("0.1.0"), FetchStatus::Fresh);
    let entry = cache.get(&key).unwrap();
    assert_eq!(entry.status(), FetchStatus::Fresh);
    assert_eq!(entry.value().and_then(|v| v.as_health()).unwrap().version, "0.1.0");
  }

  #[test]
  fn test_writes_notify_exact_key_only() {
    let mut cache = ResourceCache::new();
    let health_key = ResourceKey::health();
    let stats_key = ResourceKey::cache_stats();
    let (seen, _) = recorder(&mut cache, &health_key);

    cache.put(&health_key, health("1"), FetchStatus::Fresh);
    cache.mark_error(&stats_key, SyncError::transport("down"));
    cache.invalidate(&health_key);
    cache.mark_error(&health_key, SyncError::transport("down"));

    let seen = seen.borrow();
    assert_eq!(
      *seen,
      vec![
        ("health".to_string(), Some(FetchStatus::Fresh)),
        ("health".to_string(), Some(FetchStatus::Stale)),
        ("health".to_string(), Some(FetchStatus::Error)),
      ]
    );
  }

  #[test]
  fn test_invalidate_unknown_key_is_noop() {
    let mut cache = ResourceCache::new();
    let key = ResourceKey::cache_stats();
    let (seen, _) = recorder(&mut cache, &key);
    cache.invalidate(&key);
    assert!(cache.get(&key).is_none());
    assert!(seen.borrow().is_empty());
  }

  #[test]
  fn test_remove_notifies_absence() {
    let mut cache = ResourceCache::new();
    let key = ResourceKey::health();
    cache.put(&key, health("1"), FetchStatus::Fresh);
    let (seen, _) = recorder(&mut cache, &key);

    assert!(cache.remove(&key).is_some());
    assert!(cache.remove(&key).is_none());
    assert_eq!(*seen.borrow(), vec![("health".to_string(), None)]);
  }

  #[test]
  fn test_removed_listener_is_not_called() {
    let mut cache = ResourceCache::new();
    let key = ResourceKey::health();
    let (seen, id) = recorder(&mut cache, &key);
    cache.remove_listener(&key, id);
    cache.put(&key, health("1"), FetchStatus::Fresh);
    assert!(seen.borrow().is_empty());
  }

  #[test]
  fn test_batch_defers_and_coalesces_notifications() {
    let mut cache = ResourceCache::new();
    let a = ResourceKey::health();
    let b = ResourceKey::cache_stats();
    let (seen_a, _) = recorder(&mut cache, &a);
    let (seen_b, _) = recorder(&mut cache, &b);

    cache.batch(|c| {
      c.put(&a, health("1"), FetchStatus::Fresh);
      c.mark_error(&b, SyncError::transport("x"));
      c.put(&a, health("2"), FetchStatus::Fresh);
      // Nothing delivered while the batch is open
      assert!(seen_a.borrow().is_empty());
    });

    assert_eq!(seen_a.borrow().len(), 1);
    assert_eq!(seen_b.borrow().len(), 1);
    let version = cache
      .get(&a)
      .and_then(|e| e.value())
      .and_then(|v| v.as_health())
      .map(|h| h.version.clone());
    assert_eq!(version.as_deref(), Some("2"));
  }

  #[test]
  fn test_pending_mutation_marks() {
    let mut cache = ResourceCache::new();
    let key = ResourceKey::job_list();
    assert!(!cache.is_mutating(&key));
    cache.begin_mutation(&key);
    cache.begin_mutation(&key);
    cache.end_mutation(&key);
    assert!(cache.is_mutating(&key));
    cache.end_mutation(&key);
    assert!(!cache.is_mutating(&key));
  }

  #[test]
  fn test_generation_survives_removal() {
    let mut cache = ResourceCache::new();
    let key = ResourceKey::job("a");
    cache.bump_generation(&key);
    cache.remove(&key);
    assert_eq!(cache.generation(&key), 1);
  }
}
