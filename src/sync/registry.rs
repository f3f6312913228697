//! Reference counting of observers per resource key.

use std::collections::HashMap;

use super::key::ResourceKey;

/// Change in whether anybody needs a key's data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
  /// First subscriber arrived (refcount 0 → 1)
  Wanted,
  /// Last subscriber left (refcount 1 → 0)
  Unwanted,
}

/// Proof of one live subscription. Consumed by `unsubscribe`.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
  id: u64,
  key: ResourceKey,
}

impl SubscriptionHandle {
  pub fn id(&self) -> u64 {
    self.id
  }

  pub fn key(&self) -> &ResourceKey {
    &self.key
  }
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
  refcounts: HashMap<ResourceKey, usize>,
  next_id: u64,
}

impl SubscriptionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn subscribe(&mut self, key: ResourceKey) -> (SubscriptionHandle, Option<Interest>) {
    let count = self.refcounts.entry(key.clone()).or_insert(0);
    *count += 1;
    let interest = (*count == 1).then_some(Interest::Wanted);

    let handle = SubscriptionHandle {
      id: self.next_id,
      key,
    };
    self.next_id += 1;
    (handle, interest)
  }

  pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Option<Interest> {
    let count = self.refcounts.get_mut(&handle.key)?;
    *count -= 1;
    if *count == 0 {
      self.refcounts.remove(&handle.key);
      Some(Interest::Unwanted)
    } else {
      None
    }
  }

  pub fn refcount(&self, key: &ResourceKey) -> usize {
    self.refcounts.get(key).copied().unwrap_or(0)
  }

  pub fn is_wanted(&self, key: &ResourceKey) -> bool {
    self.refcount(key) > 0
  }

  pub fn wanted_keys(&self) -> impl Iterator<Item = &ResourceKey> {
    self.refcounts.keys()
  }
}
