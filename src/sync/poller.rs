//! Per-key fetch scheduling.
//!
//! The poller owns no data. It keeps, for every key somebody wants, whether
//! a fetch is outstanding and when the next one is due, and decides cadence
//! from the resource kind and the cached value. `due` is called from the
//! store's tick; the store starts the fetches and reports completions back.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::trace;

use super::entry::{CacheEntry, FetchStatus};
use super::key::{ResourceKey, ResourceKind};
use super::lifecycle;

/// Poll intervals per cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
  /// Jobs and job lists, while any job under the key is active
  pub job: Duration,
  /// Connectivity check
  pub health: Duration,
  /// Retry delay for on-demand resources whose fetch failed
  pub error_retry: Duration,
}

impl Default for PollIntervals {
  fn default() -> Self {
    Self {
      job: Duration::from_secs(2),
      health: Duration::from_secs(30),
      error_retry: Duration::from_secs(10),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
  /// Poll at the interval while the cached value has a pending/running job
  WhileActive(Duration),
  /// Poll at the interval for as long as the key is wanted
  Fixed(Duration),
  /// Fetch when wanted and missing or stale; never re-polled while fresh
  OnDemand,
}

/// Bookkeeping for one outstanding fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
  /// Cache write generation of the key when the fetch started
  pub generation: u64,
  /// Entry status before it was marked loading
  pub prior_status: FetchStatus,
  pub started: Instant,
}

#[derive(Debug, Default)]
struct Slot {
  wanted: bool,
  in_flight: Option<FetchTicket>,
  next_due: Option<Instant>,
}

#[derive(Debug)]
pub struct Poller {
  slots: HashMap<ResourceKey, Slot>,
  intervals: PollIntervals,
}

impl Poller {
  pub fn new(intervals: PollIntervals) -> Self {
    Self {
      slots: HashMap::new(),
      intervals,
    }
  }

  pub fn cadence(&self, kind: ResourceKind) -> Cadence {
    match kind {
      ResourceKind::Job | ResourceKind::JobList => Cadence::WhileActive(self.intervals.job),
      ResourceKind::Health => Cadence::Fixed(self.intervals.health),
      ResourceKind::CacheStats | ResourceKind::SubredditPresets | ResourceKind::PhrasePresets => {
        Cadence::OnDemand
      }
    }
  }

  /// A key gained its first subscriber
  pub fn want(&mut self, key: &ResourceKey, now: Instant, entry: Option<&CacheEntry>) {
    let cadence = self.cadence(key.kind());
    let slot = self.slots.entry(key.clone()).or_default();
    slot.wanted = true;

    if slot.in_flight.is_some() {
      // The outstanding fetch reschedules when it lands
      slot.next_due = None;
      return;
    }

    let already_fresh = entry.map(|e| e.status() == FetchStatus::Fresh).unwrap_or(false);
    slot.next_due = match cadence {
      Cadence::OnDemand if already_fresh => None,
      // Terminal jobs included: one confirming fetch, then `finish` stops polling
      _ => Some(now),
    };
    trace!(key = %key, due = slot.next_due.is_some(), "wanted");
  }

  /// A key lost its last subscriber. An outstanding fetch is left to finish.
  pub fn unwant(&mut self, key: &ResourceKey) {
    if let Some(slot) = self.slots.get_mut(key) {
      slot.wanted = false;
      slot.next_due = None;
      if slot.in_flight.is_none() {
        self.slots.remove(key);
      }
    }
    trace!(key = %key, "unwanted");
  }

  /// Keys whose next fetch is due and that have nothing in flight
  pub fn due(&self, now: Instant) -> Vec<ResourceKey> {
    let mut keys: Vec<ResourceKey> = self
      .slots
      .iter()
      .filter(|(_, slot)| {
        slot.wanted && slot.in_flight.is_none() && slot.next_due.is_some_and(|due| due <= now)
      })
      .map(|(key, _)| key.clone())
      .collect();
    keys.sort();
    keys
  }

  pub fn begin(&mut self, key: &ResourceKey, ticket: FetchTicket) {
    let slot = self.slots.entry(key.clone()).or_default();
    slot.in_flight = Some(ticket);
    slot.next_due = None;
  }

  /// Record a landed fetch and schedule the next one from the updated entry.
  pub fn finish(
    &mut self,
    key: &ResourceKey,
    now: Instant,
    entry: Option<&CacheEntry>,
  ) -> Option<FetchTicket> {
    let next = self.next_after(key.kind(), now, entry);
    let slot = self.slots.get_mut(key)?;
    let ticket = slot.in_flight.take();

    if slot.wanted {
      slot.next_due = next;
    } else {
      // Nobody is watching: pause
      self.slots.remove(key);
    }
    ticket
  }

  /// Recompute the schedule after the entry changed outside a fetch
  /// (mutation commit, invalidation, folding from another key).
  pub fn reschedule(&mut self, key: &ResourceKey, now: Instant, entry: Option<&CacheEntry>) {
    let next = self.next_after(key.kind(), now, entry);
    if let Some(slot) = self.slots.get_mut(key) {
      if slot.wanted && slot.in_flight.is_none() {
        slot.next_due = next;
      }
    }
  }

  pub fn in_flight(&self, key: &ResourceKey) -> Option<&FetchTicket> {
    self.slots.get(key).and_then(|slot| slot.in_flight.as_ref())
  }

  pub fn in_flight_count(&self) -> usize {
    self.slots.values().filter(|slot| slot.in_flight.is_some()).count()
  }

  pub fn next_due(&self, key: &ResourceKey) -> Option<Instant> {
    self.slots.get(key).and_then(|slot| slot.next_due)
  }

  /// Whether another fetch for this key will be scheduled on its own
  pub fn is_polling(&self, key: &ResourceKey) -> bool {
    self.next_due(key).is_some()
  }

  fn next_after(&self, kind: ResourceKind, now: Instant, entry: Option<&CacheEntry>) -> Option<Instant> {
    // Absent: the resource does not exist (e.g. a deleted job)
    let entry = entry?;
    let cadence = self.cadence(kind);

    match entry.status() {
      FetchStatus::Idle | FetchStatus::Stale => Some(now),
      FetchStatus::Loading => None,
      FetchStatus::Error => match cadence {
        Cadence::WhileActive(every) => {
          let settled = entry.value().is_some() && !lifecycle::has_active_jobs(entry.value());
          (!settled).then_some(now + every)
        }
        Cadence::Fixed(every) => Some(now + every),
        Cadence::OnDemand => Some(now + self.intervals.error_retry),
      },
      FetchStatus::Fresh => match cadence {
        Cadence::WhileActive(every) => {
          lifecycle::has_active_jobs(entry.value()).then_some(now + every)
        }
        Cadence::Fixed(every) => Some(now + every),
        Cadence::OnDemand => None,
      },
    }
  }
}
