//! Cache entries and the values they hold.

use chrono::{DateTime, Utc};

use crate::api::{CacheStats, Health, Job, PhrasePresets, SubredditPreset};
use crate::error::SyncError;

/// Fetch status of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
  /// Never fetched
  Idle,
  /// A fetch is outstanding (a previous value may still be present)
  Loading,
  /// Value confirmed by the last fetch or mutation
  Fresh,
  /// Value kept but must be refetched before it is trusted
  Stale,
  /// Last fetch failed; the previous value, if any, is retained
  Error,
}

/// Any value the cache can hold
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
  Job(Job),
  JobList(Vec<Job>),
  CacheStats(CacheStats),
  Health(Health),
  SubredditPresets(Vec<SubredditPreset>),
  PhrasePresets(PhrasePresets),
}

impl Resource {
  pub fn as_job(&self) -> Option<&Job> {
    match self {
      Resource::Job(job) => Some(job),
      _ => None,
    }
  }

  pub fn as_job_list(&self) -> Option<&[Job]> {
    match self {
      Resource::JobList(jobs) => Some(jobs),
      _ => None,
    }
  }

  pub fn as_cache_stats(&self) -> Option<&CacheStats> {
    match self {
      Resource::CacheStats(stats) => Some(stats),
      _ => None,
    }
  }

  pub fn as_health(&self) -> Option<&Health> {
    match self {
      Resource::Health(health) => Some(health),
      _ => None,
    }
  }

  pub fn as_subreddit_presets(&self) -> Option<&[SubredditPreset]> {
    match self {
      Resource::SubredditPresets(presets) => Some(presets),
      _ => None,
    }
  }

  pub fn as_phrase_presets(&self) -> Option<&PhrasePresets> {
    match self {
      Resource::PhrasePresets(presets) => Some(presets),
      _ => None,
    }
  }
}

/// Last known state of one resource
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  value: Option<Resource>,
  status: FetchStatus,
  fetched_at: Option<DateTime<Utc>>,
  error: Option<SyncError>,
}

impl CacheEntry {
  pub(crate) fn new() -> Self {
    Self {
      value: None,
      status: FetchStatus::Idle,
      fetched_at: None,
      error: None,
    }
  }

  pub fn value(&self) -> Option<&Resource> {
    self.value.as_ref()
  }

  pub fn status(&self) -> FetchStatus {
    self.status
  }

  /// When the value was last confirmed by the backend
  pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
    self.fetched_at
  }

  pub fn error(&self) -> Option<&SyncError> {
    self.error.as_ref()
  }

  pub fn is_loading(&self) -> bool {
    self.status == FetchStatus::Loading
  }

  pub fn is_error(&self) -> bool {
    self.status == FetchStatus::Error
  }

  pub(crate) fn set_value(&mut self, value: Resource, status: FetchStatus) {
    self.value = Some(value);
    self.status = status;
    self.error = None;
    if status == FetchStatus::Fresh {
      self.fetched_at = Some(Utc::now());
    }
  }

  /// Keep the value, mark it confirmed again
  pub(crate) fn touch(&mut self) {
    self.status = FetchStatus::Fresh;
    self.error = None;
    self.fetched_at = Some(Utc::now());
  }

  pub(crate) fn set_status(&mut self, status: FetchStatus) {
    self.status = status;
  }

  pub(crate) fn set_error(&mut self, error: SyncError) {
    self.status = FetchStatus::Error;
    self.error = Some(error);
  }

  pub(crate) fn value_mut(&mut self) -> Option<&mut Resource> {
    self.value.as_mut()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_retains_value() {
    let mut entry = CacheEntry::new();
    entry.set_value(Resource::JobList(Vec::new()), FetchStatus::Fresh);
    let fetched_at = entry.fetched_at();
    assert!(fetched_at.is_some());

    entry.set_error(SyncError::transport("down"));
    assert!(entry.is_error());
    assert_eq!(entry.value(), Some(&Resource::JobList(Vec::new())));
    assert_eq!(entry.fetched_at(), fetched_at);

    entry.set_value(Resource::JobList(Vec::new()), FetchStatus::Fresh);
    assert!(entry.error().is_none());
  }

  #[test]
  fn test_accessors_match_variant() {
    let resource = Resource::PhrasePresets(PhrasePresets::default());
    assert!(resource.as_phrase_presets().is_some());
    assert!(resource.as_job().is_none());
    assert!(resource.as_job_list().is_none());
  }
}
