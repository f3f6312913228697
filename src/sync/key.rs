use std::fmt;

/// Kind of server-backed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
  Job,
  JobList,
  CacheStats,
  Health,
  SubredditPresets,
  PhrasePresets,
}

impl ResourceKind {
  pub fn name(self) -> &'static str {
    match self {
      ResourceKind::Job => "job",
      ResourceKind::JobList => "job-list",
      ResourceKind::CacheStats => "cache-stats",
      ResourceKind::Health => "health",
      ResourceKind::SubredditPresets => "subreddit-presets",
      ResourceKind::PhrasePresets => "phrase-presets",
    }
  }
}

/// Identifies one cache slot. Two keys address the same slot when kind and id match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
  kind: ResourceKind,
  id: Option<String>,
}

impl ResourceKey {
  pub fn job(job_id: impl Into<String>) -> Self {
    Self {
      kind: ResourceKind::Job,
      id: Some(job_id.into()),
    }
  }

  pub fn job_list() -> Self {
    Self::singleton(ResourceKind::JobList)
  }

  pub fn cache_stats() -> Self {
    Self::singleton(ResourceKind::CacheStats)
  }

  pub fn health() -> Self {
    Self::singleton(ResourceKind::Health)
  }

  pub fn subreddit_presets() -> Self {
    Self::singleton(ResourceKind::SubredditPresets)
  }

  pub fn phrase_presets() -> Self {
    Self::singleton(ResourceKind::PhrasePresets)
  }

  fn singleton(kind: ResourceKind) -> Self {
    Self { kind, id: None }
  }

  pub fn kind(&self) -> ResourceKind {
    self.kind
  }

  pub fn id(&self) -> Option<&str> {
    self.id.as_deref()
  }

  /// The job id, if this key addresses a single job
  pub fn job_id(&self) -> Option<&str> {
    match self.kind {
      ResourceKind::Job => self.id(),
      _ => None,
    }
  }
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.id {
      Some(id) => write!(f, "{}:{}", self.kind.name(), id),
      None => f.write_str(self.kind.name()),
    }
  }
}
