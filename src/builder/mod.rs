//! Assembles and validates the job-start request.
//!
//! Validation and normalization are pure functions over
//! `AnalysisConfiguration`. Credential persistence goes through the
//! `CredentialStore` trait and is never triggered by validation itself; the
//! caller saves credentials after the backend has accepted a job.

mod model;

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing::warn;

use crate::error::ValidationError;

pub use model::{
  AnalysisConfiguration, ClusteringConfig, ClusteringMethod, FiltersConfig, NetworkConfig,
  ProxyConfig, ProxyMode, RedditCredentials, SubredditConfig, DEFAULT_EXCLUDE_PHRASES,
  DEFAULT_INCLUDE_PHRASES, DEFAULT_USER_AGENT,
};

/// The credential part of a request, kept between sessions
pub type StoredCredentials = RedditCredentials;

pub const CLIENT_SECRET_ENV: &str = "PAINBOARD_REDDIT_CLIENT_SECRET";
pub const PASSWORD_ENV: &str = "PAINBOARD_REDDIT_PASSWORD";

const MAX_POSTS_ADVISORY: u32 = 500;
const PERIOD_DAYS_ADVISORY: u32 = 90;

/// Durable slot for the last credentials that were accepted by the backend
pub trait CredentialStore {
  fn load_credentials(&self) -> Result<Option<StoredCredentials>>;
  fn save_credentials(&self, credentials: &StoredCredentials) -> Result<()>;
}

// ============================================================================
// Pure checks
// ============================================================================

/// Reject a request the backend could never run.
pub fn validate(config: &AnalysisConfiguration) -> Result<(), ValidationError> {
  if !config.subreddits.iter().any(|s| !s.name.trim().is_empty()) {
    return Err(ValidationError::MissingSubreddits);
  }

  let reddit = &config.reddit;
  if reddit.client_id.trim().is_empty() || reddit.client_secret.trim().is_empty() {
    return Err(ValidationError::MissingCredentials);
  }

  let clustering = &config.clustering;
  if clustering.k_min > clustering.k_max {
    return Err(ValidationError::InvalidClusterRange {
      k_min: clustering.k_min,
      k_max: clustering.k_max,
    });
  }

  Ok(())
}

/// Normalized copy of `config`, ready to send.
///
/// Subreddit names are trimmed (a leading `r/` is dropped) and empty or
/// repeated names removed; phrase lists are trimmed and de-duplicated
/// case-insensitively, keeping the first spelling.
pub fn build_request(config: &AnalysisConfiguration) -> AnalysisConfiguration {
  let mut request = config.clone();

  let mut subreddits: Vec<SubredditConfig> = Vec::with_capacity(config.subreddits.len());
  for sub in &config.subreddits {
    let name = normalize_subreddit(&sub.name);
    if name.is_empty() || subreddits.iter().any(|s| s.name.eq_ignore_ascii_case(&name)) {
      continue;
    }
    subreddits.push(SubredditConfig {
      name,
      ..sub.clone()
    });
  }
  request.subreddits = subreddits;

  request.filters.include_phrases = dedup_phrases(&config.filters.include_phrases);
  request.filters.exclude_phrases = dedup_phrases(&config.filters.exclude_phrases);
  request.reddit.client_id = config.reddit.client_id.trim().to_string();
  request.reddit.username = config.reddit.username.trim().to_string();
  request
}

/// Settings that are valid but likely unintended
pub fn warnings(config: &AnalysisConfiguration) -> Vec<String> {
  let mut advisories = Vec::new();
  for sub in config.subreddits.iter().filter(|s| !s.name.trim().is_empty()) {
    if sub.max_posts > MAX_POSTS_ADVISORY {
      advisories.push(format!(
        "r/{}: max_posts {} is above {}, the scrape will be slow",
        sub.name.trim(),
        sub.max_posts,
        MAX_POSTS_ADVISORY
      ));
    }
    if sub.period_days > PERIOD_DAYS_ADVISORY {
      advisories.push(format!(
        "r/{}: period_days {} is above {}, Reddit may not return that much history",
        sub.name.trim(),
        sub.period_days,
        PERIOD_DAYS_ADVISORY
      ));
    }
  }
  advisories
}

fn normalize_subreddit(name: &str) -> String {
  let name = name.trim();
  let name = name
    .strip_prefix("r/")
    .or_else(|| name.strip_prefix("/r/"))
    .unwrap_or(name);
  name.trim().to_string()
}

fn dedup_phrases(phrases: &[String]) -> Vec<String> {
  let mut out: Vec<String> = Vec::with_capacity(phrases.len());
  for phrase in phrases {
    push_phrase(&mut out, phrase);
  }
  out
}

/// Returns false if the phrase is empty or already present
fn push_phrase(list: &mut Vec<String>, phrase: &str) -> bool {
  let phrase = phrase.trim();
  if phrase.is_empty() || list.iter().any(|p| p.to_lowercase() == phrase.to_lowercase()) {
    return false;
  }
  list.push(phrase.to_string());
  true
}

// ============================================================================
// Stored credentials
// ============================================================================

/// Read the last saved credentials. A store error is logged and treated as absent.
pub fn load_stored_credentials(store: &dyn CredentialStore) -> Option<StoredCredentials> {
  match store.load_credentials() {
    Ok(credentials) => credentials,
    Err(e) => {
      warn!(error = %e, "could not read stored credentials");
      None
    }
  }
}

pub fn save_stored_credentials(
  store: &dyn CredentialStore,
  credentials: &StoredCredentials,
) -> Result<()> {
  store.save_credentials(credentials)
}

// ============================================================================
// Builder
// ============================================================================

/// Editable draft of a job request. Each section can be changed independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigBuilder {
  config: AnalysisConfiguration,
}

impl ConfigBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_config(config: AnalysisConfiguration) -> Self {
    let mut builder = Self::default();
    builder.config = AnalysisConfiguration {
      subreddits: Vec::new(),
      ..config.clone()
    };
    builder.config.filters.include_phrases = dedup_phrases(&config.filters.include_phrases);
    builder.config.filters.exclude_phrases = dedup_phrases(&config.filters.exclude_phrases);
    for sub in config.subreddits {
      builder.add_subreddit(sub);
    }
    builder
  }

  /// Load a YAML job draft. Missing sections take the backend defaults.
  pub fn load_draft(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read job file {}: {}", path.display(), e))?;

    let config: AnalysisConfiguration = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse job file {}: {}", path.display(), e))?;

    Ok(Self::from_config(config))
  }

  /// Fill credential fields the draft left empty from the stored ones
  pub fn seed_credentials(&mut self, stored: &StoredCredentials) {
    let reddit = &mut self.config.reddit;
    for (field, saved) in [
      (&mut reddit.client_id, &stored.client_id),
      (&mut reddit.client_secret, &stored.client_secret),
      (&mut reddit.username, &stored.username),
      (&mut reddit.password, &stored.password),
    ] {
      if field.trim().is_empty() {
        *field = saved.clone();
      }
    }
    if reddit.user_agent == DEFAULT_USER_AGENT && !stored.user_agent.is_empty() {
      reddit.user_agent = stored.user_agent.clone();
    }
  }

  /// Secrets from `PAINBOARD_REDDIT_CLIENT_SECRET` and `PAINBOARD_REDDIT_PASSWORD`
  /// take precedence over the draft and the store.
  pub fn apply_env_overrides(&mut self) {
    self.apply_overrides(|name| std::env::var(name).ok());
  }

  fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(secret) = lookup(CLIENT_SECRET_ENV).filter(|s| !s.is_empty()) {
      self.config.reddit.client_secret = secret;
    }
    if let Some(password) = lookup(PASSWORD_ENV).filter(|s| !s.is_empty()) {
      self.config.reddit.password = password;
    }
  }

  // ==========================================================================
  // Subreddits
  // ==========================================================================

  /// Returns false if the name is empty or already in the list
  pub fn add_subreddit(&mut self, sub: SubredditConfig) -> bool {
    let name = normalize_subreddit(&sub.name);
    if name.is_empty()
      || self
        .config
        .subreddits
        .iter()
        .any(|s| s.name.eq_ignore_ascii_case(&name))
    {
      return false;
    }
    self.config.subreddits.push(SubredditConfig { name, ..sub });
    true
  }

  pub fn remove_subreddit(&mut self, name: &str) -> bool {
    let name = normalize_subreddit(name);
    let before = self.config.subreddits.len();
    self
      .config
      .subreddits
      .retain(|s| !s.name.eq_ignore_ascii_case(&name));
    self.config.subreddits.len() != before
  }

  pub fn subreddit_mut(&mut self, name: &str) -> Option<&mut SubredditConfig> {
    self
      .config
      .subreddits
      .iter_mut()
      .find(|s| s.name.eq_ignore_ascii_case(name))
  }

  // ==========================================================================
  // Filters
  // ==========================================================================

  pub fn add_include_phrase(&mut self, phrase: &str) -> bool {
    push_phrase(&mut self.config.filters.include_phrases, phrase)
  }

  pub fn add_exclude_phrase(&mut self, phrase: &str) -> bool {
    push_phrase(&mut self.config.filters.exclude_phrases, phrase)
  }

  pub fn remove_include_phrase(&mut self, phrase: &str) -> bool {
    remove_phrase(&mut self.config.filters.include_phrases, phrase)
  }

  pub fn remove_exclude_phrase(&mut self, phrase: &str) -> bool {
    remove_phrase(&mut self.config.filters.exclude_phrases, phrase)
  }

  pub fn set_min_pain_length(&mut self, length: u32) {
    self.config.filters.min_pain_length = length;
  }

  // ==========================================================================
  // Other sections
  // ==========================================================================

  pub fn reddit_mut(&mut self) -> &mut RedditCredentials {
    &mut self.config.reddit
  }

  pub fn clustering_mut(&mut self) -> &mut ClusteringConfig {
    &mut self.config.clustering
  }

  pub fn network_mut(&mut self) -> &mut NetworkConfig {
    &mut self.config.network
  }

  pub fn set_use_cache(&mut self, use_cache: bool) {
    self.config.use_cache = use_cache;
  }

  pub fn config(&self) -> &AnalysisConfiguration {
    &self.config
  }

  pub fn credentials(&self) -> StoredCredentials {
    self.config.reddit.clone()
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    validate(&self.config)
  }

  pub fn build_request(&self) -> AnalysisConfiguration {
    build_request(&self.config)
  }

  pub fn warnings(&self) -> Vec<String> {
    warnings(&self.config)
  }
}

fn remove_phrase(list: &mut Vec<String>, phrase: &str) -> bool {
  let needle = phrase.trim().to_lowercase();
  let before = list.len();
  list.retain(|p| p.to_lowercase() != needle);
  list.len() != before
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::collections::HashMap;

  fn credentials() -> RedditCredentials {
    RedditCredentials {
      client_id: "id".into(),
      client_secret: "secret".into(),
      ..Default::default()
    }
  }

  #[derive(Default)]
  struct MemoryStore {
    saved: RefCell<Option<StoredCredentials>>,
  }

  impl CredentialStore for MemoryStore {
    fn load_credentials(&self) -> Result<Option<StoredCredentials>> {
      Ok(self.saved.borrow().clone())
    }

    fn save_credentials(&self, credentials: &StoredCredentials) -> Result<()> {
      *self.saved.borrow_mut() = Some(credentials.clone());
      Ok(())
    }
  }

  struct BrokenStore;

  impl CredentialStore for BrokenStore {
    fn load_credentials(&self) -> Result<Option<StoredCredentials>> {
      Err(eyre!("disk on fire"))
    }

    fn save_credentials(&self, _: &StoredCredentials) -> Result<()> {
      Err(eyre!("disk on fire"))
    }
  }

  #[test]
  fn test_empty_subreddits_after_trim_fail() {
    let mut config = AnalysisConfiguration {
      subreddits: vec![SubredditConfig::named("   ")],
      reddit: credentials(),
      ..Default::default()
    };
    config.clustering.k_min = 5;
    config.clustering.k_max = 20;
    assert_eq!(validate(&config), Err(ValidationError::MissingSubreddits));

    config.subreddits.push(SubredditConfig::named("ADHD"));
    assert_eq!(validate(&config), Ok(()));
  }

  #[test]
  fn test_missing_credentials() {
    let config = AnalysisConfiguration {
      subreddits: vec![SubredditConfig::named("ADHD")],
      reddit: RedditCredentials {
        client_id: "id".into(),
        client_secret: " ".into(),
        ..Default::default()
      },
      ..Default::default()
    };
    assert_eq!(validate(&config), Err(ValidationError::MissingCredentials));
  }

  #[test]
  fn test_inverted_cluster_range() {
    let mut config = AnalysisConfiguration {
      subreddits: vec![SubredditConfig::named("ADHD")],
      reddit: credentials(),
      ..Default::default()
    };
    config.clustering.k_min = 9;
    config.clustering.k_max = 3;
    assert_eq!(
      validate(&config),
      Err(ValidationError::InvalidClusterRange { k_min: 9, k_max: 3 })
    );
  }

  #[test]
  fn test_build_request_normalizes() {
    let mut config = AnalysisConfiguration {
      subreddits: vec![
        SubredditConfig::named("  ADHD "),
        SubredditConfig::named(""),
        SubredditConfig::named("r/productivity"),
        SubredditConfig::named("adhd"),
      ],
      reddit: credentials(),
      ..Default::default()
    };
    config.filters.include_phrases = vec!["I wish".into(), " i wish ".into(), "".into()];

    let request = build_request(&config);
    let names: Vec<&str> = request.subreddits.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["ADHD", "productivity"]);
    assert_eq!(request.filters.include_phrases, vec!["I wish".to_string()]);
    // Input is left alone
    assert_eq!(config.subreddits.len(), 4);
  }

  #[test]
  fn test_phrase_insertion_dedups() {
    let mut builder = ConfigBuilder::new();
    let before = builder.config().filters.include_phrases.len();
    assert!(!builder.add_include_phrase("i STRUGGLE"));
    assert!(builder.add_include_phrase("  I can't focus  "));
    assert!(!builder.add_include_phrase("i can't focus"));
    assert!(!builder.add_exclude_phrase("   "));
    assert_eq!(builder.config().filters.include_phrases.len(), before + 1);
    assert!(builder.remove_include_phrase("I CAN'T FOCUS"));
    assert_eq!(builder.config().filters.include_phrases.len(), before);
  }

  #[test]
  fn test_subreddit_editing() {
    let mut builder = ConfigBuilder::new();
    assert!(builder.add_subreddit(SubredditConfig::named("ADHD")));
    assert!(!builder.add_subreddit(SubredditConfig::named("adhd")));
    assert!(!builder.add_subreddit(SubredditConfig::named("  ")));
    builder.subreddit_mut("ADHD").unwrap().max_posts = 40;
    assert_eq!(builder.config().subreddits[0].max_posts, 40);
    assert!(builder.remove_subreddit("r/ADHD"));
    assert!(builder.config().subreddits.is_empty());
  }

  #[test]
  fn test_warnings() {
    let mut sub = SubredditConfig::named("ADHD");
    sub.max_posts = 800;
    sub.period_days = 365;
    let config = AnalysisConfiguration {
      subreddits: vec![sub, SubredditConfig::named("productivity")],
      ..Default::default()
    };
    let advisories = warnings(&config);
    assert_eq!(advisories.len(), 2);
    assert!(advisories[0].contains("max_posts 800"));
    assert!(advisories[1].contains("period_days 365"));
  }

  #[test]
  fn test_seed_and_overrides() {
    let mut builder = ConfigBuilder::new();
    builder.reddit_mut().client_id = "from-draft".into();

    let stored = RedditCredentials {
      client_id: "stored-id".into(),
      client_secret: "stored-secret".into(),
      username: "someone".into(),
      password: "hunter2".into(),
      user_agent: "custom/1.0".into(),
    };
    builder.seed_credentials(&stored);
    let env: HashMap<&str, &str> = [(CLIENT_SECRET_ENV, "env-secret"), (PASSWORD_ENV, "")].into();
    builder.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

    let reddit = &builder.config().reddit;
    assert_eq!(reddit.client_id, "from-draft");
    assert_eq!(reddit.client_secret, "env-secret");
    assert_eq!(reddit.password, "hunter2");
    assert_eq!(reddit.user_agent, "custom/1.0");
  }

  #[test]
  fn test_load_draft() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("job.yaml");
    std::fs::write(
      &path,
      "subreddits:\n  - name: ' ADHD '\n  - name: ADHD\nclustering:\n  k_min: 3\n",
    )
    .unwrap();

    let builder = ConfigBuilder::load_draft(&path).unwrap();
    assert_eq!(builder.config().subreddits.len(), 1);
    assert_eq!(builder.config().clustering.k_min, 3);
    assert_eq!(builder.config().clustering.k_max, 20);

    assert!(ConfigBuilder::load_draft(&dir.path().join("missing.yaml")).is_err());
  }

  #[test]
  fn test_credentials_round_trip() {
    let store = MemoryStore::default();
    assert_eq!(load_stored_credentials(&store), None);

    let creds = RedditCredentials {
      username: "someone".into(),
      ..credentials()
    };
    save_stored_credentials(&store, &creds).unwrap();
    assert_eq!(load_stored_credentials(&store), Some(creds));
  }

  #[test]
  fn test_broken_store_reads_as_absent() {
    assert_eq!(load_stored_credentials(&BrokenStore), None);
    assert!(save_stored_credentials(&BrokenStore, &credentials()).is_err());
  }
}
