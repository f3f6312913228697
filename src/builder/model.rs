//! Job-start payload, in the shape the backend's analyze endpoint accepts.

use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "painminer/0.1 (personal research)";

pub const DEFAULT_INCLUDE_PHRASES: &[&str] = &[
  "I struggle",
  "I keep forgetting",
  "I wish",
  "How do you",
  "Is there an app",
  "Anyone else",
];

pub const DEFAULT_EXCLUDE_PHRASES: &[&str] = &["politics", "rant"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfiguration {
  pub subreddits: Vec<SubredditConfig>,
  pub reddit: RedditCredentials,
  pub filters: FiltersConfig,
  pub clustering: ClusteringConfig,
  pub network: NetworkConfig,
  pub use_cache: bool,
}

impl Default for AnalysisConfiguration {
  fn default() -> Self {
    Self {
      subreddits: Vec::new(),
      reddit: RedditCredentials::default(),
      filters: FiltersConfig::default(),
      clustering: ClusteringConfig::default(),
      network: NetworkConfig::default(),
      use_cache: true,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubredditConfig {
  pub name: String,
  /// Lookback window in days
  #[serde(default = "default_period_days")]
  pub period_days: u32,
  #[serde(default = "default_min_upvotes")]
  pub min_upvotes: u32,
  #[serde(default = "default_max_posts")]
  pub max_posts: u32,
  #[serde(default = "default_max_comments")]
  pub max_comments_per_post: u32,
}

impl SubredditConfig {
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      period_days: default_period_days(),
      min_upvotes: default_min_upvotes(),
      max_posts: default_max_posts(),
      max_comments_per_post: default_max_comments(),
    }
  }
}

/// Reddit API credentials. Passed through to the backend untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditCredentials {
  pub client_id: String,
  pub client_secret: String,
  pub username: String,
  pub password: String,
  pub user_agent: String,
}

impl Default for RedditCredentials {
  fn default() -> Self {
    Self {
      client_id: String::new(),
      client_secret: String::new(),
      username: String::new(),
      password: String::new(),
      user_agent: default_user_agent(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
  pub include_phrases: Vec<String>,
  pub exclude_phrases: Vec<String>,
  pub min_pain_length: u32,
}

impl Default for FiltersConfig {
  fn default() -> Self {
    Self {
      include_phrases: DEFAULT_INCLUDE_PHRASES.iter().map(|s| s.to_string()).collect(),
      exclude_phrases: DEFAULT_EXCLUDE_PHRASES.iter().map(|s| s.to_string()).collect(),
      min_pain_length: 12,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringMethod {
  #[default]
  TfidfKmeans,
  SimpleHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
  pub method: ClusteringMethod,
  pub k_min: u32,
  pub k_max: u32,
  /// Seed for reproducible clustering
  pub random_state: u64,
}

impl Default for ClusteringConfig {
  fn default() -> Self {
    Self {
      method: ClusteringMethod::TfidfKmeans,
      k_min: 5,
      k_max: 20,
      random_state: 42,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
  pub timeout_sec: u32,
  pub proxy: ProxyConfig,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      timeout_sec: 20,
      proxy: ProxyConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
  #[default]
  Single,
  Pool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
  pub enabled: bool,
  pub mode: ProxyMode,
  pub single_http: String,
  pub single_https: String,
  pub pool: Vec<String>,
  /// Rotate to the next pool proxy after this many requests
  pub rotate_every_requests: u32,
}

impl Default for ProxyConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      mode: ProxyMode::Single,
      single_http: String::new(),
      single_https: String::new(),
      pool: Vec::new(),
      rotate_every_requests: 25,
    }
  }
}

fn default_period_days() -> u32 {
  30
}

fn default_min_upvotes() -> u32 {
  10
}

fn default_max_posts() -> u32 {
  100
}

fn default_max_comments() -> u32 {
  30
}

fn default_user_agent() -> String {
  DEFAULT_USER_AGENT.to_string()
}
