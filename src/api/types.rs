use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Lifecycle status of an analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
  Pending,
  Running,
  Completed,
  Failed,
}

impl JobStatus {
  /// Completed or failed; no further change is expected
  pub fn is_terminal(self) -> bool {
    matches!(self, JobStatus::Completed | JobStatus::Failed)
  }

  pub fn is_active(self) -> bool {
    !self.is_terminal()
  }

  pub fn label(self) -> &'static str {
    match self {
      JobStatus::Pending => "pending",
      JobStatus::Running => "running",
      JobStatus::Completed => "completed",
      JobStatus::Failed => "failed",
    }
  }
}

/// An analysis job as reported by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
  pub id: String,
  pub status: JobStatus,
  pub progress: u8,
  pub message: String,
  pub error: Option<String>,
  pub created_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  /// Produced by the backend; opaque to the sync layer
  pub result: Option<serde_json::Value>,
}

impl Job {
  /// Decode the opaque result payload for display.
  ///
  /// Returns None if the job has no result or the payload has an unexpected shape.
  pub fn analysis_result(&self) -> Option<AnalysisResult> {
    let value = self.result.as_ref()?;
    serde_json::from_value(value.clone()).ok()
  }
}

/// Backend cache statistics
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheStats {
  #[serde(default)]
  pub directory: String,
  pub file_count: u64,
  pub total_size_bytes: u64,
  #[serde(default)]
  pub total_size_mb: f64,
}

/// Outcome of clearing the backend cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ClearedCache {
  pub files_deleted: u64,
}

/// Service identity returned by the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
  pub status: String,
  pub service: String,
  pub version: String,
}

impl Health {
  pub fn is_ok(&self) -> bool {
    self.status == "ok"
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubredditPreset {
  pub name: String,
  pub description: String,
}

/// Suggested include/exclude phrases
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PhrasePresets {
  #[serde(default)]
  pub include: Vec<String>,
  #[serde(default)]
  pub exclude: Vec<String>,
}

// ============================================================================
// Typed view of a completed job's result payload
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisResult {
  pub total_posts: u64,
  pub total_comments: u64,
  pub total_pain_items: u64,
  pub total_clusters: u64,
  pub total_ideas: u64,
  #[serde(default)]
  pub clusters: Vec<Cluster>,
  #[serde(default)]
  pub ideas: Vec<AppIdea>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Cluster {
  pub cluster_id: String,
  pub label: String,
  pub count: u64,
  pub avg_score: f64,
  pub total_score: i64,
  #[serde(default)]
  pub example_texts: Vec<String>,
  #[serde(default)]
  pub items: Vec<PainItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PainItem {
  pub id: String,
  pub subreddit: String,
  pub source_type: String,
  pub post_id: String,
  pub score: i64,
  pub text: String,
  pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppIdea {
  pub idea_name: String,
  pub problem_statement: String,
  pub target_user: String,
  #[serde(default)]
  pub core_functions: Vec<String>,
  #[serde(default)]
  pub screens: Vec<String>,
  #[serde(default)]
  pub local_data: Vec<String>,
  #[serde(default)]
  pub minimal_notifications: Vec<String>,
  pub mvp_complexity: String,
  #[serde(default)]
  pub reddit_evidence: serde_json::Value,
}
