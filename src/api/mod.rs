//! Boundary to the painminer analysis service.

pub mod api_types;
pub mod client;
#[cfg(test)]
pub mod fake;
pub mod types;

use async_trait::async_trait;

use crate::builder::AnalysisConfiguration;
use crate::error::SyncResult;

pub use client::HttpBackend;
pub use types::{
  AnalysisResult, CacheStats, ClearedCache, Health, Job, JobStatus, PhrasePresets,
  SubredditPreset,
};

/// Remote operations consumed by the sync layer.
///
/// Implementations map failures onto the `SyncError` taxonomy: connection
/// failures are `Transport`, non-2xx responses are `Backend` (or `NotFound`
/// for a missing job).
#[async_trait]
pub trait Backend: Send + Sync {
  async fn health(&self) -> SyncResult<Health>;

  /// Submit a job. Returns as soon as the backend has accepted it.
  async fn start_job(&self, config: &AnalysisConfiguration) -> SyncResult<Job>;

  async fn get_job(&self, job_id: &str) -> SyncResult<Job>;

  async fn list_jobs(&self) -> SyncResult<Vec<Job>>;

  /// Idempotent: deleting an unknown job succeeds.
  async fn delete_job(&self, job_id: &str) -> SyncResult<()>;

  async fn cache_stats(&self) -> SyncResult<CacheStats>;

  async fn clear_cache(&self) -> SyncResult<ClearedCache>;

  async fn subreddit_presets(&self) -> SyncResult<Vec<SubredditPreset>>;

  async fn phrase_presets(&self) -> SyncResult<PhrasePresets>;
}
