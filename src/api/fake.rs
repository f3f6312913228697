//! In-memory backend for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use super::types::{
  CacheStats, ClearedCache, Health, Job, JobStatus, PhrasePresets, SubredditPreset,
};
use super::Backend;
use crate::builder::AnalysisConfiguration;
use crate::error::{SyncError, SyncResult};

#[derive(Default)]
struct State {
  jobs: Vec<Job>,
  cache_files: u64,
  next_job: u64,
  failures: HashMap<&'static str, SyncError>,
  calls: Vec<&'static str>,
  submitted: Vec<AnalysisConfiguration>,
}

/// Backend double with scripted jobs, failures and gates that hold calls.
#[derive(Default)]
pub struct FakeBackend {
  state: Mutex<State>,
  gates: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
}

impl FakeBackend {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn job(id: &str, status: JobStatus, progress: u8) -> Job {
    Job {
      id: id.to_string(),
      status,
      progress,
      message: format!("{} at {}%", status.label(), progress),
      error: None,
      created_at: Utc::now(),
      completed_at: status.is_terminal().then(Utc::now),
      result: None,
    }
  }

  /// Insert or replace a job
  pub fn set_job(&self, job: Job) {
    let mut state = self.state.lock().unwrap();
    match state.jobs.iter_mut().find(|j| j.id == job.id) {
      Some(existing) => *existing = job,
      None => state.jobs.push(job),
    }
  }

  pub fn set_cache_files(&self, count: u64) {
    self.state.lock().unwrap().cache_files = count;
  }

  /// Make every call to `op` fail until cleared
  pub fn fail(&self, op: &'static str, error: SyncError) {
    self.state.lock().unwrap().failures.insert(op, error);
  }

  pub fn recover(&self, op: &'static str) {
    self.state.lock().unwrap().failures.remove(op);
  }

  pub fn calls(&self, op: &str) -> usize {
    self.state.lock().unwrap().calls.iter().filter(|c| **c == op).count()
  }

  pub fn total_calls(&self) -> usize {
    self.state.lock().unwrap().calls.len()
  }

  pub fn submitted(&self) -> Vec<AnalysisConfiguration> {
    self.state.lock().unwrap().submitted.clone()
  }

  /// Hold calls to `op` until `release` is called
  pub fn hold(&self, op: &'static str) {
    self
      .gates
      .lock()
      .unwrap()
      .insert(op, Arc::new(Semaphore::new(0)));
  }

  /// Hold `get_job` and `list_jobs` responses
  pub fn hold_reads(&self) {
    self.hold("get_job");
    self.hold("list_jobs");
  }

  pub fn release(&self) {
    for (_, gate) in self.gates.lock().unwrap().drain() {
      gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
  }

  async fn wait_gate(&self, op: &str) {
    let gate = self.gates.lock().unwrap().get(op).cloned();
    if let Some(gate) = gate {
      if let Ok(permit) = gate.acquire().await {
        permit.forget();
      }
    }
  }

  fn record(&self, op: &'static str) -> SyncResult<()> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(op);
    match state.failures.get(op) {
      Some(error) => Err(error.clone()),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl Backend for FakeBackend {
  async fn health(&self) -> SyncResult<Health> {
    self.wait_gate("health").await;
    self.record("health")?;
    Ok(Health {
      status: "ok".into(),
      service: "painminer-api".into(),
      version: "0.1.0".into(),
    })
  }

  async fn start_job(&self, config: &AnalysisConfiguration) -> SyncResult<Job> {
    self.wait_gate("start_job").await;
    self.record("start_job")?;
    let mut state = self.state.lock().unwrap();
    state.next_job += 1;
    let job = Self::job(&format!("job-{}", state.next_job), JobStatus::Pending, 0);
    state.jobs.push(job.clone());
    state.submitted.push(config.clone());
    Ok(job)
  }

  async fn get_job(&self, job_id: &str) -> SyncResult<Job> {
    // Answer is computed before the gate, so a held response can be out of date
    let answer = self.record("get_job").and_then(|_| {
      let state = self.state.lock().unwrap();
      state
        .jobs
        .iter()
        .find(|j| j.id == job_id)
        .cloned()
        .ok_or_else(|| SyncError::not_found("Job not found"))
    });
    self.wait_gate("get_job").await;
    answer
  }

  async fn list_jobs(&self) -> SyncResult<Vec<Job>> {
    let answer = self
      .record("list_jobs")
      .map(|_| self.state.lock().unwrap().jobs.clone());
    self.wait_gate("list_jobs").await;
    answer
  }

  async fn delete_job(&self, job_id: &str) -> SyncResult<()> {
    self.wait_gate("delete_job").await;
    self.record("delete_job")?;
    self.state.lock().unwrap().jobs.retain(|j| j.id != job_id);
    Ok(())
  }

  async fn cache_stats(&self) -> SyncResult<CacheStats> {
    self.wait_gate("cache_stats").await;
    self.record("cache_stats")?;
    let files = self.state.lock().unwrap().cache_files;
    Ok(CacheStats {
      directory: "cache".into(),
      file_count: files,
      total_size_bytes: files * 2048,
      total_size_mb: 0.0,
    })
  }

  async fn clear_cache(&self) -> SyncResult<ClearedCache> {
    self.wait_gate("clear_cache").await;
    self.record("clear_cache")?;
    let mut state = self.state.lock().unwrap();
    let files_deleted = state.cache_files;
    state.cache_files = 0;
    Ok(ClearedCache { files_deleted })
  }

  async fn subreddit_presets(&self) -> SyncResult<Vec<SubredditPreset>> {
    self.wait_gate("subreddit_presets").await;
    self.record("subreddit_presets")?;
    Ok(vec![SubredditPreset {
      name: "ADHD".into(),
      description: "ADHD community - productivity and focus issues".into(),
    }])
  }

  async fn phrase_presets(&self) -> SyncResult<PhrasePresets> {
    self.wait_gate("phrase_presets").await;
    self.record("phrase_presets")?;
    Ok(PhrasePresets {
      include: vec!["I struggle".into()],
      exclude: vec!["rant".into()],
    })
  }
}
