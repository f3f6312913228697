//! State-changing requests and the cache reconciliation that follows them.
//!
//! A mutation runs in three steps so the remote call never holds the cache:
//!
//! 1. `prepare`: normalize and validate locally, then mark the affected keys
//!    as mutating.
//!    Fetch results that land on a mutating key are discarded.
//! 2. `PendingMutation::run`: the remote call, under the caller's timeout.
//! 3. `apply`: release the marks; on success commit the minimal cache update
//!    as one batch, on failure leave the cache exactly as it was.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{info, warn};

use super::cache::ResourceCache;
use super::entry::{FetchStatus, Resource};
use super::key::ResourceKey;
use crate::api::{Backend, ClearedCache, Job};
use crate::builder::{self, AnalysisConfiguration, RedditCredentials};
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone)]
pub enum Mutation {
  StartJob(AnalysisConfiguration),
  DeleteJob(String),
  ClearBackendCache,
}

impl Mutation {
  pub fn label(&self) -> &'static str {
    match self {
      Mutation::StartJob(_) => "start job",
      Mutation::DeleteJob(_) => "delete job",
      Mutation::ClearBackendCache => "clear backend cache",
    }
  }

  /// Keys whose cached state the mutation will rewrite
  fn affected_keys(&self) -> Vec<ResourceKey> {
    match self {
      Mutation::StartJob(_) => vec![ResourceKey::job_list()],
      Mutation::DeleteJob(job_id) => vec![ResourceKey::job(job_id.as_str()), ResourceKey::job_list()],
      Mutation::ClearBackendCache => vec![ResourceKey::cache_stats()],
    }
  }
}

/// Confirmed result of a mutation
#[derive(Debug, Clone, PartialEq)]
pub enum MutationResponse {
  Started(Job),
  Deleted(String),
  Cleared(ClearedCache),
}

impl MutationResponse {
  /// Keys whose cache entries were rewritten by the commit
  pub fn touched_keys(&self) -> Vec<ResourceKey> {
    match self {
      MutationResponse::Started(job) => vec![ResourceKey::job(job.id.as_str()), ResourceKey::job_list()],
      MutationResponse::Deleted(job_id) => {
        vec![ResourceKey::job(job_id.as_str()), ResourceKey::job_list()]
      }
      MutationResponse::Cleared(_) => vec![ResourceKey::cache_stats()],
    }
  }
}

/// A prepared mutation whose remote call has not run yet.
///
/// Owns everything the request needs, so it can be moved into a spawned task.
pub struct PendingMutation {
  label: &'static str,
  affected: Vec<ResourceKey>,
  credentials: Option<RedditCredentials>,
  request: BoxFuture<'static, SyncResult<MutationResponse>>,
  timeout: Duration,
}

impl PendingMutation {
  pub fn label(&self) -> &'static str {
    self.label
  }

  pub async fn run(self) -> MutationOutcome {
    let result = match tokio::time::timeout(self.timeout, self.request).await {
      Ok(result) => result,
      Err(_) => Err(SyncError::transport(format!(
        "{} timed out after {}s",
        self.label,
        self.timeout.as_secs()
      ))),
    };

    MutationOutcome {
      label: self.label,
      affected: self.affected,
      credentials: self.credentials,
      result,
    }
  }
}

/// Result of the remote call, to be handed back to `apply`
#[derive(Debug)]
pub struct MutationOutcome {
  label: &'static str,
  affected: Vec<ResourceKey>,
  /// Credentials of the start request this outcome answers
  credentials: Option<RedditCredentials>,
  result: SyncResult<MutationResponse>,
}

impl MutationOutcome {
  pub fn label(&self) -> &'static str {
    self.label
  }

  pub fn submitted_credentials(&self) -> Option<&RedditCredentials> {
    self.credentials.as_ref()
  }
}

pub struct MutationExecutor {
  backend: Arc<dyn Backend>,
  timeout: Duration,
}

impl MutationExecutor {
  pub fn new(backend: Arc<dyn Backend>, timeout: Duration) -> Self {
    Self { backend, timeout }
  }

  /// Normalize, validate and mark affected keys. A validation error never
  /// reaches the network and leaves no marks behind.
  pub fn prepare(
    &self,
    cache: &mut ResourceCache,
    mutation: Mutation,
  ) -> SyncResult<PendingMutation> {
    let mutation = match mutation {
      Mutation::StartJob(config) => {
        let request = builder::build_request(&config);
        builder::validate(&request)?;
        Mutation::StartJob(request)
      }
      other => other,
    };

    let label = mutation.label();
    let affected = mutation.affected_keys();
    let credentials = match &mutation {
      Mutation::StartJob(request) => Some(request.reddit.clone()),
      _ => None,
    };
    let backend = Arc::clone(&self.backend);

    let request: BoxFuture<'static, SyncResult<MutationResponse>> = match mutation {
      Mutation::StartJob(config) => Box::pin(async move {
        backend.start_job(&config).await.map(MutationResponse::Started)
      }),
      Mutation::DeleteJob(job_id) => Box::pin(async move {
        backend.delete_job(&job_id).await?;
        Ok(MutationResponse::Deleted(job_id))
      }),
      Mutation::ClearBackendCache => {
        Box::pin(async move { backend.clear_cache().await.map(MutationResponse::Cleared) })
      }
    };

    for key in &affected {
      cache.begin_mutation(key);
    }

    Ok(PendingMutation {
      label,
      affected,
      credentials,
      request,
      timeout: self.timeout,
    })
  }

  /// Commit or abort. Subscribers see either the prior state or the fully
  /// reconciled state, never a mix.
  pub fn apply(
    &self,
    cache: &mut ResourceCache,
    outcome: MutationOutcome,
  ) -> SyncResult<MutationResponse> {
    for key in &outcome.affected {
      cache.end_mutation(key);
    }

    match outcome.result {
      Ok(response) => {
        info!(mutation = outcome.label, "mutation confirmed");
        cache.batch(|c| reconcile(c, &response));
        Ok(response)
      }
      Err(e) => {
        warn!(mutation = outcome.label, error = %e, "mutation failed");
        Err(e)
      }
    }
  }
}

fn reconcile(cache: &mut ResourceCache, response: &MutationResponse) {
  for key in response.touched_keys() {
    cache.bump_generation(&key);
  }

  let list_key = ResourceKey::job_list();
  match response {
    MutationResponse::Started(job) => {
      cache.put(
        &ResourceKey::job(job.id.as_str()),
        Resource::Job(job.clone()),
        FetchStatus::Fresh,
      );
      cache.modify(&list_key, |resource| match resource {
        Resource::JobList(jobs) if !jobs.iter().any(|j| j.id == job.id) => {
          jobs.insert(0, job.clone());
          true
        }
        _ => false,
      });
    }
    MutationResponse::Deleted(job_id) => {
      cache.remove(&ResourceKey::job(job_id.as_str()));
      cache.modify(&list_key, |resource| match resource {
        Resource::JobList(jobs) => {
          let before = jobs.len();
          jobs.retain(|j| &j.id != job_id);
          jobs.len() != before
        }
        _ => false,
      });
    }
    MutationResponse::Cleared(_) => {
      cache.invalidate(&ResourceKey::cache_stats());
    }
  }
}
