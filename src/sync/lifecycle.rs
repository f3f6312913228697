//! Job lifecycle state machine.
//!
//! ```text
//! pending ──► running ──► completed
//!    │           └──────► failed
//!    └──► completed | failed
//! ```
//!
//! Transitions are taken only from fetched job values. A fetched value that
//! would move a job backwards (out of a terminal status, running → pending, or
//! lower progress) is reported as a regression and never replaces the cached
//! record.

use crate::api::{Job, JobStatus};

use super::entry::Resource;

/// What a freshly fetched job value means relative to the cached one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
  /// Nothing cached yet
  First(JobStatus),
  /// Same status and progress
  Unchanged,
  /// Same status, progress moved forward (or only the message changed)
  Progressed { from: u8, to: u8 },
  /// Status moved along an allowed edge
  Transitioned { from: JobStatus, to: JobStatus },
  /// Fetched value is behind the cached one; keep the cached record
  Regressed { from: JobStatus, to: JobStatus },
}

impl Observation {
  /// Whether the fetched value should replace the cached one
  pub fn accepts(self) -> bool {
    matches!(
      self,
      Observation::First(_) | Observation::Progressed { .. } | Observation::Transitioned { .. }
    )
  }

  /// Whether this observation moved the job into a terminal status
  pub fn reached_terminal(self) -> bool {
    match self {
      Observation::First(to) | Observation::Transitioned { to, .. } => to.is_terminal(),
      _ => false,
    }
  }
}

/// Allowed status edges. Staying in an active status is allowed.
pub fn is_allowed(from: JobStatus, to: JobStatus) -> bool {
  use JobStatus::*;
  matches!(
    (from, to),
    (Pending, Pending)
      | (Pending, Running)
      | (Pending, Completed)
      | (Pending, Failed)
      | (Running, Running)
      | (Running, Completed)
      | (Running, Failed)
  )
}

pub fn observe(cached: Option<&Job>, fetched: &Job) -> Observation {
  let Some(cached) = cached else {
    return Observation::First(fetched.status);
  };

  let (from, to) = (cached.status, fetched.status);

  if from.is_terminal() {
    // Terminal records are immutable
    return if to == from {
      Observation::Unchanged
    } else {
      Observation::Regressed { from, to }
    };
  }

  if !is_allowed(from, to) {
    return Observation::Regressed { from, to };
  }

  if from != to {
    return Observation::Transitioned { from, to };
  }

  if fetched.progress < cached.progress {
    return Observation::Regressed { from, to };
  }

  if fetched == cached {
    Observation::Unchanged
  } else {
    Observation::Progressed {
      from: cached.progress,
      to: fetched.progress,
    }
  }
}

/// Whether a cached value still needs periodic job polling
pub fn has_active_jobs(resource: Option<&Resource>) -> bool {
  match resource {
    Some(Resource::Job(job)) => job.status.is_active(),
    Some(Resource::JobList(jobs)) => jobs.iter().any(|job| job.status.is_active()),
    _ => false,
  }
}

/// Replace the list item for `job` when the fetched value supersedes it.
///
/// Returns true if the list changed.
pub fn fold_into_list(list: &mut [Job], job: &Job) -> bool {
  match list.iter_mut().find(|item| item.id == job.id) {
    Some(item) if observe(Some(item), job).accepts() => {
      *item = job.clone();
      true
    }
    _ => false,
  }
}
