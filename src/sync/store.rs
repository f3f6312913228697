//! The sync facade views talk to.
//!
//! `SyncStore` owns the cache, the subscription registry, the poller and the
//! mutation executor, and is driven from the UI task:
//!
//! - `subscribe` / `unsubscribe` register interest and a change callback.
//! - `tick` applies fetch results that have landed, then starts due fetches.
//! - `prepare` / `apply` wrap the mutation executor and reschedule the keys a
//!   commit touched.
//!
//! Fetches run on spawned tasks and only ever send their result back over a
//! channel, so every cache write happens here, on one task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::cache::{ListenerId, ResourceCache};
use super::clock::{Clock, SystemClock};
use super::entry::{CacheEntry, FetchStatus, Resource};
use super::key::{ResourceKey, ResourceKind};
use super::lifecycle::{self, Observation};
use super::mutation::{Mutation, MutationExecutor, MutationOutcome, MutationResponse, PendingMutation};
use super::poller::{FetchTicket, PollIntervals, Poller};
use super::registry::{Interest, SubscriptionHandle, SubscriptionRegistry};
use crate::api::{Backend, CacheStats, Health, Job, PhrasePresets, SubredditPreset};
use crate::builder::AnalysisConfiguration;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
  pub intervals: PollIntervals,
  /// Per-fetch timeout; expiry counts as a transport error
  pub fetch_timeout: Duration,
  pub mutation_timeout: Duration,
}

impl Default for SyncOptions {
  fn default() -> Self {
    Self {
      intervals: PollIntervals::default(),
      fetch_timeout: Duration::from_secs(20),
      mutation_timeout: Duration::from_secs(30),
    }
  }
}

/// Read-only projection of one cache entry for rendering
#[derive(Debug)]
pub struct ResourceView<'a, T: ?Sized> {
  pub data: Option<&'a T>,
  pub is_loading: bool,
  pub is_error: bool,
  pub error: Option<&'a SyncError>,
  pub fetched_at: Option<DateTime<Utc>>,
}

impl<'a, T: ?Sized> ResourceView<'a, T> {
  fn project(entry: Option<&'a CacheEntry>, select: impl Fn(&'a Resource) -> Option<&'a T>) -> Self {
    match entry {
      Some(entry) => Self {
        data: entry.value().and_then(select),
        is_loading: entry.is_loading(),
        is_error: entry.is_error(),
        error: entry.error(),
        fetched_at: entry.fetched_at(),
      },
      None => Self {
        data: None,
        is_loading: false,
        is_error: false,
        error: None,
        fetched_at: None,
      },
    }
  }
}

#[derive(Debug)]
struct FetchCompletion {
  key: ResourceKey,
  result: SyncResult<Resource>,
}

pub struct SyncStore {
  cache: ResourceCache,
  registry: SubscriptionRegistry,
  poller: Poller,
  mutations: MutationExecutor,
  backend: Arc<dyn Backend>,
  clock: Arc<dyn Clock>,
  fetch_timeout: Duration,
  /// Cache listener per live subscription
  listeners: HashMap<u64, ListenerId>,
  completions_tx: mpsc::UnboundedSender<FetchCompletion>,
  completions_rx: mpsc::UnboundedReceiver<FetchCompletion>,
}

impl SyncStore {
  pub fn new(backend: Arc<dyn Backend>, options: SyncOptions) -> Self {
    Self::with_clock(backend, options, Arc::new(SystemClock))
  }

  pub fn with_clock(backend: Arc<dyn Backend>, options: SyncOptions, clock: Arc<dyn Clock>) -> Self {
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();
    Self {
      cache: ResourceCache::new(),
      registry: SubscriptionRegistry::new(),
      poller: Poller::new(options.intervals),
      mutations: MutationExecutor::new(Arc::clone(&backend), options.mutation_timeout),
      backend,
      clock,
      fetch_timeout: options.fetch_timeout,
      listeners: HashMap::new(),
      completions_tx,
      completions_rx,
    }
  }

  // ============================================================================
  // Subscriptions
  // ============================================================================

  /// Observe `key`. The callback runs after every write to that key; the first
  /// subscriber makes the key eligible for fetching on the next tick.
  pub fn subscribe<F>(&mut self, key: ResourceKey, callback: F) -> SubscriptionHandle
  where
    F: FnMut(&ResourceKey, Option<&CacheEntry>) + 'static,
  {
    let listener = self.cache.subscribe_on_change(&key, callback);
    let (handle, interest) = self.registry.subscribe(key.clone());
    self.listeners.insert(handle.id(), listener);

    if interest == Some(Interest::Wanted) {
      let now = self.clock.now();
      self.poller.want(&key, now, self.cache.get(&key));
    }
    debug!(key = %key, subscribers = self.registry.refcount(&key), "subscribed");
    handle
  }

  /// Drop a subscription. A fetch already sent for the key is not cancelled.
  pub fn unsubscribe(&mut self, handle: SubscriptionHandle) {
    let key = handle.key().clone();
    if let Some(listener) = self.listeners.remove(&handle.id()) {
      self.cache.remove_listener(&key, listener);
    }
    if self.registry.unsubscribe(handle) == Some(Interest::Unwanted) {
      self.poller.unwant(&key);
    }
    debug!(key = %key, subscribers = self.registry.refcount(&key), "unsubscribed");
  }

  pub fn subscriber_count(&self, key: &ResourceKey) -> usize {
    self.registry.refcount(key)
  }

  // ============================================================================
  // Polling
  // ============================================================================

  /// Apply landed fetch results, then start fetches that are due.
  ///
  /// Returns true if any result was applied.
  pub fn tick(&mut self) -> bool {
    let mut applied = false;
    while let Ok(completion) = self.completions_rx.try_recv() {
      self.apply_completion(completion);
      applied = true;
    }
    self.launch_due();
    applied
  }

  /// Mark `key` stale so it is fetched again if anyone is watching
  pub fn refresh(&mut self, key: &ResourceKey) {
    self.cache.invalidate(key);
    self.reschedule(key);
  }

  pub fn is_polling(&self, key: &ResourceKey) -> bool {
    self.poller.is_polling(key)
  }

  pub fn in_flight_count(&self) -> usize {
    self.poller.in_flight_count()
  }

  fn launch_due(&mut self) {
    let now = self.clock.now();
    for key in self.poller.due(now) {
      // Picked up again once the mutation has been applied
      if self.cache.is_mutating(&key) {
        continue;
      }
      self.launch(key, now);
    }
  }

  fn launch(&mut self, key: ResourceKey, now: Instant) {
    let ticket = FetchTicket {
      generation: self.cache.generation(&key),
      prior_status: self
        .cache
        .get(&key)
        .map(|entry| entry.status())
        .unwrap_or(FetchStatus::Idle),
      started: now,
    };
    self.poller.begin(&key, ticket);
    self.cache.mark_loading(&key);
    debug!(key = %key, "fetch started");

    let backend = Arc::clone(&self.backend);
    let tx = self.completions_tx.clone();
    let timeout = self.fetch_timeout;
    tokio::spawn(async move {
      let result = match tokio::time::timeout(timeout, fetch_resource(backend.as_ref(), &key)).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::transport(format!(
          "fetching {} timed out after {}s",
          key,
          timeout.as_secs()
        ))),
      };
      // Receiver only goes away with the store
      let _ = tx.send(FetchCompletion { key, result });
    });
  }

  fn apply_completion(&mut self, completion: FetchCompletion) {
    let FetchCompletion { key, result } = completion;
    let Some(ticket) = self.poller.in_flight(&key).copied() else {
      return;
    };
    let now = self.clock.now();

    let overtaken =
      self.cache.generation(&key) != ticket.generation || self.cache.is_mutating(&key);
    if overtaken {
      debug!(key = %key, "discarding fetch result overtaken by a mutation");
      if self.cache.get(&key).is_some_and(CacheEntry::is_loading) {
        self.cache.restore_status(&key, ticket.prior_status);
      }
    } else {
      match result {
        Ok(resource) => self.accept(&key, resource),
        Err(e) if e.is_not_found() && key.kind() == ResourceKind::Job => self.forget_job(&key),
        Err(e) => {
          warn!(key = %key, error = %e, "fetch failed");
          self.cache.mark_error(&key, e);
        }
      }
    }

    self.poller.finish(&key, now, self.cache.get(&key));
    debug!(
      key = %key,
      elapsed_ms = now.saturating_duration_since(ticket.started).as_millis() as u64,
      polling = self.poller.is_polling(&key),
      "fetch finished"
    );
  }

  fn accept(&mut self, key: &ResourceKey, resource: Resource) {
    match resource {
      Resource::Job(job) => self.accept_job(key, job),
      Resource::JobList(jobs) => self.accept_job_list(key, jobs),
      other => self.cache.put(key, other, FetchStatus::Fresh),
    }
  }

  fn accept_job(&mut self, key: &ResourceKey, job: Job) {
    let cached = self
      .cache
      .get(key)
      .and_then(CacheEntry::value)
      .and_then(Resource::as_job);
    let observation = lifecycle::observe(cached, &job);

    if !observation.accepts() {
      if let Observation::Regressed { from, to } = observation {
        warn!(
          job = %job.id,
          from = from.label(),
          to = to.label(),
          progress = job.progress,
          "ignoring job state older than the cached one"
        );
      }
      self.cache.touch(key);
      return;
    }

    if observation.reached_terminal() {
      info!(job = %job.id, status = job.status.label(), "job finished");
    }

    let list_key = ResourceKey::job_list();
    self.cache.batch(|cache| {
      cache.modify(&list_key, |resource| match resource {
        Resource::JobList(jobs) => lifecycle::fold_into_list(jobs, &job),
        _ => false,
      });
      cache.put(key, Resource::Job(job), FetchStatus::Fresh);
    });
    self.reschedule(&list_key);
  }

  /// Store a fetched list, keeping it consistent with the job entries: an item
  /// behind the cached record is replaced by it, an item ahead of it updates it
  /// unless that job has its own fetch in flight.
  fn accept_job_list(&mut self, key: &ResourceKey, mut jobs: Vec<Job>) {
    let mut advanced = Vec::new();
    let poller = &self.poller;

    self.cache.batch(|cache| {
      if let Some(previous) = cache.get(key).and_then(CacheEntry::value).and_then(Resource::as_job_list) {
        for listed in jobs.iter_mut() {
          if let Some(old) = previous.iter().find(|j| j.id == listed.id) {
            if matches!(lifecycle::observe(Some(old), listed), Observation::Regressed { .. }) {
              *listed = old.clone();
            }
          }
        }
      }

      for listed in jobs.iter_mut() {
        let job_key = ResourceKey::job(listed.id.as_str());
        let Some(cached) = cache
          .get(&job_key)
          .and_then(CacheEntry::value)
          .and_then(Resource::as_job)
          .cloned()
        else {
          continue;
        };

        match lifecycle::observe(Some(&cached), listed) {
          Observation::Regressed { .. } => *listed = cached,
          obs if obs.accepts() && poller.in_flight(&job_key).is_none() => {
            cache.put(&job_key, Resource::Job(listed.clone()), FetchStatus::Fresh);
            advanced.push(job_key);
          }
          _ => {}
        }
      }

      cache.put(key, Resource::JobList(jobs), FetchStatus::Fresh);
    });

    for job_key in advanced {
      self.reschedule(&job_key);
    }
  }

  /// The backend no longer knows the job: drop it everywhere
  fn forget_job(&mut self, key: &ResourceKey) {
    let Some(job_id) = key.job_id().map(str::to_string) else {
      return;
    };
    info!(job = %job_id, "job no longer exists on the backend");

    let list_key = ResourceKey::job_list();
    self.cache.batch(|cache| {
      cache.remove(key);
      cache.modify(&list_key, |resource| match resource {
        Resource::JobList(jobs) => {
          let before = jobs.len();
          jobs.retain(|j| j.id != job_id);
          jobs.len() != before
        }
        _ => false,
      });
    });
  }

  fn reschedule(&mut self, key: &ResourceKey) {
    let now = self.clock.now();
    self.poller.reschedule(key, now, self.cache.get(key));
  }

  // ============================================================================
  // Mutations
  // ============================================================================

  /// Validate and mark the keys a mutation will rewrite. Run the returned
  /// request anywhere, then hand its outcome to `apply`.
  pub fn prepare(&mut self, mutation: Mutation) -> SyncResult<PendingMutation> {
    self.mutations.prepare(&mut self.cache, mutation)
  }

  pub fn apply(&mut self, outcome: MutationOutcome) -> SyncResult<MutationResponse> {
    let response = self.mutations.apply(&mut self.cache, outcome)?;
    for key in response.touched_keys() {
      self.reschedule(&key);
    }
    Ok(response)
  }

  /// Submit a job and wait for the backend to accept it. Returns the job id.
  pub async fn start_job(&mut self, config: AnalysisConfiguration) -> SyncResult<String> {
    match self.execute(Mutation::StartJob(config)).await? {
      MutationResponse::Started(job) => Ok(job.id),
      other => unreachable!("start job answered {:?}", other),
    }
  }

  pub async fn delete_job(&mut self, job_id: &str) -> SyncResult<()> {
    self.execute(Mutation::DeleteJob(job_id.to_string())).await?;
    Ok(())
  }

  /// Clear the backend's scrape cache. Returns the number of files deleted.
  pub async fn clear_backend_cache(&mut self) -> SyncResult<u64> {
    match self.execute(Mutation::ClearBackendCache).await? {
      MutationResponse::Cleared(cleared) => Ok(cleared.files_deleted),
      other => unreachable!("clear cache answered {:?}", other),
    }
  }

  async fn execute(&mut self, mutation: Mutation) -> SyncResult<MutationResponse> {
    let pending = self.prepare(mutation)?;
    let outcome = pending.run().await;
    self.apply(outcome)
  }

  // ============================================================================
  // Reads
  // ============================================================================

  pub fn entry(&self, key: &ResourceKey) -> Option<&CacheEntry> {
    self.cache.get(key)
  }

  pub fn job(&self, job_id: &str) -> ResourceView<'_, Job> {
    ResourceView::project(self.cache.get(&ResourceKey::job(job_id)), Resource::as_job)
  }

  pub fn job_list(&self) -> ResourceView<'_, [Job]> {
    ResourceView::project(self.cache.get(&ResourceKey::job_list()), Resource::as_job_list)
  }

  pub fn cache_stats(&self) -> ResourceView<'_, CacheStats> {
    ResourceView::project(self.cache.get(&ResourceKey::cache_stats()), Resource::as_cache_stats)
  }

  pub fn health(&self) -> ResourceView<'_, Health> {
    ResourceView::project(self.cache.get(&ResourceKey::health()), Resource::as_health)
  }

  pub fn subreddit_presets(&self) -> ResourceView<'_, [SubredditPreset]> {
    ResourceView::project(
      self.cache.get(&ResourceKey::subreddit_presets()),
      Resource::as_subreddit_presets,
    )
  }

  pub fn phrase_presets(&self) -> ResourceView<'_, PhrasePresets> {
    ResourceView::project(
      self.cache.get(&ResourceKey::phrase_presets()),
      Resource::as_phrase_presets,
    )
  }
}

async fn fetch_resource(backend: &dyn Backend, key: &ResourceKey) -> SyncResult<Resource> {
  let resource = match key.kind() {
    ResourceKind::Job => {
      let job_id = key
        .job_id()
        .ok_or_else(|| SyncError::not_found(format!("{} has no job id", key)))?;
      Resource::Job(backend.get_job(job_id).await?)
    }
    ResourceKind::JobList => Resource::JobList(backend.list_jobs().await?),
    ResourceKind::CacheStats => Resource::CacheStats(backend.cache_stats().await?),
    ResourceKind::Health => Resource::Health(backend.health().await?),
    ResourceKind::SubredditPresets => Resource::SubredditPresets(backend.subreddit_presets().await?),
    ResourceKind::PhrasePresets => Resource::PhrasePresets(backend.phrase_presets().await?),
  };
  Ok(resource)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeBackend;
  use crate::api::JobStatus;
  use crate::builder::{RedditCredentials, SubredditConfig};
  use crate::error::ValidationError;
  use crate::sync::clock::ManualClock;
  use std::cell::RefCell;
  use std::rc::Rc;

  struct Harness {
    store: SyncStore,
    backend: Arc<FakeBackend>,
    clock: Arc<ManualClock>,
  }

  impl Harness {
    fn new() -> Self {
      let backend = Arc::new(FakeBackend::new());
      let clock = Arc::new(ManualClock::new());
      let store = SyncStore::with_clock(backend.clone(), SyncOptions::default(), clock.clone());
      Self {
        store,
        backend,
        clock,
      }
    }

    /// Tick until nothing is in flight
    async fn settle(&mut self) {
      for _ in 0..200 {
        tokio::task::yield_now().await;
        self.store.tick();
        if self.store.in_flight_count() == 0 {
          return;
        }
      }
      panic!("fetches did not settle");
    }

    /// Move the clock forward and run whatever became due
    async fn advance(&mut self, secs: u64) {
      self.clock.advance(Duration::from_secs(secs));
      self.store.tick();
      self.settle().await;
    }

    fn watch(&mut self, key: ResourceKey) -> SubscriptionHandle {
      self.store.subscribe(key, |_, _| {})
    }
  }

  type Progress = Rc<RefCell<Vec<Option<u8>>>>;

  fn progress_recorder(store: &mut SyncStore, job_id: &str) -> (Progress, SubscriptionHandle) {
    let seen: Progress = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let handle = store.subscribe(ResourceKey::job(job_id), move |_, entry| {
      let progress = entry
        .and_then(CacheEntry::value)
        .and_then(Resource::as_job)
        .map(|job| job.progress);
      sink.borrow_mut().push(progress);
    });
    (seen, handle)
  }

  fn valid_config() -> AnalysisConfiguration {
    AnalysisConfiguration {
      subreddits: vec![SubredditConfig::named("ADHD")],
      reddit: RedditCredentials {
        client_id: "id".into(),
        client_secret: "secret".into(),
        ..Default::default()
      },
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn test_one_fetch_in_flight_per_key() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 10));
    h.backend.hold_reads();

    let first = h.watch(ResourceKey::job("J"));
    let _second = h.watch(ResourceKey::job("J"));
    h.store.tick();
    assert_eq!(h.store.in_flight_count(), 1);

    // Repeated ticks, resubscription and elapsed time never start a second fetch
    h.store.unsubscribe(first);
    let _third = h.watch(ResourceKey::job("J"));
    for _ in 0..5 {
      h.clock.advance(Duration::from_secs(5));
      h.store.tick();
      tokio::task::yield_now().await;
      assert!(h.store.in_flight_count() <= 1);
    }
    assert_eq!(h.backend.calls("get_job"), 1);

    h.backend.release();
    h.settle().await;
    assert_eq!(h.store.job("J").data.map(|j| j.progress), Some(10));
  }

  #[tokio::test]
  async fn test_running_job_polls_until_terminal() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 40));
    let _sub = h.watch(ResourceKey::job("J"));
    h.settle().await;
    assert!(h.store.is_polling(&ResourceKey::job("J")));

    h.backend.set_job(FakeBackend::job("J", JobStatus::Completed, 100));
    h.advance(2).await;
    let view = h.store.job("J");
    assert_eq!(view.data.map(|j| j.status), Some(JobStatus::Completed));
    assert!(!view.is_loading);
    assert!(!h.store.is_polling(&ResourceKey::job("J")));

    h.advance(60).await;
    assert_eq!(h.backend.calls("get_job"), 2);
  }

  #[tokio::test]
  async fn test_cold_subscribe_to_finished_job_fetches_once() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Failed, 30));
    let _sub = h.watch(ResourceKey::job("J"));
    h.settle().await;
    h.advance(10).await;
    assert_eq!(h.backend.calls("get_job"), 1);
    assert_eq!(h.store.job("J").data.map(|j| j.status), Some(JobStatus::Failed));
  }

  #[tokio::test]
  async fn test_subscribers_share_progress_updates() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 40));
    let (a, _ha) = progress_recorder(&mut h.store, "J");
    let (b, _hb) = progress_recorder(&mut h.store, "J");
    h.settle().await;

    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 55));
    h.advance(2).await;

    assert_eq!(h.backend.calls("get_job"), 2);
    assert_eq!(*a.borrow(), *b.borrow());
    assert!(a.borrow().contains(&Some(40)));
    assert_eq!(a.borrow().last(), Some(&Some(55)));
  }

  #[tokio::test]
  async fn test_unsubscribe_pauses_polling() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 40));
    let sub = h.watch(ResourceKey::job("J"));
    h.settle().await;

    h.store.unsubscribe(sub);
    h.advance(10).await;
    assert_eq!(h.backend.calls("get_job"), 1);
    assert!(!h.store.is_polling(&ResourceKey::job("J")));
    // Last value stays readable
    assert!(h.store.job("J").data.is_some());
  }

  #[tokio::test]
  async fn test_regressed_job_state_is_ignored() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 55));
    let _sub = h.watch(ResourceKey::job("J"));
    h.settle().await;

    h.backend.set_job(FakeBackend::job("J", JobStatus::Pending, 0));
    h.advance(2).await;
    let view = h.store.job("J");
    assert_eq!(view.data.map(|j| (j.status, j.progress)), Some((JobStatus::Running, 55)));
    assert!(!view.is_error);
  }

  #[tokio::test]
  async fn test_missing_job_becomes_absent() {
    let mut h = Harness::new();
    let _sub = h.watch(ResourceKey::job("nope"));
    h.settle().await;

    let view = h.store.job("nope");
    assert!(view.data.is_none());
    assert!(!view.is_error);
    assert!(h.store.entry(&ResourceKey::job("nope")).is_none());
    assert!(!h.store.is_polling(&ResourceKey::job("nope")));
  }

  #[tokio::test]
  async fn test_list_keeps_fresher_job_entry() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 40));
    let _job = h.watch(ResourceKey::job("J"));
    h.settle().await;

    // A lagging list answer must not pull the job backwards
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 30));
    let _list = h.watch(ResourceKey::job_list());
    h.settle().await;

    let list = h.store.job_list();
    assert_eq!(list.data.map(|jobs| jobs[0].progress), Some(40));
    assert_eq!(h.store.job("J").data.map(|j| j.progress), Some(40));

    // An advancing list answer moves the job entry forward
    h.backend.set_job(FakeBackend::job("J", JobStatus::Completed, 100));
    h.store.refresh(&ResourceKey::job_list());
    h.store.tick();
    h.settle().await;
    assert_eq!(h.store.job("J").data.map(|j| j.status), Some(JobStatus::Completed));
  }

  #[tokio::test]
  async fn test_list_leaves_job_loading_while_its_fetch_is_out() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 40));
    let _job = h.watch(ResourceKey::job("J"));
    let _list = h.watch(ResourceKey::job_list());
    h.settle().await;

    // The job poll is held, the list poll answers with newer progress
    h.backend.hold("get_job");
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 60));
    h.clock.advance(Duration::from_secs(2));
    h.store.tick();
    for _ in 0..5 {
      tokio::task::yield_now().await;
    }
    h.store.tick();
    assert_eq!(h.store.job_list().data.map(|jobs| jobs[0].progress), Some(60));
    let job = h.store.job("J");
    assert!(job.is_loading);
    assert_eq!(job.data.map(|j| j.progress), Some(40));

    h.backend.release();
    h.settle().await;
    let job = h.store.job("J");
    assert!(!job.is_loading);
    assert_eq!(job.data.map(|j| j.progress), Some(60));
  }

  #[tokio::test]
  async fn test_delete_during_poll_leaves_no_trace() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 40));
    let _job = h.watch(ResourceKey::job("J"));
    let _list = h.watch(ResourceKey::job_list());
    h.settle().await;

    // Both polls are in flight with answers that still contain J
    h.backend.hold_reads();
    h.clock.advance(Duration::from_secs(2));
    h.store.tick();
    for _ in 0..5 {
      tokio::task::yield_now().await;
    }
    assert_eq!(h.store.in_flight_count(), 2);
    assert_eq!(h.backend.calls("list_jobs"), 2);

    h.store.delete_job("J").await.unwrap();
    assert!(h.store.job("J").data.is_none());
    assert!(h.store.job_list().data.unwrap().is_empty());

    h.backend.release();
    h.settle().await;
    assert!(h.store.job("J").data.is_none());
    assert!(h.store.job_list().data.unwrap().iter().all(|j| j.id != "J"));
    assert!(!h.store.is_polling(&ResourceKey::job("J")));
  }

  #[tokio::test]
  async fn test_failed_mutation_leaves_cache_untouched() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Completed, 100));
    let _list = h.watch(ResourceKey::job_list());
    h.settle().await;

    h.backend.fail("delete_job", SyncError::backend(500, "Internal Server Error"));
    let err = h.store.delete_job("J").await.unwrap_err();
    assert_eq!(err, SyncError::backend(500, "Internal Server Error"));
    assert_eq!(h.store.job_list().data.map(|jobs| jobs.len()), Some(1));
  }

  #[tokio::test]
  async fn test_invalid_config_never_reaches_backend() {
    let mut h = Harness::new();
    let mut config = valid_config();
    config.subreddits.clear();
    config.clustering.k_min = 5;
    config.clustering.k_max = 20;

    let err = h.store.start_job(config.clone()).await.unwrap_err();
    assert_eq!(err, SyncError::Validation(ValidationError::MissingSubreddits));
    assert_eq!(h.backend.total_calls(), 0);

    config.subreddits.push(SubredditConfig::named("ADHD"));
    assert!(h.store.start_job(config).await.is_ok());
    assert_eq!(h.backend.calls("start_job"), 1);
  }

  #[tokio::test]
  async fn test_start_job_sends_normalized_request() {
    let mut h = Harness::new();
    let mut config = valid_config();
    config.subreddits = vec![
      SubredditConfig::named("   "),
      SubredditConfig::named(" ADHD "),
      SubredditConfig::named("r/productivity"),
      SubredditConfig::named("adhd"),
    ];
    config.filters.include_phrases = vec!["I wish".into(), " i wish ".into()];

    h.store.start_job(config).await.unwrap();
    let sent = &h.backend.submitted()[0];
    let names: Vec<&str> = sent.subreddits.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["ADHD", "productivity"]);
    assert_eq!(sent.filters.include_phrases, vec!["I wish".to_string()]);
  }

  #[tokio::test]
  async fn test_blank_subreddits_fail_validation_after_trimming() {
    let mut h = Harness::new();
    let mut config = valid_config();
    config.subreddits = vec![SubredditConfig::named("  "), SubredditConfig::named("r/")];

    let err = h.store.start_job(config).await.unwrap_err();
    assert_eq!(err, SyncError::Validation(ValidationError::MissingSubreddits));
    assert_eq!(h.backend.total_calls(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_timeout_is_transport_error_and_polling_goes_on() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 40));
    let _sub = h.watch(ResourceKey::job("J"));
    h.settle().await;

    h.backend.hold("get_job");
    h.clock.advance(Duration::from_secs(2));
    h.store.tick();
    tokio::task::yield_now().await;
    assert_eq!(h.store.in_flight_count(), 1);

    tokio::time::advance(SyncOptions::default().fetch_timeout + Duration::from_secs(1)).await;
    for _ in 0..5 {
      tokio::task::yield_now().await;
    }
    h.store.tick();

    let view = h.store.job("J");
    assert!(matches!(view.error, Some(SyncError::Transport(_))), "got {:?}", view.error);
    assert!(view.is_error);
    assert_eq!(view.data.map(|j| j.progress), Some(40));
    assert!(h.store.is_polling(&ResourceKey::job("J")));

    h.backend.release();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Running, 70));
    h.advance(30).await;
    let view = h.store.job("J");
    assert!(!view.is_error);
    assert_eq!(view.data.map(|j| j.progress), Some(70));
  }

  #[tokio::test(start_paused = true)]
  async fn test_mutation_timeout_is_transport_error_and_cache_is_unchanged() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Completed, 100));
    let _list = h.watch(ResourceKey::job_list());
    let _job = h.watch(ResourceKey::job("J"));
    h.settle().await;

    // Never released; the paused clock jumps straight to the mutation timeout
    h.backend.hold("delete_job");
    let err = h.store.delete_job("J").await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)), "got {:?}", err);

    assert_eq!(h.store.job_list().data.map(|jobs| jobs.len()), Some(1));
    assert_eq!(h.store.job("J").data.map(|j| j.status), Some(JobStatus::Completed));
    assert!(!h.store.job("J").is_error);
    assert_eq!(h.backend.calls("delete_job"), 0);
  }

  #[tokio::test]
  async fn test_started_job_joins_cached_list() {
    let mut h = Harness::new();
    let _list = h.watch(ResourceKey::job_list());
    h.settle().await;
    assert!(!h.store.is_polling(&ResourceKey::job_list()));

    let job_id = h.store.start_job(valid_config()).await.unwrap();
    let list = h.store.job_list();
    assert_eq!(list.data.map(|jobs| jobs[0].id.clone()), Some(job_id.clone()));
    assert_eq!(h.store.job(&job_id).data.map(|j| j.status), Some(JobStatus::Pending));
    assert!(h.store.is_polling(&ResourceKey::job_list()));
    assert_eq!(h.backend.submitted()[0].subreddits[0].name, "ADHD");
  }

  #[tokio::test]
  async fn test_mutation_commit_is_one_notification() {
    let mut h = Harness::new();
    h.backend.set_job(FakeBackend::job("J", JobStatus::Completed, 100));
    let _list = h.watch(ResourceKey::job_list());
    h.settle().await;

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let _observer = h.store.subscribe(ResourceKey::job_list(), move |_, entry| {
      let len = entry
        .and_then(CacheEntry::value)
        .and_then(Resource::as_job_list)
        .map(|jobs| jobs.len());
      sink.borrow_mut().push(len);
    });

    h.store.start_job(valid_config()).await.unwrap();
    assert_eq!(*seen.borrow(), vec![Some(2)]);
  }

  #[tokio::test]
  async fn test_clear_cache_refetches_stats() {
    let mut h = Harness::new();
    h.backend.set_cache_files(12);
    let _stats = h.watch(ResourceKey::cache_stats());
    h.settle().await;
    assert_eq!(h.store.cache_stats().data.map(|s| s.file_count), Some(12));

    let deleted = h.store.clear_backend_cache().await.unwrap();
    assert_eq!(deleted, 12);
    assert_eq!(h.store.entry(&ResourceKey::cache_stats()).map(|e| e.status()), Some(FetchStatus::Stale));

    h.store.tick();
    h.settle().await;
    assert_eq!(h.store.cache_stats().data.map(|s| s.file_count), Some(0));
    assert_eq!(h.backend.calls("cache_stats"), 2);
  }

  #[tokio::test]
  async fn test_presets_are_fetched_once() {
    let mut h = Harness::new();
    let sub = h.watch(ResourceKey::subreddit_presets());
    h.settle().await;
    h.store.unsubscribe(sub);

    let _again = h.watch(ResourceKey::subreddit_presets());
    h.advance(3600).await;
    assert_eq!(h.backend.calls("subreddit_presets"), 1);
    assert_eq!(h.store.subreddit_presets().data.map(|p| p[0].name.as_str()), Some("ADHD"));
  }

  #[tokio::test]
  async fn test_health_keeps_last_value_while_erroring() {
    let mut h = Harness::new();
    let _health = h.watch(ResourceKey::health());
    h.settle().await;

    h.backend.fail("health", SyncError::transport("connection refused"));
    h.advance(30).await;
    let view = h.store.health();
    assert!(view.data.is_some_and(Health::is_ok));
    assert!(view.is_error);
    assert_eq!(view.error, Some(&SyncError::transport("connection refused")));

    // Still polled after the error
    h.backend.recover("health");
    h.advance(30).await;
    assert!(!h.store.health().is_error);
    assert_eq!(h.backend.calls("health"), 3);
  }
}
