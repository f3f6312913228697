use crate::api::api_types::{ApiDeleteResponse, ApiErrorBody, ApiJobInfo};
use crate::api::types::{
  CacheStats, ClearedCache, Health, Job, PhrasePresets, SubredditPreset,
};
use crate::api::Backend;
use crate::builder::AnalysisConfiguration;
use crate::config::BackendConfig;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HTTP client for the painminer REST API
#[derive(Clone)]
pub struct HttpBackend {
  http: reqwest::Client,
  base: Url,
}

impl HttpBackend {
  pub fn new(config: &BackendConfig) -> Result<Self> {
    let mut base = Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid backend URL '{}': {}", config.url, e))?;
    // Url::join treats a base without trailing slash as a file and drops the last segment
    if !base.path().ends_with('/') {
      base.set_path(&format!("{}/", base.path()));
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("painboard/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  fn endpoint(&self, path: &str) -> SyncResult<Url> {
    self
      .base
      .join(path)
      .map_err(|e| SyncError::transport(format!("invalid endpoint {}: {}", path, e)))
  }

  /// `api/jobs/<id>`, with the id pushed as a single encoded segment
  fn job_endpoint(&self, job_id: &str) -> SyncResult<Url> {
    let mut url = self.endpoint("api/jobs/")?;
    url
      .path_segments_mut()
      .map_err(|_| SyncError::transport(format!("backend URL {} cannot hold a path", self.base)))?
      .pop_if_empty()
      .push(job_id);
    Ok(url)
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SyncResult<T> {
    let url = self.endpoint(path)?;
    self.send(self.http.get(url), path).await
  }

  /// Execute a request and decode the JSON body, mapping failures to `SyncError`
  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> SyncResult<T> {
    debug!(endpoint = what, "backend request");

    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.message())
        .unwrap_or_else(|_| {
          if body.is_empty() {
            status.canonical_reason().unwrap_or("error").to_string()
          } else {
            body
          }
        });

      return Err(if status == StatusCode::NOT_FOUND {
        SyncError::not_found(message)
      } else {
        SyncError::backend(status.as_u16(), message)
      });
    }

    response
      .json::<T>()
      .await
      .map_err(|e| SyncError::backend(status.as_u16(), format!("invalid response from {}: {}", what, e)))
  }
}

fn transport_error(e: reqwest::Error) -> SyncError {
  if e.is_timeout() {
    SyncError::transport("request timed out")
  } else {
    SyncError::transport(e.to_string())
  }
}

#[async_trait]
impl Backend for HttpBackend {
  async fn health(&self) -> SyncResult<Health> {
    self.get_json("").await
  }

  async fn start_job(&self, config: &AnalysisConfiguration) -> SyncResult<Job> {
    let url = self.endpoint("api/analyze")?;
    let info: ApiJobInfo = self.send(self.http.post(url).json(config), "api/analyze").await?;
    Ok(info.into())
  }

  async fn get_job(&self, job_id: &str) -> SyncResult<Job> {
    let url = self.job_endpoint(job_id)?;
    let info: ApiJobInfo = self.send(self.http.get(url), "api/jobs/{id}").await?;
    Ok(info.into())
  }

  async fn list_jobs(&self) -> SyncResult<Vec<Job>> {
    let infos: Vec<ApiJobInfo> = self.get_json("api/jobs").await?;
    Ok(infos.into_iter().map(Job::from).collect())
  }

  async fn delete_job(&self, job_id: &str) -> SyncResult<()> {
    let url = self.job_endpoint(job_id)?;

    match self.send::<ApiDeleteResponse>(self.http.delete(url), "api/jobs/{id}").await {
      Ok(ack) => {
        debug!(job_id = %ack.job_id, "job deleted");
        Ok(())
      }
      // Already gone counts as deleted
      Err(SyncError::NotFound(_)) => Ok(()),
      Err(e) => Err(e),
    }
  }

  async fn cache_stats(&self) -> SyncResult<CacheStats> {
    self.get_json("api/cache/stats").await
  }

  async fn clear_cache(&self) -> SyncResult<ClearedCache> {
    let url = self.endpoint("api/cache/clear")?;
    self.send(self.http.post(url), "api/cache/clear").await
  }

  async fn subreddit_presets(&self) -> SyncResult<Vec<SubredditPreset>> {
    self.get_json("api/presets/subreddits").await
  }

  async fn phrase_presets(&self) -> SyncResult<PhrasePresets> {
    self.get_json("api/presets/phrases").await
  }
}
