//! Jenkins remote API client
//!
//! [`JenkinsApi`] is the seam the reconciliation logic depends on;
//! [`HttpJenkinsClient`] implements it over the Jenkins JSON API.

use crate::config::JenkinsConnectorConfig;
use crate::error::ConnectorError;
use crate::resilience::{ResilienceConfig, execute_with_retry};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Build range of a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    /// Oldest build still known to the server
    pub first_build_number: Option<u64>,
    /// Most recently started build
    pub last_build_number: Option<u64>,
}

/// One build as reported by the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInfo {
    pub number: u64,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub building: bool,
    pub duration_ms: u64,
    pub estimated_duration_ms: Option<u64>,
    /// Raw result string (e.g. "SUCCESS"); `None` while building
    pub result: Option<String>,
    pub timestamp_ms: Option<i64>,
    pub url: Option<String>,
    pub culprits: Vec<String>,
    pub change_sets: Vec<ChangeItem>,
}

/// A change that went into a build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeItem {
    pub author: Option<String>,
    pub message: String,
}

/// Remote calls needed by the Jenkins connector
///
/// Implementations must stop promptly when `cancel` fires.
#[async_trait]
pub trait JenkinsApi: Send + Sync {
    async fn get_job(&self, cancel: &CancellationToken) -> Result<JobSummary, ConnectorError>;

    async fn get_build(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<BuildInfo, ConnectorError>;
}

/// [`JenkinsApi`] over HTTP
pub struct HttpJenkinsClient {
    client: reqwest::Client,
    config: JenkinsConnectorConfig,
    job_url: String,
    resilience: ResilienceConfig,
}

impl HttpJenkinsClient {
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails (e.g., TLS misconfiguration)
    pub fn new(config: JenkinsConnectorConfig) -> Result<Self, ConnectorError> {
        let resilience = config.resilience_config();
        let client = reqwest::Client::builder()
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .timeout(resilience.timeout())
            .build()
            .map_err(|e| ConnectorError::Init(format!("Jenkins HTTP client: {}", e)))?;

        let job_url = job_url(&config.server, &config.project);

        Ok(Self {
            client,
            config,
            job_url,
            resilience,
        })
    }

    pub fn job_url(&self) -> &str {
        &self.job_url
    }

    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.api_token.as_deref()),
            None => request,
        }
    }

    /// GET a JSON document (single attempt, no retry)
    async fn fetch_once<T>(&self, url: &str) -> Result<T, ConnectorError>
    where
        T: for<'de> Deserialize<'de>,
    {
        trace!(url, "requesting");
        let response = self.build_request(url).send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }

        Err(match status {
            reqwest::StatusCode::NOT_FOUND => ConnectorError::NotFound(url.to_string()),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                ConnectorError::AuthFailed(format!("{} rejected credentials", self.config.server))
            }
            other => ConnectorError::Status {
                code: other.as_u16(),
                url: url.to_string(),
            },
        })
    }

    async fn fetch<T>(&self, url: &str, cancel: &CancellationToken) -> Result<T, ConnectorError>
    where
        T: for<'de> Deserialize<'de>,
    {
        execute_with_retry(&self.resilience, cancel, url, || self.fetch_once(url)).await
    }
}

#[async_trait]
impl JenkinsApi for HttpJenkinsClient {
    async fn get_job(&self, cancel: &CancellationToken) -> Result<JobSummary, ConnectorError> {
        let url = format!("{}/api/json", self.job_url);
        let job: JobResponse = self.fetch(&url, cancel).await?;
        Ok(job.into())
    }

    async fn get_build(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<BuildInfo, ConnectorError> {
        let url = format!("{}/{}/api/json", self.job_url, number);
        let build: BuildResponse = self.fetch(&url, cancel).await?;
        Ok(build.into())
    }
}

/// `{server}/job/a/job/b` for project "a/b"
pub(crate) fn job_url(server: &str, project: &str) -> String {
    let mut url = server.trim_end_matches('/').to_string();
    for segment in project.split('/').filter(|s| !s.is_empty()) {
        url.push_str("/job/");
        url.push_str(&urlencoding::encode(segment));
    }
    url
}

// --- API Response Types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobResponse {
    first_build: Option<BuildRef>,
    last_build: Option<BuildRef>,
}

#[derive(Debug, Deserialize)]
struct BuildRef {
    number: u64,
}

impl From<JobResponse> for JobSummary {
    fn from(job: JobResponse) -> Self {
        Self {
            first_build_number: job.first_build.map(|b| b.number),
            last_build_number: job.last_build.map(|b| b.number),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct BuildResponse {
    number: u64,
    display_name: Option<String>,
    description: Option<String>,
    building: bool,
    duration: u64,
    estimated_duration: Option<i64>,
    result: Option<String>,
    timestamp: Option<i64>,
    url: Option<String>,
    culprits: Vec<Culprit>,
    /// Pipeline jobs
    change_sets: Vec<ChangeSet>,
    /// Freestyle jobs
    change_set: Option<ChangeSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Culprit {
    full_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChangeSet {
    items: Vec<ChangeSetEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChangeSetEntry {
    msg: String,
    author: Option<Culprit>,
}

impl From<BuildResponse> for BuildInfo {
    fn from(build: BuildResponse) -> Self {
        let change_sets = build
            .change_sets
            .into_iter()
            .chain(build.change_set)
            .flat_map(|set| set.items)
            .map(|entry| ChangeItem {
                author: entry.author.map(|a| a.full_name),
                message: entry.msg,
            })
            .collect();

        Self {
            number: build.number,
            display_name: build.display_name,
            description: build.description,
            building: build.building,
            duration_ms: build.duration,
            // Jenkins reports -1 when it has no estimate
            estimated_duration_ms: build.estimated_duration.and_then(|d| u64::try_from(d).ok()),
            result: build.result,
            timestamp_ms: build.timestamp,
            url: build.url,
            culprits: build.culprits.into_iter().map(|c| c.full_name).collect(),
            change_sets,
        }
    }
}
