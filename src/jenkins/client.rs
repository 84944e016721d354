use std::path::Path;

use log::warn;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use url::Url;

use crate::error::{Result, ValetError};

use super::types::{BuildInfo, JobInfo, JobListResponse, JobSummary, StageDescription};

/// Jenkins JSON API client.
///
/// One instance per run; the underlying connection pool is shared across
/// every job and build lookup.
pub struct JenkinsClient {
    client: Client,
    base_url: Url,
    auth: Option<(String, String)>,
}

impl JenkinsClient {
    pub fn new(
        base_url: &str,
        username: Option<&str>,
        api_token: Option<&str>,
        ca_certificate: Option<&Path>,
    ) -> Result<Self> {
        let client = build_http_client(ca_certificate)?;
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ValetError::Config(format!("Invalid Jenkins URL: {e}")))?;
        // relative joins drop the last path segment without this
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let auth = match (username, api_token) {
            (Some(user), Some(token)) => Some((user.to_string(), token.to_string())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url,
            auth,
        })
    }

    async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ValetError::Api(format!("Invalid API path {path}: {e}")))?;

        let mut request = self.client.get(url.clone());
        if let Some((user, token)) = &self.auth {
            request = request.basic_auth(user, Some(token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ValetError::Api(format!(
                "GET {url} returned status {status}"
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Lists every job on the server whose name matches at least one of the
    /// comma-separated regex search fields.
    ///
    /// A field that fails to compile is logged and skipped so a typo in one
    /// search pattern cannot empty the whole report.
    pub async fn search_jobs(&self, job_search_fields: &str) -> Result<Vec<JobSummary>> {
        let patterns: Vec<Regex> = job_search_fields
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .filter_map(|field| match Regex::new(field) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Error compiling search field regex: {e} - skipping this search field");
                    None
                }
            })
            .collect();

        let listing: JobListResponse = self.get_json("api/json?tree=jobs[name]").await?;

        Ok(listing
            .jobs
            .into_iter()
            .filter(|job| patterns.iter().any(|pattern| pattern.is_match(&job.name)))
            .collect())
    }

    pub async fn job_info(&self, job_name: &str) -> Result<JobInfo> {
        self.get_json(&format!("job/{job_name}/api/json")).await
    }

    pub async fn build_info(&self, job_name: &str, number: u32) -> Result<BuildInfo> {
        self.get_json(&format!("job/{job_name}/{number}/api/json"))
            .await
    }

    pub async fn build_stages(&self, job_name: &str, number: u32) -> Result<StageDescription> {
        self.get_json(&format!("job/{job_name}/{number}/wfapi/describe"))
            .await
    }
}

/// Shared HTTP client builder, also used by the tracker resolvers.
///
/// An optional CA certificate (PEM) is added to the root store for
/// deployments fronted by an internal authority.
pub fn build_http_client(ca_certificate: Option<&Path>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("valet/", env!("CARGO_PKG_VERSION"))),
    );

    let mut builder = Client::builder().default_headers(headers);
    if let Some(path) = ca_certificate {
        let pem = std::fs::read(path)?;
        let cert = reqwest::Certificate::from_pem(&pem)
            .map_err(|e| ValetError::Config(format!("Invalid CA certificate: {e}")))?;
        builder = builder.add_root_certificate(cert);
    }

    builder
        .build()
        .map_err(|e| ValetError::Config(format!("Failed to create HTTP client: {e}")))
}
