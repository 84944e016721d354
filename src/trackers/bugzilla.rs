use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use log::warn;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Result, ValetError};
use crate::jenkins::build_http_client;

use super::ResolvedRef;

/// Resolves bug ids against the Bugzilla REST API.
///
/// The HTTP client is created lazily on first use and dropped after a
/// failed lookup, so the next lookup starts from a fresh connection
/// instead of a possibly wedged one.
pub struct BugzillaResolver {
    base_url: String,
    ca_certificate: Option<PathBuf>,
    client: Option<Client>,
}

#[derive(Deserialize)]
struct BugsResponse {
    bugs: Vec<Bug>,
}

#[derive(Deserialize)]
struct Bug {
    status: String,
    summary: String,
}

impl BugzillaResolver {
    pub fn new(base_url: &str, ca_certificate: Option<&Path>) -> Self {
        Self {
            // the REST endpoint rejects a doubled slash
            base_url: base_url.trim_end_matches('/').to_string(),
            ca_certificate: ca_certificate.map(Path::to_path_buf),
            client: None,
        }
    }

    /// Resolves every id in the set. Lookup failures substitute a bare
    /// `BZ#<id>` label and never fail the run; the deep link is emitted
    /// either way.
    pub async fn resolve(&mut self, bug_ids: &BTreeSet<u64>) -> HashMap<u64, ResolvedRef> {
        let mut resolved = HashMap::new();
        for &bug_id in bug_ids {
            // 0 is the "no bug on file" sentinel, never a real lookup
            if bug_id == 0 {
                continue;
            }
            let label = match self.lookup(bug_id).await {
                Ok(label) => label,
                Err(e) => {
                    warn!("Bugzilla API call error for bug {bug_id}: {e}");
                    self.client = None;
                    format!("BZ#{bug_id}")
                }
            };
            resolved.insert(
                bug_id,
                ResolvedRef {
                    label,
                    url: format!("{}/show_bug.cgi?id={bug_id}", self.base_url),
                },
            );
        }
        resolved
    }

    async fn lookup(&mut self, bug_id: u64) -> Result<String> {
        let url = format!(
            "{}/rest/bug/{bug_id}?include_fields=status,summary",
            self.base_url
        );
        let response = self.client()?.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ValetError::Api(format!(
                "GET {url} returned status {status}"
            )));
        }

        let body: BugsResponse = response.json().await?;
        let bug = body
            .bugs
            .first()
            .ok_or_else(|| ValetError::Api(format!("bug {bug_id} not found")))?;
        Ok(format!("[{}] {}", bug.status, bug.summary))
    }

    fn client(&mut self) -> Result<&Client> {
        if self.client.is_none() {
            self.client = Some(build_http_client(self.ca_certificate.as_deref())?);
        }
        Ok(self.client.as_ref().expect("client initialized above"))
    }
}
