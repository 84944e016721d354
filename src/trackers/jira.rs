use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use log::warn;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Result, ValetError};
use crate::jenkins::build_http_client;

use super::ResolvedRef;

/// Resolves ticket ids against the Jira REST API.
///
/// Same connection-handling policy as the Bugzilla resolver: the client
/// is built lazily and recreated after any failed lookup.
pub struct JiraResolver {
    base_url: String,
    auth: Option<(String, String)>,
    ca_certificate: Option<PathBuf>,
    client: Option<Client>,
}

#[derive(Deserialize)]
struct IssueResponse {
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueFields {
    status: IssueStatus,
    summary: String,
}

#[derive(Deserialize)]
struct IssueStatus {
    name: String,
}

impl JiraResolver {
    pub fn new(
        base_url: &str,
        username: Option<&str>,
        password: Option<&str>,
        ca_certificate: Option<&Path>,
    ) -> Self {
        let auth = match (username, password) {
            (Some(user), Some(pass)) => Some((user.to_string(), pass.to_string())),
            _ => None,
        };
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            ca_certificate: ca_certificate.map(Path::to_path_buf),
            client: None,
        }
    }

    /// Resolves every ticket id in the set. A failed lookup falls back to
    /// the bare ticket id as its label.
    pub async fn resolve(&mut self, ticket_ids: &BTreeSet<String>) -> HashMap<String, ResolvedRef> {
        let mut resolved = HashMap::new();
        for ticket_id in ticket_ids {
            // "0" is the "no ticket on file" sentinel
            if ticket_id == "0" {
                continue;
            }
            let label = match self.lookup(ticket_id).await {
                Ok(label) => label,
                Err(e) => {
                    warn!("Jira API call error for ticket {ticket_id}: {e}");
                    self.client = None;
                    ticket_id.clone()
                }
            };
            resolved.insert(
                ticket_id.clone(),
                ResolvedRef {
                    label,
                    url: format!("{}/browse/{ticket_id}", self.base_url),
                },
            );
        }
        resolved
    }

    async fn lookup(&mut self, ticket_id: &str) -> Result<String> {
        let url = format!(
            "{}/rest/api/2/issue/{ticket_id}?fields=status,summary",
            self.base_url
        );
        let auth = self.auth.clone();
        let mut request = self.client()?.get(&url);
        if let Some((user, pass)) = &auth {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ValetError::Api(format!(
                "GET {url} returned status {status}"
            )));
        }

        let issue: IssueResponse = response.json().await?;
        Ok(format!(
            "[{}] {}",
            issue.fields.status.name.to_uppercase(),
            issue.fields.summary
        ))
    }

    fn client(&mut self) -> Result<&Client> {
        if self.client.is_none() {
            self.client = Some(build_http_client(self.ca_certificate.as_deref())?);
        }
        Ok(self.client.as_ref().expect("client initialized above"))
    }
}
