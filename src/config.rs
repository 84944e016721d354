use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::jenkins::BuildFilter;
use crate::version;

/// Run configuration for valet.
///
/// Server URLs, credentials and delivery settings live here; which jobs
/// have known blockers lives in the separate blockers file. YAML is the
/// primary format, TOML and JSON are accepted by extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Jenkins base URL (required)
    #[serde(default)]
    pub jenkins_url: String,

    /// Jenkins API credentials, for servers that refuse anonymous reads
    pub jenkins_username: Option<String>,
    pub jenkins_api_token: Option<String>,

    /// Comma-separated regex fields selecting jobs by name (required)
    #[serde(default)]
    pub job_search_fields: String,

    /// Bugzilla base URL (required)
    #[serde(default)]
    pub bz_url: String,

    /// Jira base URL (required) and credentials
    #[serde(default)]
    pub jira_url: String,
    pub jira_username: Option<String>,
    pub jira_password: Option<String>,

    /// PEM CA certificate for internally-signed server endpoints
    pub certificate: Option<PathBuf>,

    /// Email delivery settings, required unless running with --no-email
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default)]
    pub email_subject: String,
    #[serde(default)]
    pub email_from: String,
    /// Comma-separated recipient list
    #[serde(default)]
    pub email_to: String,
    /// Recipient override for --test-email runs
    #[serde(default)]
    pub email_to_test: String,

    /// Only report builds where this parameter carried this value
    pub filter_param_name: Option<String>,
    pub filter_param_value: Option<String>,

    /// Only report builds triggered by a cause of this class
    pub cause_action_class: Option<String>,

    /// Failed stage name -> artifact paths worth linking in reminders
    #[serde(default)]
    pub stage_logs: IndexMap<String, Vec<String>>,

    /// Override for the version-extraction pattern
    pub version_pattern: Option<String>,

    /// Where archived HTML reports land; defaults to ./archive
    pub archive_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            _ => {
                // Try YAML first, then TOML, then JSON
                serde_yaml::from_str(&contents)
                    .or_else(|_| toml::from_str(&contents).map_err(anyhow::Error::from))
                    .or_else(|_| serde_json::from_str(&contents).map_err(anyhow::Error::from))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }

    /// Validates that every field the requested run needs is present.
    ///
    /// Email fields are only required when a report will actually be
    /// mailed; the test recipient only when --test-email is in effect.
    pub fn validate(&self, no_email: bool, test_email: bool) -> Result<()> {
        let mut required: Vec<(&str, &str)> = vec![
            ("jenkins_url", &self.jenkins_url),
            ("job_search_fields", &self.job_search_fields),
            ("bz_url", &self.bz_url),
            ("jira_url", &self.jira_url),
        ];

        if !no_email {
            required.push(("smtp_host", &self.smtp_host));
            required.push(("email_subject", &self.email_subject));
            required.push(("email_from", &self.email_from));
            required.push(("email_to", &self.email_to));
        }
        if test_email {
            required.push(("email_to_test", &self.email_to_test));
        }

        for (name, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("field \"{name}\" is not defined");
            }
        }
        Ok(())
    }

    /// The version-extraction pattern, custom or default.
    pub fn version_pattern(&self) -> Result<Regex> {
        match &self.version_pattern {
            Some(pattern) => Regex::new(pattern)
                .with_context(|| format!("Invalid version_pattern: {pattern}")),
            None => Ok(version::default_pattern()),
        }
    }

    /// Build-selection criteria assembled from the optional filter fields.
    pub fn build_filter(&self) -> BuildFilter {
        BuildFilter {
            param_name: self.filter_param_name.clone(),
            param_value: self.filter_param_value.clone(),
            cause_class: self.cause_action_class.clone(),
        }
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("archive"))
    }

    /// Log-artifact URLs for a failed stage of a given build.
    pub fn stage_log_urls(
        &self,
        failed_stage: &str,
        job_url: &str,
        build_number: u32,
    ) -> Vec<String> {
        self.stage_logs
            .get(failed_stage)
            .map(|paths| {
                paths
                    .iter()
                    .map(|path| {
                        format!(
                            "{}/{build_number}/artifact/{path}",
                            job_url.trim_end_matches('/')
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
