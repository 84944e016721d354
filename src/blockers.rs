use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::warn;
use serde::Deserialize;

/// Sentinel id meaning "no blocker on file". Never forwarded to a tracker.
const SENTINEL_BUG: u64 = 0;
const SENTINEL_TICKET: &str = "0";

/// One job's entry in the blocker declaration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockerEntry {
    #[serde(default)]
    pub bz: Vec<u64>,
    #[serde(default, deserialize_with = "string_or_int_list")]
    pub jira: Vec<String>,
    #[serde(default)]
    pub other: Vec<OtherBlocker>,
    #[serde(default)]
    pub owners: Vec<String>,
}

/// A free-form blocker reference: an ad-hoc link with an optional label.
#[derive(Debug, Clone, Deserialize)]
pub struct OtherBlocker {
    pub name: Option<String>,
    pub url: Option<String>,
}

/// Parsed blocker declaration file, keyed by job name in file order.
#[derive(Debug, Clone, Default)]
pub struct BlockerFile {
    jobs: IndexMap<String, BlockerEntry>,
}

impl BlockerFile {
    /// Loads a blocker YAML file.
    ///
    /// An unreadable or syntactically invalid file is fatal; a job entry
    /// that does not match the expected shape is logged and dropped so one
    /// bad stanza cannot take down the whole run.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read blockers file: {}", path.display()))?;
        let raw: IndexMap<String, serde_yaml::Value> = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse blockers file: {}", path.display()))?;

        let mut jobs = IndexMap::new();
        for (job_name, value) in raw {
            match serde_yaml::from_value(value) {
                Ok(entry) => {
                    jobs.insert(job_name, entry);
                }
                Err(e) => {
                    warn!("Malformed blockers entry for job {job_name}: {e} - skipping");
                }
            }
        }
        Ok(Self { jobs })
    }

    pub fn from_entries(jobs: IndexMap<String, BlockerEntry>) -> Self {
        Self { jobs }
    }

    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// All unique bug ids across every job, sentinel excluded.
    pub fn bug_set(&self) -> BTreeSet<u64> {
        self.jobs
            .values()
            .flat_map(|entry| entry.bz.iter().copied())
            .filter(|&id| id != SENTINEL_BUG)
            .collect()
    }

    /// All unique ticket ids across every job, sentinel excluded.
    pub fn ticket_set(&self) -> BTreeSet<String> {
        self.jobs
            .values()
            .flat_map(|entry| entry.jira.iter().cloned())
            .filter(|id| id != SENTINEL_TICKET)
            .collect()
    }

    /// Bug ids declared for one job, sentinel excluded.
    pub fn bugs(&self, job_name: &str) -> Vec<u64> {
        self.jobs
            .get(job_name)
            .map(|entry| {
                entry
                    .bz
                    .iter()
                    .copied()
                    .filter(|&id| id != SENTINEL_BUG)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ticket ids declared for one job, sentinel excluded.
    pub fn tickets(&self, job_name: &str) -> Vec<String> {
        self.jobs
            .get(job_name)
            .map(|entry| {
                entry
                    .jira
                    .iter()
                    .filter(|id| id.as_str() != SENTINEL_TICKET)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Free-form blocker links declared for one job.
    pub fn other(&self, job_name: &str) -> Vec<OtherRef> {
        self.jobs
            .get(job_name)
            .map(|entry| {
                entry
                    .other
                    .iter()
                    .map(|blocker| OtherRef {
                        name: blocker.name.clone().unwrap_or_else(|| "Link".to_string()),
                        url: blocker.url.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn owners_of(&self, job_name: &str) -> &[String] {
        self.jobs
            .get(job_name)
            .map(|entry| entry.owners.as_slice())
            .unwrap_or_default()
    }

    /// Every owner named anywhere in the file.
    pub fn owner_set(&self) -> BTreeSet<String> {
        self.jobs
            .values()
            .flat_map(|entry| entry.owners.iter().cloned())
            .collect()
    }

    /// True when the job declares at least one real blocker in any category.
    pub fn has_blockers(&self, job_name: &str) -> bool {
        !self.bugs(job_name).is_empty()
            || !self.tickets(job_name).is_empty()
            || !self.other(job_name).is_empty()
    }
}

/// A resolved "other" blocker ready for rendering.
#[derive(Debug, Clone)]
pub struct OtherRef {
    pub name: String,
    pub url: Option<String>,
}

/// Ticket ids may be written as strings or bare integers (the sentinel 0
/// usually is); normalize both to strings.
fn string_or_int_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Num(u64),
        Text(String),
    }

    let raw = Vec::<RawId>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|id| match id {
            RawId::Num(n) => n.to_string(),
            RawId::Text(s) => s,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_str(yaml: &str) -> BlockerFile {
        let raw: IndexMap<String, serde_yaml::Value> = serde_yaml::from_str(yaml).unwrap();
        let mut jobs = IndexMap::new();
        for (name, value) in raw {
            if let Ok(entry) = serde_yaml::from_value(value) {
                jobs.insert(name, entry);
            }
        }
        BlockerFile::from_entries(jobs)
    }

    #[test]
    fn test_bug_set_excludes_sentinel() {
        let blockers = load_str(
            r#"
job1:
  bz: [0]
job2:
  bz: [123456]
job3:
  bz: [123456, 789123]
"#,
        );
        assert_eq!(blockers.bug_set(), BTreeSet::from([123456, 789123]));
    }

    #[test]
    fn test_ticket_set_excludes_sentinel() {
        let blockers = load_str(
            r#"
job1:
  jira: [0]
job2:
  jira: [RHOSINFRA-123]
job3:
  jira: [RHOSINFRA-123, RHOSENTDFG-456]
"#,
        );
        assert_eq!(
            blockers.ticket_set(),
            BTreeSet::from(["RHOSINFRA-123".to_string(), "RHOSENTDFG-456".to_string()])
        );
    }

    #[test]
    fn test_empty_file_yields_empty_sets() {
        let blockers = BlockerFile::default();
        assert!(blockers.bug_set().is_empty());
        assert!(blockers.ticket_set().is_empty());
        assert!(blockers.owner_set().is_empty());
    }

    #[test]
    fn test_has_blockers() {
        let blockers = load_str(
            r#"
job1:
  bz: [123456]
job2:
  jira: [RHOSINFRA-123]
job3:
  other:
    - name: custom link
      url: http://example.com
job4:
  bz: [0]
job5:
  jira: [0]
job6:
  other: []
job7:
  owners: [foo@bar.com]
job8:
  owners: [foo@bar.com]
  bz: [123456]
  jira: [RHOSINFRA-123]
job9: {}
"#,
        );
        assert!(blockers.has_blockers("job1"));
        assert!(blockers.has_blockers("job2"));
        assert!(blockers.has_blockers("job3"));
        assert!(!blockers.has_blockers("job4"));
        assert!(!blockers.has_blockers("job5"));
        assert!(!blockers.has_blockers("job6"));
        assert!(!blockers.has_blockers("job7"));
        assert!(blockers.has_blockers("job8"));
        assert!(!blockers.has_blockers("job9"));
        assert!(!blockers.has_blockers("job-not-listed"));
    }

    #[test]
    fn test_other_defaults_link_name() {
        let blockers = load_str(
            r#"
job1:
  other:
    - url: http://example.com/logs
"#,
        );
        let other = blockers.other("job1");
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].name, "Link");
        assert_eq!(other[0].url.as_deref(), Some("http://example.com/logs"));
    }

    #[test]
    fn test_owner_set_deduplicates() {
        let blockers = load_str(
            r#"
job1:
  owners: [a@example.com, b@example.com]
job2:
  owners: [a@example.com]
"#,
        );
        assert_eq!(
            blockers.owner_set(),
            BTreeSet::from(["a@example.com".to_string(), "b@example.com".to_string()])
        );
    }
}
