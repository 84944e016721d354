use serde::{Deserialize, Serialize};

/// Final result of a completed build, plus the synthetic variant used
/// when a job has no build that survives filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    Aborted,
    Error,
    NoKnownBuilds,
}

impl BuildResult {
    /// Classify the result string the server reports. Anything the server
    /// invents beyond the documented set is bucketed as `Error`.
    pub fn from_api(result: &str) -> Self {
        match result {
            "SUCCESS" => Self::Success,
            "UNSTABLE" => Self::Unstable,
            "FAILURE" => Self::Failure,
            "ABORTED" => Self::Aborted,
            _ => Self::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Unstable => "UNSTABLE",
            Self::Failure => "FAILURE",
            Self::Aborted => "ABORTED",
            Self::Error => "ERROR",
            Self::NoKnownBuilds => "NO_KNOWN_BUILDS",
        }
    }

    /// Anything other than a passing build.
    pub fn is_broken(&self) -> bool {
        !matches!(self, Self::Success)
    }

    /// Results that get declared blockers attached in the report. ERROR
    /// rows stay bare: they widen the coverage denominator but nothing on
    /// file can cover them.
    pub fn takes_blockers(&self) -> bool {
        matches!(
            self,
            Self::Unstable | Self::Failure | Self::Aborted | Self::NoKnownBuilds
        )
    }
}

impl std::fmt::Display for BuildResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry from the server-wide job listing.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSummary {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct JobListResponse {
    #[serde(default)]
    pub jobs: Vec<JobSummary>,
}

/// Job metadata from `/job/<name>/api/json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub url: String,
    /// Recent builds, newest first. Running builds are included.
    #[serde(default)]
    pub builds: Vec<BuildRef>,
    pub last_completed_build: Option<BuildRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildRef {
    pub number: u32,
}

/// Build metadata from `/job/<name>/<number>/api/json`.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildInfo {
    pub number: u32,
    pub url: String,
    /// `None` while the build is still running.
    pub result: Option<String>,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Jenkins serializes every plugin contribution into the `actions` array;
/// only the fields we consume are modeled, everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Action {
    #[serde(rename = "_class", default)]
    pub class: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub causes: Vec<Cause>,
    #[serde(rename = "failCount", default)]
    pub fail_count: Option<u64>,
    /// Raw HTML badge some plugins attach; the compose id lives here.
    #[serde(default)]
    pub html: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl Parameter {
    pub fn value_str(&self) -> Option<String> {
        match &self.value {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cause {
    #[serde(rename = "_class", default)]
    pub class: Option<String>,
}

/// Pipeline stage detail from `/job/<name>/<number>/wfapi/describe`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageDescription {
    #[serde(default)]
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stage {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl StageDescription {
    /// Name of the first failed stage, if any.
    pub fn failed_stage(&self) -> Option<String> {
        self.stages
            .iter()
            .find(|stage| stage.status.as_deref() == Some("FAILED"))
            .map(|stage| stage.name.clone().unwrap_or_else(|| "N/A".to_string()))
    }
}
