use chrono::Utc;
use log::{debug, warn};

use crate::error::Result;

use super::client::JenkinsClient;
use super::types::{BuildInfo, BuildResult};

const COMPOSE_MARKER: &str = "core_puddle:";

/// Parameters a build must carry before it can represent a job in the
/// report. Builds that fail any active criterion are skipped and the scan
/// moves to the next older build.
#[derive(Debug, Clone, Default)]
pub struct BuildFilter {
    /// Keep only builds where this parameter carries `param_value`.
    pub param_name: Option<String>,
    pub param_value: Option<String>,
    /// Keep only builds triggered by a cause of this class.
    pub cause_class: Option<String>,
}

impl BuildFilter {
    fn param_filter(&self) -> Option<(&str, &str)> {
        match (&self.param_name, &self.param_value) {
            (Some(name), Some(value)) => Some((name, value)),
            _ => None,
        }
    }
}

/// What we know about the build chosen to represent a job.
#[derive(Debug, Clone)]
pub struct BuildSnapshot {
    pub result: BuildResult,
    pub number: Option<u32>,
    pub url: Option<String>,
    pub compose: String,
    pub second_compose: Option<String>,
    pub days_ago: Option<i64>,
    pub failed_stage: Option<String>,
    pub failed_tests: Option<u64>,
}

impl BuildSnapshot {
    /// Synthetic snapshot for a job whose history holds no build that
    /// survives filtering. Not an error: the job still gets a report row.
    pub fn no_known_builds() -> Self {
        Self {
            result: BuildResult::NoKnownBuilds,
            number: None,
            url: None,
            compose: "N/A".to_string(),
            second_compose: None,
            days_ago: None,
            failed_stage: None,
            failed_tests: None,
        }
    }
}

/// A job's URL together with its selected build.
#[derive(Debug, Clone)]
pub struct LastCompletedBuild {
    pub job_url: String,
    pub build: BuildSnapshot,
}

/// Finds the most recent completed build satisfying the filter.
///
/// Scans the build history newest first, skipping periodic runs, builds
/// tied to a review patch, and builds failing the caller's parameter or
/// cause criteria. Exhausting the history degrades to a
/// `NO_KNOWN_BUILDS` snapshot; a transport failure on a job with real
/// history is returned as an error so the caller can skip the job.
pub async fn last_completed_build(
    client: &JenkinsClient,
    job_name: &str,
    filter: &BuildFilter,
) -> Result<LastCompletedBuild> {
    let job_info = client.job_info(job_name).await?;
    let job_url = job_info.url.clone();

    let Some(last_completed) = job_info.last_completed_build else {
        return Ok(LastCompletedBuild {
            job_url,
            build: BuildSnapshot::no_known_builds(),
        });
    };

    // newest first, bounded by the last *completed* build; the raw list
    // also holds builds that are still running
    let mut numbers: Vec<u32> = job_info
        .builds
        .iter()
        .map(|build| build.number)
        .filter(|&number| number <= last_completed.number)
        .collect();
    numbers.sort_unstable_by(|a, b| b.cmp(a));

    for number in numbers {
        let build = match client.build_info(job_name, number).await {
            Ok(build) => build,
            Err(e) => {
                // a single listed build that cannot be fetched means the
                // job has no usable history, not a broken server
                if job_info.builds.len() <= 1 {
                    return Ok(LastCompletedBuild {
                        job_url,
                        build: BuildSnapshot::no_known_builds(),
                    });
                }
                return Err(e);
            }
        };

        if build.result.is_none() {
            continue;
        }
        if let Some(reason) = exclusion_reason(&build, filter) {
            debug!("Skipping build {number} of {job_name}: {reason}");
            continue;
        }

        let snapshot = snapshot(client, job_name, build).await;
        return Ok(LastCompletedBuild {
            job_url,
            build: snapshot,
        });
    }

    Ok(LastCompletedBuild {
        job_url,
        build: BuildSnapshot::no_known_builds(),
    })
}

/// Why a build cannot represent its job, or `None` when it can.
fn exclusion_reason(build: &BuildInfo, filter: &BuildFilter) -> Option<&'static str> {
    if is_periodic(build) {
        return Some("periodic run");
    }
    if is_review_patch(build) {
        return Some("tied to a review patch");
    }
    if let Some((name, value)) = filter.param_filter() {
        if parameter_value(build, name).as_deref() != Some(value) {
            return Some("filter parameter mismatch");
        }
    }
    if let Some(cause_class) = filter.cause_class.as_deref() {
        let matched = build
            .actions
            .iter()
            .flat_map(|action| action.causes.iter())
            .any(|cause| cause.class.as_deref() == Some(cause_class));
        if !matched {
            return Some("cause class mismatch");
        }
    }
    None
}

fn is_periodic(build: &BuildInfo) -> bool {
    build
        .actions
        .iter()
        .flat_map(|action| action.causes.iter())
        .any(|cause| {
            cause
                .class
                .as_deref()
                .is_some_and(|class| class.contains("TimerTrigger"))
        })
}

fn is_review_patch(build: &BuildInfo) -> bool {
    const REVIEW_PARAMS: [&str; 2] = ["GERRIT_REFSPEC", "GERRIT_CHANGE_NUMBER"];
    REVIEW_PARAMS.iter().any(|name| {
        parameter_value(build, name).is_some_and(|value| !value.is_empty() && value != "null")
    })
}

fn parameter_value(build: &BuildInfo, name: &str) -> Option<String> {
    build
        .actions
        .iter()
        .filter(|action| {
            action.class.as_deref().is_some_and(|class| {
                class.ends_with("ParametersAction") || class.ends_with("MultiJobParametersAction")
            })
        })
        .flat_map(|action| action.parameters.iter())
        .find(|param| param.name.as_deref() == Some(name))
        .and_then(|param| param.value_str())
}

async fn snapshot(client: &JenkinsClient, job_name: &str, build: BuildInfo) -> BuildSnapshot {
    let result = build
        .result
        .as_deref()
        .map(BuildResult::from_api)
        .unwrap_or(BuildResult::Error);

    let failed_stage = if result == BuildResult::Unstable || result == BuildResult::Failure {
        match client.build_stages(job_name, build.number).await {
            Ok(stages) => stages.failed_stage(),
            Err(e) => {
                warn!("Could not fetch stages for build {} of {job_name}: {e}", build.number);
                None
            }
        }
    } else {
        None
    };

    let failed_tests = build
        .actions
        .iter()
        .find(|action| {
            action
                .class
                .as_deref()
                .is_some_and(|class| class.ends_with("TestResultAction"))
        })
        .and_then(|action| action.fail_count);

    let composes = parse_composes(&build);
    let (compose, second_compose) = match composes.len() {
        // likely a failed run where the compose was never calculated
        0 => ("Could not find compose".to_string(), None),
        // two composes means an update or upgrade job
        2 => (composes[0].clone(), Some(composes[1].clone())),
        _ => (composes[0].clone(), None),
    };

    let days_ago = Some((Utc::now().timestamp_millis() - build.timestamp) / 86_400_000);

    BuildSnapshot {
        result,
        number: Some(build.number),
        url: Some(build.url),
        compose,
        second_compose,
        days_ago,
        failed_stage,
        failed_tests,
    }
}

/// Pulls compose identifiers out of the HTML badges plugins attach to a
/// build, e.g. `... core_puddle: RHOS-16.2-20220104.n.1<br> ...`.
fn parse_composes(build: &BuildInfo) -> Vec<String> {
    build
        .actions
        .iter()
        .filter_map(|action| action.html.as_deref())
        .filter_map(|html| {
            let start = html.find(COMPOSE_MARKER)? + COMPOSE_MARKER.len();
            let rest = &html[start..];
            let end = rest.find('<').unwrap_or(rest.len());
            Some(rest[..end].trim().to_string())
        })
        .filter(|compose| !compose.is_empty())
        .collect()
}
