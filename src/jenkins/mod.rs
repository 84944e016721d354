mod builds;
mod client;
mod types;

pub use builds::{last_completed_build, BuildFilter, BuildSnapshot, LastCompletedBuild};
pub use client::{build_http_client, JenkinsClient};
pub use types::{BuildResult, JobSummary};
