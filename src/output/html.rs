use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use askama::Template;
use chrono::Local;
use clap::ValueEnum;

use crate::report::{ReportRow, Summary};

/// Context block rendered at the top of every report and reminder.
#[derive(Debug, Clone)]
pub struct Header {
    pub date: String,
    pub source: String,
    pub filter_param_name: Option<String>,
    pub filter_param_value: Option<String>,
}

impl Header {
    /// For reports the source is the job search fields; for reminders it
    /// is the blockers file, shown by filename only rather than full path.
    pub fn new(
        source: &str,
        filter_param_name: Option<String>,
        filter_param_value: Option<String>,
        remind: bool,
    ) -> Self {
        let source = if remind {
            source.rsplit('/').next().unwrap_or(source).to_string()
        } else {
            source.to_string()
        };
        Self {
            date: Local::now().format("%m/%d/%Y at %I:%M%p").to_string(),
            source,
            filter_param_name,
            filter_param_value,
        }
    }
}

/// Which built-in report layout to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportStyle {
    /// Full table with composes, test counts and the result chart
    #[default]
    Standard,
    /// Result and blockers only, for narrow mail clients
    Compact,
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    header: &'a Header,
    preamble: Option<&'a str>,
    rows: &'a [ReportRow],
    summary: &'a Summary,
}

#[derive(Template)]
#[template(path = "report_compact.html")]
struct CompactReportTemplate<'a> {
    header: &'a Header,
    preamble: Option<&'a str>,
    rows: &'a [ReportRow],
    summary: &'a Summary,
}

#[derive(Template)]
#[template(path = "remind.html")]
struct RemindTemplate<'a> {
    header: &'a Header,
    owner: &'a str,
    rows: &'a [ReportRow],
}

pub fn render_report(
    style: ReportStyle,
    header: &Header,
    preamble: Option<&str>,
    rows: &[ReportRow],
    summary: &Summary,
) -> Result<String> {
    let html = match style {
        ReportStyle::Standard => ReportTemplate {
            header,
            preamble,
            rows,
            summary,
        }
        .render(),
        ReportStyle::Compact => CompactReportTemplate {
            header,
            preamble,
            rows,
            summary,
        }
        .render(),
    };
    html.context("Failed to render report template")
}

pub fn render_reminder(header: &Header, owner: &str, rows: &[ReportRow]) -> Result<String> {
    RemindTemplate {
        header,
        owner,
        rows,
    }
    .render()
    .context("Failed to render reminder template")
}

/// What an archived HTML file holds; controls its filename prefix.
#[derive(Debug, Clone, Copy)]
pub enum ReportKind {
    Report,
    Reminder,
}

impl ReportKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Reminder => "reminder",
        }
    }
}

/// Writes the rendered HTML into the archive directory with a timestamped
/// name and returns the path.
pub fn archive_html(archive_dir: &Path, kind: ReportKind, htmlcode: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(archive_dir)
        .with_context(|| format!("Failed to create archive dir: {}", archive_dir.display()))?;

    let filename = format!(
        "{}_{}.html",
        kind.prefix(),
        Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let path = archive_dir.join(filename);
    std::fs::write(&path, htmlcode)
        .with_context(|| format!("Failed to write HTML file: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockers::OtherRef;
    use crate::jenkins::{BuildResult, BuildSnapshot};
    use crate::trackers::ResolvedRef;
    use crate::version::Version;

    fn sample_header() -> Header {
        Header {
            date: "01/02/2026 at 09:00AM".to_string(),
            source: "compute, network".to_string(),
            filter_param_name: None,
            filter_param_value: None,
        }
    }

    fn failed_row() -> ReportRow {
        ReportRow {
            version: Version {
                major: 16,
                minor: Some(2),
            },
            job_name: "DFG-compute-nova-16.2".to_string(),
            job_url: "http://jenkins/job/DFG-compute-nova-16.2/".to_string(),
            build: BuildSnapshot {
                result: BuildResult::Failure,
                number: Some(12),
                url: Some("http://jenkins/job/DFG-compute-nova-16.2/12/".to_string()),
                compose: "RHOS-16.2-RHEL-8-20220104.n.1".to_string(),
                second_compose: None,
                days_ago: Some(3),
                failed_stage: Some("Deploy".to_string()),
                failed_tests: Some(7),
            },
            bugs: vec![ResolvedRef {
                label: "[POST] deploy fails".to_string(),
                url: "http://bugzilla/show_bug.cgi?id=111".to_string(),
            }],
            tickets: Vec::new(),
            other: vec![OtherRef {
                name: "triage notes".to_string(),
                url: Some("http://etherpad/triage".to_string()),
            }],
            has_blockers: true,
            test_report_url: Some(
                "http://jenkins/job/DFG-compute-nova-16.2/12/testReport".to_string(),
            ),
            stage_urls: vec![
                "http://jenkins/job/DFG-compute-nova-16.2/12/artifact/logs/deploy.log".to_string(),
            ],
        }
    }

    fn sample_summary() -> Summary {
        Summary {
            total_jobs: 1,
            num_failure: 1,
            num_covered: 1,
            bug_total: 1,
            bug_unique: 1,
            chart_url: "https://quickchart.io/chart?c=%7B%7D".to_string(),
            ..Summary::default()
        }
    }

    #[test]
    fn test_header_remind_shows_filename_only() {
        let header = Header::new("/home/ci/conf/blockers.yaml", None, None, true);
        assert_eq!(header.source, "blockers.yaml");

        let header = Header::new("compute, network", None, None, false);
        assert_eq!(header.source, "compute, network");
    }

    #[test]
    fn test_report_template_renders_rows_and_summary() {
        let rows = vec![failed_row()];
        let html = render_report(
            ReportStyle::Standard,
            &sample_header(),
            Some("<p>maintenance window Friday</p>"),
            &rows,
            &sample_summary(),
        )
        .unwrap();

        assert!(html.contains("DFG-compute-nova-16.2"));
        assert!(html.contains("FAILURE"));
        assert!(html.contains("[POST] deploy fails"));
        assert!(html.contains("maintenance window Friday"));
        assert!(html.contains("quickchart.io"));
        assert!(html.contains("RHOS-16.2-RHEL-8-20220104.n.1"));
    }

    #[test]
    fn test_compact_template_skips_compose() {
        let rows = vec![failed_row()];
        let html = render_report(
            ReportStyle::Compact,
            &sample_header(),
            None,
            &rows,
            &sample_summary(),
        )
        .unwrap();

        assert!(html.contains("DFG-compute-nova-16.2"));
        assert!(!html.contains("RHOS-16.2-RHEL-8-20220104.n.1"));
    }

    #[test]
    fn test_reminder_template_lists_stage_logs() {
        let rows = vec![failed_row()];
        let html = render_reminder(&sample_header(), "owner@example.com", &rows).unwrap();

        assert!(html.contains("owner@example.com"));
        assert!(html.contains("Deploy"));
        assert!(html.contains("logs/deploy.log"));
    }

    #[test]
    fn test_archive_html_writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = archive_html(dir.path(), ReportKind::Report, "<html></html>").unwrap();

        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("report_"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html></html>");
    }
}
