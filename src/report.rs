use std::collections::HashMap;

use anyhow::Result;
use log::{info, warn};

use crate::blockers::{BlockerFile, OtherRef};
use crate::config::Config;
use crate::jenkins::{self, BuildResult, BuildSnapshot, JenkinsClient};
use crate::output::html::{self, Header, ReportKind, ReportStyle};
use crate::output::{mail, print_summary, PhaseProgress};
use crate::trackers::{BugzillaResolver, JiraResolver, ResolvedRef};
use crate::version::{self, Version};

/// A job after version extraction and build selection, before blocker
/// attachment.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_name: String,
    pub version: Version,
    pub job_url: String,
    pub build: BuildSnapshot,
}

/// One line of the rendered report.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub version: Version,
    pub job_name: String,
    pub job_url: String,
    pub build: BuildSnapshot,
    pub bugs: Vec<ResolvedRef>,
    pub tickets: Vec<ResolvedRef>,
    pub other: Vec<OtherRef>,
    pub has_blockers: bool,
    pub test_report_url: Option<String>,
    /// Log links for the failed stage; only populated for reminders.
    pub stage_urls: Vec<String>,
}

/// Aggregated result metrics across every row.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub total_jobs: usize,
    pub num_success: usize,
    pub num_unstable: usize,
    pub num_failure: usize,
    pub num_aborted: usize,
    pub num_missing: usize,
    pub num_error: usize,
    /// Broken jobs with at least one declared blocker.
    pub num_covered: usize,
    pub bug_total: usize,
    pub bug_unique: usize,
    pub ticket_total: usize,
    pub ticket_unique: usize,
    pub chart_url: String,
}

impl Summary {
    pub fn success_line(&self) -> String {
        format!(
            "Total SUCCESS:  {}/{} = {:.1}%",
            self.num_success,
            self.total_jobs,
            percent(self.num_success, self.total_jobs)
        )
    }

    pub fn unstable_line(&self) -> String {
        format!(
            "Total UNSTABLE: {}/{} = {:.1}%",
            self.num_unstable,
            self.total_jobs,
            percent(self.num_unstable, self.total_jobs)
        )
    }

    pub fn failure_line(&self) -> String {
        format!(
            "Total FAILURE:  {}/{} = {:.1}%",
            self.num_failure,
            self.total_jobs,
            percent(self.num_failure, self.total_jobs)
        )
    }

    pub fn broken_jobs(&self) -> usize {
        self.total_jobs - self.num_success
    }

    pub fn coverage_line(&self) -> String {
        format!(
            "Total bz/jira/other coverage:  {}/{} = {:.1}%",
            self.num_covered,
            self.broken_jobs(),
            percent(self.num_covered, self.broken_jobs())
        )
    }

    pub fn bugs_line(&self) -> String {
        if self.bug_total == 0 {
            "Blocker Bugs: 0 total".to_string()
        } else {
            format!(
                "Blocker Bugs: {} total, {} unique",
                self.bug_total, self.bug_unique
            )
        }
    }

    pub fn tickets_line(&self) -> String {
        if self.ticket_total == 0 {
            "Blocker Tickets: 0 total".to_string()
        } else {
            format!(
                "Blocker Tickets: {} total, {} unique",
                self.ticket_total, self.ticket_unique
            )
        }
    }

    pub fn aborted_line(&self) -> Option<String> {
        (self.num_aborted > 0).then(|| {
            format!(
                "Total ABORTED:  {}/{} = {:.1}%",
                self.num_aborted,
                self.total_jobs,
                percent(self.num_aborted, self.total_jobs)
            )
        })
    }

    pub fn missing_line(&self) -> Option<String> {
        (self.num_missing > 0).then(|| {
            format!(
                "Total NO_KNOWN_BUILDS:  {}/{} = {:.1}%",
                self.num_missing,
                self.total_jobs,
                percent(self.num_missing, self.total_jobs)
            )
        })
    }

    pub fn error_line(&self) -> Option<String> {
        (self.num_error > 0).then(|| {
            format!(
                "Total ERROR:  {}/{} = {:.1}%",
                self.num_error,
                self.total_jobs,
                percent(self.num_error, self.total_jobs)
            )
        })
    }
}

/// Percentage rounded to one decimal. A zero denominator yields 0 rather
/// than a division error: an empty category is simply empty.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (1000.0 * part as f64 / whole as f64).round() / 10.0
}

/// Folds job outcomes and their blocker declarations into report rows and
/// a summary. Pure aggregation: every total is computed and returned here,
/// nothing is accumulated through shared state.
pub fn aggregate(
    outcomes: Vec<JobOutcome>,
    blockers: &BlockerFile,
    bugs_by_id: &HashMap<u64, ResolvedRef>,
    tickets_by_id: &HashMap<String, ResolvedRef>,
) -> (Vec<ReportRow>, Summary) {
    let mut summary = Summary::default();
    let mut all_bugs: Vec<u64> = Vec::new();
    let mut all_tickets: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(outcomes.len());

    for outcome in outcomes {
        match outcome.build.result {
            BuildResult::Success => summary.num_success += 1,
            BuildResult::Unstable => summary.num_unstable += 1,
            BuildResult::Failure => summary.num_failure += 1,
            BuildResult::Aborted => summary.num_aborted += 1,
            BuildResult::NoKnownBuilds => summary.num_missing += 1,
            BuildResult::Error => summary.num_error += 1,
        }

        // passing and ERROR jobs carry no blockers no matter what is on file
        let (bugs, tickets, other) = if outcome.build.result.takes_blockers() {
            let bug_ids = blockers.bugs(&outcome.job_name);
            let ticket_ids = blockers.tickets(&outcome.job_name);
            all_bugs.extend(&bug_ids);
            all_tickets.extend(ticket_ids.iter().cloned());

            let bugs: Vec<ResolvedRef> = bug_ids
                .iter()
                .filter_map(|id| bugs_by_id.get(id).cloned())
                .collect();
            let tickets: Vec<ResolvedRef> = ticket_ids
                .iter()
                .filter_map(|id| tickets_by_id.get(id).cloned())
                .collect();
            let other = blockers.other(&outcome.job_name);

            if !bugs.is_empty() || !tickets.is_empty() || !other.is_empty() {
                summary.num_covered += 1;
            }
            (bugs, tickets, other)
        } else {
            (Vec::new(), Vec::new(), Vec::new())
        };

        let has_blockers = !bugs.is_empty() || !tickets.is_empty() || !other.is_empty();
        let test_report_url = outcome
            .build
            .url
            .as_ref()
            .map(|url| format!("{}testReport", url));

        rows.push(ReportRow {
            version: outcome.version,
            job_name: outcome.job_name,
            job_url: outcome.job_url,
            build: outcome.build,
            bugs,
            tickets,
            other,
            has_blockers,
            test_report_url,
            stage_urls: Vec::new(),
        });
    }

    sort_rows(&mut rows);

    summary.total_jobs = rows.len();
    summary.bug_total = all_bugs.len();
    summary.bug_unique = {
        let unique: std::collections::HashSet<_> = all_bugs.iter().collect();
        unique.len()
    };
    summary.ticket_total = all_tickets.len();
    summary.ticket_unique = {
        let unique: std::collections::HashSet<_> = all_tickets.iter().collect();
        unique.len()
    };
    summary.chart_url = chart_url(&summary);

    (rows, summary)
}

/// Descending version, then job name for a stable order between runs.
pub fn sort_rows(rows: &mut [ReportRow]) {
    rows.sort_by(|a, b| {
        b.version
            .cmp(&a.version)
            .then_with(|| a.job_name.cmp(&b.job_name))
    });
}

/// Doughnut chart of the result distribution, rendered by quickchart.io.
fn chart_url(summary: &Summary) -> String {
    let buckets = [
        ("#3465a4", summary.num_success, "Success"),
        ("#515151", summary.num_aborted, "Aborted"),
        ("#ef2929", summary.num_failure, "Failure"),
        ("#704426", summary.num_error, "Error"),
        ("#ffb738", summary.num_unstable, "Unstable"),
        ("#bbbbbb", summary.num_missing, "Missing"),
    ];

    let mut colors = Vec::new();
    let mut data = Vec::new();
    let mut labels = Vec::new();
    for (color, count, label) in buckets {
        if count != 0 {
            colors.push(color);
            data.push(count);
            labels.push(label);
        }
    }

    let chart_config = serde_json::json!({
        "type": "doughnut",
        "data": {
            "labels": labels,
            "datasets": [{
                "backgroundColor": colors,
                "data": data
            }]
        },
        "options": {
            "plugins": {
                "datalabels": {
                    "display": "true",
                    "align": "middle",
                    "backgroundColor": "#fff",
                    "borderRadius": 20,
                    "font": { "weight": "bold" }
                },
                "doughnutlabel": {
                    "labels": [
                        { "text": summary.total_jobs, "font": { "size": 20 } },
                        { "text": "Total Jobs", "font": { "size": 15 } }
                    ]
                }
            }
        }
    });

    let encoded: String =
        url::form_urlencoded::byte_serialize(chart_config.to_string().as_bytes()).collect();
    format!("https://quickchart.io/chart?c={encoded}")
}

/// Options carried in from the command line for a report run.
pub struct ReportOptions {
    pub preamble: Option<String>,
    pub no_email: bool,
    pub test_email: bool,
    pub style: ReportStyle,
}

/// Generates the full status report: fetch, classify, aggregate, render,
/// archive and (unless told otherwise) mail.
pub async fn run_report(
    config: &Config,
    blockers: &BlockerFile,
    jenkins: &JenkinsClient,
    header: &Header,
    opts: &ReportOptions,
) -> Result<()> {
    let progress = PhaseProgress::start_phase_1();
    let jobs = jenkins.search_jobs(&config.job_search_fields).await?;
    if jobs.is_empty() {
        info!("No jobs found with given search field. Exiting...");
        return Ok(());
    }

    let progress = progress.finish_phase_1_start_phase_2();
    let mut bugzilla = BugzillaResolver::new(&config.bz_url, config.certificate.as_deref());
    let bugs_by_id = bugzilla.resolve(&blockers.bug_set()).await;
    let mut jira = JiraResolver::new(
        &config.jira_url,
        config.jira_username.as_deref(),
        config.jira_password.as_deref(),
        config.certificate.as_deref(),
    );
    let tickets_by_id = jira.resolve(&blockers.ticket_set()).await;

    let progress = progress.finish_phase_2_start_phase_3();
    let pattern = config.version_pattern()?;
    let filter = config.build_filter();

    let mut outcomes = Vec::new();
    for job in jobs {
        let Some(version) = version::extract_version(&job.name, &pattern) else {
            warn!("No version could be found in job {}. Skipping...", job.name);
            continue;
        };
        match jenkins::last_completed_build(jenkins, &job.name, &filter).await {
            Ok(lcb) => outcomes.push(JobOutcome {
                job_name: job.name,
                version,
                job_url: lcb.job_url,
                build: lcb.build,
            }),
            Err(e) => {
                warn!("Jenkins API call error on job {}: {e} - skipping...", job.name);
            }
        }
    }

    let (rows, summary) = aggregate(outcomes, blockers, &bugs_by_id, &tickets_by_id);
    progress.finish_phase_3();

    if rows.is_empty() {
        info!("No rows could be built for any of the jobs found. Exiting...");
        return Ok(());
    }

    let htmlcode = html::render_report(opts.style, header, opts.preamble.as_deref(), &rows, &summary)?;
    print_summary(&summary);

    if !opts.test_email {
        let filename = html::archive_html(&config.archive_dir(), ReportKind::Report, &htmlcode)?;
        info!("HTML file generated as {}", filename.display());
    }

    if !opts.no_email {
        let recipients: Vec<String> = if opts.test_email {
            mail::split_recipients(&config.email_to_test)
        } else {
            mail::split_recipients(&config.email_to)
        };
        match mail::send_html(
            &config.smtp_host,
            &config.email_from,
            &recipients,
            &config.email_subject,
            &htmlcode,
        ) {
            Ok(()) => info!("Report successfully accepted by mail server for delivery"),
            Err(e) => {
                warn!("Error sending email report: {e}\nSee HTML file saved in archive folder");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockers::BlockerEntry;
    use indexmap::IndexMap;

    fn outcome(name: &str, major: u32, minor: Option<u32>, result: BuildResult) -> JobOutcome {
        let mut build = BuildSnapshot::no_known_builds();
        build.result = result;
        if result != BuildResult::NoKnownBuilds {
            build.number = Some(1);
            build.url = Some(format!("http://jenkins/job/{name}/1/"));
        }
        JobOutcome {
            job_name: name.to_string(),
            version: Version { major, minor },
            job_url: format!("http://jenkins/job/{name}/"),
            build,
        }
    }

    fn blockers_with(entries: &[(&str, BlockerEntry)]) -> BlockerFile {
        let mut map = IndexMap::new();
        for (name, entry) in entries {
            map.insert(name.to_string(), entry.clone());
        }
        BlockerFile::from_entries(map)
    }

    fn resolved(label: &str) -> ResolvedRef {
        ResolvedRef {
            label: label.to_string(),
            url: format!("http://tracker/{label}"),
        }
    }

    #[test]
    fn test_percent_zero_denominator() {
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(percent(0, 0), 0.0);
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(2, 3), 66.7);
        assert_eq!(percent(3, 3), 100.0);
    }

    #[test]
    fn test_success_job_contributes_no_blockers() {
        let blockers = blockers_with(&[(
            "jobA",
            BlockerEntry {
                bz: vec![111],
                ..BlockerEntry::default()
            },
        )]);
        let bugs = HashMap::from([(111, resolved("[POST] some bug"))]);

        let (rows, summary) = aggregate(
            vec![outcome("jobA", 16, None, BuildResult::Success)],
            &blockers,
            &bugs,
            &HashMap::new(),
        );

        assert_eq!(rows.len(), 1);
        assert!(rows[0].bugs.is_empty());
        assert!(!rows[0].has_blockers);
        assert_eq!(summary.bug_total, 0);
        assert_eq!(summary.num_covered, 0);
    }

    #[test]
    fn test_failed_job_attaches_resolved_blockers() {
        let blockers = blockers_with(&[(
            "jobB",
            BlockerEntry {
                bz: vec![111],
                jira: vec!["RHOSINFRA-1".to_string()],
                ..BlockerEntry::default()
            },
        )]);
        let bugs = HashMap::from([(111, resolved("[POST] some bug"))]);
        let tickets = HashMap::from([("RHOSINFRA-1".to_string(), resolved("[OPEN] a ticket"))]);

        let (rows, summary) = aggregate(
            vec![outcome("jobB", 16, Some(2), BuildResult::Failure)],
            &blockers,
            &bugs,
            &tickets,
        );

        assert_eq!(rows[0].bugs.len(), 1);
        assert_eq!(rows[0].tickets.len(), 1);
        assert!(rows[0].has_blockers);
        assert_eq!(summary.num_covered, 1);
        assert_eq!(summary.bug_total, 1);
        assert_eq!(summary.bug_unique, 1);
    }

    #[test]
    fn test_error_row_stays_uncovered() {
        let blockers = blockers_with(&[(
            "jobA",
            BlockerEntry {
                bz: vec![111],
                ..BlockerEntry::default()
            },
        )]);
        let bugs = HashMap::from([(111, resolved("[POST] some bug"))]);

        let (rows, summary) = aggregate(
            vec![outcome("jobA", 16, None, BuildResult::Error)],
            &blockers,
            &bugs,
            &HashMap::new(),
        );

        // an ERROR row widens the coverage denominator but never attaches
        // blockers and never counts as covered
        assert!(rows[0].bugs.is_empty());
        assert!(!rows[0].has_blockers);
        assert_eq!(summary.num_error, 1);
        assert_eq!(summary.num_covered, 0);
        assert_eq!(summary.bug_total, 0);
        assert_eq!(summary.broken_jobs(), 1);
    }

    #[test]
    fn test_sentinel_only_job_counts_nothing() {
        let blockers = blockers_with(&[
            (
                "jobA",
                BlockerEntry {
                    bz: vec![0],
                    ..BlockerEntry::default()
                },
            ),
            (
                "jobB",
                BlockerEntry {
                    bz: vec![111],
                    ..BlockerEntry::default()
                },
            ),
        ]);
        assert_eq!(blockers.bug_set(), std::collections::BTreeSet::from([111]));

        let bugs = HashMap::from([(111, resolved("[POST] some bug"))]);
        let (rows, summary) = aggregate(
            vec![
                outcome("jobA", 16, None, BuildResult::Failure),
                outcome("jobB", 16, None, BuildResult::Failure),
            ],
            &blockers,
            &bugs,
            &HashMap::new(),
        );

        // jobA has only the sentinel on file: uncovered, no bug refs
        let row_a = rows.iter().find(|r| r.job_name == "jobA").unwrap();
        assert!(row_a.bugs.is_empty());
        assert!(!row_a.has_blockers);
        assert_eq!(summary.num_covered, 1);
        assert_eq!(summary.bug_total, 1);
    }

    #[test]
    fn test_rows_sorted_by_descending_version() {
        let (rows, _) = aggregate(
            vec![
                outcome("job-13", 13, None, BuildResult::Success),
                outcome("job-16.2", 16, Some(2), BuildResult::Success),
                outcome("job-16", 16, None, BuildResult::Success),
                outcome("job-16.1", 16, Some(1), BuildResult::Success),
            ],
            &BlockerFile::default(),
            &HashMap::new(),
            &HashMap::new(),
        );

        let names: Vec<&str> = rows.iter().map(|r| r.job_name.as_str()).collect();
        assert_eq!(names, vec!["job-16.2", "job-16.1", "job-16", "job-13"]);
    }

    #[test]
    fn test_duplicate_bugs_counted_raw_and_unique() {
        let entry = BlockerEntry {
            bz: vec![111],
            ..BlockerEntry::default()
        };
        let blockers = blockers_with(&[("jobA", entry.clone()), ("jobB", entry)]);
        let bugs = HashMap::from([(111, resolved("[POST] some bug"))]);

        let (_, summary) = aggregate(
            vec![
                outcome("jobA", 16, None, BuildResult::Failure),
                outcome("jobB", 13, None, BuildResult::Unstable),
            ],
            &blockers,
            &bugs,
            &HashMap::new(),
        );

        assert_eq!(summary.bug_total, 2);
        assert_eq!(summary.bug_unique, 1);
        assert_eq!(summary.bugs_line(), "Blocker Bugs: 2 total, 1 unique");
    }

    #[test]
    fn test_coverage_line_uses_broken_jobs_denominator() {
        let blockers = blockers_with(&[(
            "jobB",
            BlockerEntry {
                bz: vec![111],
                ..BlockerEntry::default()
            },
        )]);
        let bugs = HashMap::from([(111, resolved("[POST] some bug"))]);

        let (_, summary) = aggregate(
            vec![
                outcome("jobA", 16, None, BuildResult::Success),
                outcome("jobB", 16, None, BuildResult::Failure),
                outcome("jobC", 13, None, BuildResult::NoKnownBuilds),
            ],
            &blockers,
            &bugs,
            &HashMap::new(),
        );

        assert_eq!(summary.broken_jobs(), 2);
        assert_eq!(summary.num_covered, 1);
        assert_eq!(
            summary.coverage_line(),
            "Total bz/jira/other coverage:  1/2 = 50.0%"
        );
    }

    #[test]
    fn test_all_success_summary_has_no_optional_lines() {
        let (_, summary) = aggregate(
            vec![outcome("jobA", 16, None, BuildResult::Success)],
            &BlockerFile::default(),
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(summary.success_line(), "Total SUCCESS:  1/1 = 100.0%");
        assert!(summary.aborted_line().is_none());
        assert!(summary.missing_line().is_none());
        assert!(summary.error_line().is_none());
        assert_eq!(summary.coverage_line(), "Total bz/jira/other coverage:  0/0 = 0.0%");
    }

    #[test]
    fn test_chart_url_skips_empty_buckets() {
        let (_, summary) = aggregate(
            vec![
                outcome("jobA", 16, None, BuildResult::Success),
                outcome("jobB", 16, None, BuildResult::Failure),
            ],
            &BlockerFile::default(),
            &HashMap::new(),
            &HashMap::new(),
        );
        assert!(summary.chart_url.starts_with("https://quickchart.io/chart?c="));
        assert!(summary.chart_url.contains("Success"));
        assert!(!summary.chart_url.contains("Aborted"));
    }
}
