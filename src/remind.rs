use std::collections::BTreeSet;

use anyhow::Result;
use log::{info, warn};

use crate::blockers::BlockerFile;
use crate::config::Config;
use crate::jenkins::{self, JenkinsClient};
use crate::output::html::{self, Header, ReportKind};
use crate::output::mail;
use crate::report::{sort_rows, ReportRow};
use crate::trackers::{BugzillaResolver, JiraResolver};
use crate::version;

/// Sends each owner a reminder listing their broken jobs.
///
/// Owners come from the blockers file. A job appears in an owner's
/// reminder whenever its selected build is anything but SUCCESS, with its
/// blockers resolved and failed-stage logs linked. Owners whose jobs all
/// pass get nothing.
pub async fn run_remind(
    config: &Config,
    blockers: &BlockerFile,
    jenkins: &JenkinsClient,
    header: &Header,
) -> Result<()> {
    let owners = blockers.owner_set();
    if owners.is_empty() {
        info!("No owners found in blocker file");
        return Ok(());
    }

    let pattern = config.version_pattern()?;
    let filter = config.build_filter();

    // one resolver pair for the whole run; connections are reused across
    // owners and recreated only after a failed lookup
    let mut bugzilla = BugzillaResolver::new(&config.bz_url, config.certificate.as_deref());
    let mut jira = JiraResolver::new(
        &config.jira_url,
        config.jira_username.as_deref(),
        config.jira_password.as_deref(),
        config.certificate.as_deref(),
    );

    for owner in owners {
        let mut rows: Vec<ReportRow> = Vec::new();

        for job_name in blockers.job_names() {
            if !blockers.owners_of(job_name).contains(&owner) {
                continue;
            }
            let Some(job_version) = version::extract_version(job_name, &pattern) else {
                warn!("No version could be found in job {job_name}. Skipping...");
                continue;
            };

            let lcb = match jenkins::last_completed_build(jenkins, job_name, &filter).await {
                Ok(lcb) => lcb,
                Err(e) => {
                    warn!("Jenkins API call error on job {job_name}: {e} - skipping...");
                    continue;
                }
            };
            if !lcb.build.result.is_broken() {
                continue;
            }

            let bug_ids = blockers.bugs(job_name);
            let bugs_by_id = bugzilla.resolve(&bug_ids.iter().copied().collect()).await;
            let bugs = bug_ids
                .iter()
                .filter_map(|id| bugs_by_id.get(id).cloned())
                .collect::<Vec<_>>();

            let ticket_ids = blockers.tickets(job_name);
            let tickets_by_id = jira
                .resolve(&ticket_ids.iter().cloned().collect::<BTreeSet<_>>())
                .await;
            let tickets = ticket_ids
                .iter()
                .filter_map(|id| tickets_by_id.get(id).cloned())
                .collect::<Vec<_>>();

            let other = blockers.other(job_name);
            let has_blockers = !bugs.is_empty() || !tickets.is_empty() || !other.is_empty();

            let stage_urls = match (&lcb.build.failed_stage, lcb.build.number) {
                (Some(stage), Some(number)) => config.stage_log_urls(stage, &lcb.job_url, number),
                _ => Vec::new(),
            };
            let test_report_url = lcb.build.url.as_ref().map(|url| format!("{url}testReport"));

            rows.push(ReportRow {
                version: job_version,
                job_name: job_name.to_string(),
                job_url: lcb.job_url,
                build: lcb.build,
                bugs,
                tickets,
                other,
                has_blockers,
                test_report_url,
                stage_urls,
            });
        }

        if rows.is_empty() {
            info!("Owner {owner} has all passing jobs!");
            continue;
        }
        sort_rows(&mut rows);

        let htmlcode = html::render_reminder(header, &owner, &rows)?;
        let subject = format!("Valet reminder for {owner}");
        match mail::send_html(
            &config.smtp_host,
            &config.email_from,
            std::slice::from_ref(&owner),
            &subject,
            &htmlcode,
        ) {
            Ok(()) => {
                info!("Reminder for {owner} successfully accepted by mail server for delivery");
            }
            Err(e) => {
                warn!("Error sending email reminder: {e}\nHTML file generated");
                let filename =
                    html::archive_html(&config.archive_dir(), ReportKind::Reminder, &htmlcode)?;
                info!("HTML file generated as {}", filename.display());
            }
        }
    }

    Ok(())
}
