use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use crate::blockers::BlockerFile;
use crate::config::Config;
use crate::jenkins::JenkinsClient;
use crate::output::html::{Header, ReportStyle};
use crate::remind::run_remind;
use crate::report::{run_report, ReportOptions};

#[derive(Parser)]
#[command(name = "valet")]
#[command(author, version, about = "An automated CI report generator for Jenkins", long_about = None)]
pub struct Cli {
    /// Configuration file to use
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Blockers file to use
    #[arg(long, default_value = "blockers.yaml")]
    blockers: PathBuf,

    /// Raw HTML file injected at the top of the report
    #[arg(long)]
    preamble: Option<PathBuf>,

    /// Do not send the report email
    #[arg(long, default_value_t = false)]
    no_email: bool,

    /// Send the report to the test address instead of the real recipients
    #[arg(long, default_value_t = false)]
    test_email: bool,

    /// Run in reminder mode, mailing each owner their broken jobs.
    /// Overrides --no-email and --test-email.
    #[arg(long, default_value_t = false)]
    remind: bool,

    /// Built-in report layout to render
    #[arg(long, value_enum, default_value_t = ReportStyle::Standard)]
    template: ReportStyle,
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        // reminders are always mailed to real owners
        let (no_email, test_email) = if self.remind {
            (false, false)
        } else {
            (self.no_email, self.test_email)
        };

        let config = Config::load(&self.config).context("Error loading configuration data")?;
        config
            .validate(no_email, test_email)
            .context("Error loading configuration data")?;

        let blockers =
            BlockerFile::load(&self.blockers).context("Error loading blocker configuration data")?;

        let jenkins = JenkinsClient::new(
            &config.jenkins_url,
            config.jenkins_username.as_deref(),
            config.jenkins_api_token.as_deref(),
            config.certificate.as_deref(),
        )?;

        if self.remind {
            info!("Running in reminder mode");
            let header = Header::new(&self.blockers.display().to_string(), None, None, true);
            run_remind(&config, &blockers, &jenkins, &header).await
        } else {
            let header = Header::new(
                &config.job_search_fields,
                config.filter_param_name.clone(),
                config.filter_param_value.clone(),
                false,
            );
            let preamble = match &self.preamble {
                Some(path) => Some(std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read preamble file: {}", path.display())
                })?),
                None => None,
            };
            let opts = ReportOptions {
                preamble,
                no_email,
                test_email,
                style: self.template,
            };
            run_report(&config, &blockers, &jenkins, &header, &opts).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_remind_flag_overrides_email_flags() {
        let cli = Cli::parse_from(["valet", "--remind", "--no-email", "--test-email"]);
        assert!(cli.remind);
        // resolution happens in execute(); the flags themselves still parse
        assert!(cli.no_email);
        assert!(cli.test_email);
    }

    #[test]
    fn test_default_paths() {
        let cli = Cli::parse_from(["valet"]);
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert_eq!(cli.blockers, PathBuf::from("blockers.yaml"));
        assert_eq!(cli.template, ReportStyle::Standard);
    }
}
