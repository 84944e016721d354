use comfy_table::{Cell, Color as TableColor};

use crate::report::{percent, Summary};

use super::styling::{bright, bright_green, bright_red, bright_yellow};
use super::tables::{color_coded_rate_cell, count_cell, create_table};

/// Prints a terminal rendition of the report summary: one row per result
/// bucket plus coverage and blocker totals. The full detail goes into the
/// HTML report; this is the at-a-glance view for whoever ran the tool.
pub fn print_summary(summary: &Summary) {
    println!("{}", render_summary(summary));
}

fn render_summary(summary: &Summary) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{} {}\n",
        bright("📊"),
        bright("Result Summary").underlined()
    ));

    let mut table = create_table();
    table.set_header(vec![
        Cell::new("Result").fg(TableColor::Cyan),
        Cell::new("Jobs").fg(TableColor::Cyan),
        Cell::new("Share").fg(TableColor::Cyan),
    ]);

    let buckets = [
        ("SUCCESS", summary.num_success, TableColor::Green),
        ("UNSTABLE", summary.num_unstable, TableColor::Yellow),
        ("FAILURE", summary.num_failure, TableColor::Red),
        ("ABORTED", summary.num_aborted, TableColor::DarkGrey),
        ("NO_KNOWN_BUILDS", summary.num_missing, TableColor::Grey),
        ("ERROR", summary.num_error, TableColor::DarkRed),
    ];
    for (label, count, color) in buckets {
        table.add_row(vec![
            Cell::new(label),
            count_cell(count, color),
            Cell::new(format!("{:.1}%", percent(count, summary.total_jobs))),
        ]);
    }
    table.add_row(vec![
        Cell::new("Coverage"),
        Cell::new(format!("{}/{}", summary.num_covered, summary.broken_jobs())),
        color_coded_rate_cell(percent(summary.num_covered, summary.broken_jobs())),
    ]);
    output.push_str(&table.to_string());
    output.push('\n');

    let success_rate = percent(summary.num_success, summary.total_jobs);
    let rate_line = format!("{} of {} jobs passing", summary.num_success, summary.total_jobs);
    let styled = if success_rate > 80.0 {
        bright_green(rate_line)
    } else if success_rate >= 50.0 {
        bright_yellow(rate_line)
    } else {
        bright_red(rate_line)
    };
    output.push_str(&format!("{styled}\n"));

    output.push_str(&format!("{}\n", summary.bugs_line()));
    output.push_str(&format!("{}\n", summary.tickets_line()));

    output
}
