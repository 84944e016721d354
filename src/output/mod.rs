pub mod html;
pub mod mail;
mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::PhaseProgress;
pub use styling::{dim, magenta_bold};
pub use summary::print_summary;

/// Prints the valet banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🎩 valet"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Jenkins CI report generator")
    );
}
