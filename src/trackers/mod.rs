mod bugzilla;
mod jira;

pub use bugzilla::BugzillaResolver;
pub use jira::JiraResolver;

/// A blocker reference resolved against its tracker: a human-readable
/// label (status + summary, or a bare id when the lookup failed) and a
/// deep link into the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    pub label: String,
    pub url: String,
}
