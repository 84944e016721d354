use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use regex::Regex;

/// A release version parsed out of a job name, e.g. `16` or `16.2`.
///
/// An absent minor compares equal to minor 0, matching the convention
/// that `16` and `16.0` name the same release.
#[derive(Debug, Clone, Copy)]
pub struct Version {
    pub major: u32,
    pub minor: Option<u32>,
}

impl Version {
    fn key(self) -> (u32, u32) {
        (self.major, self.minor.unwrap_or(0))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) if minor != 0 => write!(f, "{}.{}", self.major, minor),
            _ => write!(f, "{}", self.major),
        }
    }
}

/// Default pattern for version-like substrings in a job name.
///
/// Matches any digit run with an optional `.minor` part; the two-digit
/// major convention is enforced after matching, which also rules out
/// hits inside longer numbers (dates, build ids) without lookarounds.
pub fn default_pattern() -> Regex {
    Regex::new(r"\d+(?:\.\d+)?").expect("default version pattern is valid")
}

/// Extracts the release version from a job name.
///
/// When several version-like substrings appear (e.g. upgrade jobs named
/// "from 13 to 16.2"), the highest numeric value wins: the target version
/// is what the job actually exercises. Returns `None` when the name
/// carries no two-digit version.
pub fn extract_version(job_name: &str, pattern: &Regex) -> Option<Version> {
    pattern
        .find_iter(job_name)
        .filter_map(|m| parse_token(m.as_str()))
        .filter(|v| (10..=99).contains(&v.major))
        .max()
}

fn parse_token(token: &str) -> Option<Version> {
    let (major, minor) = match token.split_once('.') {
        Some((major, minor)) => (major.parse().ok()?, Some(minor.parse().ok()?)),
        None => (token.parse().ok()?, None),
    };
    Some(Version { major, minor })
}
