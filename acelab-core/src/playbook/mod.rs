//! The Playbook: a versioned, human-readable knowledge base.
//!
//! Entries live in named sections and carry usage counters. The Playbook is
//! mutated in exactly two places: the Executor stamps `last_used` on cited
//! entries, and the Curator produces a new version.

pub mod store;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use store::{LoadSource, LoadedPlaybook, PlaybookStore, StoreError};

pub const SECTION_STRATEGIES: &str = "strategies_and_hard_rules";
pub const SECTION_TEMPLATES: &str = "useful_code_and_templates";
pub const SECTION_PITFALLS: &str = "troubleshooting_and_pitfalls";

/// Dotted `MAJOR.MINOR` playbook version. The Curator bumps MINOR; MAJOR is
/// reserved for schema migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const INITIAL: Version = Version { major: 1, minor: 0 };

    pub fn bump_minor(self) -> Self {
        Self { major: self.major, minor: self.minor + 1 }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| format!("version '{s}' is not MAJOR.MINOR"))?;
        Ok(Self {
            major: major.parse().map_err(|_| format!("bad major in '{s}'"))?,
            minor: minor.parse().map_err(|_| format!("bad minor in '{s}'"))?,
        })
    }
}

impl TryFrom<String> for Version {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

/// One actionable knowledge item with usage counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: String,
    pub content: String,
    pub helpful_count: u32,
    pub harmful_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new(id: impl Into<String>, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            helpful_count: 0,
            harmful_count: 0,
            created_at,
            last_used: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub total_entries: usize,
    /// Entry ids removed when this version was curated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pruned_in_version: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Playbook {
    pub metadata: Metadata,
    /// Section name → ordered entries. Unrecognized sections are preserved.
    pub sections: BTreeMap<String, Vec<Entry>>,
}

/// A single invariant violation found by [`Playbook::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Violation {
    #[error("duplicate entry id '{id}'")]
    DuplicateId { id: String },

    #[error("metadata.total_entries is {declared} but sections hold {actual}")]
    TotalEntriesMismatch { declared: usize, actual: usize },

    #[error("entry with empty id in section '{section}'")]
    EmptyEntryId { section: String },

    #[error("entry '{id}' has empty content")]
    EmptyContent { id: String },
}

impl Playbook {
    /// Initial playbook installed on first run or after quarantine.
    pub fn seed(now: DateTime<Utc>) -> Self {
        let mut sections = BTreeMap::new();
        sections.insert(
            SECTION_STRATEGIES.to_string(),
            vec![
                Entry::new("strat-001", "Only trade during the NY session window", now),
                Entry::new(
                    "strat-002",
                    "Stand aside 30 minutes either side of high-impact news",
                    now,
                ),
                Entry::new("strat-003", "Minimum risk-reward ratio: 1:1.5", now),
            ],
        );
        sections.insert(
            SECTION_TEMPLATES.to_string(),
            vec![Entry::new(
                "code-001",
                "Position sizing: (account_balance * risk_pct) / (entry - stop)",
                now,
            )],
        );
        sections.insert(
            SECTION_PITFALLS.to_string(),
            vec![Entry::new(
                "pit-001",
                "Liquidity thins in the final session hour; avoid fresh entries",
                now,
            )],
        );
        let total = sections.values().map(Vec::len).sum();
        Self {
            metadata: Metadata {
                version: Version::INITIAL,
                created_at: now,
                last_updated: now,
                total_entries: total,
                pruned_in_version: Vec::new(),
            },
            sections,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    /// Iterate every entry with its section name.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.sections
            .iter()
            .flat_map(|(name, entries)| entries.iter().map(move |e| (name.as_str(), e)))
    }

    pub fn find_entry(&self, id: &str) -> Option<&Entry> {
        self.entries().map(|(_, e)| e).find(|e| e.id == id)
    }

    pub fn find_entry_mut(&mut self, id: &str) -> Option<&mut Entry> {
        self.sections
            .values_mut()
            .flat_map(|entries| entries.iter_mut())
            .find(|e| e.id == id)
    }

    /// Stamp `last_used` on an entry. Returns false for unknown ids.
    pub fn touch(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        match self.find_entry_mut(id) {
            Some(entry) => {
                entry.last_used = Some(now);
                true
            }
            None => false,
        }
    }

    /// Exact-content duplicate check used by Curator dedup.
    pub fn contains_content(&self, content: &str) -> bool {
        self.entries().any(|(_, e)| e.content == content)
    }

    /// Append an entry to a section, creating the section if needed, and keep
    /// the entry total in sync.
    pub fn insert_entry(&mut self, section: &str, entry: Entry) {
        self.sections.entry(section.to_string()).or_default().push(entry);
        self.metadata.total_entries = self.entry_count();
    }

    /// Mint a fresh entry id for `section`: section prefix plus a stable token
    /// derived from the leading characters of `content`, disambiguated until
    /// unique within this playbook.
    pub fn mint_entry_id(&self, section: &str, content: &str) -> String {
        let prefix = section_prefix(section);
        let token = content_token(content);
        let base = format!("{prefix}-{token}");
        if self.find_entry(&base).is_none() {
            return base;
        }
        let mut n = 2u32;
        loop {
            let candidate = format!("{base}-{n}");
            if self.find_entry(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Check structural invariants: unique ids, accurate entry total, and
    /// per-entry section schema. Returns every violation found.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut seen = std::collections::BTreeSet::new();
        for (section, entry) in self.entries() {
            if entry.id.is_empty() {
                violations.push(Violation::EmptyEntryId { section: section.to_string() });
                continue;
            }
            if !seen.insert(entry.id.as_str()) {
                violations.push(Violation::DuplicateId { id: entry.id.clone() });
            }
            if entry.content.is_empty() {
                violations.push(Violation::EmptyContent { id: entry.id.clone() });
            }
        }
        let actual = self.entry_count();
        if self.metadata.total_entries != actual {
            violations.push(Violation::TotalEntriesMismatch {
                declared: self.metadata.total_entries,
                actual,
            });
        }
        violations
    }
}

/// Section-prefix convention for entry ids.
fn section_prefix(section: &str) -> String {
    match section {
        SECTION_STRATEGIES => "strat".to_string(),
        SECTION_TEMPLATES => "code".to_string(),
        SECTION_PITFALLS => "pit".to_string(),
        other => {
            let short: String = other
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(4)
                .collect::<String>()
                .to_ascii_lowercase();
            if short.is_empty() {
                "misc".to_string()
            } else {
                short
            }
        }
    }
}

/// Stable token from the content's leading characters.
fn content_token(content: &str) -> String {
    let head: String = content.chars().take(32).collect();
    blake3::hash(head.as_bytes()).to_hex()[..6].to_string()
}
