//! Name matching against prefix and pattern lists.
//!
//! Both the hide list and every subpart's path list are [`MatchList`]s. In a
//! config file a plain string is a prefix and a `{ pattern = "..." }` table is
//! a regular expression searched anywhere in the node name:
//!
//! ```toml
//! hide = ["Pipe", { pattern = "^Magnet.*Yoke$" }]
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One entry of a [`MatchList`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawMatchSpec", into = "RawMatchSpec")]
pub enum MatchSpec {
    /// Matches names starting with the string.
    Prefix(String),
    /// Matches names in which the expression finds a match.
    Pattern(Regex),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawMatchSpec {
    Prefix(String),
    Pattern { pattern: String },
}

impl TryFrom<RawMatchSpec> for MatchSpec {
    type Error = regex::Error;

    fn try_from(raw: RawMatchSpec) -> Result<Self, Self::Error> {
        match raw {
            RawMatchSpec::Prefix(prefix) => Ok(MatchSpec::Prefix(prefix)),
            RawMatchSpec::Pattern { pattern } => MatchSpec::pattern(&pattern),
        }
    }
}

impl From<MatchSpec> for RawMatchSpec {
    fn from(spec: MatchSpec) -> Self {
        match spec {
            MatchSpec::Prefix(prefix) => RawMatchSpec::Prefix(prefix),
            MatchSpec::Pattern(regex) => RawMatchSpec::Pattern {
                pattern: regex.as_str().to_string(),
            },
        }
    }
}

impl MatchSpec {
    /// Prefix entry.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        MatchSpec::Prefix(prefix.into())
    }

    /// Pattern entry.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(MatchSpec::Pattern)
    }

    /// Whether `name` is selected by this entry.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            MatchSpec::Prefix(prefix) => name.starts_with(prefix.as_str()),
            MatchSpec::Pattern(regex) => regex.is_match(name),
        }
    }
}

impl PartialEq for MatchSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MatchSpec::Prefix(a), MatchSpec::Prefix(b)) => a == b,
            (MatchSpec::Pattern(a), MatchSpec::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

/// Ordered list of prefixes and patterns. An empty list matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchList(Vec<MatchSpec>);

impl MatchList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// List of plain prefixes.
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        prefixes.into_iter().map(MatchSpec::prefix).collect()
    }

    /// Append an entry.
    pub fn push(&mut self, spec: MatchSpec) {
        self.0.push(spec);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the entries.
    pub fn iter(&self) -> impl Iterator<Item = &MatchSpec> {
        self.0.iter()
    }

    /// Whether any entry selects `name`.
    pub fn matches(&self, name: &str) -> bool {
        self.0.iter().any(|spec| spec.matches(name))
    }
}

impl FromIterator<MatchSpec> for MatchList {
    fn from_iter<I: IntoIterator<Item = MatchSpec>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<MatchSpec>> for MatchList {
    fn from(specs: Vec<MatchSpec>) -> Self {
        Self(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_matches_nothing() {
        let list = MatchList::new();
        assert!(!list.matches(""));
        assert!(!list.matches("Ecal"));
    }

    #[test]
    fn prefix_is_anchored_at_start() {
        let list = MatchList::prefixes(["Ecal"]);
        assert!(list.matches("Ecal"));
        assert!(list.matches("EcalInner_3"));
        assert!(!list.matches("MyEcal"));
    }

    #[test]
    fn pattern_searches_anywhere() {
        let list: MatchList = vec![MatchSpec::pattern("Module[0-9]+").unwrap()].into();
        assert!(list.matches("VPLeft_Module12_1"));
        assert!(!list.matches("VPLeft_ModuleA"));
    }

    #[test]
    fn any_entry_selects() {
        let list: MatchList = vec![
            MatchSpec::prefix("Rich1"),
            MatchSpec::pattern("^Mirror").unwrap(),
        ]
        .into();
        assert!(list.matches("Rich1Gas"));
        assert!(list.matches("MirrorSeg_4"));
        assert!(!list.matches("Rich2"));
    }

    #[test]
    fn deserializes_tagged_entries() {
        let list: MatchList =
            serde_json::from_str(r#"["Pipe", {"pattern": "Yoke$"}]"#).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().next(), Some(&MatchSpec::prefix("Pipe")));
        assert!(list.matches("MagnetYoke"));
        assert!(!list.matches("YokeSupport"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let result: Result<MatchList, _> = serde_json::from_str(r#"[{"pattern": "("}]"#);
        assert!(result.is_err());
    }
}
