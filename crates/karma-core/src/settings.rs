use std::collections::{HashMap, HashSet};

use crate::error::ConfigError;

/// Alias name to canonical name. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    map: HashMap<String, String>,
}

impl AliasTable {
    /// Builds the table from `name++alias1++alias2` entries.
    pub fn from_specs<I, S>(specs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = HashMap::new();
        for spec in specs {
            let spec = spec.as_ref();
            let mut names = spec.split("++").map(|n| n.trim().to_lowercase());
            let canonical = names.next().filter(|n| !n.is_empty());
            let aliases: Vec<String> = names.collect();
            let Some(canonical) = canonical else {
                return Err(ConfigError::InvalidAlias(spec.to_owned()));
            };
            if aliases.is_empty() || aliases.iter().any(String::is_empty) {
                return Err(ConfigError::InvalidAlias(spec.to_owned()));
            }
            for alias in aliases {
                map.insert(alias, canonical.clone());
            }
        }
        Ok(Self { map })
    }

    /// Single hop: the canonical name for `name`, or `name` itself.
    #[must_use]
    pub fn apply<'a>(&'a self, name: &'a str) -> &'a str {
        self.map.get(name).map_or(name, String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<A: Into<String>, C: Into<String>> FromIterator<(A, C)> for AliasTable {
    fn from_iter<T: IntoIterator<Item = (A, C)>>(iter: T) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(a, c)| (a.into().to_lowercase(), c.into().to_lowercase()))
                .collect(),
        }
    }
}

/// Canonical names that can never be karma targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    names: HashSet<String>,
}

impl Blacklist {
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

impl<S: AsRef<str>> FromIterator<S> for Blacklist {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }
}

pub const DEFAULT_UPVOTE_REACTJI: [&str; 3] = ["+1", "thumbsup", "thumbsup_all"];
pub const DEFAULT_DOWNVOTE_REACTJI: [&str; 2] = ["-1", "thumbsdown"];

/// Emoji reactions that count as votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactjiPolicy {
    enabled: bool,
    upvote: HashSet<String>,
    downvote: HashSet<String>,
}

impl Default for ReactjiPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            upvote: DEFAULT_UPVOTE_REACTJI.iter().map(|s| (*s).to_owned()).collect(),
            downvote: DEFAULT_DOWNVOTE_REACTJI.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl ReactjiPolicy {
    /// Empty lists fall back to the defaults. The two sets must be disjoint.
    pub fn new(enabled: bool, upvote: &[String], downvote: &[String]) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let upvote = if upvote.is_empty() {
            defaults.upvote
        } else {
            normalize_reactji(upvote)
        };
        let downvote = if downvote.is_empty() {
            defaults.downvote
        } else {
            normalize_reactji(downvote)
        };
        if let Some(shared) = upvote.intersection(&downvote).next() {
            return Err(ConfigError::OverlappingReactji(shared.clone()));
        }
        Ok(Self {
            enabled,
            upvote,
            downvote,
        })
    }

    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Point change for a reaction being added (`added`) or removed.
    /// Removing a vote undoes it.
    #[must_use]
    pub fn vote(&self, reaction: &str, added: bool) -> Option<i64> {
        if !self.enabled {
            return None;
        }
        let direction = if self.upvote.contains(reaction) {
            1
        } else if self.downvote.contains(reaction) {
            -1
        } else {
            return None;
        };
        Some(if added { direction } else { -direction })
    }
}

fn normalize_reactji(list: &[String]) -> HashSet<String> {
    list.iter()
        .map(|r| r.trim().trim_matches(':').to_owned())
        .filter(|r| !r.is_empty())
        .collect()
}
