//! Roll options for predicate evaluation.
//!
//! A `RollOptionSet` is the evaluation context for predicates: a set of
//! colon-delimited tags such as `self:trait:elf` or `target:distance:30`.
//! The engine does not interpret tags beyond membership and trailing
//! numeric segments; upstream data preparation decides what goes in.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An ordered, de-duplicated set of roll options.
///
/// Insertion order is kept because numeric comparisons resolve against the
/// *first* matching tag.
///
/// # Examples
///
/// ```rust
/// use modstack::RollOptionSet;
///
/// let mut options = RollOptionSet::new();
/// options.insert("self:trait:elf");
/// options.insert("target:distance:30");
/// options.insert("self:trait:elf");
///
/// assert_eq!(options.len(), 2);
/// assert!(options.contains("self:trait:elf"));
/// assert_eq!(options.numeric_suffix("target:distance"), Some(Ok(30.0)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct RollOptionSet {
    ordered: Vec<String>,
    members: HashSet<String>,
}

impl RollOptionSet {
    /// Create a new empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a roll option. Returns `false` if it was already present.
    pub fn insert(&mut self, option: impl Into<String>) -> bool {
        let option = option.into();
        if self.members.contains(&option) {
            return false;
        }
        self.members.insert(option.clone());
        self.ordered.push(option);
        true
    }

    /// Check membership of an exact tag.
    pub fn contains(&self, option: &str) -> bool {
        self.members.contains(option)
    }

    /// Number of distinct options.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Whether the set has no options.
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Iterate over options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(String::as_str)
    }

    /// Merge another set into this one, keeping this set's order first.
    pub fn extend_from(&mut self, other: &RollOptionSet) {
        for option in other.iter() {
            self.insert(option);
        }
    }

    /// Find the first tag of the form `<prefix>:<suffix>` and return its suffix.
    pub fn suffix_of(&self, prefix: &str) -> Option<&str> {
        self.ordered.iter().find_map(|option| {
            option
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix(':'))
                .filter(|suffix| !suffix.is_empty())
        })
    }

    /// Resolve the numeric suffix of the first tag matching `prefix`.
    ///
    /// Returns `None` when no tag matches, and `Some(Err(suffix))` when the
    /// first matching tag's suffix is not a number.
    pub fn numeric_suffix(&self, prefix: &str) -> Option<Result<f64, String>> {
        self.suffix_of(prefix).map(|suffix| {
            suffix
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| suffix.to_string())
        })
    }
}

impl From<Vec<String>> for RollOptionSet {
    fn from(options: Vec<String>) -> Self {
        options.into_iter().collect()
    }
}

impl From<RollOptionSet> for Vec<String> {
    fn from(set: RollOptionSet) -> Self {
        set.ordered
    }
}

impl<S: Into<String>> FromIterator<S> for RollOptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = RollOptionSet::new();
        for option in iter {
            set.insert(option);
        }
        set
    }
}

impl<S: Into<String>> Extend<S> for RollOptionSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for option in iter {
            self.insert(option);
        }
    }
}
