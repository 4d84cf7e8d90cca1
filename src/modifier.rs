//! Modifiers.
//!
//! A modifier is one named, typed, optionally conditional adjustment to a
//! statistic. Modifiers are built fresh on every data-preparation pass by
//! rule elements and statistic definitions; they are never persisted.

use crate::predicate::Predicate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Modifier category. Same-category modifiers of the same sign do not
/// stack unless the category is configured as cumulative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierType {
    Ability,
    Circumstance,
    Item,
    Potency,
    Proficiency,
    Status,
    Untyped,
}

impl ModifierType {
    /// Every category, in display order.
    pub const ALL: [ModifierType; 7] = [
        ModifierType::Ability,
        ModifierType::Circumstance,
        ModifierType::Item,
        ModifierType::Potency,
        ModifierType::Proficiency,
        ModifierType::Status,
        ModifierType::Untyped,
    ];

    /// The lowercase key used in authored data and configuration.
    pub fn key(self) -> &'static str {
        match self {
            ModifierType::Ability => "ability",
            ModifierType::Circumstance => "circumstance",
            ModifierType::Item => "item",
            ModifierType::Potency => "potency",
            ModifierType::Proficiency => "proficiency",
            ModifierType::Status => "status",
            ModifierType::Untyped => "untyped",
        }
    }
}

impl Default for ModifierType {
    fn default() -> Self {
        ModifierType::Untyped
    }
}

impl fmt::Display for ModifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Whether a modifier raises or lowers the statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Bonus,
    Penalty,
}

/// A numeric adjustment to a statistic.
///
/// # Examples
///
/// ```rust
/// use modstack::{Modifier, ModifierType, Predicate};
///
/// let flanking = Modifier::new("flanking", ModifierType::Circumstance, -2)
///     .with_label("PF2E.Condition.OffGuard")
///     .with_predicate(Predicate::atom("target:condition:off-guard"));
///
/// assert_eq!(flanking.value, -2);
/// assert!(flanking.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    /// Stable identifier used by adjustments and for de-duplication.
    pub slug: String,
    /// Localization key (or literal text) for display.
    pub label: String,
    pub value: i32,
    #[serde(rename = "type", default)]
    pub kind: ModifierType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
    /// `false` when the user toggled the modifier off.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Where the modifier came from, usually an item id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Modifier {
    /// Create an enabled, unconditional modifier whose label is its slug.
    pub fn new(slug: impl Into<String>, kind: ModifierType, value: i32) -> Self {
        let slug = slug.into();
        Self {
            label: slug.clone(),
            slug,
            value,
            kind,
            predicate: None,
            enabled: true,
            source: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Mark the modifier as ignored by the user.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// `None` for zero-value modifiers.
    pub fn sign(&self) -> Option<Sign> {
        match self.value {
            v if v > 0 => Some(Sign::Bonus),
            v if v < 0 => Some(Sign::Penalty),
            _ => None,
        }
    }

    /// Signed value as shown on a sheet, e.g. `+2` or `-1`.
    pub fn signed_value(&self) -> String {
        format!("{:+}", self.value)
    }
}
