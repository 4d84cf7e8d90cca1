//! Modifier configuration.
//!
//! The table of modifier categories with their display metadata and
//! stacking rule. It is handed to the aggregator and to breakdown rendering
//! explicitly, so nothing reads a global table.

use crate::modifier::ModifierType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How modifiers of one category combine within a `(type, sign)` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stacking {
    /// Only the greatest magnitude applies; ties go to the first listed.
    Highest,
    /// Every modifier applies.
    Cumulative,
}

/// Display metadata and stacking rule for one modifier category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMetadata {
    /// Localization key for the category name.
    pub label: String,
    pub stacking: Stacking,
}

/// Configuration slice for aggregation and breakdown rendering.
///
/// # Examples
///
/// ```rust
/// use modstack::config::{ModifierConfig, Stacking};
/// use modstack::ModifierType;
///
/// let config = ModifierConfig::default();
/// assert_eq!(config.stacking(ModifierType::Untyped), Stacking::Cumulative);
/// assert_eq!(config.stacking(ModifierType::Status), Stacking::Highest);
///
/// let custom = ModifierConfig::from_json_str(
///     r#"{"types": {"circumstance": {"label": "Circ.", "stacking": "cumulative"}}}"#,
/// ).unwrap();
/// assert_eq!(custom.stacking(ModifierType::Circumstance), Stacking::Cumulative);
/// assert_eq!(custom.stacking(ModifierType::Untyped), Stacking::Cumulative);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierConfig {
    #[serde(default)]
    pub types: BTreeMap<ModifierType, TypeMetadata>,
}

impl Default for ModifierConfig {
    fn default() -> Self {
        let types = ModifierType::ALL
            .into_iter()
            .map(|kind| (kind, default_metadata(kind)))
            .collect();
        Self { types }
    }
}

fn default_metadata(kind: ModifierType) -> TypeMetadata {
    let stacking = match kind {
        ModifierType::Untyped => Stacking::Cumulative,
        _ => Stacking::Highest,
    };
    let mut key = kind.key().to_string();
    if let Some(first) = key.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    TypeMetadata {
        label: format!("PF2E.ModifierType.{key}"),
        stacking,
    }
}

impl ModifierConfig {
    /// Load a configuration from JSON. Categories missing from the document
    /// keep their default metadata.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let parsed: ModifierConfig = serde_json::from_str(json)?;
        let mut config = ModifierConfig::default();
        config.types.extend(parsed.types);
        Ok(config)
    }

    /// Stacking rule for a category. `untyped` is always cumulative.
    pub fn stacking(&self, kind: ModifierType) -> Stacking {
        if kind == ModifierType::Untyped {
            return Stacking::Cumulative;
        }
        self.types
            .get(&kind)
            .map(|meta| meta.stacking)
            .unwrap_or_else(|| default_metadata(kind).stacking)
    }

    /// Label key for a category.
    pub fn label(&self, kind: ModifierType) -> String {
        self.types
            .get(&kind)
            .map(|meta| meta.label.clone())
            .unwrap_or_else(|| default_metadata(kind).label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_only_untyped_cumulative() {
        let config = ModifierConfig::default();
        for kind in ModifierType::ALL {
            let expected = if kind == ModifierType::Untyped {
                Stacking::Cumulative
            } else {
                Stacking::Highest
            };
            assert_eq!(config.stacking(kind), expected, "{kind}");
        }
    }

    #[test]
    fn test_default_labels() {
        let config = ModifierConfig::default();
        assert_eq!(config.label(ModifierType::Status), "PF2E.ModifierType.Status");
    }

    #[test]
    fn test_empty_table_falls_back() {
        let config = ModifierConfig {
            types: BTreeMap::new(),
        };
        assert_eq!(config.stacking(ModifierType::Untyped), Stacking::Cumulative);
        assert_eq!(config.stacking(ModifierType::Item), Stacking::Highest);
    }

    #[test]
    fn test_untyped_cannot_be_made_highest() {
        let config = ModifierConfig::from_json_str(
            r#"{"types": {"untyped": {"label": "U", "stacking": "highest"}}}"#,
        )
        .unwrap();
        assert_eq!(config.stacking(ModifierType::Untyped), Stacking::Cumulative);
        assert_eq!(config.label(ModifierType::Untyped), "U");

        let stat = crate::ModifierAggregator::new(&config).aggregate(
            "ac",
            &[
                crate::Modifier::new("a", ModifierType::Untyped, 2),
                crate::Modifier::new("b", ModifierType::Untyped, 1),
            ],
            &crate::RollOptionSet::new(),
        );
        assert_eq!(stat.total, 3);
    }

    #[test]
    fn test_bad_json_is_error() {
        assert!(ModifierConfig::from_json_str("{\"types\": 3}").is_err());
    }
}
