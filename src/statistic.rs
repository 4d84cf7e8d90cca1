//! Statistic results.
//!
//! A `Statistic` is the read-only output of aggregation: the total and the
//! full list of candidate modifiers, each flagged with whether it counted.

use crate::config::ModifierConfig;
use crate::id::StatId;
use crate::modifier::{Modifier, ModifierType};
use crate::store::LabelResolver;
use serde::{Deserialize, Serialize};

/// A modifier together with whether it contributed to the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedModifier {
    pub modifier: Modifier,
    pub applies: bool,
}

/// An aggregated statistic with its breakdown.
///
/// Excluded modifiers stay in `modifiers` (with `applies == false`) so a
/// sheet can show why something did not count.
///
/// # Examples
///
/// ```rust
/// use modstack::{aggregate, Modifier, ModifierType, RollOptionSet};
///
/// let stat = aggregate(
///     vec![
///         Modifier::new("aid", ModifierType::Circumstance, 2),
///         Modifier::new("cover", ModifierType::Circumstance, 4),
///         Modifier::new("trick", ModifierType::Untyped, 1),
///     ],
///     &RollOptionSet::new(),
/// );
/// assert_eq!(stat.total, 5);
/// assert_eq!(stat.applied().count(), 2);
/// assert_eq!(stat.excluded().count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    pub slug: StatId,
    pub total: i32,
    /// Every candidate modifier in input order.
    pub modifiers: Vec<AppliedModifier>,
}

impl Statistic {
    pub fn new(slug: StatId) -> Self {
        Self {
            slug,
            total: 0,
            modifiers: Vec::new(),
        }
    }

    /// Modifiers that counted toward the total.
    pub fn applied(&self) -> impl Iterator<Item = &Modifier> {
        self.modifiers
            .iter()
            .filter(|m| m.applies)
            .map(|m| &m.modifier)
    }

    /// Modifiers that were considered but did not count.
    pub fn excluded(&self) -> impl Iterator<Item = &Modifier> {
        self.modifiers
            .iter()
            .filter(|m| !m.applies)
            .map(|m| &m.modifier)
    }

    /// Look up a candidate modifier by slug.
    pub fn get(&self, slug: &str) -> Option<&AppliedModifier> {
        self.modifiers.iter().find(|m| m.modifier.slug == slug)
    }

    /// Render applied, non-zero modifiers as sheet lines such as
    /// `"Bless (Status) +1"`.
    pub fn breakdown(&self, config: &ModifierConfig, labels: &dyn LabelResolver) -> Vec<String> {
        self.applied()
            .filter(|m| m.value != 0)
            .map(|m| {
                let label = labels.resolve_or_key(&m.label);
                if m.kind == ModifierType::Untyped {
                    format!("{label} {}", m.signed_value())
                } else {
                    let category = labels.resolve_or_key(&config.label(m.kind));
                    format!("{label} ({category}) {}", m.signed_value())
                }
            })
            .collect()
    }
}
