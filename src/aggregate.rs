//! Modifier aggregation.
//!
//! Reduces a list of candidate modifiers to a [`Statistic`]:
//!
//! 1. Disabled modifiers are excluded.
//! 2. Modifiers whose predicate fails are excluded.
//! 3. The rest are bucketed by `(type, sign)`. Zero-value modifiers apply
//!    but contribute nothing.
//! 4. Cumulative categories (by default only `untyped`) apply in full.
//! 5. In every other bucket only the greatest magnitude applies; on a tie
//!    the first in input order wins.
//! 6. The total is the sum of applied values, saturating at the `i32`
//!    bounds.
//!
//! Aggregation is pure: it borrows its inputs and allocates a new result.

use crate::config::{ModifierConfig, Stacking};
use crate::id::StatId;
use crate::modifier::{Modifier, ModifierType, Sign};
use crate::predicate::Predicate;
use crate::roll_options::RollOptionSet;
use crate::statistic::{AppliedModifier, Statistic};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Aggregates modifiers according to a stacking table.
///
/// # Examples
///
/// ```rust
/// use modstack::config::ModifierConfig;
/// use modstack::{Modifier, ModifierAggregator, ModifierType, RollOptionSet};
///
/// let config = ModifierConfig::default();
/// let aggregator = ModifierAggregator::new(&config);
/// let modifiers = vec![
///     Modifier::new("frightened", ModifierType::Status, -2),
///     Modifier::new("sickened", ModifierType::Status, -1),
///     Modifier::new("inspire", ModifierType::Status, 1),
/// ];
///
/// let stat = aggregator.aggregate("will", &modifiers, &RollOptionSet::new());
/// // The worst status penalty and the best status bonus both apply.
/// assert_eq!(stat.total, -1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ModifierAggregator<'a> {
    config: &'a ModifierConfig,
}

impl<'a> ModifierAggregator<'a> {
    pub fn new(config: &'a ModifierConfig) -> Self {
        Self { config }
    }

    /// Aggregate `modifiers` under `options` into a statistic named `slug`.
    pub fn aggregate(
        &self,
        slug: impl Into<StatId>,
        modifiers: &[Modifier],
        options: &RollOptionSet,
    ) -> Statistic {
        let slug = slug.into();
        let mut applies = vec![false; modifiers.len()];
        let mut best: HashMap<(ModifierType, Sign), usize> = HashMap::new();

        for (idx, modifier) in modifiers.iter().enumerate() {
            if !modifier.enabled {
                continue;
            }
            if !Predicate::test(modifier.predicate.as_ref(), options) {
                continue;
            }
            let Some(sign) = modifier.sign() else {
                applies[idx] = true;
                continue;
            };
            match self.config.stacking(modifier.kind) {
                Stacking::Cumulative => applies[idx] = true,
                Stacking::Highest => match best.entry((modifier.kind, sign)) {
                    Entry::Vacant(slot) => {
                        slot.insert(idx);
                    }
                    Entry::Occupied(mut slot) => {
                        let current = &modifiers[*slot.get()];
                        if modifier.value.unsigned_abs() > current.value.unsigned_abs() {
                            slot.insert(idx);
                        }
                    }
                },
            }
        }
        for &idx in best.values() {
            applies[idx] = true;
        }

        let mut statistic = Statistic::new(slug);
        statistic.total = modifiers
            .iter()
            .zip(&applies)
            .filter(|(_, applies)| **applies)
            .fold(0_i32, |total, (m, _)| total.saturating_add(m.value));
        statistic.modifiers = modifiers
            .iter()
            .zip(applies)
            .map(|(modifier, applies)| AppliedModifier {
                modifier: modifier.clone(),
                applies,
            })
            .collect();

        tracing::debug!(
            statistic = %statistic.slug,
            total = statistic.total,
            candidates = modifiers.len(),
            "aggregated statistic"
        );
        statistic
    }
}

/// Aggregate with the default stacking table.
///
/// ```rust
/// use modstack::{aggregate, Modifier, ModifierType, RollOptionSet};
///
/// let stat = aggregate(
///     vec![Modifier::new("ignored", ModifierType::Item, 2).disabled()],
///     &RollOptionSet::new(),
/// );
/// assert_eq!(stat.total, 0);
/// assert!(!stat.modifiers[0].applies);
/// ```
pub fn aggregate(modifiers: Vec<Modifier>, options: &RollOptionSet) -> Statistic {
    let config = ModifierConfig::default();
    ModifierAggregator::new(&config).aggregate("custom", &modifiers, options)
}
