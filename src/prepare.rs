//! Data preparation and item creation passes.
//!
//! `prepare_actor` is the read/compute phase: it takes a snapshot of an
//! actor and its items and produces every statistic from scratch. Nothing
//! it reads is mutated. `pre_create_items` runs before items are created
//! and expands a creation batch with whatever the new items grant.

use crate::aggregate::ModifierAggregator;
use crate::config::ModifierConfig;
use crate::document::{ActorSource, ItemSource};
use crate::id::{ItemId, StatId};
use crate::modifier::Modifier;
use crate::roll_options::RollOptionSet;
use crate::rule_element::{
    CreateContext, IdAllocator, PrepareContext, PreparePhase, RuleElement, RuleElementState,
    Synthetics,
};
use crate::statistic::Statistic;
use crate::store::{ItemLibrary, SchemaMigrator};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Grants nested deeper than this are dropped.
pub const MAX_GRANT_DEPTH: usize = 8;

/// The domain every statistic belongs to.
pub const ALL_DOMAIN: &str = "all";

/// How to build one statistic.
///
/// # Examples
///
/// ```rust
/// use modstack::prepare::StatisticDefinition;
/// use modstack::{Modifier, ModifierType};
///
/// let athletics = StatisticDefinition::new("athletics", ["skill-check", "str-based"])
///     .with_modifier(Modifier::new("str", ModifierType::Ability, 4))
///     .with_modifier(Modifier::new("trained", ModifierType::Proficiency, 3));
/// assert_eq!(athletics.domains, vec!["athletics", "skill-check", "str-based"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticDefinition {
    pub slug: StatId,
    /// Selector domains that feed this statistic. The slug itself is always
    /// the first domain; `all` is implied.
    pub domains: Vec<String>,
    /// Modifiers that exist regardless of rule elements.
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

impl StatisticDefinition {
    pub fn new<I, S>(slug: &str, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = vec![slug.to_string()];
        for domain in domains {
            let domain = domain.into();
            if !all.contains(&domain) {
                all.push(domain);
            }
        }
        Self {
            slug: StatId::new(slug),
            domains: all,
            modifiers: Vec::new(),
        }
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    fn domains(&self) -> impl Iterator<Item = &str> {
        let implied = (!self.domains.iter().any(|d| d == ALL_DOMAIN)).then_some(ALL_DOMAIN);
        implied
            .into_iter()
            .chain(self.domains.iter().map(String::as_str))
    }
}

/// Final state of one rule element after a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleElementStatus {
    pub item: ItemId,
    pub index: usize,
    pub key: String,
    pub state: RuleElementState,
}

impl From<&RuleElement> for RuleElementStatus {
    fn from(element: &RuleElement) -> Self {
        Self {
            item: element.item().clone(),
            index: element.index(),
            key: element.key().to_string(),
            state: element.state(),
        }
    }
}

/// Output of a preparation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedActor {
    /// Actor-wide roll options after rule elements ran.
    pub roll_options: RollOptionSet,
    /// One statistic per definition, in definition order.
    pub statistics: Vec<Statistic>,
    pub rule_element_states: Vec<RuleElementStatus>,
}

impl PreparedActor {
    pub fn statistic(&self, slug: &str) -> Option<&Statistic> {
        self.statistics.iter().find(|s| s.slug.as_str() == slug)
    }
}

/// Run the data-preparation pass for one actor.
///
/// Rule elements are instantiated from scratch for each item, in item order.
/// Roll option elements run first, then everything else. Each statistic
/// then sees the actor-wide options plus those of its domains, has the
/// adjustments of its domains applied to its modifiers, and is aggregated.
pub fn prepare_actor(
    actor: &ActorSource,
    items: &[ItemSource],
    base_options: &RollOptionSet,
    definitions: &[StatisticDefinition],
    config: &ModifierConfig,
) -> PreparedActor {
    let elements: Vec<(&ItemSource, RuleElement)> = items
        .iter()
        .flat_map(|item| {
            RuleElement::instantiate(item, actor.kind)
                .into_iter()
                .map(move |element| (item, element))
        })
        .collect();

    let mut roll_options = base_options.clone();
    let mut synthetics = Synthetics::default();
    for phase in [PreparePhase::RollOptions, PreparePhase::Synthetics] {
        for (item, element) in &elements {
            if element.phase() != Some(phase) {
                continue;
            }
            element.prepare_data(&mut PrepareContext {
                actor,
                item,
                roll_options: &mut roll_options,
                synthetics: &mut synthetics,
            });
        }
    }

    let aggregator = ModifierAggregator::new(config);
    let statistics = definitions
        .iter()
        .map(|definition| {
            let mut options = roll_options.clone();
            let mut modifiers = definition.modifiers.clone();
            for domain in definition.domains() {
                options.extend(synthetics.roll_options(domain).iter().cloned());
                modifiers.extend(synthetics.modifiers(domain).iter().cloned());
            }
            for domain in definition.domains() {
                for adjustment in synthetics.adjustments(domain) {
                    for modifier in &mut modifiers {
                        adjustment.apply(modifier, &options);
                    }
                }
            }
            aggregator.aggregate(definition.slug.clone(), &modifiers, &options)
        })
        .collect();

    let rule_element_states = elements
        .iter()
        .map(|(_, element)| RuleElementStatus::from(element))
        .collect();

    tracing::debug!(
        actor = %actor.id,
        items = items.len(),
        rule_elements = elements.len(),
        roll_options = roll_options.len(),
        "prepared actor"
    );
    PreparedActor {
        roll_options,
        statistics,
        rule_element_states,
    }
}

/// Collaborators needed while creating items.
#[derive(Clone, Copy)]
pub struct CreationServices<'a> {
    pub library: &'a dyn ItemLibrary,
    pub migrator: &'a dyn SchemaMigrator,
}

/// Run `on_pre_create_item` for a creation batch.
///
/// Returns the batch extended with granted items, each granter ahead of
/// what it granted. Granted items run their own hooks in turn, down to
/// [`MAX_GRANT_DEPTH`]. `owned` is what the actor already has; it is read
/// for duplicate checks, and granted items never reuse one of its ids.
pub fn pre_create_items(
    actor: &ActorSource,
    owned: &[ItemSource],
    batch: Vec<ItemSource>,
    services: CreationServices<'_>,
) -> Vec<ItemSource> {
    let mut known_sources: HashSet<String> = owned
        .iter()
        .chain(batch.iter())
        .filter_map(|item| item.source_id.clone())
        .collect();
    let mut ids = IdAllocator::new(format!("{}-new", actor.id));
    ids.reserve(owned.iter().chain(batch.iter()).map(|item| &item.id));
    let mut queue: VecDeque<(ItemSource, usize)> = batch.into_iter().map(|item| (item, 0)).collect();
    let mut created = Vec::new();

    while let Some((mut item, depth)) = queue.pop_front() {
        let mut queued = Vec::new();
        if depth < MAX_GRANT_DEPTH {
            for element in RuleElement::instantiate(&item, actor.kind) {
                element.pre_create_item(&mut CreateContext {
                    actor,
                    granter: &mut item,
                    library: services.library,
                    migrator: services.migrator,
                    known_sources: &mut known_sources,
                    queued: &mut queued,
                    ids: &mut ids,
                });
            }
        } else if item.rules.iter().any(|rule| rule.key() == "GrantItem") {
            tracing::warn!(item = %item.id, depth, "grant depth limit reached, not granting further");
        }
        created.push(item);
        // Grantees go next so each granter is directly followed by its grants.
        for grantee in queued.into_iter().rev() {
            queue.push_front((grantee, depth + 1));
        }
    }

    tracing::debug!(actor = %actor.id, created = created.len(), "expanded creation batch");
    created
}
