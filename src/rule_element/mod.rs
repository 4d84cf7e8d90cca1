//! Rule elements.
//!
//! Items carry declarative behaviour as a list of rule element sources. Each
//! source is resolved once into a [`RuleElement`] wrapping the handler for
//! its kind. Handlers contribute at three lifecycle points:
//!
//! - `on_prepare_data`: roll options, modifiers and modifier adjustments,
//!   recomputed on every preparation pass,
//! - `on_pre_create_item`: grants, before an item is created,
//! - `on_pre_delete_item`: grant bookkeeping, before an item is deleted.
//!
//! A failing hook never stops the pass. [`RuleElement::run_hook`] logs the
//! error and treats the hook as a no-op.

mod adjust_modifier;
mod flat_modifier;
mod grant_item;
mod roll_option;

pub use adjust_modifier::{AdjustEffect, AdjustMode, AdjustModifierSource, ModifierAdjustment};
pub use flat_modifier::FlatModifierSource;
pub use grant_item::{GrantItemSource, OnDeleteActions};
pub use roll_option::RollOptionSource;

use crate::document::{ActorKind, ActorSource, ItemSource};
use crate::error::RuleElementError;
use crate::grant::{GrantGraph, PendingDeletions, PreDeleteOutcome};
use crate::id::ItemId;
use crate::modifier::Modifier;
use crate::roll_options::RollOptionSet;
use crate::store::{ItemLibrary, SchemaMigrator};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A rule element as authored on an item, tagged by `key`.
///
/// Unrecognized keys deserialize to `Unknown` so one bad entry does not make
/// the whole item unreadable; such elements are always ignored.
///
/// ```rust
/// use modstack::rule_element::RuleElementSource;
///
/// let source: RuleElementSource = serde_json::from_str(
///     r#"{"key": "FlatModifier", "selector": "ac", "type": "item", "value": 1}"#,
/// )
/// .unwrap();
/// assert_eq!(source.key(), "FlatModifier");
///
/// let unknown: RuleElementSource = serde_json::from_str(r#"{"key": "Aura"}"#).unwrap();
/// assert_eq!(unknown, RuleElementSource::Unknown);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key")]
pub enum RuleElementSource {
    FlatModifier(FlatModifierSource),
    RollOption(RollOptionSource),
    AdjustModifier(AdjustModifierSource),
    GrantItem(GrantItemSource),
    #[serde(other)]
    Unknown,
}

impl RuleElementSource {
    pub fn key(&self) -> &'static str {
        match self {
            RuleElementSource::FlatModifier(_) => "FlatModifier",
            RuleElementSource::RollOption(_) => "RollOption",
            RuleElementSource::AdjustModifier(_) => "AdjustModifier",
            RuleElementSource::GrantItem(_) => "GrantItem",
            RuleElementSource::Unknown => "Unknown",
        }
    }

    /// Whether the author switched this element off.
    pub fn is_ignored(&self) -> bool {
        match self {
            RuleElementSource::FlatModifier(s) => s.ignored,
            RuleElementSource::RollOption(s) => s.ignored,
            RuleElementSource::AdjustModifier(s) => s.ignored,
            RuleElementSource::GrantItem(s) => s.ignored,
            RuleElementSource::Unknown => false,
        }
    }

    fn into_handler(self) -> Result<Box<dyn RuleElementHandler>, RuleElementError> {
        match self {
            RuleElementSource::FlatModifier(s) => Ok(Box::new(s)),
            RuleElementSource::RollOption(s) => Ok(Box::new(s)),
            RuleElementSource::AdjustModifier(s) => Ok(Box::new(s)),
            RuleElementSource::GrantItem(s) => Ok(Box::new(s)),
            RuleElementSource::Unknown => Err(RuleElementError::InvalidSource {
                key: "Unknown",
                reason: "unrecognized rule element key".into(),
            }),
        }
    }
}

/// One selector or a list of them. Authored as `"selector": "ac"` or
/// `"selectors": ["ac", "reflex"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selector {
    One(String),
    Many(Vec<String>),
}

impl Default for Selector {
    fn default() -> Self {
        Selector::Many(Vec::new())
    }
}

impl Selector {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice = match self {
            Selector::One(s) => std::slice::from_ref(s),
            Selector::Many(v) => v.as_slice(),
        };
        slice.iter().map(String::as_str)
    }

    pub(crate) fn validate(&self, key: &'static str) -> Result<(), RuleElementError> {
        let mut any = false;
        for selector in self.iter() {
            if selector.trim().is_empty() {
                return Err(RuleElementError::InvalidSource {
                    key,
                    reason: "empty selector".into(),
                });
            }
            any = true;
        }
        if !any {
            return Err(RuleElementError::InvalidSource {
                key,
                reason: "no selector".into(),
            });
        }
        Ok(())
    }
}

/// Lower-case, hyphen-separated form of a name.
pub(crate) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Which part of the preparation pass a handler runs in.
///
/// Roll options are collected first so that predicates on modifiers and
/// adjustments can see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreparePhase {
    RollOptions,
    Synthetics,
}

/// Contributions collected during a preparation pass, keyed by domain.
#[derive(Debug, Clone, Default)]
pub struct Synthetics {
    modifiers: HashMap<String, Vec<Modifier>>,
    adjustments: HashMap<String, Vec<ModifierAdjustment>>,
    roll_options: HashMap<String, Vec<String>>,
}

impl Synthetics {
    pub fn add_modifier(&mut self, domain: &str, modifier: Modifier) {
        self.modifiers.entry(domain.to_string()).or_default().push(modifier);
    }

    pub fn add_adjustment(&mut self, domain: &str, adjustment: ModifierAdjustment) {
        self.adjustments
            .entry(domain.to_string())
            .or_default()
            .push(adjustment);
    }

    pub fn add_roll_option(&mut self, domain: &str, option: String) {
        self.roll_options.entry(domain.to_string()).or_default().push(option);
    }

    pub fn modifiers(&self, domain: &str) -> &[Modifier] {
        self.modifiers.get(domain).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn adjustments(&self, domain: &str) -> &[ModifierAdjustment] {
        self.adjustments.get(domain).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn roll_options(&self, domain: &str) -> &[String] {
        self.roll_options.get(domain).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// What `on_prepare_data` sees.
pub struct PrepareContext<'a> {
    pub actor: &'a ActorSource,
    /// The item that owns the rule element.
    pub item: &'a ItemSource,
    /// Actor-wide roll options; grows during the pass.
    pub roll_options: &'a mut RollOptionSet,
    pub synthetics: &'a mut Synthetics,
}

/// Hands out ids for items created during one batch, skipping every id
/// reserved as already in use.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    prefix: String,
    next: u64,
    taken: HashSet<ItemId>,
}

impl IdAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
            taken: HashSet::new(),
        }
    }

    /// Mark ids as in use so `fresh` never returns them.
    pub fn reserve<'i>(&mut self, ids: impl IntoIterator<Item = &'i ItemId>) {
        self.taken.extend(ids.into_iter().cloned());
    }

    pub fn fresh(&mut self) -> ItemId {
        loop {
            self.next += 1;
            let id = ItemId::new(&format!("{}-{}", self.prefix, self.next));
            if self.taken.insert(id.clone()) {
                return id;
            }
        }
    }
}

/// What `on_pre_create_item` sees.
pub struct CreateContext<'a> {
    pub actor: &'a ActorSource,
    /// The item about to be created. Grant bookkeeping is written here.
    pub granter: &'a mut ItemSource,
    pub library: &'a dyn ItemLibrary,
    pub migrator: &'a dyn SchemaMigrator,
    /// Source ids already on the actor or earlier in the batch.
    pub known_sources: &'a mut HashSet<String>,
    /// Items to create alongside `granter`.
    pub queued: &'a mut Vec<ItemSource>,
    pub ids: &'a mut IdAllocator,
}

/// What `on_pre_delete_item` sees.
pub struct DeleteContext<'a> {
    pub graph: &'a GrantGraph,
    /// The item being deleted.
    pub item: &'a ItemId,
    pub pending: &'a mut PendingDeletions,
    outcome: Option<PreDeleteOutcome>,
}

impl<'a> DeleteContext<'a> {
    pub fn new(graph: &'a GrantGraph, item: &'a ItemId, pending: &'a mut PendingDeletions) -> Self {
        Self {
            graph,
            item,
            pending,
            outcome: None,
        }
    }

    /// Run the grant manager's pre-delete check for `item`. Only the first
    /// call reaches the graph; later calls return its outcome.
    pub fn check(&mut self) -> PreDeleteOutcome {
        match self.outcome {
            Some(outcome) => outcome,
            None => {
                let outcome = self.graph.on_pre_delete(self.item, self.pending);
                self.outcome = Some(outcome);
                outcome
            }
        }
    }
}

/// Behaviour of one rule element kind.
///
/// Every hook defaults to doing nothing.
pub trait RuleElementHandler: fmt::Debug + Send + Sync {
    /// The `key` this handler was resolved from.
    fn key(&self) -> &'static str;

    /// Check the source data. Runs once, at activation.
    fn validate(&self) -> Result<(), RuleElementError> {
        Ok(())
    }

    /// Whether the element works on this kind of actor.
    fn supports(&self, _kind: ActorKind) -> bool {
        true
    }

    fn phase(&self) -> PreparePhase {
        PreparePhase::Synthetics
    }

    fn on_prepare_data(&self, _ctx: &mut PrepareContext<'_>) -> Result<(), RuleElementError> {
        Ok(())
    }

    fn on_pre_create_item(&self, _ctx: &mut CreateContext<'_>) -> Result<(), RuleElementError> {
        Ok(())
    }

    fn on_pre_delete_item(&self, _ctx: &mut DeleteContext<'_>) -> Result<(), RuleElementError> {
        Ok(())
    }
}

/// Lifecycle of a rule element instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleElementState {
    /// Constructed, preconditions not yet checked.
    Pending,
    Active,
    /// Preconditions failed; every hook is skipped.
    Ignored,
    /// The owning item was deleted.
    Retired,
}

/// A rule element instance bound to its owning item.
///
/// ```rust
/// use modstack::document::ActorKind;
/// use modstack::rule_element::{RuleElement, RuleElementSource, RuleElementState};
/// use modstack::ItemId;
///
/// let source: RuleElementSource =
///     serde_json::from_str(r#"{"key": "RollOption", "option": "self:raging"}"#).unwrap();
/// let mut element = RuleElement::new(ItemId::new("rage"), 0, source);
/// assert_eq!(element.state(), RuleElementState::Pending);
///
/// element.activate(ActorKind::Character);
/// assert_eq!(element.state(), RuleElementState::Active);
/// ```
#[derive(Debug)]
pub struct RuleElement {
    item: ItemId,
    index: usize,
    key: &'static str,
    ignored_by_author: bool,
    handler: Result<Box<dyn RuleElementHandler>, RuleElementError>,
    state: RuleElementState,
}

impl RuleElement {
    pub fn new(item: ItemId, index: usize, source: RuleElementSource) -> Self {
        Self {
            item,
            index,
            key: source.key(),
            ignored_by_author: source.is_ignored(),
            handler: source.into_handler(),
            state: RuleElementState::Pending,
        }
    }

    /// Resolve and activate every rule element on an item, in source order.
    pub fn instantiate(item: &ItemSource, actor_kind: ActorKind) -> Vec<RuleElement> {
        item.rules
            .iter()
            .enumerate()
            .map(|(index, source)| {
                let mut element = RuleElement::new(item.id.clone(), index, source.clone());
                element.activate(actor_kind);
                element
            })
            .collect()
    }

    pub fn item(&self) -> &ItemId {
        &self.item
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn state(&self) -> RuleElementState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RuleElementState::Active
    }

    /// Check preconditions and move to `Active` or `Ignored`.
    pub fn activate(&mut self, actor_kind: ActorKind) {
        if self.state == RuleElementState::Retired {
            return;
        }
        let reason = match &self.handler {
            _ if self.ignored_by_author => Some("ignored by its source".to_string()),
            Err(error) => Some(error.to_string()),
            Ok(handler) if !handler.supports(actor_kind) => {
                Some(format!("unsupported on {actor_kind:?} actors"))
            }
            Ok(handler) => handler.validate().err().map(|error| error.to_string()),
        };
        match reason {
            None => self.state = RuleElementState::Active,
            Some(reason) => {
                tracing::debug!(
                    item = %self.item,
                    index = self.index,
                    key = self.key,
                    %reason,
                    "rule element ignored"
                );
                self.state = RuleElementState::Ignored;
            }
        }
    }

    /// The owning item is gone; no hook runs again.
    pub fn retire(&mut self) {
        self.state = RuleElementState::Retired;
    }

    /// The phase this element prepares in, if it is active.
    pub fn phase(&self) -> Option<PreparePhase> {
        self.active_handler().map(|handler| handler.phase())
    }

    fn active_handler(&self) -> Option<&dyn RuleElementHandler> {
        match (&self.handler, self.state) {
            (Ok(handler), RuleElementState::Active) => Some(handler.as_ref()),
            _ => None,
        }
    }

    /// Run one hook with failure isolation.
    ///
    /// Inactive elements are skipped. An `Err` from the hook is logged and
    /// swallowed. Returns whether the hook ran to completion.
    pub fn run_hook<F>(&self, hook: &'static str, f: F) -> bool
    where
        F: FnOnce(&dyn RuleElementHandler) -> Result<(), RuleElementError>,
    {
        let Some(handler) = self.active_handler() else {
            tracing::debug!(item = %self.item, index = self.index, hook, state = ?self.state, "skipping rule element");
            return false;
        };
        match f(handler) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    item = %self.item,
                    index = self.index,
                    key = self.key,
                    hook,
                    %error,
                    "rule element failed"
                );
                false
            }
        }
    }

    pub fn prepare_data(&self, ctx: &mut PrepareContext<'_>) -> bool {
        self.run_hook("on_prepare_data", |handler| handler.on_prepare_data(ctx))
    }

    pub fn pre_create_item(&self, ctx: &mut CreateContext<'_>) -> bool {
        self.run_hook("on_pre_create_item", |handler| handler.on_pre_create_item(ctx))
    }

    pub fn pre_delete_item(&self, ctx: &mut DeleteContext<'_>) -> bool {
        self.run_hook("on_pre_delete_item", |handler| handler.on_pre_delete_item(ctx))
    }
}
