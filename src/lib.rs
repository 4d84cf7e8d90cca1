//! # modstack - Deterministic Modifier Stacking and Item Grant Engine
//!
//! Computes the numeric statistics of a tabletop character (attack bonuses,
//! difficulty classes, skill totals) from many independent, conditional
//! modifiers, and keeps the grant relationships between items consistent
//! when items are created and deleted.
//!
//! ## Core Concepts
//!
//! ### Preparation Pipeline
//!
//! ```text
//! [ItemSource rules] → [RuleElement] → [Modifier] → [ModifierAggregator] → [Statistic]
//!                                   ↘ [RollOptionSet] ↗
//! ```
//!
//! 1. **Roll options** are string tags describing the current situation
//! 2. **Predicates** are boolean expressions over roll options
//! 3. **Rule elements** on items contribute roll options, modifiers and
//!    adjustments
//! 4. **Aggregation** applies the stacking rule: within a type and sign
//!    only the largest modifier counts, untyped modifiers always add up
//!
//! ### Grants
//!
//! Items may grant other items. [`grant::GrantGraph`] records each grant as
//! an edge with a deletion policy for each end (`cascade`, `restrict` or
//! `remove-link`) and plans deletions against it.
//! [`deletion::DeletionCoordinator`] commits those plans to a
//! [`store::DocumentStore`].
//!
//! ## Example
//!
//! ```rust
//! use modstack::*;
//!
//! let options: RollOptionSet = ["self:ability:str:score:12"].into_iter().collect();
//! let weak = Predicate::lt("self:ability:str:score", 14);
//!
//! let stat = aggregate(
//!     vec![
//!         Modifier::new("aid", ModifierType::Circumstance, 2),
//!         Modifier::new("cover", ModifierType::Circumstance, 4),
//!         Modifier::new("luck", ModifierType::Untyped, 1),
//!         Modifier::new("bulk", ModifierType::Status, -1).with_predicate(weak),
//!     ],
//!     &options,
//! );
//! assert_eq!(stat.total, 4);
//! ```
//!
//! ## Modules
//!
//! - [`id`] - Item, actor and statistic identifiers
//! - [`roll_options`] - Roll option sets
//! - [`predicate`] - Predicate language and evaluation
//! - [`modifier`] - Modifiers and modifier types
//! - [`config`] - Stacking table and type labels
//! - [`aggregate`] - Modifier aggregation
//! - [`statistic`] - Aggregated results and breakdowns
//! - [`document`] - Actor and item source documents
//! - [`rule_element`] - Rule element runtime
//! - [`prepare`] - Data preparation and item creation passes
//! - [`grant`] - Grant graph and deletion planning
//! - [`deletion`] - Serialized deletion commits
//! - [`store`] - Storage, migration, library and label interfaces
//! - [`error`] - Error types
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod aggregate;
pub mod config;
pub mod deletion;
pub mod document;
pub mod error;
pub mod grant;
pub mod id;
pub mod modifier;
pub mod predicate;
pub mod prepare;
pub mod roll_options;
pub mod rule_element;
pub mod statistic;
pub mod store;

// Re-export main types for convenience
pub use aggregate::{aggregate, ModifierAggregator};
pub use config::ModifierConfig;
pub use error::{DeletionError, GrantError, PredicateError, RuleElementError, StoreError};
pub use id::{ActorId, ItemId, StatId};
pub use modifier::{Modifier, ModifierType};
pub use predicate::Predicate;
pub use roll_options::RollOptionSet;
pub use statistic::{AppliedModifier, Statistic};
