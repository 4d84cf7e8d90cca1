//! Error types.
//!
//! Each concern has its own enum. Predicate and rule-element errors are
//! recovered inside the engine (logged, then treated as `false` or a no-op);
//! grant, store and deletion errors reach the caller.

use crate::id::{ActorId, ItemId};
use thiserror::Error;

/// Format a grant cycle as a readable string.
fn format_cycle_path(path: &[ItemId]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Why a predicate could not be evaluated.
///
/// [`Predicate::evaluate`](crate::Predicate::evaluate) never returns this;
/// it logs it and yields `false`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredicateError {
    /// The predicate node had a shape or operator the evaluator does not know.
    #[error("Malformed predicate: {0}")]
    Malformed(String),

    /// A tag matched a comparison prefix but its suffix is not a number.
    #[error("Roll option {prefix}:{suffix} has a non-numeric suffix")]
    NonNumericSuffix { prefix: String, suffix: String },
}

/// A rule element failed while running a hook or validating its source.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuleElementError {
    /// The rule element's source data is unusable.
    #[error("Invalid {key} rule element: {reason}")]
    InvalidSource { key: &'static str, reason: String },

    /// A grant referenced an item the library does not have.
    #[error("Granted item {0} not found")]
    GrantSourceNotFound(String),

    /// The migration collaborator rejected a granted item.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Anything else a handler reports.
    #[error("{0}")]
    Failed(String),
}

/// Data-integrity problems in the grant edge table.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GrantError {
    /// A chain of grants leads back to its start.
    #[error("Grant cycle detected: {}", format_cycle_path(.path))]
    Cycle { path: Vec<ItemId> },

    /// A grantee already has a different granter.
    #[error("Item {grantee} is already granted by {existing}")]
    AlreadyGranted { grantee: ItemId, existing: ItemId },

    /// An edge refers to an item that is not on the actor.
    #[error("Grant edge refers to missing item {0}")]
    MissingItem(ItemId),

    /// The two redundant records of an edge disagree.
    #[error("Grant records for {granter} -> {grantee} do not match")]
    Mismatch { granter: ItemId, grantee: ItemId },
}

/// Failures reported by the document store collaborator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Actor not found: {0}")]
    ActorNotFound(ActorId),

    #[error("Item id already in use: {0}")]
    DuplicateItem(ItemId),

    /// The store refused a commit.
    #[error("Commit rejected: {0}")]
    Rejected(String),
}

/// Failures reported by the schema migration collaborator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MigrationError {
    #[error("Item {item} has schema version {found}, newer than supported {supported}")]
    FromTheFuture {
        item: String,
        found: u32,
        supported: u32,
    },

    #[error("Migration of {item} failed: {reason}")]
    Failed { item: String, reason: String },
}

/// Errors surfaced by a deletion request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeletionError {
    /// Reading the snapshot or committing the batch failed.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),
}
