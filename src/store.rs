//! Collaborator interfaces.
//!
//! The engine reads documents from, and commits deletions to, a store it
//! does not own. Granted items come from a shared library and pass through
//! a schema migrator first. Labels are resolved by a localization layer.
//! `MemoryStore` is an in-process store for tests and demos.

use crate::document::{ActorSource, ItemPatch, ItemSource};
use crate::error::{MigrationError, StoreError};
use crate::id::{ActorId, ItemId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Durable document storage.
pub trait DocumentStore: Send + Sync {
    fn read_item(&self, id: &ItemId) -> Result<ItemSource, StoreError>;

    fn read_actor(&self, id: &ActorId) -> Result<ActorSource, StoreError>;

    fn commit_deletions(&self, ids: &[ItemId]) -> Result<(), StoreError>;

    fn commit_updates(&self, patches: &[ItemPatch]) -> Result<(), StoreError>;

    /// Commit deletions and updates as one batch.
    ///
    /// The default calls the two commits in turn; stores that can do better
    /// should override this to make the batch atomic.
    fn commit_batch(&self, deletions: &[ItemId], updates: &[ItemPatch]) -> Result<(), StoreError> {
        self.commit_deletions(deletions)?;
        self.commit_updates(updates)
    }
}

/// Brings documents from older data versions up to the current schema.
pub trait SchemaMigrator: Send + Sync {
    fn ensure_current_schema(
        &self,
        item: ItemSource,
        known_version: u32,
    ) -> Result<ItemSource, MigrationError>;
}

/// Migrator that performs no transformations and only stamps the version.
#[derive(Debug, Clone, Copy)]
pub struct NoopMigrator {
    pub current_version: u32,
}

impl SchemaMigrator for NoopMigrator {
    fn ensure_current_schema(
        &self,
        mut item: ItemSource,
        known_version: u32,
    ) -> Result<ItemSource, MigrationError> {
        if known_version > self.current_version {
            return Err(MigrationError::FromTheFuture {
                item: item.name,
                found: known_version,
                supported: self.current_version,
            });
        }
        item.schema_version = self.current_version;
        Ok(item)
    }
}

/// Shared library of item sources that grants copy from.
pub trait ItemLibrary: Send + Sync {
    fn fetch(&self, uuid: &str) -> Option<ItemSource>;
}

impl ItemLibrary for HashMap<String, ItemSource> {
    fn fetch(&self, uuid: &str) -> Option<ItemSource> {
        self.get(uuid).cloned()
    }
}

/// Resolves label keys to display text.
pub trait LabelResolver {
    fn resolve(&self, key: &str) -> Option<String>;

    /// Resolve, falling back to the key itself.
    fn resolve_or_key(&self, key: &str) -> String {
        self.resolve(key).unwrap_or_else(|| key.to_string())
    }
}

impl LabelResolver for HashMap<String, String> {
    fn resolve(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Label resolver that knows no translations.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawLabels;

impl LabelResolver for RawLabels {
    fn resolve(&self, _key: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    actors: HashMap<ActorId, ActorSource>,
    items: HashMap<ItemId, ItemSource>,
}

/// In-memory `DocumentStore`.
///
/// Batches are validated before anything is written, so a rejected batch
/// leaves the store untouched.
///
/// # Examples
///
/// ```rust
/// use modstack::document::{ActorKind, ActorSource, ItemSource};
/// use modstack::store::{DocumentStore, MemoryStore};
/// use modstack::{ActorId, ItemId};
///
/// let store = MemoryStore::new();
/// store.insert_actor(ActorSource::new("hero", "Hero", ActorKind::Character));
/// store.insert_item(&ActorId::new("hero"), ItemSource::new("sword", "Sword")).unwrap();
///
/// assert_eq!(store.read_actor(&ActorId::new("hero")).unwrap().items.len(), 1);
/// store.commit_deletions(&[ItemId::new("sword")]).unwrap();
/// assert!(store.read_item(&ItemId::new("sword")).is_err());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_actor(&self, actor: ActorSource) {
        self.inner.write().actors.insert(actor.id.clone(), actor);
    }

    /// Store a new item and attach it to an actor. Refuses an id that is
    /// already stored.
    pub fn insert_item(&self, actor: &ActorId, item: ItemSource) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.items.contains_key(&item.id) {
            return Err(StoreError::DuplicateItem(item.id));
        }
        let owner = inner
            .actors
            .get_mut(actor)
            .ok_or_else(|| StoreError::ActorNotFound(actor.clone()))?;
        owner.items.push(item.id.clone());
        inner.items.insert(item.id.clone(), item);
        Ok(())
    }

    /// Overwrite a stored item, keeping its owner.
    pub fn replace_item(&self, item: ItemSource) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        match inner.items.get_mut(&item.id) {
            Some(slot) => {
                *slot = item;
                Ok(())
            }
            None => Err(StoreError::ItemNotFound(item.id)),
        }
    }

    /// Read every item an actor owns, in sheet order.
    pub fn read_actor_items(&self, actor: &ActorId) -> Result<Vec<ItemSource>, StoreError> {
        let owner = self.read_actor(actor)?;
        owner.items.iter().map(|id| self.read_item(id)).collect()
    }

    /// Make the next commit fail with `StoreError::Rejected`.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Rejected("simulated storage failure".into()));
        }
        Ok(())
    }

    fn validate(
        inner: &MemoryInner,
        deletions: &[ItemId],
        updates: &[ItemPatch],
    ) -> Result<(), StoreError> {
        for id in deletions.iter().chain(updates.iter().map(ItemPatch::target)) {
            if !inner.items.contains_key(id) {
                return Err(StoreError::ItemNotFound(id.clone()));
            }
        }
        Ok(())
    }

    fn apply(inner: &mut MemoryInner, deletions: &[ItemId], updates: &[ItemPatch]) {
        for patch in updates {
            if let Some(item) = inner.items.get_mut(patch.target()) {
                patch.apply(item);
            }
        }
        for id in deletions {
            inner.items.remove(id);
        }
        for actor in inner.actors.values_mut() {
            actor.items.retain(|id| !deletions.contains(id));
        }
    }
}

impl DocumentStore for MemoryStore {
    fn read_item(&self, id: &ItemId) -> Result<ItemSource, StoreError> {
        self.inner
            .read()
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ItemNotFound(id.clone()))
    }

    fn read_actor(&self, id: &ActorId) -> Result<ActorSource, StoreError> {
        self.inner
            .read()
            .actors
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ActorNotFound(id.clone()))
    }

    fn commit_deletions(&self, ids: &[ItemId]) -> Result<(), StoreError> {
        self.commit_batch(ids, &[])
    }

    fn commit_updates(&self, patches: &[ItemPatch]) -> Result<(), StoreError> {
        self.commit_batch(&[], patches)
    }

    fn commit_batch(&self, deletions: &[ItemId], updates: &[ItemPatch]) -> Result<(), StoreError> {
        self.check_failure()?;
        let mut inner = self.inner.write();
        Self::validate(&inner, deletions, updates)?;
        Self::apply(&mut inner, deletions, updates);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ActorKind;
    use crate::grant::DeletePolicy;

    fn store_with(items: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_actor(ActorSource::new("hero", "Hero", ActorKind::Character));
        for id in items {
            store
                .insert_item(&ActorId::new("hero"), ItemSource::new(*id, *id))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_insert_item_requires_actor() {
        let store = MemoryStore::new();
        let err = store
            .insert_item(&ActorId::new("nobody"), ItemSource::new("x", "X"))
            .unwrap_err();
        assert_eq!(err, StoreError::ActorNotFound(ActorId::new("nobody")));
    }

    #[test]
    fn test_insert_item_refuses_id_clash() {
        let store = store_with(&["a"]);
        store.insert_actor(ActorSource::new("rival", "Rival", ActorKind::Npc));
        let mut clash = ItemSource::new("a", "Impostor");
        clash.source_id = Some("lib.impostor".into());

        for owner in ["hero", "rival"] {
            let err = store
                .insert_item(&ActorId::new(owner), clash.clone())
                .unwrap_err();
            assert_eq!(err, StoreError::DuplicateItem(ItemId::new("a")));
        }
        assert_eq!(store.read_item(&ItemId::new("a")).unwrap().name, "a");
        assert_eq!(store.read_actor(&ActorId::new("hero")).unwrap().items.len(), 1);
        assert!(store.read_actor(&ActorId::new("rival")).unwrap().items.is_empty());
    }

    #[test]
    fn test_replace_item() {
        let store = store_with(&["a"]);
        store.replace_item(ItemSource::new("a", "Renamed")).unwrap();
        assert_eq!(store.read_item(&ItemId::new("a")).unwrap().name, "Renamed");
        assert_eq!(store.read_actor(&ActorId::new("hero")).unwrap().items.len(), 1);
        assert_eq!(
            store.replace_item(ItemSource::new("ghost", "Ghost")).unwrap_err(),
            StoreError::ItemNotFound(ItemId::new("ghost"))
        );
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let store = store_with(&["a", "b"]);
        let err = store
            .commit_batch(&[ItemId::new("a"), ItemId::new("ghost")], &[])
            .unwrap_err();
        assert_eq!(err, StoreError::ItemNotFound(ItemId::new("ghost")));
        assert!(store.read_item(&ItemId::new("a")).is_ok());
    }

    #[test]
    fn test_simulated_failure_fires_once() {
        let store = store_with(&["a"]);
        store.fail_next_commit();
        assert!(store.commit_deletions(&[ItemId::new("a")]).is_err());
        assert!(store.read_item(&ItemId::new("a")).is_ok());
        assert!(store.commit_deletions(&[ItemId::new("a")]).is_ok());
        assert!(store.read_actor(&ActorId::new("hero")).unwrap().items.is_empty());
    }

    #[test]
    fn test_updates_apply_patches() {
        let store = store_with(&["b"]);
        let mut a = ItemSource::new("a", "A");
        a.add_grant(ItemId::new("b"), DeletePolicy::Cascade);
        store.insert_item(&ActorId::new("hero"), a).unwrap();

        store
            .commit_updates(&[ItemPatch::RemoveGrant {
                granter: ItemId::new("a"),
                grantee: ItemId::new("b"),
            }])
            .unwrap();
        assert!(store.read_item(&ItemId::new("a")).unwrap().item_grants.is_empty());
    }

    #[test]
    fn test_noop_migrator() {
        let migrator = NoopMigrator { current_version: 5 };
        let item = migrator
            .ensure_current_schema(ItemSource::new("a", "A"), 2)
            .unwrap();
        assert_eq!(item.schema_version, 5);
        assert!(migrator
            .ensure_current_schema(ItemSource::new("a", "A"), 9)
            .is_err());
    }

    #[test]
    fn test_label_fallback() {
        let labels: HashMap<String, String> = HashMap::new();
        assert_eq!(labels.resolve_or_key("PF2E.X"), "PF2E.X");
        assert_eq!(RawLabels.resolve_or_key("k"), "k");
    }
}
