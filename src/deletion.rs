//! Deletion coordinator.
//!
//! A deletion request is planned against one snapshot of the actor and then
//! committed as one batch. Requests for the same actor are serialized by a
//! per-actor lock held from planning until the plan is committed or dropped;
//! requests for different actors do not wait on each other.

use crate::document::ItemSource;
use crate::error::DeletionError;
use crate::grant::{DeletionPlan, GrantGraph};
use crate::id::{ActorId, ItemId};
use crate::rule_element::{DeleteContext, RuleElement};
use crate::store::DocumentStore;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A planned deletion, holding its actor's lock.
///
/// Dropping it without committing cancels the request.
pub struct PlannedDeletion {
    actor: ActorId,
    plan: DeletionPlan,
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl PlannedDeletion {
    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn plan(&self) -> &DeletionPlan {
        &self.plan
    }
}

impl fmt::Debug for PlannedDeletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedDeletion")
            .field("actor", &self.actor)
            .field("plan", &self.plan)
            .finish()
    }
}

/// Plans and commits deletions against a document store.
///
/// # Examples
///
/// ```rust
/// use modstack::deletion::DeletionCoordinator;
/// use modstack::document::{ActorKind, ActorSource, ItemSource};
/// use modstack::grant::DeletePolicy;
/// use modstack::store::{DocumentStore, MemoryStore};
/// use modstack::{ActorId, ItemId};
/// use modstack::document::GrantedBy;
///
/// let store = MemoryStore::new();
/// let hero = ActorId::new("hero");
/// store.insert_actor(ActorSource::new("hero", "Hero", ActorKind::Character));
///
/// let mut feat = ItemSource::new("feat", "Feat");
/// feat.add_grant(ItemId::new("action"), DeletePolicy::Cascade);
/// let mut action = ItemSource::new("action", "Action");
/// action.granted_by = Some(GrantedBy { id: ItemId::new("feat"), on_delete: DeletePolicy::RemoveLink });
/// store.insert_item(&hero, feat).unwrap();
/// store.insert_item(&hero, action).unwrap();
///
/// let coordinator = DeletionCoordinator::new(store);
/// let plan = coordinator.delete(&hero, &[ItemId::new("feat")]).unwrap();
/// assert_eq!(plan.deletions.len(), 2);
/// assert!(coordinator.store().read_actor(&hero).unwrap().items.is_empty());
/// ```
pub struct DeletionCoordinator<S> {
    store: S,
    locks: Mutex<HashMap<ActorId, Arc<Mutex<()>>>>,
}

impl<S: DocumentStore> DeletionCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn actor_lock(&self, actor: &ActorId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        prune_idle(&mut locks);
        locks.entry(actor.clone()).or_default().clone()
    }

    /// Number of actors with a request planned or waiting.
    pub fn busy_actors(&self) -> usize {
        let mut locks = self.locks.lock();
        prune_idle(&mut locks);
        locks.len()
    }

    /// Plan a deletion, waiting for any earlier request on the same actor.
    pub fn plan(&self, actor: &ActorId, targets: &[ItemId]) -> Result<PlannedDeletion, DeletionError> {
        let guard = self.actor_lock(actor).lock_arc();
        self.plan_locked(actor, targets, guard)
    }

    /// Plan a deletion unless another request on the same actor is in
    /// flight, in which case `None` is returned.
    pub fn try_plan(
        &self,
        actor: &ActorId,
        targets: &[ItemId],
    ) -> Option<Result<PlannedDeletion, DeletionError>> {
        let guard = self.actor_lock(actor).try_lock_arc()?;
        Some(self.plan_locked(actor, targets, guard))
    }

    fn plan_locked(
        &self,
        actor: &ActorId,
        targets: &[ItemId],
        guard: ArcMutexGuard<RawMutex, ()>,
    ) -> Result<PlannedDeletion, DeletionError> {
        let source = self.store.read_actor(actor)?;
        let items = source
            .items
            .iter()
            .map(|id| self.store.read_item(id))
            .collect::<Result<Vec<ItemSource>, _>>()?;
        let graph = GrantGraph::from_items(&items);
        if let Err(error) = graph.detect_cycles() {
            tracing::warn!(actor = %actor, %error, "grant graph has a cycle");
        }

        let by_id: HashMap<&ItemId, &ItemSource> = items.iter().map(|item| (&item.id, item)).collect();
        let elements: HashMap<&ItemId, Vec<RuleElement>> = targets
            .iter()
            .filter_map(|target| by_id.get(target).map(|item| (target, RuleElement::instantiate(item, source.kind))))
            .collect();

        let plan = graph.plan_request(targets, |target, pending| {
            let mut ctx = DeleteContext::new(&graph, target, pending);
            for element in elements.get(target).into_iter().flatten() {
                element.pre_delete_item(&mut ctx);
            }
            ctx.check()
        });
        for (target, mut owned) in elements {
            if plan.deletions.contains(target) {
                owned.iter_mut().for_each(RuleElement::retire);
            }
        }
        tracing::debug!(
            actor = %actor,
            deletions = plan.deletions.len(),
            updates = plan.updates.len(),
            aborted = plan.aborted.len(),
            "planned deletion"
        );
        Ok(PlannedDeletion {
            actor: actor.clone(),
            plan,
            _guard: guard,
        })
    }

    /// Commit a plan. The actor's lock is released when this returns.
    pub fn commit(&self, planned: PlannedDeletion) -> Result<DeletionPlan, DeletionError> {
        let PlannedDeletion { actor, plan, _guard } = planned;
        if plan.is_empty() {
            return Ok(plan);
        }
        self.store.commit_batch(&plan.deletions, &plan.updates)?;
        tracing::info!(
            actor = %actor,
            deleted = plan.deletions.len(),
            updated = plan.updates.len(),
            "committed deletion"
        );
        Ok(plan)
    }

    /// Plan and commit in one call.
    pub fn delete(&self, actor: &ActorId, targets: &[ItemId]) -> Result<DeletionPlan, DeletionError> {
        let planned = self.plan(actor, targets)?;
        self.commit(planned)
    }
}

/// Drop lock entries nobody holds or waits on. Callers hold the table
/// lock, so no new clone can appear while counting.
fn prune_idle(locks: &mut HashMap<ActorId, Arc<Mutex<()>>>) {
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
}

impl<S: fmt::Debug> fmt::Debug for DeletionCoordinator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeletionCoordinator")
            .field("store", &self.store)
            .field("actors", &self.locks.lock().len())
            .finish()
    }
}
