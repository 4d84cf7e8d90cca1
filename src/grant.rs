//! Grant graph module.
//!
//! Items can grant other items: a feat grants an action, a class grants its
//! features. Each grant is a directed edge granter → grantee recorded on
//! both items. `GrantGraph` turns those records into an explicit edge table
//! and plans deletions against it:
//!
//! - deleting a granter applies the granter-side policy to each grantee,
//! - deleting a grantee applies the grantee-side policy to its granter,
//! - `cascade` recurses, and `remove-link` keeps the other item but
//!   schedules a patch clearing the link,
//! - `restrict` refuses the requested item whose cascade reaches it, unless
//!   the request removes the protected item as well.
//!
//! Planning never touches storage; see [`crate::deletion`] for committing.

use crate::document::{ItemPatch, ItemSource};
use crate::error::GrantError;
use crate::id::ItemId;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// What happens to the other end of a grant when one end is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletePolicy {
    /// Refuse the deletion while the other item exists.
    Restrict,
    /// Delete the other item too.
    Cascade,
    /// Keep the other item and clear its reference.
    #[default]
    #[serde(alias = "detach")]
    RemoveLink,
}

/// One grant edge with both policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantEdge {
    pub granter: ItemId,
    pub grantee: ItemId,
    /// Applied to the grantee when the granter is deleted.
    pub grantee_policy: DeletePolicy,
    /// Applied to the granter when the grantee is deleted.
    pub granter_policy: DeletePolicy,
}

/// Why a deletion was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    /// The item to delete granted something that must be removed first.
    GranteeRestricts,
    /// The item to delete was granted by something that forbids removal.
    GranterRestricts,
}

/// User-visible notice for a blocked deletion. Names both items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    /// The item whose deletion was requested or cascaded into.
    pub item: ItemId,
    pub item_name: String,
    /// The item that blocked it.
    pub blocker: ItemId,
    pub blocker_name: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NoticeKind::GranteeRestricts => write!(
                f,
                "{} cannot be deleted while {} (granted by it) remains",
                self.item_name, self.blocker_name
            ),
            NoticeKind::GranterRestricts => write!(
                f,
                "{} cannot be deleted because it was granted by {}",
                self.item_name, self.blocker_name
            ),
        }
    }
}

/// Deletions staged for one request, in staging order.
#[derive(Debug, Clone, Default)]
pub struct PendingDeletions {
    order: Vec<ItemId>,
    members: HashSet<ItemId>,
    /// Everything the request will delete once every target is visited.
    requested: HashSet<ItemId>,
    updates: Vec<ItemPatch>,
    notices: Vec<Notice>,
    aborted: Vec<ItemId>,
}

impl PendingDeletions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending deletions for a request that will remove all of `requested`.
    /// A `restrict` dependent in that set does not block.
    pub fn for_request(requested: impl IntoIterator<Item = ItemId>) -> Self {
        Self {
            requested: requested.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.members.contains(id)
    }

    fn is_leaving(&self, id: &ItemId) -> bool {
        self.members.contains(id) || self.requested.contains(id)
    }

    /// Stage an item. Returns `false` if it was already staged.
    pub fn stage(&mut self, id: ItemId) -> bool {
        if !self.members.insert(id.clone()) {
            return false;
        }
        self.order.push(id);
        true
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.order
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Whether a pre-delete check already refused this item.
    pub fn is_aborted(&self, id: &ItemId) -> bool {
        self.aborted.contains(id)
    }

    fn checkpoint(&self) -> (usize, usize) {
        (self.order.len(), self.updates.len())
    }

    fn rollback(&mut self, (staged, updates): (usize, usize)) {
        for id in self.order.drain(staged..) {
            self.members.remove(&id);
        }
        self.updates.truncate(updates);
    }

    /// Finish planning. Patches aimed at items that are being deleted
    /// anyway are dropped.
    pub fn into_plan(self) -> DeletionPlan {
        let members = self.members;
        let mut seen = HashSet::new();
        let updates = self
            .updates
            .into_iter()
            .filter(|patch| !members.contains(patch.target()))
            .filter(|patch| seen.insert(patch.clone()))
            .collect();
        DeletionPlan {
            deletions: self.order,
            updates,
            notices: self.notices,
            aborted: self.aborted,
        }
    }
}

/// Result of running the pre-delete check for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreDeleteOutcome {
    pub aborted: bool,
}

/// Everything a deletion request will persist, computed in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Items to delete, requested items first, then cascades in discovery order.
    pub deletions: Vec<ItemId>,
    /// Link-clearing patches for surviving items.
    pub updates: Vec<ItemPatch>,
    /// Notices for refused deletions.
    pub notices: Vec<Notice>,
    /// Requested items whose deletion was refused.
    pub aborted: Vec<ItemId>,
}

impl DeletionPlan {
    /// Whether committing this plan would change anything.
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.updates.is_empty()
    }
}

/// Explicit edge table of grants between an actor's items.
///
/// # Examples
///
/// ```rust
/// use modstack::grant::{DeletePolicy, GrantGraph};
/// use modstack::ItemId;
///
/// let mut graph = GrantGraph::new();
/// let feat = ItemId::new("feat");
/// let action = ItemId::new("action");
/// graph.add_item(feat.clone(), "Sudden Charge");
/// graph.add_item(action.clone(), "Charge");
/// graph
///     .add_edge(feat.clone(), action.clone(), DeletePolicy::Cascade, DeletePolicy::RemoveLink)
///     .unwrap();
///
/// let plan = graph.plan_deletion(&[feat.clone()]);
/// assert_eq!(plan.deletions, vec![feat, action]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GrantGraph {
    graph: StableDiGraph<ItemId, GrantEdge>,
    node_map: HashMap<ItemId, NodeIndex>,
    names: HashMap<ItemId, String>,
}

impl GrantGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the edge table from item documents.
    ///
    /// Every edge must be recorded on both ends. Edges with a dangling id,
    /// disagreeing records or a second granter are logged and ignored.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a ItemSource>) -> Self {
        let items: Vec<&ItemSource> = items.into_iter().collect();
        let mut graph = GrantGraph::new();
        for item in &items {
            graph.add_item(item.id.clone(), item.name.clone());
        }
        let by_id: HashMap<&ItemId, &ItemSource> = items.iter().map(|i| (&i.id, *i)).collect();

        for granter in &items {
            for grant in &granter.item_grants {
                let Some(grantee) = by_id.get(&grant.id) else {
                    warn_ignored(&GrantError::MissingItem(grant.id.clone()));
                    continue;
                };
                let back = grantee.granted_by.as_ref().filter(|b| b.id == granter.id);
                let Some(back) = back else {
                    warn_ignored(&GrantError::Mismatch {
                        granter: granter.id.clone(),
                        grantee: grant.id.clone(),
                    });
                    continue;
                };
                if let Err(error) = graph.add_edge(
                    granter.id.clone(),
                    grant.id.clone(),
                    grant.on_delete,
                    back.on_delete,
                ) {
                    warn_ignored(&error);
                }
            }
        }

        for grantee in &items {
            let Some(back) = &grantee.granted_by else {
                continue;
            };
            if !graph.node_map.contains_key(&back.id) {
                warn_ignored(&GrantError::MissingItem(back.id.clone()));
            } else if graph.granter_of(&grantee.id) != Some(&back.id) {
                warn_ignored(&GrantError::Mismatch {
                    granter: back.id.clone(),
                    grantee: grantee.id.clone(),
                });
            }
        }
        graph
    }

    /// Add an item node if it doesn't exist.
    pub fn add_item(&mut self, id: ItemId, name: impl Into<String>) -> NodeIndex {
        self.names.insert(id.clone(), name.into());
        if let Some(&idx) = self.node_map.get(&id) {
            idx
        } else {
            let idx = self.graph.add_node(id.clone());
            self.node_map.insert(id, idx);
            idx
        }
    }

    /// Add a grant edge. Both items must already be in the graph and the
    /// grantee must not have another granter.
    pub fn add_edge(
        &mut self,
        granter: ItemId,
        grantee: ItemId,
        grantee_policy: DeletePolicy,
        granter_policy: DeletePolicy,
    ) -> Result<(), GrantError> {
        let from = *self
            .node_map
            .get(&granter)
            .ok_or_else(|| GrantError::MissingItem(granter.clone()))?;
        let to = *self
            .node_map
            .get(&grantee)
            .ok_or_else(|| GrantError::MissingItem(grantee.clone()))?;

        if let Some(existing) = self.granter_of(&grantee) {
            if existing != &granter {
                return Err(GrantError::AlreadyGranted {
                    grantee,
                    existing: existing.clone(),
                });
            }
            return Ok(());
        }

        self.graph.add_edge(
            from,
            to,
            GrantEdge {
                granter,
                grantee,
                grantee_policy,
                granter_policy,
            },
        );
        Ok(())
    }

    pub fn contains_item(&self, id: &ItemId) -> bool {
        self.node_map.contains_key(id)
    }

    /// Display name recorded for an item, falling back to its id.
    pub fn name_of<'a>(&'a self, id: &'a ItemId) -> &'a str {
        self.names.get(id).map(String::as_str).unwrap_or(id.as_str())
    }

    /// The edge that granted `id`, if any.
    pub fn granted_by(&self, id: &ItemId) -> Option<&GrantEdge> {
        let idx = *self.node_map.get(id)?;
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .next()
            .map(|edge| edge.weight())
    }

    pub fn granter_of(&self, id: &ItemId) -> Option<&ItemId> {
        self.granted_by(id).map(|edge| &edge.granter)
    }

    /// Edges to the items `id` granted, in the order they were added.
    pub fn grants_of(&self, id: &ItemId) -> Vec<&GrantEdge> {
        let Some(&idx) = self.node_map.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .collect();
        edges.sort_by_key(|edge| edge.id());
        edges.into_iter().map(|edge| edge.weight()).collect()
    }

    pub fn grantees_of(&self, id: &ItemId) -> Vec<ItemId> {
        self.grants_of(id)
            .into_iter()
            .map(|edge| edge.grantee.clone())
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.node_map.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Give an item a new id, keeping its edges. Used when the store assigns
    /// a permanent id to a freshly created item.
    pub fn reassign_id(&mut self, old: &ItemId, new: ItemId) -> Result<(), GrantError> {
        if self.node_map.contains_key(&new) {
            return Err(GrantError::AlreadyGranted {
                grantee: new,
                existing: old.clone(),
            });
        }
        let idx = self
            .node_map
            .remove(old)
            .ok_or_else(|| GrantError::MissingItem(old.clone()))?;
        self.graph[idx] = new.clone();
        if let Some(name) = self.names.remove(old) {
            self.names.insert(new.clone(), name);
        }
        self.node_map.insert(new.clone(), idx);

        let touching: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|edge| edge.id())
            .collect();
        for edge_idx in touching {
            if let Some(edge) = self.graph.edge_weight_mut(edge_idx) {
                if &edge.granter == old {
                    edge.granter = new.clone();
                }
                if &edge.grantee == old {
                    edge.grantee = new.clone();
                }
            }
        }
        Ok(())
    }

    /// Remove an item and every edge touching it.
    pub fn remove_item(&mut self, id: &ItemId) -> bool {
        match self.node_map.remove(id) {
            Some(idx) => {
                self.graph.remove_node(idx);
                self.names.remove(id);
                true
            }
            None => false,
        }
    }

    /// Detect grant cycles.
    ///
    /// Cycles are a data-integrity problem, not a blocker: deletion planning
    /// terminates on them regardless. This reports the first cycle found,
    /// as a closed path like `[A, B, A]`.
    pub fn detect_cycles(&self) -> Result<(), GrantError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        let mut roots: Vec<NodeIndex> = self.graph.node_indices().collect();
        roots.sort();
        for node_idx in roots {
            if !visited.contains(&node_idx) {
                let mut cycle_path = Vec::new();
                if let Some(cycle) =
                    self.dfs_cycle_detect(node_idx, &mut visited, &mut rec_stack, &mut cycle_path)
                {
                    return Err(cycle);
                }
            }
        }
        Ok(())
    }

    fn dfs_cycle_detect(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        rec_stack: &mut HashSet<NodeIndex>,
        cycle_path: &mut Vec<ItemId>,
    ) -> Option<GrantError> {
        visited.insert(node);
        rec_stack.insert(node);
        cycle_path.push(self.graph[node].clone());

        for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
            if !visited.contains(&neighbor) {
                if let Some(cycle) = self.dfs_cycle_detect(neighbor, visited, rec_stack, cycle_path)
                {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&neighbor) {
                let start = self.graph[neighbor].clone();
                let from = cycle_path.iter().position(|id| id == &start).unwrap_or(0);
                let mut path = cycle_path[from..].to_vec();
                path.push(start);
                return Some(GrantError::Cycle { path });
            }
        }

        rec_stack.remove(&node);
        cycle_path.pop();
        None
    }

    /// Run the pre-delete check for `item`, extending `pending`.
    ///
    /// On success `item` and everything it cascades into are staged. If a
    /// `restrict` policy is hit anywhere in the reachable cascade, everything
    /// this call staged is rolled back, including `item`, and a notice is
    /// recorded. Items already staged or already refused are left alone.
    pub fn on_pre_delete(&self, item: &ItemId, pending: &mut PendingDeletions) -> PreDeleteOutcome {
        if pending.is_aborted(item) {
            return PreDeleteOutcome { aborted: true };
        }
        if pending.contains(item) {
            return PreDeleteOutcome { aborted: false };
        }
        let checkpoint = pending.checkpoint();
        pending.stage(item.clone());

        match self.visit(item, pending) {
            Ok(()) => PreDeleteOutcome { aborted: false },
            Err(notice) => {
                pending.rollback(checkpoint);
                tracing::info!(item = %item, blocker = %notice.blocker, "deletion refused: {notice}");
                pending.notices.push(notice);
                pending.aborted.push(item.clone());
                PreDeleteOutcome { aborted: true }
            }
        }
    }

    fn visit(&self, item: &ItemId, pending: &mut PendingDeletions) -> Result<(), Notice> {
        for edge in self.grants_of(item) {
            let grantee = &edge.grantee;
            if pending.contains(grantee) {
                continue;
            }
            match edge.grantee_policy {
                DeletePolicy::Restrict if pending.is_leaving(grantee) => {}
                DeletePolicy::Restrict => {
                    return Err(self.notice(NoticeKind::GranteeRestricts, item, grantee));
                }
                DeletePolicy::Cascade => {
                    pending.stage(grantee.clone());
                    self.visit(grantee, pending)?;
                }
                DeletePolicy::RemoveLink => pending.updates.push(ItemPatch::ClearGrantedBy {
                    item: grantee.clone(),
                }),
            }
        }

        if let Some(edge) = self.granted_by(item) {
            let granter = &edge.granter;
            if !pending.contains(granter) {
                match edge.granter_policy {
                    DeletePolicy::Restrict if pending.is_leaving(granter) => {}
                    DeletePolicy::Restrict => {
                        return Err(self.notice(NoticeKind::GranterRestricts, item, granter));
                    }
                    DeletePolicy::Cascade => {
                        pending.stage(granter.clone());
                        self.visit(granter, pending)?;
                    }
                    DeletePolicy::RemoveLink => pending.updates.push(ItemPatch::RemoveGrant {
                        granter: granter.clone(),
                        grantee: item.clone(),
                    }),
                }
            }
        }
        Ok(())
    }

    fn notice(&self, kind: NoticeKind, item: &ItemId, blocker: &ItemId) -> Notice {
        Notice {
            kind,
            item: item.clone(),
            item_name: self.name_of(item).to_string(),
            blocker: blocker.clone(),
            blocker_name: self.name_of(blocker).to_string(),
        }
    }

    /// Items removed along with `targets` through `cascade` edges alone,
    /// targets included.
    pub fn cascade_closure(&self, targets: &[ItemId]) -> HashSet<ItemId> {
        let mut closure: HashSet<ItemId> = HashSet::new();
        let mut stack: Vec<ItemId> = targets.to_vec();
        while let Some(id) = stack.pop() {
            if !closure.insert(id.clone()) {
                continue;
            }
            for edge in self.grants_of(&id) {
                if edge.grantee_policy == DeletePolicy::Cascade {
                    stack.push(edge.grantee.clone());
                }
            }
            if let Some(edge) = self.granted_by(&id) {
                if edge.granter_policy == DeletePolicy::Cascade {
                    stack.push(edge.granter.clone());
                }
            }
        }
        closure
    }

    /// Plan the deletion of `targets`. Unknown ids are skipped with a warning.
    pub fn plan_deletion(&self, targets: &[ItemId]) -> DeletionPlan {
        self.plan_request(targets, |target, pending| self.on_pre_delete(target, pending))
    }

    /// Plan a request, running `check` as the pre-delete step of each target.
    ///
    /// The request is treated as a whole: a `restrict` dependent that the
    /// request removes anyway does not block, whatever the target order. A
    /// refused target is dropped and the rest are planned again, until a
    /// pass refuses nothing.
    pub fn plan_request<F>(&self, targets: &[ItemId], mut check: F) -> DeletionPlan
    where
        F: FnMut(&ItemId, &mut PendingDeletions) -> PreDeleteOutcome,
    {
        let mut remaining: Vec<ItemId> = Vec::new();
        for target in targets {
            if !self.contains_item(target) {
                tracing::warn!(item = %target, "cannot delete unknown item");
            } else if !remaining.contains(target) {
                remaining.push(target.clone());
            }
        }

        let mut refused: Vec<(ItemId, Notice)> = Vec::new();
        loop {
            let mut pending = PendingDeletions::for_request(self.cascade_closure(&remaining));
            for target in &remaining {
                check(target, &mut pending);
            }
            if pending.aborted.is_empty() {
                refused.sort_by_key(|(id, _)| targets.iter().position(|t| t == id));
                for (id, notice) in refused {
                    pending.aborted.push(id);
                    pending.notices.push(notice);
                }
                return pending.into_plan();
            }
            let aborted = std::mem::take(&mut pending.aborted);
            remaining.retain(|target| !aborted.contains(target));
            refused.extend(aborted.into_iter().zip(pending.notices));
        }
    }
}

fn warn_ignored(error: &GrantError) {
    tracing::warn!(%error, "ignoring grant edge");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GrantedBy;

    fn id(s: &str) -> ItemId {
        ItemId::new(s)
    }

    fn graph_of(names: &[&str]) -> GrantGraph {
        let mut graph = GrantGraph::new();
        for name in names {
            graph.add_item(id(name), name.to_uppercase());
        }
        graph
    }

    #[test]
    fn test_single_granter_invariant() {
        let mut graph = graph_of(&["a", "b", "c"]);
        graph
            .add_edge(id("a"), id("c"), DeletePolicy::Cascade, DeletePolicy::RemoveLink)
            .unwrap();
        let err = graph
            .add_edge(id("b"), id("c"), DeletePolicy::Cascade, DeletePolicy::RemoveLink)
            .unwrap_err();
        assert_eq!(
            err,
            GrantError::AlreadyGranted {
                grantee: id("c"),
                existing: id("a")
            }
        );
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_add_edge_requires_items() {
        let mut graph = graph_of(&["a"]);
        let err = graph
            .add_edge(id("a"), id("ghost"), DeletePolicy::Cascade, DeletePolicy::RemoveLink)
            .unwrap_err();
        assert_eq!(err, GrantError::MissingItem(id("ghost")));
    }

    #[test]
    fn test_grants_keep_insertion_order() {
        let mut graph = graph_of(&["a", "b", "c", "d"]);
        for grantee in ["c", "b", "d"] {
            graph
                .add_edge(id("a"), id(grantee), DeletePolicy::RemoveLink, DeletePolicy::RemoveLink)
                .unwrap();
        }
        assert_eq!(graph.grantees_of(&id("a")), vec![id("c"), id("b"), id("d")]);
    }

    #[test]
    fn test_cascade_stages_grantee() {
        let mut graph = graph_of(&["a", "b"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::Cascade, DeletePolicy::RemoveLink)
            .unwrap();
        let plan = graph.plan_deletion(&[id("a")]);
        assert_eq!(plan.deletions, vec![id("a"), id("b")]);
        assert!(plan.updates.is_empty());
        assert!(plan.notices.is_empty());
    }

    #[test]
    fn test_restrict_aborts() {
        let mut graph = graph_of(&["a", "b"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::Restrict, DeletePolicy::RemoveLink)
            .unwrap();
        let plan = graph.plan_deletion(&[id("a")]);
        assert!(plan.is_empty());
        assert_eq!(plan.aborted, vec![id("a")]);
        assert_eq!(plan.notices.len(), 1);
        let notice = plan.notices[0].to_string();
        assert!(notice.contains('A') && notice.contains('B'), "{notice}");
    }

    #[test]
    fn test_restrict_skipped_when_dependent_also_deleted() {
        let mut graph = graph_of(&["a", "b"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::Restrict, DeletePolicy::RemoveLink)
            .unwrap();
        let plan = graph.plan_deletion(&[id("b"), id("a")]);
        assert_eq!(plan.deletions, vec![id("b"), id("a")]);
        assert!(plan.notices.is_empty());
        assert!(plan.updates.is_empty());
    }

    #[test]
    fn test_restrict_ignores_target_order() {
        let mut graph = graph_of(&["a", "b"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::Restrict, DeletePolicy::RemoveLink)
            .unwrap();
        let plan = graph.plan_deletion(&[id("a"), id("b")]);
        assert_eq!(plan.deletions, vec![id("a"), id("b")]);
        assert!(plan.aborted.is_empty());
        assert!(plan.notices.is_empty());
        assert!(plan.updates.is_empty());
    }

    #[test]
    fn test_restrict_satisfied_by_another_targets_cascade() {
        // x -cascade-> a -> b, and b may only go once a is gone.
        let mut graph = graph_of(&["a", "b", "x"]);
        graph
            .add_edge(id("x"), id("a"), DeletePolicy::Cascade, DeletePolicy::RemoveLink)
            .unwrap();
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::RemoveLink, DeletePolicy::Restrict)
            .unwrap();

        let alone = graph.plan_deletion(&[id("b")]);
        assert_eq!(alone.aborted, vec![id("b")]);
        assert_eq!(alone.notices[0].kind, NoticeKind::GranterRestricts);

        let forward = graph.plan_deletion(&[id("b"), id("x")]);
        let backward = graph.plan_deletion(&[id("x"), id("b")]);
        assert_eq!(forward.deletions, vec![id("b"), id("x"), id("a")]);
        assert_eq!(backward.deletions, vec![id("x"), id("a"), id("b")]);
        assert!(forward.aborted.is_empty() && backward.aborted.is_empty());
        assert!(forward.updates.is_empty() && backward.updates.is_empty());
    }

    #[test]
    fn test_refusal_propagates_through_request() {
        // a -restrict-> b -restrict-> c, with only a and b requested.
        let mut graph = graph_of(&["a", "b", "c", "x"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::Restrict, DeletePolicy::RemoveLink)
            .unwrap();
        graph
            .add_edge(id("b"), id("c"), DeletePolicy::Restrict, DeletePolicy::RemoveLink)
            .unwrap();

        for targets in [
            [id("a"), id("b"), id("x")],
            [id("x"), id("b"), id("a")],
        ] {
            let plan = graph.plan_deletion(&targets);
            assert_eq!(plan.deletions, vec![id("x")]);
            assert_eq!(plan.notices.len(), 2);
            let refused: HashSet<_> = plan.aborted.iter().cloned().collect();
            assert_eq!(refused, HashSet::from([id("a"), id("b")]));
        }
    }

    #[test]
    fn test_remove_link_clears_back_reference() {
        let mut graph = graph_of(&["a", "b"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::RemoveLink, DeletePolicy::RemoveLink)
            .unwrap();
        let plan = graph.plan_deletion(&[id("a")]);
        assert_eq!(plan.deletions, vec![id("a")]);
        assert_eq!(plan.updates, vec![ItemPatch::ClearGrantedBy { item: id("b") }]);
    }

    #[test]
    fn test_deleting_grantee_applies_granter_policy() {
        let mut graph = graph_of(&["a", "b"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::RemoveLink, DeletePolicy::Cascade)
            .unwrap();
        let plan = graph.plan_deletion(&[id("b")]);
        assert_eq!(plan.deletions, vec![id("b"), id("a")]);

        let mut graph = graph_of(&["a", "b"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::RemoveLink, DeletePolicy::RemoveLink)
            .unwrap();
        let plan = graph.plan_deletion(&[id("b")]);
        assert_eq!(plan.deletions, vec![id("b")]);
        assert_eq!(
            plan.updates,
            vec![ItemPatch::RemoveGrant {
                granter: id("a"),
                grantee: id("b")
            }]
        );
    }

    #[test]
    fn test_restrict_deep_in_cascade_rolls_back_everything() {
        // a -cascade-> b -cascade-> c -restrict-> d
        let mut graph = graph_of(&["a", "b", "c", "d", "e"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::Cascade, DeletePolicy::RemoveLink)
            .unwrap();
        graph
            .add_edge(id("b"), id("c"), DeletePolicy::Cascade, DeletePolicy::RemoveLink)
            .unwrap();
        graph
            .add_edge(id("c"), id("d"), DeletePolicy::Restrict, DeletePolicy::RemoveLink)
            .unwrap();
        graph
            .add_edge(id("a"), id("e"), DeletePolicy::RemoveLink, DeletePolicy::RemoveLink)
            .unwrap();

        let plan = graph.plan_deletion(&[id("a")]);
        assert!(plan.deletions.is_empty());
        assert!(plan.updates.is_empty());
        assert_eq!(plan.notices[0].item, id("c"));
        assert_eq!(plan.notices[0].blocker, id("d"));
    }

    #[test]
    fn test_aborted_target_does_not_block_independent_target() {
        let mut graph = graph_of(&["a", "b", "x"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::Restrict, DeletePolicy::RemoveLink)
            .unwrap();
        let plan = graph.plan_deletion(&[id("a"), id("x")]);
        assert_eq!(plan.deletions, vec![id("x")]);
        assert_eq!(plan.aborted, vec![id("a")]);
    }

    #[test]
    fn test_cycle_terminates_and_is_detected() {
        let mut graph = graph_of(&["a", "b"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::Cascade, DeletePolicy::Cascade)
            .unwrap();
        graph
            .add_edge(id("b"), id("a"), DeletePolicy::Cascade, DeletePolicy::Cascade)
            .unwrap();

        let plan = graph.plan_deletion(&[id("a")]);
        assert_eq!(plan.deletions, vec![id("a"), id("b")]);

        match graph.detect_cycles() {
            Err(GrantError::Cycle { path }) => {
                assert_eq!(path.len(), 3);
                assert_eq!(path[0], path[2]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_no_cycle() {
        let mut graph = graph_of(&["a", "b", "c"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::Cascade, DeletePolicy::RemoveLink)
            .unwrap();
        graph
            .add_edge(id("b"), id("c"), DeletePolicy::Cascade, DeletePolicy::RemoveLink)
            .unwrap();
        assert!(graph.detect_cycles().is_ok());
    }

    #[test]
    fn test_reassign_id_keeps_edges() {
        let mut graph = graph_of(&["a", "tmp"]);
        graph
            .add_edge(id("a"), id("tmp"), DeletePolicy::Cascade, DeletePolicy::Restrict)
            .unwrap();
        graph.reassign_id(&id("tmp"), id("b")).unwrap();

        assert!(!graph.contains_item(&id("tmp")));
        assert_eq!(graph.granter_of(&id("b")), Some(&id("a")));
        assert_eq!(graph.grantees_of(&id("a")), vec![id("b")]);
        assert_eq!(graph.name_of(&id("b")), "TMP");
        assert!(graph.reassign_id(&id("ghost"), id("z")).is_err());
    }

    #[test]
    fn test_remove_item_drops_edges() {
        let mut graph = graph_of(&["a", "b"]);
        graph
            .add_edge(id("a"), id("b"), DeletePolicy::Cascade, DeletePolicy::RemoveLink)
            .unwrap();
        assert!(graph.remove_item(&id("a")));
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.granter_of(&id("b")).is_none());
    }

    #[test]
    fn test_from_items_checks_both_records() {
        let mut a = ItemSource::new("a", "A");
        a.add_grant(id("b"), DeletePolicy::Cascade);
        a.add_grant(id("c"), DeletePolicy::Cascade);
        a.add_grant(id("missing"), DeletePolicy::Cascade);
        let mut b = ItemSource::new("b", "B");
        b.granted_by = Some(GrantedBy {
            id: id("a"),
            on_delete: DeletePolicy::Restrict,
        });
        // c has no back-reference, so the a -> c edge is ignored.
        let c = ItemSource::new("c", "C");

        let graph = GrantGraph::from_items([&a, &b, &c]);
        assert_eq!(graph.item_count(), 3);
        assert_eq!(graph.edge_count(), 1);
        let edge = graph.granted_by(&id("b")).unwrap();
        assert_eq!(edge.grantee_policy, DeletePolicy::Cascade);
        assert_eq!(edge.granter_policy, DeletePolicy::Restrict);
    }

    #[test]
    fn test_policy_serde() {
        let p: DeletePolicy = serde_json::from_str("\"detach\"").unwrap();
        assert_eq!(p, DeletePolicy::RemoveLink);
        assert_eq!(serde_json::to_string(&DeletePolicy::RemoveLink).unwrap(), "\"remove-link\"");
    }
}
