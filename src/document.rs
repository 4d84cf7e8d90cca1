//! Actor and item source documents.
//!
//! These are the persisted shapes the engine reads from the document store.
//! Grant bookkeeping is typed: a granter lists its grants, a grantee points
//! back at its granter, and each record carries the policy applied to the
//! *other* end when this end is deleted.

use crate::grant::DeletePolicy;
use crate::id::{ActorId, ItemId};
use crate::rule_element::RuleElementSource;
use serde::{Deserialize, Serialize};

/// Kinds of actor. Rule elements declare which kinds they support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    Character,
    Npc,
    Familiar,
    Hazard,
    Vehicle,
    Loot,
}

impl ActorKind {
    /// Actors that have creature statistics.
    pub fn is_creature(self) -> bool {
        matches!(
            self,
            ActorKind::Character | ActorKind::Npc | ActorKind::Familiar
        )
    }
}

/// An actor as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSource {
    pub id: ActorId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ActorKind,
    /// Owned items, in sheet order.
    #[serde(default)]
    pub items: Vec<ItemId>,
}

impl ActorSource {
    pub fn new(id: impl Into<ActorId>, name: impl Into<String>, kind: ActorKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            items: Vec::new(),
        }
    }
}

/// Back-reference from a grantee to the item that granted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantedBy {
    pub id: ItemId,
    /// Applied to the granter when this grantee is deleted.
    #[serde(rename = "onDelete", default)]
    pub on_delete: DeletePolicy,
}

/// Forward reference from a granter to one of its grantees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemGrant {
    pub id: ItemId,
    /// Applied to the grantee when this granter is deleted.
    #[serde(rename = "onDelete", default)]
    pub on_delete: DeletePolicy,
}

/// An item as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSource {
    pub id: ItemId,
    pub name: String,
    /// Compendium identifier the item was copied from.
    #[serde(rename = "sourceId", default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(rename = "schemaVersion", default)]
    pub schema_version: u32,
    #[serde(default)]
    pub rules: Vec<RuleElementSource>,
    #[serde(rename = "grantedBy", default, skip_serializing_if = "Option::is_none")]
    pub granted_by: Option<GrantedBy>,
    #[serde(rename = "itemGrants", default)]
    pub item_grants: Vec<ItemGrant>,
}

impl ItemSource {
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_id: None,
            schema_version: 0,
            rules: Vec::new(),
            granted_by: None,
            item_grants: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: RuleElementSource) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Record that this item granted `grantee`.
    pub fn add_grant(&mut self, grantee: ItemId, on_delete: DeletePolicy) {
        self.item_grants.retain(|g| g.id != grantee);
        self.item_grants.push(ItemGrant {
            id: grantee,
            on_delete,
        });
    }
}

/// A targeted change to a stored item, produced when grant links are broken.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum ItemPatch {
    /// Clear a grantee's back-reference.
    ClearGrantedBy { item: ItemId },
    /// Remove one entry from a granter's grant list.
    RemoveGrant { granter: ItemId, grantee: ItemId },
}

impl ItemPatch {
    /// The item this patch writes to.
    pub fn target(&self) -> &ItemId {
        match self {
            ItemPatch::ClearGrantedBy { item } => item,
            ItemPatch::RemoveGrant { granter, .. } => granter,
        }
    }

    /// Apply the patch to an item document.
    pub fn apply(&self, item: &mut ItemSource) {
        match self {
            ItemPatch::ClearGrantedBy { .. } => item.granted_by = None,
            ItemPatch::RemoveGrant { grantee, .. } => {
                item.item_grants.retain(|g| &g.id != grantee)
            }
        }
    }
}
