use super::{CreateContext, DeleteContext, RuleElementHandler};
use crate::document::{ActorKind, GrantedBy};
use crate::error::RuleElementError;
use crate::grant::DeletePolicy;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Per-grant deletion policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OnDeleteActions {
    /// Applied to the granter when the granted item is deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granter: Option<DeletePolicy>,
    /// Applied to the granted item when the granter is deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grantee: Option<DeletePolicy>,
}

/// Creates a copy of a library item alongside the owning item and links
/// the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantItemSource {
    /// Library identifier of the item to grant.
    pub uuid: String,
    #[serde(rename = "onDeleteActions", default)]
    pub on_delete_actions: OnDeleteActions,
    /// When `false`, nothing is granted if the actor already has an item
    /// copied from `uuid`.
    #[serde(rename = "allowDuplicate", default = "default_true")]
    pub allow_duplicate: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignored: bool,
}

impl RuleElementHandler for GrantItemSource {
    fn key(&self) -> &'static str {
        "GrantItem"
    }

    fn validate(&self) -> Result<(), RuleElementError> {
        if self.uuid.trim().is_empty() {
            return Err(RuleElementError::InvalidSource {
                key: self.key(),
                reason: "empty uuid".into(),
            });
        }
        Ok(())
    }

    fn supports(&self, kind: ActorKind) -> bool {
        kind.is_creature()
    }

    fn on_pre_create_item(&self, ctx: &mut CreateContext<'_>) -> Result<(), RuleElementError> {
        if !self.allow_duplicate && ctx.known_sources.contains(&self.uuid) {
            tracing::debug!(
                granter = %ctx.granter.id,
                uuid = %self.uuid,
                "actor already has this item, not granting a duplicate"
            );
            return Ok(());
        }

        let source = ctx
            .library
            .fetch(&self.uuid)
            .ok_or_else(|| RuleElementError::GrantSourceNotFound(self.uuid.clone()))?;
        let known_version = source.schema_version;
        let mut grantee = ctx.migrator.ensure_current_schema(source, known_version)?;

        grantee.id = ctx.ids.fresh();
        grantee.source_id = Some(self.uuid.clone());
        grantee.item_grants.clear();
        grantee.granted_by = Some(GrantedBy {
            id: ctx.granter.id.clone(),
            on_delete: self.on_delete_actions.granter.unwrap_or_default(),
        });
        ctx.granter.add_grant(
            grantee.id.clone(),
            self.on_delete_actions.grantee.unwrap_or_default(),
        );

        tracing::debug!(granter = %ctx.granter.id, grantee = %grantee.id, uuid = %self.uuid, "granting item");
        ctx.known_sources.insert(self.uuid.clone());
        ctx.queued.push(grantee);
        Ok(())
    }

    fn on_pre_delete_item(&self, ctx: &mut DeleteContext<'_>) -> Result<(), RuleElementError> {
        let outcome = ctx.check();
        tracing::debug!(item = %ctx.item, aborted = outcome.aborted, uuid = %self.uuid, "grant pre-delete check");
        Ok(())
    }
}
