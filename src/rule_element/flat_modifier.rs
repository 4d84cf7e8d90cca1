use super::{slugify, PrepareContext, RuleElementHandler, Selector};
use crate::document::ActorKind;
use crate::error::RuleElementError;
use crate::modifier::{Modifier, ModifierType};
use crate::predicate::Predicate;
use serde::{Deserialize, Serialize};

/// Contributes one modifier to each selected domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatModifierSource {
    #[serde(alias = "selectors", default)]
    pub selector: Selector,
    /// Defaults to the slugified label, then the item name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Defaults to the item name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<i32>,
    #[serde(rename = "type", default)]
    pub kind: ModifierType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignored: bool,
}

impl RuleElementHandler for FlatModifierSource {
    fn key(&self) -> &'static str {
        "FlatModifier"
    }

    fn validate(&self) -> Result<(), RuleElementError> {
        self.selector.validate(self.key())?;
        if self.value.is_none() {
            return Err(RuleElementError::InvalidSource {
                key: self.key(),
                reason: "missing value".into(),
            });
        }
        Ok(())
    }

    fn supports(&self, kind: ActorKind) -> bool {
        kind != ActorKind::Loot
    }

    fn on_prepare_data(&self, ctx: &mut PrepareContext<'_>) -> Result<(), RuleElementError> {
        let value = self.value.ok_or_else(|| RuleElementError::InvalidSource {
            key: self.key(),
            reason: "missing value".into(),
        })?;
        let label = self.label.clone().unwrap_or_else(|| ctx.item.name.clone());
        let slug = self.slug.clone().unwrap_or_else(|| slugify(&label));

        let mut modifier = Modifier::new(slug, self.kind, value)
            .with_label(label)
            .with_source(ctx.item.id.as_str());
        modifier.predicate = self.predicate.clone();

        for selector in self.selector.iter() {
            ctx.synthetics.add_modifier(selector, modifier.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ActorSource, ItemSource};
    use crate::roll_options::RollOptionSet;
    use crate::rule_element::Synthetics;

    #[test]
    fn test_contributes_to_every_selector() {
        let source: FlatModifierSource = serde_json::from_str(
            r#"{"selectors": ["fortitude", "will"], "type": "status", "value": 1, "predicate": ["self:blessed"]}"#,
        )
        .unwrap();
        let actor = ActorSource::new("a", "Hero", ActorKind::Character);
        let item = ItemSource::new("spell", "Heroism");
        let mut options = RollOptionSet::new();
        let mut synthetics = Synthetics::default();

        source
            .on_prepare_data(&mut PrepareContext {
                actor: &actor,
                item: &item,
                roll_options: &mut options,
                synthetics: &mut synthetics,
            })
            .unwrap();

        let will = &synthetics.modifiers("will")[0];
        assert_eq!(will.slug, "heroism");
        assert_eq!(will.label, "Heroism");
        assert_eq!(will.source.as_deref(), Some("spell"));
        assert!(will.predicate.is_some());
        assert_eq!(synthetics.modifiers("fortitude").len(), 1);
    }

    #[test]
    fn test_missing_value_fails_validation() {
        let source: FlatModifierSource = serde_json::from_str(r#"{"selector": "ac"}"#).unwrap();
        assert!(source.validate().is_err());
    }
}
