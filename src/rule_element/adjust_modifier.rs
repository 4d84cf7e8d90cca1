use super::{PrepareContext, RuleElementHandler, Selector};
use crate::error::RuleElementError;
use crate::id::ItemId;
use crate::modifier::Modifier;
use crate::predicate::Predicate;
use crate::roll_options::RollOptionSet;
use serde::{Deserialize, Serialize};

/// How an adjustment changes a modifier's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdjustMode {
    Add,
    Subtract,
    Override,
    /// Raise to at least the value.
    Upgrade,
    /// Lower to at most the value.
    Downgrade,
}

impl AdjustMode {
    pub fn apply(self, current: i32, value: i32) -> i32 {
        match self {
            AdjustMode::Add => current.saturating_add(value),
            AdjustMode::Subtract => current.saturating_sub(value),
            AdjustMode::Override => value,
            AdjustMode::Upgrade => current.max(value),
            AdjustMode::Downgrade => current.min(value),
        }
    }
}

/// What an adjustment does to a matching modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustEffect {
    /// Disable the modifier. It stays in the breakdown.
    Suppress,
    Value { mode: AdjustMode, value: i32 },
}

/// A pending change to modifiers with a given slug.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierAdjustment {
    pub slug: String,
    pub effect: AdjustEffect,
    pub predicate: Option<Predicate>,
    /// Item whose rule element produced the adjustment.
    pub source: ItemId,
}

impl ModifierAdjustment {
    /// Apply to `modifier` if the slug matches and the predicate holds.
    /// Returns whether the modifier was touched.
    pub fn apply(&self, modifier: &mut Modifier, options: &RollOptionSet) -> bool {
        if modifier.slug != self.slug || !Predicate::test(self.predicate.as_ref(), options) {
            return false;
        }
        match self.effect {
            AdjustEffect::Suppress => modifier.enabled = false,
            AdjustEffect::Value { mode, value } => modifier.value = mode.apply(modifier.value, value),
        }
        true
    }
}

/// Adjusts or suppresses other modifiers by slug before aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustModifierSource {
    #[serde(alias = "selectors", default)]
    pub selector: Selector,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<AdjustMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suppress: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignored: bool,
}

impl AdjustModifierSource {
    fn effect(&self) -> Result<AdjustEffect, RuleElementError> {
        if self.suppress {
            return Ok(AdjustEffect::Suppress);
        }
        match (self.mode, self.value) {
            (Some(mode), Some(value)) => Ok(AdjustEffect::Value { mode, value }),
            _ => Err(RuleElementError::InvalidSource {
                key: self.key(),
                reason: "needs a mode and value unless it suppresses".into(),
            }),
        }
    }
}

impl RuleElementHandler for AdjustModifierSource {
    fn key(&self) -> &'static str {
        "AdjustModifier"
    }

    fn validate(&self) -> Result<(), RuleElementError> {
        self.selector.validate(self.key())?;
        if self.slug.trim().is_empty() {
            return Err(RuleElementError::InvalidSource {
                key: self.key(),
                reason: "empty slug".into(),
            });
        }
        self.effect().map(|_| ())
    }

    fn on_prepare_data(&self, ctx: &mut PrepareContext<'_>) -> Result<(), RuleElementError> {
        let adjustment = ModifierAdjustment {
            slug: self.slug.clone(),
            effect: self.effect()?,
            predicate: self.predicate.clone(),
            source: ctx.item.id.clone(),
        };
        for selector in self.selector.iter() {
            ctx.synthetics.add_adjustment(selector, adjustment.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::ModifierType;

    #[test]
    fn test_modes() {
        assert_eq!(AdjustMode::Add.apply(2, 1), 3);
        assert_eq!(AdjustMode::Subtract.apply(2, 3), -1);
        assert_eq!(AdjustMode::Override.apply(2, 5), 5);
        assert_eq!(AdjustMode::Upgrade.apply(2, 1), 2);
        assert_eq!(AdjustMode::Upgrade.apply(2, 4), 4);
        assert_eq!(AdjustMode::Downgrade.apply(2, 1), 1);
        assert_eq!(AdjustMode::Add.apply(i32::MAX, 1), i32::MAX);
    }

    #[test]
    fn test_suppress_keeps_modifier_visible() {
        let adjustment = ModifierAdjustment {
            slug: "frightened".into(),
            effect: AdjustEffect::Suppress,
            predicate: None,
            source: ItemId::new("courage"),
        };
        let mut frightened = Modifier::new("frightened", ModifierType::Status, -2);
        let mut other = Modifier::new("sickened", ModifierType::Status, -1);

        assert!(adjustment.apply(&mut frightened, &RollOptionSet::new()));
        assert!(!frightened.enabled);
        assert_eq!(frightened.value, -2);
        assert!(!adjustment.apply(&mut other, &RollOptionSet::new()));
        assert!(other.enabled);
    }

    #[test]
    fn test_predicate_gates_adjustment() {
        let adjustment = ModifierAdjustment {
            slug: "cover".into(),
            effect: AdjustEffect::Value {
                mode: AdjustMode::Override,
                value: 4,
            },
            predicate: Some(Predicate::atom("self:taking-cover")),
            source: ItemId::new("tower-shield"),
        };
        let mut cover = Modifier::new("cover", ModifierType::Circumstance, 2);
        assert!(!adjustment.apply(&mut cover, &RollOptionSet::new()));
        assert_eq!(cover.value, 2);

        let options: RollOptionSet = ["self:taking-cover"].into_iter().collect();
        assert!(adjustment.apply(&mut cover, &options));
        assert_eq!(cover.value, 4);
    }

    #[test]
    fn test_validation() {
        let ok: AdjustModifierSource =
            serde_json::from_str(r#"{"selector": "ac", "slug": "cover", "suppress": true}"#)
                .unwrap();
        assert!(ok.validate().is_ok());

        let no_value: AdjustModifierSource =
            serde_json::from_str(r#"{"selector": "ac", "slug": "cover", "mode": "add"}"#).unwrap();
        assert!(no_value.validate().is_err());

        let upgrade: AdjustModifierSource = serde_json::from_str(
            r#"{"selector": "ac", "slug": "cover", "mode": "upgrade", "value": 4}"#,
        )
        .unwrap();
        assert_eq!(
            upgrade.effect().unwrap(),
            AdjustEffect::Value {
                mode: AdjustMode::Upgrade,
                value: 4
            }
        );
    }
}
