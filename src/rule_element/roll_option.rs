use super::{PrepareContext, PreparePhase, RuleElementHandler};
use crate::error::RuleElementError;
use crate::predicate::Predicate;
use serde::{Deserialize, Serialize};

fn default_domain() -> String {
    String::from("all")
}

/// Adds a roll option when its predicate holds.
///
/// Options in the `all` domain join the actor-wide set; other domains only
/// reach statistics that list that domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollOptionSource {
    #[serde(default = "default_domain")]
    pub domain: String,
    pub option: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignored: bool,
}

impl RuleElementHandler for RollOptionSource {
    fn key(&self) -> &'static str {
        "RollOption"
    }

    fn validate(&self) -> Result<(), RuleElementError> {
        if self.option.trim().is_empty() {
            return Err(RuleElementError::InvalidSource {
                key: self.key(),
                reason: "empty option".into(),
            });
        }
        Ok(())
    }

    fn phase(&self) -> PreparePhase {
        PreparePhase::RollOptions
    }

    fn on_prepare_data(&self, ctx: &mut PrepareContext<'_>) -> Result<(), RuleElementError> {
        if !Predicate::test(self.predicate.as_ref(), ctx.roll_options) {
            return Ok(());
        }
        if self.domain == "all" {
            ctx.roll_options.insert(self.option.clone());
        } else {
            ctx.synthetics.add_roll_option(&self.domain, self.option.clone());
        }
        Ok(())
    }
}
