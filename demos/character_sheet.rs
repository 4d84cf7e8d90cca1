//! Character sheet example: preparing statistics from items
//!
//! This example shows:
//! - Items carrying rule elements as JSON
//! - Roll options feeding predicates
//! - Stacking and the labelled breakdown
//!
//! Run with `RUST_LOG=modstack=debug` to see the preparation pass.

use modstack::document::{ActorKind, ActorSource, ItemSource};
use modstack::prepare::{prepare_actor, StatisticDefinition};
use modstack::*;
use std::collections::HashMap;

fn item(id: &str, name: &str, rules: &str) -> ItemSource {
    let mut item = ItemSource::new(id, name);
    item.rules = serde_json::from_str(rules).unwrap_or_else(|error| {
        eprintln!("bad rules on {name}: {error}");
        Vec::new()
    });
    item
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let actor = ActorSource::new("valeros", "Valeros", ActorKind::Character);
    let items = vec![
        item(
            "shield",
            "Steel Shield",
            r#"[{"key": "FlatModifier", "selector": "ac", "slug": "shield", "type": "circumstance", "value": 2, "predicate": ["self:shield-raised"]}]"#,
        ),
        item(
            "cover",
            "Take Cover",
            r#"[{"key": "FlatModifier", "selector": "ac", "slug": "cover", "type": "circumstance", "value": 4, "predicate": ["self:in-cover"]}]"#,
        ),
        item(
            "bless",
            "Bless",
            r#"[{"key": "FlatModifier", "selectors": ["attack-roll", "will"], "label": "Bless", "type": "status", "value": 1}]"#,
        ),
        item(
            "frightened",
            "Frightened 2",
            r#"[{"key": "FlatModifier", "selector": "all", "slug": "frightened", "type": "status", "value": -2}]"#,
        ),
        item(
            "courage",
            "Heroic Courage",
            r#"[{"key": "AdjustModifier", "selector": "will", "slug": "frightened", "suppress": true}]"#,
        ),
        item(
            "weak-grip",
            "Weak Grip",
            r#"[{"key": "RollOption", "option": "self:weak-grip", "predicate": {"lt": ["self:ability:str:score", 14]}}]"#,
        ),
    ];

    let definitions = vec![
        StatisticDefinition::new("ac", Vec::<String>::new())
            .with_modifier(Modifier::new("dex", ModifierType::Ability, 2).with_label("Dexterity"))
            .with_modifier(Modifier::new("armor", ModifierType::Item, 4).with_label("Full Plate")),
        StatisticDefinition::new("strike", ["attack-roll"])
            .with_modifier(Modifier::new("str", ModifierType::Ability, 4).with_label("Strength"))
            .with_modifier(
                Modifier::new("weak-grip", ModifierType::Circumstance, -1)
                    .with_label("Weak Grip")
                    .with_predicate(Predicate::atom("self:weak-grip")),
            ),
        StatisticDefinition::new("will", ["saving-throw"])
            .with_modifier(Modifier::new("wis", ModifierType::Ability, 1).with_label("Wisdom")),
    ];

    let config = ModifierConfig::default();
    let mut labels = HashMap::new();
    for kind in ModifierType::ALL {
        let key = config.label(kind);
        let mut name = kind.key().to_string();
        name[..1].make_ascii_uppercase();
        labels.insert(key, name);
    }

    let situations: [(&str, &[&str]); 2] = [
        ("standing in the open", &["self:ability:str:score:18"]),
        (
            "shield raised behind cover",
            &["self:ability:str:score:12", "self:shield-raised", "self:in-cover"],
        ),
    ];

    for (situation, tags) in situations {
        println!("=== {} ({situation}) ===\n", actor.name);
        let options: RollOptionSet = tags.iter().copied().collect();
        let prepared = prepare_actor(&actor, &items, &options, &definitions, &config);

        for stat in &prepared.statistics {
            println!("{:<8} {:+}", stat.slug.as_str(), stat.total);
            for line in stat.breakdown(&config, &labels) {
                println!("    {line}");
            }
            for excluded in stat.excluded() {
                println!("    ({} does not count)", excluded.label);
            }
        }
        println!();
    }
}
