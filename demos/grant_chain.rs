//! Grant chain example: creating and deleting granted items
//!
//! This example shows:
//! - GrantItem rule elements expanding a creation batch
//! - Deletion plans under cascade, restrict and remove-link policies
//! - Committing through the deletion coordinator
//!
//! Run with `RUST_LOG=modstack=info` to see committed deletions.

use modstack::deletion::DeletionCoordinator;
use modstack::document::{ActorKind, ActorSource, ItemSource};
use modstack::prepare::{pre_create_items, CreationServices};
use modstack::store::{MemoryStore, NoopMigrator};
use modstack::{ActorId, ItemId};
use std::collections::HashMap;

fn library_item(name: &str, rules: &str) -> ItemSource {
    let mut item = ItemSource::new("library", name);
    item.rules = serde_json::from_str(rules).unwrap_or_default();
    item
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut library = HashMap::new();
    library.insert(
        "lib.dedication".to_string(),
        library_item(
            "Sentinel Dedication",
            r#"[{"key": "GrantItem", "uuid": "lib.armor-proficiency", "onDeleteActions": {"grantee": "cascade"}}]"#,
        ),
    );
    library.insert(
        "lib.armor-proficiency".to_string(),
        library_item("Armor Proficiency", "[]"),
    );
    library.insert(
        "lib.shield-block".to_string(),
        library_item("Shield Block", "[]"),
    );
    let migrator = NoopMigrator { current_version: 7 };
    let services = CreationServices {
        library: &library,
        migrator: &migrator,
    };

    let actor = ActorSource::new("kyra", "Kyra", ActorKind::Character);
    let hero = actor.id.clone();
    let store = MemoryStore::new();
    store.insert_actor(actor.clone());

    let mut archetype = library_item(
        "Sentinel Archetype",
        r#"[
            {"key": "GrantItem", "uuid": "lib.dedication", "onDeleteActions": {"grantee": "cascade"}},
            {"key": "GrantItem", "uuid": "lib.shield-block", "onDeleteActions": {"grantee": "restrict"}}
        ]"#,
    );
    archetype.id = ItemId::new("archetype");
    let plain = ItemSource::new("torch", "Torch");

    println!("=== Creating items ===\n");
    let created = pre_create_items(&actor, &[], vec![archetype, plain], services);
    for item in &created {
        let granter = item
            .granted_by
            .as_ref()
            .map(|g| format!(" (granted by {})", g.id))
            .unwrap_or_default();
        println!("{:<14} {}{granter}", item.id.as_str(), item.name);
        if let Err(error) = store.insert_item(&hero, item.clone()) {
            eprintln!("could not store {}: {error}", item.name);
        }
    }

    let coordinator = DeletionCoordinator::new(store);

    println!("\n=== Deleting the archetype ===\n");
    report(&coordinator, &hero, &[ItemId::new("archetype")]);

    let shield_block = created
        .iter()
        .find(|item| item.name == "Shield Block")
        .map(|item| item.id.clone());
    if let Some(shield_block) = shield_block {
        println!("\n=== Deleting the archetype together with Shield Block ===\n");
        report(&coordinator, &hero, &[shield_block, ItemId::new("archetype")]);
    }

    println!("\n=== Deleting the torch ===\n");
    report(&coordinator, &hero, &[ItemId::new("torch")]);
}

fn report(coordinator: &DeletionCoordinator<MemoryStore>, actor: &ActorId, targets: &[ItemId]) {
    match coordinator.delete(actor, targets) {
        Ok(plan) => {
            for notice in &plan.notices {
                println!("refused: {notice}");
            }
            for id in &plan.deletions {
                println!("deleted: {id}");
            }
            for patch in &plan.updates {
                println!("updated: {}", patch.target());
            }
        }
        Err(error) => println!("deletion failed: {error}"),
    }
}
