use modstack::grant::{DeletePolicy, GrantGraph};
use modstack::{ItemId, Modifier, ModifierType, Predicate, RollOptionSet};
use proptest::prelude::*;

// --- Fixed tag vocabulary ---
// Atoms are drawn from TAGS; comparisons use the numeric prefixes in
// NUMERIC, whose options carry a value in 0..=20.

pub const TAGS: &[&str] = &[
    "self:trait:elf",
    "self:condition:prone",
    "target:condition:off-guard",
    "self:action:strike",
    "item:magical",
];

pub const NUMERIC: &[&str] = &["self:level", "target:distance", "self:ability:str:score"];

const TYPES: &[ModifierType] = &ModifierType::ALL;

pub fn arb_options() -> impl Strategy<Value = RollOptionSet> {
    (
        prop::sample::subsequence(TAGS, 0..=TAGS.len()),
        prop::collection::vec((prop::sample::select(NUMERIC), 0_i32..=20), 0..4),
    )
        .prop_map(|(tags, numbers)| {
            let mut options: RollOptionSet = tags.into_iter().collect();
            for (prefix, n) in numbers {
                options.insert(format!("{prefix}:{n}"));
            }
            options
        })
}

fn arb_leaf() -> impl Strategy<Value = Predicate> {
    prop_oneof![
        prop::sample::select(TAGS).prop_map(Predicate::atom),
        (prop::sample::select(NUMERIC), 0_i32..=20, 0u8..4).prop_map(|(prefix, n, op)| match op {
            0 => Predicate::lt(prefix, n),
            1 => Predicate::lte(prefix, n),
            2 => Predicate::gt(prefix, n),
            _ => Predicate::gte(prefix, n),
        }),
    ]
}

pub fn arb_predicate() -> impl Strategy<Value = Predicate> {
    arb_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Predicate::all),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Predicate::any),
            prop::collection::vec(inner, 0..4).prop_map(Predicate::not),
        ]
    })
}

pub fn arb_modifier() -> impl Strategy<Value = Modifier> {
    (
        prop::sample::select(TYPES),
        -6_i32..=6,
        any::<bool>(),
        prop::option::of(arb_predicate()),
    )
        .prop_map(|(kind, value, enabled, predicate)| {
            let mut modifier = Modifier::new(format!("{kind}-{value}"), kind, value);
            modifier.enabled = enabled;
            modifier.predicate = predicate;
            modifier
        })
}

pub fn arb_modifiers() -> impl Strategy<Value = Vec<Modifier>> {
    prop::collection::vec(arb_modifier(), 0..12)
}

pub fn arb_policy() -> impl Strategy<Value = DeletePolicy> {
    prop_oneof![
        Just(DeletePolicy::Restrict),
        Just(DeletePolicy::Cascade),
        Just(DeletePolicy::RemoveLink),
    ]
}

pub fn item(n: usize) -> ItemId {
    ItemId::new(&format!("item-{n}"))
}

/// A grant graph over `size` items. Edges may form cycles; a grantee that
/// already has a granter keeps it.
pub fn arb_graph() -> impl Strategy<Value = (GrantGraph, usize)> {
    (2_usize..10).prop_flat_map(|size| {
        let edges = prop::collection::vec(
            (0..size, 0..size, arb_policy(), arb_policy()),
            0..size * 2,
        );
        edges.prop_map(move |edges| {
            let mut graph = GrantGraph::new();
            for n in 0..size {
                graph.add_item(item(n), format!("Item {n}"));
            }
            for (from, to, grantee_policy, granter_policy) in edges {
                let _ = graph.add_edge(item(from), item(to), grantee_policy, granter_policy);
            }
            (graph, size)
        })
    })
}
