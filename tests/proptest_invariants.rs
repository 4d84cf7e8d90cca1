mod strategies;

use modstack::grant::DeletePolicy;
use modstack::modifier::Sign;
use modstack::{aggregate, Modifier, ModifierType, Predicate, RollOptionSet};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use strategies::{arb_graph, arb_modifiers, arb_options, arb_predicate, item};

fn eligible(modifier: &Modifier, options: &RollOptionSet) -> bool {
    modifier.enabled && Predicate::test(modifier.predicate.as_ref(), options)
}

// ---------------------------------------------------------------------------
// Stacking
//
// Within a typed (type, sign) bucket at most one modifier applies, it has
// the greatest magnitude, and it is the first of that magnitude.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn stacking_one_per_bucket(modifiers in arb_modifiers(), options in arb_options()) {
        let stat = aggregate(modifiers.clone(), &options);
        let mut buckets: HashMap<(ModifierType, Sign), Vec<usize>> = HashMap::new();
        for (idx, modifier) in modifiers.iter().enumerate() {
            if modifier.kind == ModifierType::Untyped || !eligible(modifier, &options) {
                continue;
            }
            if let Some(sign) = modifier.sign() {
                buckets.entry((modifier.kind, sign)).or_default().push(idx);
            }
        }

        for members in buckets.values() {
            let applied: Vec<usize> = members.iter().copied().filter(|&i| stat.modifiers[i].applies).collect();
            prop_assert_eq!(applied.len(), 1);
            let best = members.iter().map(|&i| modifiers[i].value.unsigned_abs()).max().unwrap();
            let first_best = members.iter().copied().find(|&i| modifiers[i].value.unsigned_abs() == best).unwrap();
            prop_assert_eq!(applied[0], first_best);
        }
    }

    #[test]
    fn ineligible_never_applies(modifiers in arb_modifiers(), options in arb_options()) {
        let stat = aggregate(modifiers.clone(), &options);
        prop_assert_eq!(stat.modifiers.len(), modifiers.len());
        for (applied, modifier) in stat.modifiers.iter().zip(&modifiers) {
            prop_assert_eq!(&applied.modifier, modifier);
            if !eligible(modifier, &options) {
                prop_assert!(!applied.applies);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Untyped additivity
//
// Every eligible untyped modifier applies, and the total is the sum of the
// applied values.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn untyped_always_adds(modifiers in arb_modifiers(), options in arb_options()) {
        let stat = aggregate(modifiers.clone(), &options);
        for (applied, modifier) in stat.modifiers.iter().zip(&modifiers) {
            if modifier.kind == ModifierType::Untyped && eligible(modifier, &options) {
                prop_assert!(applied.applies);
            }
        }
        let sum: i32 = stat.applied().map(|m| m.value).sum();
        prop_assert_eq!(stat.total, sum);
    }

    #[test]
    fn adding_untyped_shifts_total(modifiers in arb_modifiers(), options in arb_options(), extra in -5_i32..=5) {
        let before = aggregate(modifiers.clone(), &options).total;
        let mut more = modifiers;
        more.push(Modifier::new("extra", ModifierType::Untyped, extra));
        let after = aggregate(more, &options).total;
        prop_assert_eq!(after, before + extra);
    }
}

// ---------------------------------------------------------------------------
// Purity and idempotence
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn predicate_is_pure(predicate in arb_predicate(), options in arb_options()) {
        let snapshot = options.clone();
        let first = predicate.evaluate(&options);
        for _ in 0..3 {
            prop_assert_eq!(predicate.evaluate(&options), first);
        }
        prop_assert_eq!(options, snapshot);
    }

    #[test]
    fn predicate_json_round_trip_evaluates_the_same(predicate in arb_predicate(), options in arb_options()) {
        let json = serde_json::to_string(&predicate).unwrap();
        let back: Predicate = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.evaluate(&options), predicate.evaluate(&options));
    }

    #[test]
    fn aggregation_is_idempotent(modifiers in arb_modifiers(), options in arb_options()) {
        let first = aggregate(modifiers.clone(), &options);
        let second = aggregate(modifiers, &options);
        prop_assert_eq!(first, second);
    }
}

// ---------------------------------------------------------------------------
// Deletion planning
//
// Planning terminates on any graph, cycles included. The result is closed
// under cascade, and never deletes an item whose restrict policy protects
// a surviving neighbour.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn cascade_terminates_without_duplicates((graph, size) in arb_graph(), target in 0_usize..10) {
        let target = item(target % size);
        let plan = graph.plan_deletion(&[target]);
        let unique: HashSet<_> = plan.deletions.iter().collect();
        prop_assert_eq!(unique.len(), plan.deletions.len());
        prop_assert!(plan.deletions.len() <= size);
    }

    #[test]
    fn plan_respects_policies((graph, size) in arb_graph(), target in 0_usize..10) {
        let target = item(target % size);
        let plan = graph.plan_deletion(&[target.clone()]);
        let deleted: HashSet<_> = plan.deletions.iter().cloned().collect();

        if plan.aborted.is_empty() {
            prop_assert!(deleted.contains(&target));
        } else {
            // All or nothing.
            prop_assert!(plan.deletions.is_empty());
            prop_assert!(plan.updates.is_empty());
            prop_assert_eq!(plan.notices.len(), 1);
        }

        for id in &deleted {
            for edge in graph.grants_of(id) {
                match edge.grantee_policy {
                    DeletePolicy::Cascade | DeletePolicy::Restrict => {
                        prop_assert!(deleted.contains(&edge.grantee));
                    }
                    DeletePolicy::RemoveLink => {}
                }
            }
            if let Some(edge) = graph.granted_by(id) {
                match edge.granter_policy {
                    DeletePolicy::Cascade | DeletePolicy::Restrict => {
                        prop_assert!(deleted.contains(&edge.granter));
                    }
                    DeletePolicy::RemoveLink => {}
                }
            }
        }

        for patch in &plan.updates {
            prop_assert!(!deleted.contains(patch.target()));
        }
    }

    #[test]
    fn plan_ignores_target_order((graph, size) in arb_graph(), picks in prop::collection::vec(0_usize..10, 1..4)) {
        let targets: Vec<_> = picks.iter().map(|n| item(n % size)).collect();
        let mut reversed = targets.clone();
        reversed.reverse();

        let forward = graph.plan_deletion(&targets);
        let backward = graph.plan_deletion(&reversed);
        let set = |ids: &[modstack::ItemId]| ids.iter().cloned().collect::<HashSet<_>>();
        prop_assert_eq!(set(&forward.deletions), set(&backward.deletions));
        prop_assert_eq!(set(&forward.aborted), set(&backward.aborted));
        let patches = |plan: &modstack::grant::DeletionPlan| plan.updates.iter().cloned().collect::<HashSet<_>>();
        prop_assert_eq!(patches(&forward), patches(&backward));

        // Every restrict edge leaving the deleted set is honoured.
        let deleted = set(&forward.deletions);
        for id in &deleted {
            for edge in graph.grants_of(id) {
                if edge.grantee_policy == DeletePolicy::Restrict {
                    prop_assert!(deleted.contains(&edge.grantee));
                }
            }
        }
    }
}
