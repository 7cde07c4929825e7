// crates/verdict-core/tests/reload_atomicity.rs
// ============================================================================
// Module: Reload Atomicity Tests
// Description: Concurrency coverage for registry snapshot swaps.
// Purpose: Ensure readers only ever observe pre- or post-reload snapshots.
// ============================================================================

//! Concurrent readers race a sequence of full reloads; every observed
//! snapshot must be internally coherent — its version maps to exactly the
//! rule set installed at that version, never a mix.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;

use verdict_core::ConditionOperator;
use verdict_core::RuleRecord;
use verdict_core::RuleStatus;
use verdict_core::RulesetId;
use verdict_core::RulesetRecord;
use verdict_core::Timestamp;
use verdict_core::core::AttributeId;
use verdict_core::core::BooleanMode;
use verdict_core::runtime::CachedRule;
use verdict_core::runtime::PreparedRule;
use verdict_core::runtime::RuleRegistry;
use verdict_core::runtime::compiler::Comparison;
use verdict_core::runtime::compiler::Operand;
use verdict_core::runtime::compiler::Predicate;

/// Builds a ruleset record fixture.
fn ruleset() -> RulesetRecord {
    RulesetRecord {
        id: RulesetId::from_raw(1).expect("nonzero"),
        name: "main".to_string(),
        description: None,
        version: "1.0".to_string(),
        status: RuleStatus::Active,
        tenant_id: None,
        is_default: true,
        tags: None,
        metadata: None,
    }
}

/// Builds one cached rule belonging to the given generation.
fn generation_rule(generation: usize, index: usize) -> CachedRule {
    let rule_id = format!("g{generation}-r{index}");
    let record = RuleRecord {
        row_id: 1,
        rule_id: rule_id.as_str().into(),
        rule_name: rule_id.clone(),
        ruleset_id: RulesetId::from_raw(1).expect("nonzero"),
        conditions: None,
        flat: None,
        rule_point: 10,
        weight: 1.0,
        priority: i32::try_from(index).unwrap_or(0),
        action_result: "Y".to_string(),
        status: RuleStatus::Active,
        version: "1.0".to_string(),
        tags: None,
        metadata: None,
    };
    let prepared = PreparedRule {
        priority: record.priority,
        rule_id: record.rule_id.clone(),
        rule_name: record.rule_name.clone(),
        predicate: Predicate {
            clauses: vec![Comparison {
                attribute: AttributeId::new("status"),
                operator: ConditionOperator::Equal,
                operand: Operand::Scalar("open".to_string()),
            }],
            mode: BooleanMode::And,
        },
        rule_point: 10,
        action_result: "Y".to_string(),
        weight: 1.0,
    };
    CachedRule {
        record,
        prepared,
    }
}

#[test]
fn readers_never_observe_a_half_applied_reload() {
    let registry = Arc::new(RuleRegistry::default());
    registry.install_reload(
        vec![(ruleset(), Vec::new())],
        vec![generation_rule(0, 0)],
        true,
        Timestamp::Logical(0),
    );

    let stop = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0 .. 4 {
        let registry = Arc::clone(&registry);
        let stop = Arc::clone(&stop);
        readers.push(thread::spawn(move || {
            let mut observed_versions: Vec<u64> = Vec::new();
            while !stop.load(Ordering::Relaxed) {
                let snapshot = registry.evaluation_snapshot(None).expect("snapshot");
                // Coherence: every rule in the snapshot belongs to a single
                // generation, and the list length matches that generation.
                let generations: Vec<usize> = snapshot
                    .prepared
                    .iter()
                    .map(|rule| {
                        let name = rule.rule_id.as_str();
                        name[1 .. name.find('-').expect("generation marker")]
                            .parse::<usize>()
                            .expect("generation number")
                    })
                    .collect();
                if let Some(first) = generations.first() {
                    assert!(generations.iter().all(|generation| generation == first));
                    assert_eq!(snapshot.prepared.len(), first + 1);
                }
                if let Some(last) = observed_versions.last() {
                    assert!(snapshot.version >= *last, "version went backwards");
                }
                observed_versions.push(snapshot.version);
            }
            observed_versions
        }));
    }

    // Each generation installs generation+1 rules so a torn read would show
    // a mixed or wrong-sized list.
    for generation in 1 .. 40 {
        let rules: Vec<CachedRule> =
            (0 ..= generation).map(|index| generation_rule(generation, index)).collect();
        registry.install_reload(
            vec![(ruleset(), Vec::new())],
            rules,
            true,
            Timestamp::Logical(generation as u64),
        );
    }

    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        let observed = reader.join().expect("reader join");
        assert!(!observed.is_empty());
    }
}
