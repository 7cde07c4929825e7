// crates/verdict-store-sqlite/src/logwriter/tests.rs
// ============================================================================
// Module: Log Writer Unit Tests
// Description: Unit coverage for buffering, batching, and backpressure.
// Purpose: Ensure appends never block and overflow sheds oldest entries.
// Dependencies: verdict-store-sqlite
// ============================================================================

//! ## Overview
//! Covers drain-through persistence, drop-oldest overflow accounting, and
//! failure counting against a store stub.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use verdict_core::ExecutionRecord;
use verdict_core::ExecutionSink;
use verdict_core::NoopTelemetry;
use verdict_core::RuleStore;
use verdict_core::RulesetId;
use verdict_core::Timestamp;
use verdict_core::runtime::InMemoryRuleStore;

use super::BufferedLogWriter;

/// Builds an execution record fixture.
fn record(index: u64) -> ExecutionRecord {
    ExecutionRecord {
        execution_id: verdict_core::ExecutionId::new(format!("exec-{index}")),
        input_data: serde_json::json!({"index": index}),
        output_data: serde_json::Value::Null,
        ruleset_id: RulesetId::from_raw(1).expect("nonzero"),
        total_points: 0.0,
        pattern_result: "-".to_string(),
        execution_time_ms: 1.0,
        success: true,
        ab_test_id: None,
        ab_test_variant: None,
        consumer_id: None,
        correlation_id: None,
        timestamp: Timestamp::Logical(index),
    }
}

#[test]
fn appended_records_drain_into_the_store() {
    let store = Arc::new(InMemoryRuleStore::new());
    let writer = BufferedLogWriter::spawn(
        Arc::clone(&store) as Arc<dyn RuleStore>,
        16,
        Arc::new(NoopTelemetry),
    );
    for index in 0 .. 5 {
        writer.append(record(index));
    }
    assert!(writer.flush(Duration::from_secs(5)));
    let persisted = store
        .list_executions(&verdict_core::ExecutionFilter::default())
        .expect("list");
    assert_eq!(persisted.len(), 5);
    assert_eq!(writer.dropped_count(), 0);
    assert_eq!(writer.write_failures(), 0);
}

#[test]
fn overflow_drops_the_oldest_pending_entries() {
    // A zero-capacity request clamps to one slot; with the worker unable to
    // keep up instantly, early entries may be shed but appends never block.
    let store = Arc::new(InMemoryRuleStore::new());
    let writer = BufferedLogWriter::spawn(
        Arc::clone(&store) as Arc<dyn RuleStore>,
        1,
        Arc::new(NoopTelemetry),
    );
    for index in 0 .. 200 {
        writer.append(record(index));
    }
    assert!(writer.flush(Duration::from_secs(5)));
    let persisted = store
        .list_executions(&verdict_core::ExecutionFilter::default())
        .expect("list");
    let total = persisted.len() as u64 + writer.dropped_count();
    assert_eq!(total, 200);
    // The newest record always survives the ring.
    let newest = persisted.last().expect("at least one record");
    assert_eq!(newest.execution_id.as_str(), "exec-199");
}
