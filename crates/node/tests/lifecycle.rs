// Path: crates/node/tests/lifecycle.rs

mod common;

use common::{slow_chain_config, Harness, PROTOCOL_VERSION};
use poc_api::storage::TableStore;
use poc_node::ChainStatus;
use poc_test_utils::fixtures::register_tx;
use poc_test_utils::{assert_error_code, assert_ok};
use poc_types::app::{ConsensusTx, CONSENSUS_TX_TYPES};
use poc_types::codec;
use poc_types::error::ChainError;
use poc_types::config::ChainConfig;
use poc_types::keys::{chain_config_key, chain_tables, CONFIG_TABLE};
use std::time::Duration;

#[tokio::test]
async fn fresh_node_synthesizes_and_runs_the_default_chain() {
    let h = Harness::new();
    let running = assert_ok!(h.manager.start().await);
    assert_eq!(running, vec![1]);
    assert_eq!(h.manager.status(1), Some(ChainStatus::Running));
    assert!(h.manager.is_scheduled(1));

    let raw = h
        .store
        .get(CONFIG_TABLE, &chain_config_key(1))
        .unwrap()
        .expect("synthesized config is persisted");
    let config: ChainConfig = codec::from_bytes_canonical(&raw).unwrap();
    assert_eq!(config, slow_chain_config(1));

    for table in chain_tables(1) {
        assert!(h.store.table_exists(&table).unwrap(), "{table} missing");
    }
    let (version, types) = h.protocol.bindings(1).unwrap();
    assert_eq!(version, PROTOCOL_VERSION);
    assert_eq!(types, CONSENSUS_TX_TYPES.to_vec());

    // Without history there is no round until an agent registers.
    assert!(h.manager.current_round(1).unwrap().is_none());
    h.manager.shutdown().await;
}

#[tokio::test]
async fn stop_and_run_again() {
    let h = Harness::new();
    h.manager.start().await.unwrap();

    assert_ok!(h.manager.stop_chain(1).await);
    assert_eq!(h.manager.status(1), Some(ChainStatus::Stopped));
    assert!(!h.manager.is_scheduled(1));

    assert_ok!(h.manager.run_chain(1).await);
    assert_eq!(h.manager.status(1), Some(ChainStatus::Running));
    assert!(h.manager.is_scheduled(1));
    h.manager.shutdown().await;
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let h = Harness::new();
    h.manager.start().await.unwrap();

    assert_error_code!(h.manager.run_chain(1).await, "CHAIN_INVALID_LIFECYCLE");
    assert_error_code!(h.manager.delete_chain(1).await, "CHAIN_INVALID_LIFECYCLE");
    assert_error_code!(h.manager.run_chain(7).await, "CHAIN_UNKNOWN");
    assert_error_code!(h.manager.stop_chain(7).await, "CHAIN_UNKNOWN");

    h.manager.stop_chain(1).await.unwrap();
    assert_error_code!(h.manager.stop_chain(1).await, "CHAIN_INVALID_LIFECYCLE");

    h.fund(&[1]);
    let tx = ConsensusTx::RegisterAgent(register_tx(1, 1, 500));
    assert_error_code!(h.manager.apply_tx(1, tx).await, "CHAIN_INVALID_LIFECYCLE");
    assert!(h.manager.agents_snapshot(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_forgets_the_chain() {
    let h = Harness::new();
    h.manager.start().await.unwrap();
    h.manager.stop_chain(1).await.unwrap();

    assert_ok!(h.manager.delete_chain(1).await);
    assert!(h.manager.chain_ids().is_empty());
    assert_eq!(h.manager.status(1), None);
    for table in chain_tables(1) {
        assert!(!h.store.table_exists(&table).unwrap(), "{table} survived");
    }
    assert!(h
        .store
        .get(CONFIG_TABLE, &chain_config_key(1))
        .unwrap()
        .is_none());
    assert!(h.protocol.bindings(1).is_none());
    assert_error_code!(h.manager.delete_chain(1).await, "CHAIN_UNKNOWN");
}

#[tokio::test]
async fn added_chains_are_independent() {
    let h = Harness::new();
    h.manager.start().await.unwrap();

    assert_ok!(h.manager.add_chain(slow_chain_config(2)));
    assert_eq!(h.manager.status(2), Some(ChainStatus::Initialized));
    assert_eq!(h.manager.chain_ids(), vec![1, 2]);
    assert!(h.protocol.bindings(2).is_some());
    for table in chain_tables(2) {
        assert!(h.store.table_exists(&table).unwrap());
    }

    h.manager.run_chain(2).await.unwrap();
    h.manager.stop_chain(1).await.unwrap();
    assert_eq!(h.manager.status(1), Some(ChainStatus::Stopped));
    assert_eq!(h.manager.status(2), Some(ChainStatus::Running));
    assert!(h.manager.is_scheduled(2));

    assert_error_code!(
        h.manager.add_chain(slow_chain_config(2)),
        "CHAIN_INVALID_LIFECYCLE"
    );
    let invalid = ChainConfig {
        packing_interval: 0,
        ..slow_chain_config(3)
    };
    assert_error_code!(h.manager.add_chain(invalid), "CONFIG_INVALID");
    assert_eq!(h.manager.status(3), None);
    h.manager.shutdown().await;
}

#[tokio::test]
async fn undecodable_configs_are_skipped() {
    let h = Harness::new();
    h.store.create_table(CONFIG_TABLE).unwrap();
    h.store
        .put(
            CONFIG_TABLE,
            &chain_config_key(2),
            &codec::to_bytes_canonical(&slow_chain_config(2)),
        )
        .unwrap();
    h.store
        .put(CONFIG_TABLE, &chain_config_key(9), &[0xde, 0xad])
        .unwrap();

    let initialized = assert_ok!(h.manager.init_chain());
    assert_eq!(initialized, vec![2]);
    // A persisted configuration exists, so none is synthesized.
    assert_eq!(h.manager.chain_ids(), vec![2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_waits_for_the_tick_in_flight() {
    let h = Harness::new();
    h.headers.hold();
    h.manager.start().await.unwrap();

    // The scheduler's first tick is parked inside the header poll.
    h.headers.wait_until_held().await;
    let manager = h.manager.clone();
    let stop = tokio::spawn(async move { manager.stop_chain(1).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!stop.is_finished(), "stop returned while a tick was in flight");

    h.headers.release();
    assert_ok!(stop.await.unwrap());
    assert_eq!(h.manager.status(1), Some(ChainStatus::Stopped));

    let polls = h.headers.polls();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.headers.polls(), polls, "a tick ran after stop returned");
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Run,
    Delete,
}

/// Holds chain 1's lock while `ops` queue behind it in order, then releases it
/// and returns each operation's result.
async fn queued_behind_lock(h: &Harness, ops: &[Op]) -> Vec<Result<(), ChainError>> {
    let chain = h.manager.chain(1).unwrap();
    let guard = chain.state().lock().await;
    let mut handles = Vec::new();
    for op in ops.iter().copied() {
        let manager = h.manager.clone();
        handles.push(tokio::spawn(async move {
            match op {
                Op::Run => manager.run_chain(1).await,
                Op::Delete => manager.delete_chain(1).await,
            }
        }));
        // The task parks on the lock before the next one is spawned.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    drop(guard);

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test]
async fn delete_queued_behind_a_run_is_rejected() {
    let h = Harness::new();
    h.start().await;
    h.manager.stop_chain(1).await.unwrap();

    let mut results = queued_behind_lock(&h, &[Op::Run, Op::Delete]).await.into_iter();
    assert_ok!(results.next().unwrap());
    assert_error_code!(results.next().unwrap(), "CHAIN_INVALID_LIFECYCLE");
    assert_eq!(h.manager.status(1), Some(ChainStatus::Running));
    assert!(h.manager.is_scheduled(1));

    h.manager.shutdown().await;
    assert!(!h.manager.is_scheduled(1));
}

#[tokio::test]
async fn run_queued_behind_a_delete_starts_nothing() {
    let h = Harness::new();
    h.start().await;
    h.manager.stop_chain(1).await.unwrap();

    let mut results = queued_behind_lock(&h, &[Op::Delete, Op::Run]).await.into_iter();
    assert_ok!(results.next().unwrap());
    assert_error_code!(results.next().unwrap(), "CHAIN_INVALID_LIFECYCLE");
    assert!(h.manager.chain_ids().is_empty());
    assert!(!h.manager.is_scheduled(1));
    for table in chain_tables(1) {
        assert!(!h.store.table_exists(&table).unwrap());
    }
}

#[tokio::test]
async fn concurrent_runs_start_one_scheduler() {
    let h = Harness::new();
    h.start().await;
    h.manager.stop_chain(1).await.unwrap();

    let mut results = queued_behind_lock(&h, &[Op::Run, Op::Run]).await.into_iter();
    assert_ok!(results.next().unwrap());
    assert_error_code!(results.next().unwrap(), "CHAIN_INVALID_LIFECYCLE");
    assert!(h.manager.is_scheduled(1));

    // A single stop cancels it; nothing is left behind.
    assert_ok!(h.manager.stop_chain(1).await);
    assert!(!h.manager.is_scheduled(1));
    assert_eq!(h.manager.status(1), Some(ChainStatus::Stopped));
}
