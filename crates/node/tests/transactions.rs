// Path: crates/node/tests/transactions.rs

mod common;

use common::Harness;
use poc_node::ChainStatus;
use poc_api::storage::TableStore;
use poc_test_utils::fixtures::{
    agent, deposit_tx, red_tx, register_tx, stop_tx, withdraw_tx,
};
use poc_test_utils::{assert_err, assert_error_code, assert_ok};
use poc_types::app::{Address, ConsensusTx, Deposit, DepositStatus, TxHash};
use poc_types::codec;
use poc_types::keys::deposit_table;

async fn running() -> Harness {
    let h = Harness::new();
    h.start().await;
    h.fund(&[1, 2, 3, 40, 41]);
    h
}

#[tokio::test]
async fn registration_then_deposits_within_bounds() {
    let h = running().await;
    let a = agent(1, 1, 500);
    assert_ok!(
        h.manager
            .apply_tx(1, ConsensusTx::RegisterAgent(register_tx(1, 1, 500)))
            .await
    );

    let below = deposit_tx(50, &a, 40, 5);
    assert_error_code!(
        h.manager.apply_tx(1, ConsensusTx::Deposit(below)).await,
        "VALIDATION_DEPOSIT_OUT_OF_RANGE"
    );
    let above = deposit_tx(51, &a, 40, 1_001);
    assert_error_code!(
        h.manager.apply_tx(1, ConsensusTx::Deposit(above)).await,
        "VALIDATION_DEPOSIT_OUT_OF_RANGE"
    );
    let entruster_low = deposit_tx(52, &a, 40, 15);
    assert_error_code!(
        h.manager.apply_tx(1, ConsensusTx::Deposit(entruster_low)).await,
        "VALIDATION_ENTRUSTER_DEPOSIT_TOO_LOW"
    );
    assert!(h.manager.deposits_snapshot(1).await.unwrap().is_empty());

    assert_ok!(
        h.manager
            .apply_tx(1, ConsensusTx::Deposit(deposit_tx(53, &a, 40, 100)))
            .await
    );
    assert_ok!(
        h.manager
            .apply_tx(1, ConsensusTx::Deposit(deposit_tx(54, &a, 41, 1_000)))
            .await
    );
    let deposits = h.manager.deposits_snapshot(1).await.unwrap();
    assert_eq!(deposits.len(), 2);
    assert_eq!(deposits.iter().map(|d| d.amount).sum::<u128>(), 1_100);

    let replay = deposit_tx(53, &a, 40, 100);
    assert_error_code!(
        h.manager.apply_tx(1, ConsensusTx::Deposit(replay)).await,
        "VALIDATION_DUPLICATE_TX"
    );
    h.manager.shutdown().await;
}

#[tokio::test]
async fn withdraw_by_depositor_only() {
    let h = running().await;
    let a = agent(1, 1, 500);
    h.manager
        .apply_tx(1, ConsensusTx::RegisterAgent(register_tx(1, 1, 500)))
        .await
        .unwrap();
    h.manager
        .apply_tx(1, ConsensusTx::Deposit(deposit_tx(60, &a, 40, 100)))
        .await
        .unwrap();

    let stranger = withdraw_tx(61, TxHash([60; 32]), Address([41; 32]));
    assert_error_code!(
        h.manager.apply_tx(1, ConsensusTx::Withdraw(stranger)).await,
        "VALIDATION_NOT_OWNER"
    );
    let owner = withdraw_tx(62, TxHash([60; 32]), Address([40; 32]));
    assert_ok!(h.manager.apply_tx(1, ConsensusTx::Withdraw(owner)).await);
    assert!(h.manager.deposits_snapshot(1).await.unwrap().is_empty());
    h.manager.shutdown().await;
}

#[tokio::test]
async fn stopping_an_agent_releases_its_deposits() {
    let h = running().await;
    let a = agent(1, 1, 500);
    let b = agent(2, 2, 300);
    for tx in [register_tx(1, 1, 500), register_tx(2, 2, 300)] {
        h.manager
            .apply_tx(1, ConsensusTx::RegisterAgent(tx))
            .await
            .unwrap();
    }
    h.manager
        .apply_tx(1, ConsensusTx::Deposit(deposit_tx(70, &a, 40, 100)))
        .await
        .unwrap();
    h.manager
        .apply_tx(1, ConsensusTx::Deposit(deposit_tx(71, &b, 41, 100)))
        .await
        .unwrap();

    let mut by_stranger = stop_tx(72, &a, common::T0);
    by_stranger.sender = Address([3; 32]);
    assert_error_code!(
        h.manager.apply_tx(1, ConsensusTx::StopAgent(by_stranger)).await,
        "VALIDATION_NOT_OWNER"
    );
    assert_eq!(h.manager.deposits_snapshot(1).await.unwrap().len(), 2);

    assert_ok!(
        h.manager
            .apply_tx(1, ConsensusTx::StopAgent(stop_tx(73, &a, common::T0)))
            .await
    );
    let agents = h.manager.agents_snapshot(1).await.unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].agent_hash, b.agent_hash);
    let deposits = h.manager.deposits_snapshot(1).await.unwrap();
    assert_eq!(deposits.len(), 1);
    assert_eq!(deposits[0].agent_hash, b.agent_hash);

    // A stopped agent takes no new deposits.
    assert_error_code!(
        h.manager
            .apply_tx(1, ConsensusTx::Deposit(deposit_tx(74, &a, 40, 100)))
            .await,
        "VALIDATION_AGENT_NOT_ACTIVE"
    );
    h.manager.shutdown().await;
}

#[tokio::test]
async fn red_card_returns_delegated_stake_and_locks_the_owner() {
    let h = running().await;
    let a = agent(1, 1, 500);
    h.manager
        .apply_tx(1, ConsensusTx::RegisterAgent(register_tx(1, 1, 500)))
        .await
        .unwrap();
    h.manager
        .apply_tx(1, ConsensusTx::Deposit(deposit_tx(60, &a, 40, 100)))
        .await
        .unwrap();

    let red = red_tx(90, a.agent_hash, 5, 1);
    assert_ok!(h.manager.apply_tx(1, ConsensusTx::RedPunish(red)).await);
    assert!(h.manager.deposits_snapshot(1).await.unwrap().is_empty());
    let raw = h.store.get(&deposit_table(1), &[60; 32]).unwrap().unwrap();
    let stored: Deposit = codec::from_bytes_canonical(&raw).unwrap();
    assert_eq!(stored.status, DepositStatus::Withdrawn);
    assert_eq!(stored.withdraw_height, Some(5));

    let withdraw = withdraw_tx(61, TxHash([60; 32]), Address([40; 32]));
    assert_error_code!(
        h.manager.apply_tx(1, ConsensusTx::Withdraw(withdraw)).await,
        "VALIDATION_DEPOSIT_WITHDRAWN"
    );
    assert_error_code!(
        h.manager
            .apply_tx(1, ConsensusTx::RegisterAgent(register_tx(2, 1, 500)))
            .await,
        "VALIDATION_ADDRESS_LOCKED"
    );
    h.manager.shutdown().await;
}

#[tokio::test]
async fn raw_payloads_are_decoded_or_rejected() {
    let h = running().await;
    assert_error_code!(h.manager.apply_raw_tx(1, &[]).await, "TX_EMPTY");
    assert_error_code!(h.manager.apply_raw_tx(1, &[0xff, 0x01, 0x02]).await, "TX_PARSE");
    assert!(h.manager.agents_snapshot(1).await.unwrap().is_empty());

    let bytes = ConsensusTx::RegisterAgent(register_tx(1, 1, 500)).to_bytes();
    assert_ok!(h.manager.apply_raw_tx(1, &bytes).await);
    assert_eq!(h.manager.agents_snapshot(1).await.unwrap().len(), 1);

    assert_error_code!(h.manager.apply_raw_tx(5, &bytes).await, "CHAIN_UNKNOWN");
    h.manager.shutdown().await;
}

#[tokio::test]
async fn registration_rejections_leave_no_trace() {
    let h = running().await;
    h.manager
        .apply_tx(1, ConsensusTx::RegisterAgent(register_tx(1, 1, 500)))
        .await
        .unwrap();

    assert_error_code!(
        h.manager
            .apply_tx(1, ConsensusTx::RegisterAgent(register_tx(1, 1, 500)))
            .await,
        "VALIDATION_DUPLICATE_TX"
    );
    assert_error_code!(
        h.manager
            .apply_tx(1, ConsensusTx::RegisterAgent(register_tx(2, 1, 500)))
            .await,
        "VALIDATION_ADDRESS_IN_USE"
    );
    assert_error_code!(
        h.manager
            .apply_tx(1, ConsensusTx::RegisterAgent(register_tx(3, 2, 50)))
            .await,
        "VALIDATION_COMMISSION_OUT_OF_RANGE"
    );
    let mut low_rate = register_tx(4, 3, 500);
    low_rate.commission_rate = 5;
    assert_error_code!(
        h.manager.apply_tx(1, ConsensusTx::RegisterAgent(low_rate)).await,
        "VALIDATION_COMMISSION_RATE_OUT_OF_RANGE"
    );
    assert_error_code!(
        h.manager
            .apply_tx(1, ConsensusTx::RegisterAgent(register_tx(5, 9, 500)))
            .await,
        "VALIDATION_INSUFFICIENT_BALANCE"
    );
    assert_eq!(h.manager.agents_snapshot(1).await.unwrap().len(), 1);
    h.manager.shutdown().await;
}

#[tokio::test]
async fn ledger_outage_is_retryable() {
    let h = running().await;
    h.ledger.set_unavailable(true);
    let err = assert_err!(
        h.manager
            .apply_tx(1, ConsensusTx::RegisterAgent(register_tx(1, 1, 500)))
            .await
    );
    assert!(err.is_retryable());
    assert_eq!(h.manager.status(1), Some(ChainStatus::Running));
    assert!(h.manager.agents_snapshot(1).await.unwrap().is_empty());
    h.manager.shutdown().await;
}
