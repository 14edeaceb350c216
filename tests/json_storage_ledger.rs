mod support;

use std::sync::Arc;

use anyhow::Result;
use coinledger::clock::FixedClock;
use coinledger::ledger::{LedgerError, LedgerService, NewAsset, NewTransaction};
use coinledger::models::{SequentialIdGenerator, TransactionType, TypeFilter};
use coinledger::storage::{JsonFileStorage, Storage};
use rust_decimal_macros::dec;
use support::utc;
use tempfile::TempDir;

fn ledger(storage: Arc<JsonFileStorage>) -> LedgerService {
    LedgerService::new(storage)
        .with_id_generator(Arc::new(SequentialIdGenerator::new("t")))
        .with_clock(Arc::new(FixedClock::new(utc(2024, 6, 1, 0, 0))))
}

fn asset(symbol: &str, feed: &str) -> NewAsset {
    NewAsset {
        symbol: symbol.to_string(),
        name: symbol.to_string(),
        price_feed_id: feed.to_string(),
        icon: None,
        location: "Cold wallet".to_string(),
    }
}

#[tokio::test]
async fn ledger_survives_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let storage = Arc::new(JsonFileStorage::new(dir.path()));
    let ledger = ledger(storage.clone());

    let btc = ledger.add_asset(asset("btc", "bitcoin")).await?;
    ledger
        .add_transaction(NewTransaction {
            date: utc(2024, 1, 10, 12, 0),
            kind: TransactionType::Buy,
            asset_id: btc.id.clone(),
            quantity: dec!(0.5),
            unit_price: dec!(42000),
            total_amount: None,
            notes: "first buy".to_string(),
        })
        .await?;
    ledger
        .add_transaction(NewTransaction {
            date: utc(2024, 2, 10, 12, 0),
            kind: TransactionType::StakingReward,
            asset_id: btc.id.clone(),
            quantity: dec!(0.01),
            unit_price: dec!(0),
            total_amount: None,
            notes: String::new(),
        })
        .await?;

    assert!(dir.path().join("assets.json").exists());
    assert!(dir.path().join("transactions.json").exists());

    let reopened = JsonFileStorage::new(dir.path());
    let assets = reopened.list_assets().await?;
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].symbol, "BTC");
    assert_eq!(assets[0].location, "Cold wallet");

    let txns = reopened.list_transactions(TypeFilter::All).await?;
    assert_eq!(txns.len(), 2);
    assert_eq!(txns[0].kind, TransactionType::StakingReward);
    assert_eq!(txns[1].total_amount, dec!(21000));
    assert_eq!(txns[1].notes, "first buy");

    let cost_based = reopened.list_transactions(TypeFilter::CostBased).await?;
    assert_eq!(cost_based.len(), 1);
    Ok(())
}

#[tokio::test]
async fn staking_reward_label_is_stored_with_a_space() -> Result<()> {
    let dir = TempDir::new()?;
    let storage = Arc::new(JsonFileStorage::new(dir.path()));
    let ledger = ledger(storage);
    let eth = ledger.add_asset(asset("eth", "ethereum")).await?;
    ledger
        .add_transaction(NewTransaction {
            date: utc(2024, 1, 1, 0, 0),
            kind: TransactionType::StakingReward,
            asset_id: eth.id,
            quantity: dec!(1),
            unit_price: dec!(0),
            total_amount: None,
            notes: String::new(),
        })
        .await?;

    let raw = std::fs::read_to_string(dir.path().join("transactions.json"))?;
    assert!(raw.contains("\"type\": \"Staking Reward\""), "{raw}");
    Ok(())
}

#[tokio::test]
async fn asset_with_transactions_cannot_be_deleted() -> Result<()> {
    let dir = TempDir::new()?;
    let storage = Arc::new(JsonFileStorage::new(dir.path()));
    let ledger = ledger(storage.clone());

    let sol = ledger.add_asset(asset("sol", "solana")).await?;
    let recorded = ledger
        .add_transaction(NewTransaction {
            date: utc(2024, 1, 1, 0, 0),
            kind: TransactionType::Airdrop,
            asset_id: sol.id.clone(),
            quantity: dec!(5),
            unit_price: dec!(0),
            total_amount: None,
            notes: String::new(),
        })
        .await?;

    match ledger.delete_asset(&sol.id).await {
        Err(LedgerError::AssetInUse { asset_id, count }) => {
            assert_eq!(asset_id, sol.id);
            assert_eq!(count, 1);
        }
        other => panic!("expected AssetInUse, got {other:?}"),
    }
    assert!(storage.get_asset(&sol.id).await?.is_some());

    ledger.delete_transaction(&recorded.transaction.id).await?;
    ledger.delete_asset(&sol.id).await?;
    assert!(storage.list_assets().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn corrupt_file_is_reported() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("assets.json"), "{ not json")?;
    let storage = JsonFileStorage::new(dir.path());
    let err = storage.list_assets().await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse JSON"));
    Ok(())
}
