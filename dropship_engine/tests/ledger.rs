//! Deposit-ledger invariants: balance folding, entry chaining, and the manual-operation guards.
use dropship_engine::{
    db_types::{Kopecks, TransactionType},
    order_objects::LedgerQueryFilter,
    LedgerApi,
    LedgerError,
};

mod support;
use support::{new_test_db, seed_client};

#[tokio::test]
async fn balance_is_the_latest_completed_entry() {
    let db = new_test_db().await;
    let client_id = seed_client(&db, 1, "ООО Ромашка").await;
    let api = LedgerApi::new(db.clone());

    assert_eq!(api.balance(client_id).await.unwrap(), Kopecks::from(0), "no entries yet");

    api.deposit(client_id, Kopecks::from(100_000), "первое пополнение").await.unwrap();
    api.deposit(client_id, Kopecks::from(25_000), "второе пополнение").await.unwrap();
    assert_eq!(api.balance(client_id).await.unwrap(), Kopecks::from(125_000));

    api.withdraw(client_id, Kopecks::from(20_000), "вывод средств").await.unwrap();
    assert_eq!(api.balance(client_id).await.unwrap(), Kopecks::from(105_000));
}

#[tokio::test]
async fn entries_chain_for_any_sequence_of_appends() {
    let db = new_test_db().await;
    let client_id = seed_client(&db, 1, "ООО Ромашка").await;
    let api = LedgerApi::new(db.clone());

    api.deposit(client_id, Kopecks::from(50_000), "пополнение").await.unwrap();
    api.withdraw(client_id, Kopecks::from(10_000), "вывод").await.unwrap();
    api.deposit(client_id, Kopecks::from(7_777), "пополнение").await.unwrap();
    api.withdraw(client_id, Kopecks::from(47_777), "вывод").await.unwrap();

    let mut entries = api.history(client_id, LedgerQueryFilter::default()).await.unwrap();
    entries.reverse(); // oldest first
    assert_eq!(entries.len(), 4);
    for entry in &entries {
        assert_eq!(entry.balance_after, entry.balance_before + entry.amount, "entry #{} breaks its own sum", entry.id);
    }
    for pair in entries.windows(2) {
        assert_eq!(pair[1].balance_before, pair[0].balance_after, "entry #{} breaks the chain", pair[1].id);
    }
    assert_eq!(entries.last().unwrap().balance_after, Kopecks::from(0));
}

#[tokio::test]
async fn balances_are_isolated_per_client() {
    let db = new_test_db().await;
    let first = seed_client(&db, 1, "ООО Ромашка").await;
    let second = seed_client(&db, 2, "ИП Петров").await;
    let api = LedgerApi::new(db.clone());

    api.deposit(first, Kopecks::from(100_000), "пополнение").await.unwrap();
    api.deposit(second, Kopecks::from(5_000), "пополнение").await.unwrap();

    assert_eq!(api.balance(first).await.unwrap(), Kopecks::from(100_000));
    assert_eq!(api.balance(second).await.unwrap(), Kopecks::from(5_000));
}

#[tokio::test]
async fn manual_operations_are_guarded() {
    let db = new_test_db().await;
    let client_id = seed_client(&db, 1, "ООО Ромашка").await;
    let api = LedgerApi::new(db.clone());

    let err = api.deposit(client_id, Kopecks::from(0), "пустое пополнение").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)), "{err}");
    let err = api.deposit(client_id, Kopecks::from(-5_000), "отрицательное").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)), "{err}");

    api.deposit(client_id, Kopecks::from(10_000), "пополнение").await.unwrap();
    let err = api.withdraw(client_id, Kopecks::from(10_001), "слишком много").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)), "{err}");
    // the failed attempts left no rows behind
    let entries = api.history(client_id, LedgerQueryFilter::default()).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn history_filters_by_type() {
    let db = new_test_db().await;
    let client_id = seed_client(&db, 1, "ООО Ромашка").await;
    let api = LedgerApi::new(db.clone());

    api.deposit(client_id, Kopecks::from(10_000), "пополнение").await.unwrap();
    api.withdraw(client_id, Kopecks::from(1_000), "вывод").await.unwrap();
    api.deposit(client_id, Kopecks::from(2_000), "пополнение").await.unwrap();

    let deposits = api
        .history(client_id, LedgerQueryFilter::default().with_type(TransactionType::Deposit))
        .await
        .unwrap();
    assert_eq!(deposits.len(), 2);
    assert!(deposits.iter().all(|e| e.transaction_type == TransactionType::Deposit));
}
