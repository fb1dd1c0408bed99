mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use treasury_ledger::error::AppError;
use treasury_ledger::models::{TransactionStatus, TransactionType};
use treasury_ledger::repositories::AuditRepository;
use treasury_ledger::services::balance;
use treasury_ledger::services::{
    CreateTransactionCommand, TransactionService, UpdateTransactionCommand,
};
use uuid::Uuid;

fn command(
    transaction_type: TransactionType,
    amount: Decimal,
    status: TransactionStatus,
    account_id: Option<Uuid>,
) -> CreateTransactionCommand {
    CreateTransactionCommand {
        transaction_type,
        amount,
        currency: "USD".to_string(),
        status: Some(status),
        logical_account_id: account_id,
        parent_transaction_id: None,
        external_tx_hash: None,
        metadata: None,
        transaction_date: None,
    }
}

#[tokio::test]
async fn test_pending_transaction_does_not_touch_balance() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let account = common::create_account(&pool, "Pending-Acct").await;
    let service = TransactionService::new(pool.clone());

    let outcome = service
        .create(
            command(
                TransactionType::Deposit,
                dec!(100),
                TransactionStatus::Pending,
                Some(account.id),
            ),
            "system",
            None,
        )
        .await
        .expect("Failed to create pending transaction");

    assert_eq!(outcome.transaction.status, TransactionStatus::Pending);
    assert!(outcome.children.is_empty());
    assert_eq!(common::cached_balance(&pool, account.id).await, Decimal::ZERO);
    assert_eq!(
        balance::computed_balance(&pool, account.id, None).await.unwrap(),
        Decimal::ZERO
    );

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_completion_applies_signed_effect_and_keeps_cache_in_sync() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let account = common::create_account(&pool, "Sync-Acct").await;
    let service = TransactionService::new(pool.clone());

    service
        .create(
            command(
                TransactionType::Deposit,
                dec!(1000),
                TransactionStatus::Completed,
                Some(account.id),
            ),
            "system",
            None,
        )
        .await
        .expect("Failed to create deposit");

    service
        .create(
            command(
                TransactionType::Withdrawal,
                dec!(300),
                TransactionStatus::Completed,
                Some(account.id),
            ),
            "system",
            None,
        )
        .await
        .expect("Failed to create withdrawal");

    let cached = common::cached_balance(&pool, account.id).await;
    let derived = balance::computed_balance(&pool, account.id, None).await.unwrap();
    assert_eq!(cached, dec!(700));
    assert_eq!(derived, cached);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_pending_to_completed_transition_settles() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let account = common::create_account(&pool, "Transition-Acct").await;
    let service = TransactionService::new(pool.clone());

    let outcome = service
        .create(
            command(
                TransactionType::Deposit,
                dec!(250),
                TransactionStatus::Pending,
                Some(account.id),
            ),
            "system",
            None,
        )
        .await
        .expect("Failed to create pending");

    let updated = service
        .update(
            outcome.transaction.id,
            UpdateTransactionCommand {
                status: Some(TransactionStatus::Completed),
                metadata: None,
            },
            "operator-1",
            None,
        )
        .await
        .expect("Failed to complete");

    assert_eq!(updated.transaction.status, TransactionStatus::Completed);
    assert_eq!(common::cached_balance(&pool, account.id).await, dec!(250));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_terminal_statuses_are_final() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let service = TransactionService::new(pool.clone());
    let outcome = service
        .create(
            command(
                TransactionType::Deposit,
                dec!(10),
                TransactionStatus::Pending,
                None,
            ),
            "system",
            None,
        )
        .await
        .expect("Failed to create");

    service
        .update(
            outcome.transaction.id,
            UpdateTransactionCommand {
                status: Some(TransactionStatus::Cancelled),
                metadata: None,
            },
            "system",
            None,
        )
        .await
        .expect("Failed to cancel");

    // Any later status write, including a repeat, is a conflict.
    for next in [
        TransactionStatus::Completed,
        TransactionStatus::Failed,
        TransactionStatus::Cancelled,
        TransactionStatus::Pending,
    ] {
        let result = service
            .update(
                outcome.transaction.id,
                UpdateTransactionCommand {
                    status: Some(next),
                    metadata: None,
                },
                "system",
                None,
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))), "{next:?}");
    }

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_create_with_same_external_hash_returns_existing() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let service = TransactionService::new(pool.clone());
    let hash = format!("0x{}", Uuid::new_v4().simple());

    let mut first = command(
        TransactionType::Deposit,
        dec!(42),
        TransactionStatus::Completed,
        None,
    );
    first.external_tx_hash = Some(hash.clone());

    let created = service
        .create(first.clone(), "system", None)
        .await
        .expect("Failed to create");

    let retried = service
        .create(first, "system", None)
        .await
        .expect("Retry must succeed");

    assert_eq!(retried.transaction.id, created.transaction.id);

    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM ledger_transactions WHERE external_tx_hash = $1")
            .bind(&hash)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count.0, 1);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_missing_account_is_not_found() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let service = TransactionService::new(pool.clone());
    let result = service
        .create(
            command(
                TransactionType::Deposit,
                dec!(10),
                TransactionStatus::Completed,
                Some(Uuid::new_v4()),
            ),
            "system",
            None,
        )
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_every_write_leaves_exactly_one_audit_row() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let service = TransactionService::new(pool.clone());
    let outcome = service
        .create(
            command(
                TransactionType::Deposit,
                dec!(15),
                TransactionStatus::Pending,
                None,
            ),
            "auditor",
            None,
        )
        .await
        .expect("Failed to create");

    let after_create = AuditRepository::count_for_target(
        &pool,
        "ledger_transaction",
        outcome.transaction.id,
    )
    .await
    .unwrap();
    assert_eq!(after_create, 1);

    service
        .update(
            outcome.transaction.id,
            UpdateTransactionCommand {
                status: Some(TransactionStatus::Completed),
                metadata: None,
            },
            "auditor",
            None,
        )
        .await
        .expect("Failed to update");

    let after_update = AuditRepository::count_for_target(
        &pool,
        "ledger_transaction",
        outcome.transaction.id,
    )
    .await
    .unwrap();
    assert_eq!(after_update, 2);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_list_filters_by_status_and_account() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let account = common::create_account(&pool, "Filter-Acct").await;
    let service = TransactionService::new(pool.clone());

    service
        .create(
            command(
                TransactionType::Deposit,
                dec!(1),
                TransactionStatus::Pending,
                Some(account.id),
            ),
            "system",
            None,
        )
        .await
        .unwrap();
    service
        .create(
            command(
                TransactionType::Deposit,
                dec!(2),
                TransactionStatus::Completed,
                Some(account.id),
            ),
            "system",
            None,
        )
        .await
        .unwrap();

    let (pending, pending_total) = service
        .list(None, Some(TransactionStatus::Pending), Some(account.id), 10, 0)
        .await
        .unwrap();
    assert_eq!(pending_total, 1);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].amount, dec!(1));

    let (all_for_account, total) = service
        .list(None, None, Some(account.id), 10, 0)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(all_for_account.len(), 2);

    common::cleanup_test_data(&pool).await;
}
