mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use treasury_ledger::error::AppError;
use treasury_ledger::models::{
    AllocationRule, AllocationSplit, TransactionStatus, TransactionType,
};
use treasury_ledger::repositories::{AllocationRuleRepository, TransactionRepository};
use treasury_ledger::services::{
    AllocationRuleService, CreateRuleCommand, CreateTransactionCommand, TransactionService,
};
use uuid::Uuid;

fn deposit(amount: Decimal) -> CreateTransactionCommand {
    CreateTransactionCommand {
        transaction_type: TransactionType::Deposit,
        amount,
        currency: "USD".to_string(),
        status: Some(TransactionStatus::Completed),
        logical_account_id: None,
        parent_transaction_id: None,
        external_tx_hash: None,
        metadata: None,
        transaction_date: None,
    }
}

#[tokio::test]
async fn test_sixty_thirty_ten_allocation() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let ops = common::create_account(&pool, "Ops").await;
    let dev = common::create_account(&pool, "Dev").await;
    let reserve = common::create_account(&pool, "Reserve").await;

    let rule_service = AllocationRuleService::new(pool.clone());
    rule_service
        .create_rule(
            CreateRuleCommand {
                name: "standard-split".to_string(),
                splits: vec![
                    AllocationSplit::new(ops.id, dec!(60)),
                    AllocationSplit::new(dev.id, dec!(30)),
                    AllocationSplit::new(reserve.id, dec!(10)),
                ],
                active: true,
            },
            "admin",
            None,
        )
        .await
        .expect("Failed to create rule");

    let tx_service = TransactionService::new(pool.clone());
    let outcome = tx_service
        .create(deposit(dec!(1000.00)), "system", None)
        .await
        .expect("Failed to create deposit");

    assert_eq!(outcome.transaction.status, TransactionStatus::Completed);
    assert_eq!(outcome.children.len(), 3);

    let amounts: Vec<Decimal> = outcome.children.iter().map(|c| c.amount).collect();
    assert_eq!(amounts, vec![dec!(600.00), dec!(300.00), dec!(100.00)]);
    assert_eq!(amounts.iter().sum::<Decimal>(), dec!(1000.00));

    for child in &outcome.children {
        assert_eq!(child.transaction_type, TransactionType::Allocation);
        assert_eq!(child.status, TransactionStatus::Completed);
        assert_eq!(child.parent_transaction_id, Some(outcome.transaction.id));
    }

    assert_eq!(common::cached_balance(&pool, ops.id).await, dec!(600.00));
    assert_eq!(common::cached_balance(&pool, dev.id).await, dec!(300.00));
    assert_eq!(common::cached_balance(&pool, reserve.id).await, dec!(100.00));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_rounding_residue_goes_to_last_slot() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let a = common::create_account(&pool, "Slice-A").await;
    let b = common::create_account(&pool, "Slice-B").await;
    let c = common::create_account(&pool, "Slice-C").await;

    let rule_service = AllocationRuleService::new(pool.clone());
    rule_service
        .create_rule(
            CreateRuleCommand {
                name: "thirds".to_string(),
                splits: vec![
                    AllocationSplit::new(a.id, dec!(33.33)),
                    AllocationSplit::new(b.id, dec!(33.33)),
                    AllocationSplit::new(c.id, dec!(33.34)),
                ],
                active: true,
            },
            "admin",
            None,
        )
        .await
        .expect("Failed to create rule");

    let tx_service = TransactionService::new(pool.clone());
    let outcome = tx_service
        .create(deposit(dec!(100.00)), "system", None)
        .await
        .expect("Failed to create deposit");

    let amounts: Vec<Decimal> = outcome.children.iter().map(|child| child.amount).collect();
    assert_eq!(amounts, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
    assert_eq!(amounts.iter().sum::<Decimal>(), dec!(100.00));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_rule_rejected_when_sum_is_not_hundred() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let a = common::create_account(&pool, "Under-A").await;
    let b = common::create_account(&pool, "Under-B").await;

    let rule_service = AllocationRuleService::new(pool.clone());
    let result = rule_service
        .create_rule(
            CreateRuleCommand {
                name: "eighty".to_string(),
                splits: vec![
                    AllocationSplit::new(a.id, dec!(50)),
                    AllocationSplit::new(b.id, dec!(30)),
                ],
                active: true,
            },
            "admin",
            None,
        )
        .await;

    match result {
        Err(AppError::Validation(message)) => assert!(message.contains("100")),
        other => panic!("Expected validation error, got {other:?}"),
    }

    assert!(AllocationRuleRepository::find_by_name(&pool, "eighty")
        .await
        .unwrap()
        .is_none());

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_rule_rejected_when_destination_missing() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let a = common::create_account(&pool, "Known").await;

    let rule_service = AllocationRuleService::new(pool.clone());
    let result = rule_service
        .create_rule(
            CreateRuleCommand {
                name: "ghost-destination".to_string(),
                splits: vec![
                    AllocationSplit::new(a.id, dec!(50)),
                    AllocationSplit::new(Uuid::new_v4(), dec!(50)),
                ],
                active: true,
            },
            "admin",
            None,
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_allocation_failure_rolls_back_everything() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let ops = common::create_account(&pool, "Rollback-Ops").await;

    // Bypass the service to plant a rule pointing at a destination that
    // does not exist; apply() must then fail mid-flight.
    let broken = AllocationRule::new(
        "broken-rule".to_string(),
        vec![
            AllocationSplit::new(ops.id, dec!(50)),
            AllocationSplit::new(Uuid::new_v4(), dec!(50)),
        ],
        true,
    );
    AllocationRuleRepository::insert(&pool, &broken)
        .await
        .expect("Failed to insert rule");

    let tx_service = TransactionService::new(pool.clone());
    let result = tx_service.create(deposit(dec!(500.00)), "system", None).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // Nothing is observable: no parent, no children, no audit row, no
    // balance movement.
    let (transactions, total) = TransactionService::new(pool.clone())
        .list(None, None, None, 100, 0)
        .await
        .unwrap();
    assert!(transactions.is_empty());
    assert_eq!(total, 0);

    let audit_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_log")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(audit_count.0, 0);

    assert_eq!(common::cached_balance(&pool, ops.id).await, Decimal::ZERO);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_concurrent_completion_allocates_exactly_once() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let ops = common::create_account(&pool, "Race-Ops").await;
    let dev = common::create_account(&pool, "Race-Dev").await;

    let rule_service = AllocationRuleService::new(pool.clone());
    rule_service
        .create_rule(
            CreateRuleCommand {
                name: "race-split".to_string(),
                splits: vec![
                    AllocationSplit::new(ops.id, dec!(70)),
                    AllocationSplit::new(dev.id, dec!(30)),
                ],
                active: true,
            },
            "admin",
            None,
        )
        .await
        .expect("Failed to create rule");

    let tx_service = TransactionService::new(pool.clone());
    let mut pending = deposit(dec!(200.00));
    pending.status = Some(TransactionStatus::Pending);
    let outcome = tx_service
        .create(pending, "system", None)
        .await
        .expect("Failed to create pending deposit");
    let parent_id = outcome.transaction.id;

    let complete = treasury_ledger::services::UpdateTransactionCommand {
        status: Some(TransactionStatus::Completed),
        metadata: None,
    };

    let service_a = TransactionService::new(pool.clone());
    let service_b = TransactionService::new(pool.clone());
    let (first, second) = tokio::join!(
        service_a.update(parent_id, complete.clone(), "racer-a", None),
        service_b.update(parent_id, complete.clone(), "racer-b", None),
    );

    let outcomes = [first, second];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one completion must win");
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(AppError::Conflict(_)))));

    let children = TransactionRepository::find_children(&pool, parent_id)
        .await
        .unwrap();
    assert_eq!(children.len(), 2, "exactly one set of children exists");
    assert_eq!(
        children.iter().map(|c| c.amount).sum::<Decimal>(),
        dec!(200.00)
    );

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_completed_deposit_without_rule_creates_no_children() {
    let _guard = common::db_guard().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let tx_service = TransactionService::new(pool.clone());
    let outcome = tx_service
        .create(deposit(dec!(75.00)), "system", None)
        .await
        .expect("Failed to create deposit");

    assert_eq!(outcome.transaction.status, TransactionStatus::Completed);
    assert!(outcome.children.is_empty());

    common::cleanup_test_data(&pool).await;
}
