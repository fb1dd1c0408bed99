use crate::error::{AppError, Result};
use crate::models::{
    AllocationRule, AllocationSplit, LedgerTransaction, TransactionStatus, TransactionType,
};
use crate::repositories::{AccountRepository, TransactionRepository};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, Postgres, Transaction};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Fractional digits carried by every monetary amount; the quantization
/// unit for split truncation is 10^-AMOUNT_SCALE.
pub const AMOUNT_SCALE: u32 = 12;

fn percentage_tolerance() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn hundred() -> Decimal {
    Decimal::ONE_HUNDRED
}

/// Validates the shape of a rule's splits: non-empty, every percentage in
/// [0, 100], and a total of 100 within a two-decimal tolerance.
pub fn validate_splits(splits: &[AllocationSplit]) -> Result<()> {
    if splits.is_empty() {
        return Err(AppError::Validation(
            "Allocation rule must define at least one split".to_string(),
        ));
    }

    for (position, split) in splits.iter().enumerate() {
        if split.percentage < Decimal::ZERO || split.percentage > hundred() {
            return Err(AppError::Validation(format!(
                "Split {} percentage {} is outside [0, 100]",
                position, split.percentage
            )));
        }
    }

    let total: Decimal = splits.iter().map(|s| s.percentage).sum();
    let drift = (total.round_dp(2) - hundred()).abs();
    if drift > percentage_tolerance() {
        return Err(AppError::Validation(format!(
            "Split percentages must sum to 100, got {total}"
        )));
    }

    Ok(())
}

/// Verifies that every destination account exists and can receive funds.
pub async fn validate_destinations<'e>(
    executor: impl PgExecutor<'e>,
    splits: &[AllocationSplit],
) -> Result<()> {
    let ids: Vec<Uuid> = splits.iter().map(|s| s.destination_account_id).collect();
    let existing = AccountRepository::find_existing_ids(executor, &ids).await?;

    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !existing.contains(id))
        .map(Uuid::to_string)
        .collect();

    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Allocation destinations do not exist: {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

/// Splits `amount` across the ordered slots so the results sum back to
/// `amount` byte-exact. Every slot but the last is truncated at the
/// quantization unit; the last slot absorbs the rounding residue.
pub fn split_amounts(amount: Decimal, splits: &[AllocationSplit]) -> Vec<Decimal> {
    if splits.is_empty() {
        return Vec::new();
    }

    let mut amounts = Vec::with_capacity(splits.len());
    let mut allocated = Decimal::ZERO;

    for split in &splits[..splits.len() - 1] {
        let share = (amount * split.percentage / hundred()).trunc_with_scale(AMOUNT_SCALE);
        allocated += share;
        amounts.push(share);
    }

    amounts.push(amount - allocated);
    amounts
}

/// Splits a completed parent transaction into ALLOCATION children per the
/// rule, crediting each destination's cached balance. Runs entirely inside
/// the caller's unit of work: either every child, every balance delta and
/// the parent's completion land together, or none do.
pub async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    parent: &LedgerTransaction,
    rule: &AllocationRule,
) -> Result<Vec<LedgerTransaction>> {
    if parent.status != TransactionStatus::Completed {
        return Err(AppError::Validation(format!(
            "Cannot allocate transaction '{}' with status {}",
            parent.id,
            parent.status.as_str()
        )));
    }

    if !parent.transaction_type.triggers_allocation() {
        return Err(AppError::Validation(format!(
            "Transactions of type {} are not eligible for allocation",
            parent.transaction_type.as_str()
        )));
    }

    let splits = rule.splits();
    validate_splits(splits)?;
    validate_destinations(&mut **tx, splits).await?;

    // Idempotence guard: a parent acquires exactly one set of children.
    let existing = TransactionRepository::find_children(&mut **tx, parent.id).await?;
    if !existing.is_empty() {
        return Err(AppError::Conflict(format!(
            "Transaction '{}' already has {} allocation children",
            parent.id,
            existing.len()
        )));
    }

    let amounts = split_amounts(parent.amount, splits);

    let mut children = Vec::with_capacity(splits.len());
    for (split, amount) in splits.iter().zip(&amounts) {
        let child = LedgerTransaction::new(
            TransactionType::Allocation,
            *amount,
            parent.currency.clone(),
            TransactionStatus::Completed,
        )
        .with_account(split.destination_account_id)
        .with_parent(parent.id)
        .with_metadata(serde_json::json!({
            "allocation_rule_id": rule.id,
            "percentage": split.percentage,
        }));

        children.push(TransactionRepository::insert(&mut **tx, &child).await?);
    }

    // One statement for every destination. A rule may name the same
    // account more than once, so deltas are summed per account first.
    let mut deltas: HashMap<Uuid, Decimal> = HashMap::new();
    for (split, amount) in splits.iter().zip(&amounts) {
        *deltas.entry(split.destination_account_id).or_default() += *amount;
    }
    let (ids, sums): (Vec<Uuid>, Vec<Decimal>) = deltas.into_iter().unzip();
    AccountRepository::apply_balance_deltas(&mut **tx, &ids, &sums).await?;

    info!(
        parent_id = %parent.id,
        rule = %rule.name,
        children = children.len(),
        "allocated transaction"
    );

    Ok(children)
}
