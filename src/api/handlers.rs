use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::requests::{
    page_bounds, BalanceQuery, CreateAccountRequest, CreateAllocationRuleRequest,
    CreateTransactionRequest, ListAccountsQuery, ListAllocationRulesQuery, ListAuditLogQuery,
    ListReconciliationsQuery, ListTransactionsQuery, ReconcileRequest,
    ResolveReconciliationRequest, UpdateAccountRequest, UpdateAllocationRuleRequest,
    UpdateTransactionRequest,
};
use crate::api::responses::{
    AccountResponse, AllocationRuleResponse, AuditLogResponse, BalanceResponse,
    PaginatedResponse, ReconciliationResponse, ResolveReconciliationResponse,
    TransactionResponse, TransactionWithChildrenResponse, TreasuryStatusResponse,
};
use crate::api::routes::AppState;
use crate::auth::{
    Authenticated, ExtractRequestContext, MaybeAuthenticated, ADMIN_ROLES, LEDGER_WRITE_ROLES,
    TREASURY_ROLES,
};
use crate::error::Result;
use crate::observability::AggregatedHealth;
use crate::repositories::AuditRepository;
use crate::services::{
    AccountService, AllocationRuleService, CreateAccountCommand, CreateRuleCommand,
    CreateTransactionCommand, ReconciliationService, TransactionService, UpdateAccountCommand,
    UpdateRuleCommand, UpdateTransactionCommand,
};

// ============================================================================
// Health & metrics
// ============================================================================

pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<AggregatedHealth>) {
    let health = state.health_checker.check().await;
    let status = if health.status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

// ============================================================================
// Transactions
// ============================================================================

pub async fn create_transaction(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    ExtractRequestContext(context): ExtractRequestContext,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionWithChildrenResponse>)> {
    request.validate()?;

    let service = TransactionService::new(state.pool.clone());
    let outcome = service
        .create(
            CreateTransactionCommand {
                transaction_type: request.transaction_type,
                amount: request.amount,
                currency: request.currency,
                status: request.status,
                logical_account_id: request.logical_account_id,
                parent_transaction_id: request.parent_transaction_id,
                external_tx_hash: request.external_tx_hash,
                metadata: request.metadata,
                transaction_date: request.transaction_date,
            },
            &claims.sub,
            Some(&context),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TransactionWithChildrenResponse::new(
            outcome.transaction,
            outcome.children,
        )),
    ))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    MaybeAuthenticated(_claims): MaybeAuthenticated,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<PaginatedResponse<TransactionResponse>>> {
    let (limit, skip) = page_bounds(query.skip, query.limit, 100);

    let service = TransactionService::new(state.pool.clone());
    let (rows, total) = service
        .list(
            query.transaction_type,
            query.status,
            query.account_id,
            limit,
            skip,
        )
        .await?;

    Ok(Json(PaginatedResponse::new(
        rows.into_iter().map(TransactionResponse::from).collect(),
        total,
        limit,
        skip,
    )))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    MaybeAuthenticated(_claims): MaybeAuthenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionWithChildrenResponse>> {
    let service = TransactionService::new(state.pool.clone());
    let transaction = service.get(id).await?;
    let children = service.get_children(id).await?;
    Ok(Json(TransactionWithChildrenResponse::new(
        transaction,
        children,
    )))
}

pub async fn update_transaction(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    ExtractRequestContext(context): ExtractRequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTransactionRequest>,
) -> Result<Json<TransactionWithChildrenResponse>> {
    request.validate()?;

    let service = TransactionService::new(state.pool.clone());
    let outcome = service
        .update(
            id,
            UpdateTransactionCommand {
                status: request.status,
                metadata: request.metadata,
            },
            &claims.sub,
            Some(&context),
        )
        .await?;

    Ok(Json(TransactionWithChildrenResponse::new(
        outcome.transaction,
        outcome.children,
    )))
}

// ============================================================================
// Accounts & treasury
// ============================================================================

pub async fn create_account(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    ExtractRequestContext(context): ExtractRequestContext,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>)> {
    claims.require_any_role(LEDGER_WRITE_ROLES)?;
    request.validate()?;

    let service = AccountService::new(state.pool.clone());
    let account = service
        .create_account(
            CreateAccountCommand {
                name: request.name,
                account_type: request.account_type,
                currency: request.currency,
                metadata: request.metadata,
            },
            &claims.sub,
            Some(&context),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

pub async fn get_account(
    State(state): State<AppState>,
    MaybeAuthenticated(_claims): MaybeAuthenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountResponse>> {
    let service = AccountService::new(state.pool.clone());
    let account = service.get(id).await?;
    Ok(Json(AccountResponse::from(account)))
}

pub async fn update_account(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    ExtractRequestContext(context): ExtractRequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>> {
    claims.require_any_role(LEDGER_WRITE_ROLES)?;
    request.validate()?;

    let service = AccountService::new(state.pool.clone());
    let account = service
        .update_account(
            id,
            UpdateAccountCommand {
                status: request.status,
                metadata: request.metadata,
            },
            &claims.sub,
            Some(&context),
        )
        .await?;

    Ok(Json(AccountResponse::from(account)))
}

pub async fn get_account_balance(
    State(state): State<AppState>,
    MaybeAuthenticated(_claims): MaybeAuthenticated,
    Path(id): Path<Uuid>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceResponse>> {
    let service = AccountService::new(state.pool.clone());
    let account = service.get(id).await?;
    let derived = service.derived_balance(id, query.as_of).await?;

    Ok(Json(BalanceResponse {
        account_id: account.id,
        currency: account.currency,
        balance: derived,
        cached_balance: account.balance,
        as_of: query.as_of,
    }))
}

/// Accounts with balances grouped by type. Served both at
/// `/treasury/status` and its `/accounts` alias.
pub async fn treasury_status(
    State(state): State<AppState>,
    Authenticated(_claims): Authenticated,
    Query(query): Query<ListAccountsQuery>,
) -> Result<Json<TreasuryStatusResponse>> {
    let (limit, skip) = page_bounds(query.skip, query.limit, 1000);

    let service = AccountService::new(state.pool.clone());
    let accounts = service
        .list(query.account_type, query.status, limit, skip)
        .await?;

    Ok(Json(TreasuryStatusResponse::from_accounts(accounts)))
}

// ============================================================================
// Reconciliation
// ============================================================================

pub async fn reconcile_treasury(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    ExtractRequestContext(context): ExtractRequestContext,
    Json(request): Json<ReconcileRequest>,
) -> Result<(StatusCode, Json<ReconciliationResponse>)> {
    claims.require_any_role(TREASURY_ROLES)?;
    request.validate()?;

    let service = ReconciliationService::new(state.pool.clone());
    let log = service
        .create_log(
            request.logical_account_id,
            request.external_balance,
            &request.currency,
            &claims.sub,
            Some(&context),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ReconciliationResponse::from(log))))
}

pub async fn list_reconciliations(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Query(query): Query<ListReconciliationsQuery>,
) -> Result<Json<Vec<ReconciliationResponse>>> {
    claims.require_any_role(TREASURY_ROLES)?;
    let (limit, skip) = page_bounds(query.skip, query.limit, 100);

    let service = ReconciliationService::new(state.pool.clone());
    let logs = service
        .list(query.account_id, query.resolved, limit, skip)
        .await?;

    Ok(Json(
        logs.into_iter().map(ReconciliationResponse::from).collect(),
    ))
}

pub async fn resolve_reconciliation(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    ExtractRequestContext(context): ExtractRequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveReconciliationRequest>,
) -> Result<Json<ResolveReconciliationResponse>> {
    claims.require_any_role(TREASURY_ROLES)?;

    let service = ReconciliationService::new(state.pool.clone());

    let response = if request.create_correction {
        let (correction, log) = service
            .create_correction(id, &claims.sub, request.notes.as_deref(), Some(&context))
            .await?;
        ResolveReconciliationResponse {
            log: ReconciliationResponse::from(log),
            correction: Some(TransactionResponse::from(correction)),
        }
    } else {
        let log = service
            .resolve_manually(id, &claims.sub, request.notes.as_deref(), Some(&context))
            .await?;
        ResolveReconciliationResponse {
            log: ReconciliationResponse::from(log),
            correction: None,
        }
    };

    Ok(Json(response))
}

// ============================================================================
// Allocation rules
// ============================================================================

pub async fn list_allocation_rules(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Query(query): Query<ListAllocationRulesQuery>,
) -> Result<Json<Vec<AllocationRuleResponse>>> {
    claims.require_any_role(ADMIN_ROLES)?;
    let (limit, skip) = page_bounds(query.skip, query.limit, 100);

    let service = AllocationRuleService::new(state.pool.clone());
    let rules = service
        .list(query.active_only.unwrap_or(false), limit, skip)
        .await?;

    Ok(Json(
        rules.into_iter().map(AllocationRuleResponse::from).collect(),
    ))
}

pub async fn create_allocation_rule(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    ExtractRequestContext(context): ExtractRequestContext,
    Json(request): Json<CreateAllocationRuleRequest>,
) -> Result<(StatusCode, Json<AllocationRuleResponse>)> {
    claims.require_any_role(ADMIN_ROLES)?;
    request.validate()?;

    let service = AllocationRuleService::new(state.pool.clone());
    let rule = service
        .create_rule(
            CreateRuleCommand {
                name: request.name,
                splits: request.splits,
                active: request.active,
            },
            &claims.sub,
            Some(&context),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AllocationRuleResponse::from(rule)),
    ))
}

pub async fn get_allocation_rule(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<AllocationRuleResponse>> {
    claims.require_any_role(ADMIN_ROLES)?;

    let service = AllocationRuleService::new(state.pool.clone());
    let rule = service.get(id).await?;
    Ok(Json(AllocationRuleResponse::from(rule)))
}

pub async fn update_allocation_rule(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    ExtractRequestContext(context): ExtractRequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAllocationRuleRequest>,
) -> Result<Json<AllocationRuleResponse>> {
    claims.require_any_role(ADMIN_ROLES)?;
    request.validate()?;

    let service = AllocationRuleService::new(state.pool.clone());
    let rule = service
        .update_rule(
            id,
            UpdateRuleCommand {
                name: request.name,
                splits: request.splits,
                active: request.active,
            },
            &claims.sub,
            Some(&context),
        )
        .await?;

    Ok(Json(AllocationRuleResponse::from(rule)))
}

pub async fn delete_allocation_rule(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    ExtractRequestContext(context): ExtractRequestContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    claims.require_any_role(ADMIN_ROLES)?;

    let service = AllocationRuleService::new(state.pool.clone());
    service.delete_rule(id, &claims.sub, Some(&context)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Audit trail
// ============================================================================

pub async fn list_audit_log(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Query(query): Query<ListAuditLogQuery>,
) -> Result<Json<Vec<AuditLogResponse>>> {
    claims.require_any_role(ADMIN_ROLES)?;
    let (limit, skip) = page_bounds(query.skip, query.limit, 100);

    let entries = AuditRepository::list(
        &state.pool,
        query.target_type.as_deref(),
        query.target_id,
        limit,
        skip,
    )
    .await?;

    Ok(Json(
        entries.into_iter().map(AuditLogResponse::from).collect(),
    ))
}
