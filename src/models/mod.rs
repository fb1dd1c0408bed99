pub mod account;
pub mod allocation_rule;
pub mod audit;
pub mod reconciliation;
pub mod transaction;

pub use account::{AccountStatus, AccountType, LogicalAccount};
pub use allocation_rule::{AllocationRule, AllocationSplit};
pub use audit::{AuditAction, AuditLog, RequestContext};
pub use reconciliation::{discrepancy_epsilon, ReconciliationLog};
pub use transaction::{
    LedgerTransaction, TransactionStatus, TransactionType, CORRECTION_DECREASE,
    CORRECTION_DIRECTION_KEY, CORRECTION_INCREASE,
};
