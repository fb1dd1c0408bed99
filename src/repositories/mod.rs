pub mod account_repository;
pub mod allocation_rule_repository;
pub mod audit_repository;
pub mod reconciliation_repository;
pub mod transaction_repository;

pub use account_repository::AccountRepository;
pub use allocation_rule_repository::AllocationRuleRepository;
pub use audit_repository::AuditRepository;
pub use reconciliation_repository::ReconciliationRepository;
pub use transaction_repository::TransactionRepository;
