pub mod account_service;
pub mod allocation_engine;
pub mod allocation_rule_service;
pub mod audit;
pub mod balance;
pub mod reconciliation_service;
pub mod transaction_service;

pub use account_service::{AccountService, CreateAccountCommand, UpdateAccountCommand};
pub use allocation_rule_service::{AllocationRuleService, CreateRuleCommand, UpdateRuleCommand};
pub use reconciliation_service::ReconciliationService;
pub use transaction_service::{
    CreateTransactionCommand, TransactionOutcome, TransactionService, UpdateTransactionCommand,
};
