pub mod extract;
pub mod jwt;

pub use extract::{Authenticated, ExtractRequestContext, MaybeAuthenticated};
pub use jwt::{Claims, JwtHandler};

/// Roles recognised by the RBAC policy.
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_GUARDIAN: &str = "guardian";
pub const ROLE_OPERATOR: &str = "operator";

/// Roles allowed to mutate ledger state.
pub const LEDGER_WRITE_ROLES: &[&str] = &[ROLE_GUARDIAN, ROLE_ADMIN];
/// Roles allowed to run treasury reconciliation.
pub const TREASURY_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_OPERATOR];
/// Roles allowed to administer allocation rules and read the audit trail.
pub const ADMIN_ROLES: &[&str] = &[ROLE_ADMIN];
