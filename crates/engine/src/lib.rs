//! Rimborso domain engine.
//!
//! Companies, users, categories, approval rules and expenses live here,
//! together with the workflow state machine that turns approver decisions
//! into expense state. The HTTP layer sits on top of [`Engine`] and never
//! touches the database directly for domain writes.

pub use actions::{ApprovalAction, Decision};
pub use audit::AuditEntry;
pub use categories::Category;
pub use commands::{
    ApproverSpec, CreateCategoryCmd, CreateCompanyCmd, CreateRuleCmd, CreateUserCmd, DecideCmd,
    SubmitExpenseCmd,
};
pub use companies::Company;
pub use currency::Currency;
pub use error::EngineError;
pub use expenses::{Expense, ExpenseStatus};
pub use notifier::{LogNotifier, Notifier, WorkflowEvent};
pub use ops::{DecisionOutcome, Engine, EngineBuilder, ExpenseListFilter, ExpensePage};
pub use rates::{FixedRates, Rate, RateProvider};
pub use rules::{ApprovalRule, RuleApprover};
pub use users::{Role, User, UserStatus};
pub use workflow::Verdict;

mod actions;
mod audit;
mod categories;
mod commands;
mod companies;
mod currency;
mod error;
mod expenses;
mod notifier;
mod ops;
mod rates;
mod rule_approvers;
mod rule_categories;
mod rules;
mod users;
mod util;
pub mod workflow;

type ResultEngine<T> = Result<T, EngineError>;
