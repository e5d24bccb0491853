use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::{
    EngineError, FixedRates, LogNotifier, Notifier, RateProvider, ResultEngine,
};

mod audit;
mod categories;
mod companies;
mod decisions;
mod expenses;
mod rules;
mod users;

pub use decisions::DecisionOutcome;
pub use expenses::{ExpenseListFilter, ExpensePage};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Per-expense critical sections.
///
/// Two approvers deciding on the same expense serialize here so the
/// evaluator always observes a consistent action history; decisions on
/// different expenses never contend.
#[derive(Debug, Default)]
struct ExpenseLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl ExpenseLocks {
    fn for_expense(&self, expense_id: Uuid) -> ResultEngine<Arc<tokio::sync::Mutex<()>>> {
        let mut map = self.inner.lock().map_err(|_| {
            EngineError::ConcurrentModification("expense lock registry poisoned".to_string())
        })?;
        Ok(Arc::clone(map.entry(expense_id).or_default()))
    }
}

pub struct Engine {
    database: DatabaseConnection,
    notifier: Box<dyn Notifier>,
    rates: Box<dyn RateProvider>,
    expense_locks: ExpenseLocks,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
pub struct EngineBuilder {
    database: DatabaseConnection,
    notifier: Box<dyn Notifier>,
    rates: Box<dyn RateProvider>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            database: DatabaseConnection::default(),
            notifier: Box::new(LogNotifier),
            rates: Box::new(FixedRates),
        }
    }
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Replace the default logging notifier.
    pub fn notifier(mut self, notifier: Box<dyn Notifier>) -> EngineBuilder {
        self.notifier = notifier;
        self
    }

    /// Replace the default fixed-rate table.
    pub fn rates(mut self, rates: Box<dyn RateProvider>) -> EngineBuilder {
        self.rates = rates;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            notifier: self.notifier,
            rates: self.rates,
            expense_locks: ExpenseLocks::default(),
        })
    }
}
