use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    Currency, EngineError, Expense, ExpenseStatus, ResultEngine, SubmitExpenseCmd, User,
    UserStatus, WorkflowEvent, categories, expenses, rates, users, workflow,
};

use super::{Engine, with_tx};

/// Filters for listing expenses.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExpenseListFilter {
    pub employee_id: Option<Uuid>,
    pub status: Option<ExpenseStatus>,
}

/// One page of expenses plus the cursor for the next one.
#[derive(Clone, Debug)]
pub struct ExpensePage {
    pub expenses: Vec<Expense>,
    pub next_cursor: Option<String>,
}

impl Engine {
    /// Submits a new expense for approval.
    ///
    /// The original amount is converted into the company base currency
    /// here, once; later rate changes never touch a submitted expense. The
    /// expense starts in `pending` at step 0 and the initial approver set
    /// is notified.
    pub async fn submit_expense(&self, cmd: SubmitExpenseCmd) -> ResultEngine<Expense> {
        if cmd.amount_original_minor <= 0 {
            return Err(EngineError::InvalidInput(
                "amount must be > 0".to_string(),
            ));
        }
        let description = cmd.description.trim();
        if description.is_empty() {
            return Err(EngineError::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }

        let (expense, recipients) = with_tx!(self, |db_tx| {
            let employee = users::Entity::find_by_id(cmd.employee_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("employee not exists".to_string()))?;
            if employee.status != UserStatus::Active.as_str() {
                return Err(EngineError::Forbidden(
                    "inactive users cannot submit expenses".to_string(),
                ));
            }

            let category = categories::Entity::find_by_id(cmd.category_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("category not exists".to_string()))?;
            if category.company_id != employee.company_id {
                return Err(EngineError::KeyNotFound("category not exists".to_string()));
            }
            if !category.active {
                return Err(EngineError::InvalidInput(format!(
                    "category {} is inactive",
                    category.name
                )));
            }

            let company = self.company_model(&db_tx, employee.company_id).await?;
            let base_currency = Currency::try_from(company.base_currency.as_str())?;
            let amount_converted_minor = rates::convert(
                self.rates.as_ref(),
                cmd.amount_original_minor,
                cmd.currency_original,
                base_currency,
            )?;

            let id = Uuid::new_v4();
            let now = Utc::now();
            let active = expenses::ActiveModel {
                id: ActiveValue::Set(id),
                company_id: ActiveValue::Set(employee.company_id),
                employee_id: ActiveValue::Set(cmd.employee_id),
                category_id: ActiveValue::Set(cmd.category_id),
                description: ActiveValue::Set(description.to_string()),
                amount_original_minor: ActiveValue::Set(cmd.amount_original_minor),
                currency_original: ActiveValue::Set(cmd.currency_original.code().to_string()),
                amount_converted_minor: ActiveValue::Set(amount_converted_minor),
                receipt_url: ActiveValue::Set(cmd.receipt_url.clone()),
                date_incurred: ActiveValue::Set(cmd.date_incurred),
                status: ActiveValue::Set(ExpenseStatus::Pending.as_str().to_string()),
                current_step: ActiveValue::Set(0),
                version: ActiveValue::Set(0),
                created_at: ActiveValue::Set(now),
            };
            let model = active.insert(&db_tx).await?;

            self.record_audit(
                &db_tx,
                "expense",
                id,
                "submitted",
                Some(cmd.employee_id),
                json!({
                    "amount_original_minor": cmd.amount_original_minor,
                    "currency_original": cmd.currency_original.code(),
                    "amount_converted_minor": amount_converted_minor,
                    "category_id": cmd.category_id,
                }),
            )
            .await?;

            let rule = self
                .resolve_rule(&db_tx, employee.company_id, cmd.category_id)
                .await?;
            let recipients = match &rule {
                Some(rule) => workflow::initial_awaiting(rule, employee.manager_id),
                None => employee.manager_id.into_iter().collect(),
            };

            Ok::<_, EngineError>((Expense::try_from(model)?, recipients))
        })?;

        if !recipients.is_empty() {
            self.notifier
                .notify(expense.id, WorkflowEvent::StepAdvanced, &recipients);
        }
        Ok(expense)
    }

    /// Returns an expense by id.
    pub async fn expense(&self, expense_id: Uuid) -> ResultEngine<Expense> {
        let model = expenses::Entity::find_by_id(expense_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
        Expense::try_from(model)
    }

    /// Lists company expenses, newest first, with cursor pagination.
    pub async fn list_expenses(
        &self,
        company_id: Uuid,
        filter: ExpenseListFilter,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<ExpensePage> {
        let limit = limit.clamp(1, 200);
        let mut query = expenses::Entity::find()
            .filter(expenses::Column::CompanyId.eq(company_id))
            .order_by_desc(expenses::Column::CreatedAt)
            .order_by_desc(expenses::Column::Id)
            .limit(limit + 1);

        if let Some(employee_id) = filter.employee_id {
            query = query.filter(expenses::Column::EmployeeId.eq(employee_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(expenses::Column::Status.eq(status.as_str()));
        }
        if let Some(cursor) = cursor {
            let (created_at, id) = decode_cursor(cursor)?;
            query = query.filter(
                Condition::any()
                    .add(expenses::Column::CreatedAt.lt(created_at))
                    .add(
                        Condition::all()
                            .add(expenses::Column::CreatedAt.eq(created_at))
                            .add(expenses::Column::Id.lt(id)),
                    ),
            );
        }

        let mut models = query.all(&self.database).await?;
        let next_cursor = if models.len() as u64 > limit {
            models.truncate(limit as usize);
            models
                .last()
                .map(|m| encode_cursor(m.created_at, m.id))
        } else {
            None
        };

        let expenses = models
            .into_iter()
            .map(Expense::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        Ok(ExpensePage {
            expenses,
            next_cursor,
        })
    }

    /// Pending expenses currently waiting on `user_id`'s decision.
    pub async fn pending_approvals(&self, user_id: Uuid) -> ResultEngine<Vec<Expense>> {
        let approver = self.user(user_id).await?;

        let models = expenses::Entity::find()
            .filter(expenses::Column::CompanyId.eq(approver.company_id))
            .filter(expenses::Column::Status.eq(ExpenseStatus::Pending.as_str()))
            .order_by_asc(expenses::Column::CreatedAt)
            .all(&self.database)
            .await?;

        let mut out = Vec::new();
        for model in models {
            let expense = Expense::try_from(model)?;
            if self.is_awaited_by(&expense, &approver).await? {
                out.push(expense);
            }
        }
        Ok(out)
    }

    async fn is_awaited_by(&self, expense: &Expense, approver: &User) -> ResultEngine<bool> {
        let employee = self.user(expense.employee_id).await?;
        let rule = self
            .resolve_rule(&self.database, expense.company_id, expense.category_id)
            .await?;

        match rule {
            Some(rule) => {
                let history = self.list_actions(expense.id).await?;
                let awaiting =
                    workflow::awaiting(&rule, employee.manager_id, expense.current_step, &history);
                Ok(awaiting.contains(&approver.id))
            }
            None => Ok(match employee.manager_id {
                Some(manager_id) => approver.id == manager_id,
                None => {
                    approver.role == crate::Role::Admin
                        && approver.company_id == employee.company_id
                }
            }),
        }
    }

    pub(super) async fn company_model<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        company_id: Uuid,
    ) -> ResultEngine<crate::companies::Model> {
        crate::companies::Entity::find_by_id(company_id)
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("company not exists".to_string()))
    }
}

fn encode_cursor(created_at: DateTime<Utc>, id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(format!("{}|{}", created_at.timestamp_micros(), id))
}

fn decode_cursor(raw: &str) -> ResultEngine<(DateTime<Utc>, Uuid)> {
    let invalid = || EngineError::InvalidInput("invalid cursor".to_string());
    let bytes = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    let (micros, id) = text.split_once('|').ok_or_else(invalid)?;
    let micros: i64 = micros.parse().map_err(|_| invalid())?;
    let created_at = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(invalid)?;
    let id = Uuid::parse_str(id).map_err(|_| invalid())?;
    Ok((created_at, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let (decoded_at, decoded_id) = decode_cursor(&encode_cursor(now, id)).unwrap();
        assert_eq!(decoded_at.timestamp_micros(), now.timestamp_micros());
        assert_eq!(decoded_id, id);
    }

    #[test]
    fn garbage_cursor_is_rejected() {
        assert!(decode_cursor("not a cursor").is_err());
    }
}
