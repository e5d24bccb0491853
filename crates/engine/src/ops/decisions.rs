use sea_orm::{
    ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    ApprovalAction, DecideCmd, EngineError, ExpenseStatus, ResultEngine, UserStatus, Verdict,
    WorkflowEvent, actions, expenses, users, workflow,
};

use super::{Engine, with_tx};

/// Result of processing one decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub action: ApprovalAction,
    pub status: ExpenseStatus,
    pub current_step: i32,
}

impl Engine {
    /// Records an approver's decision and moves the workflow.
    ///
    /// Decisions on the same expense serialize through a per-expense lock
    /// so the evaluator always sees the full prior history; decisions on
    /// different expenses run independently. The status/step write carries
    /// a version guard on top of the lock, so a lost race surfaces as
    /// [`EngineError::ConcurrentModification`] instead of a silent
    /// double-transition.
    pub async fn decide(&self, cmd: DecideCmd) -> ResultEngine<DecisionOutcome> {
        let lock = self.expense_locks.for_expense(cmd.expense_id)?;
        let _guard = lock.lock().await;

        let (outcome, event, recipients) = with_tx!(self, |db_tx| {
            let expense = expenses::Entity::find_by_id(cmd.expense_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;

            let status = ExpenseStatus::try_from(expense.status.as_str())?;
            if status.is_terminal() {
                return Err(EngineError::ExpenseClosed(format!(
                    "expense is already {}",
                    status.as_str()
                )));
            }

            if actions::Entity::find()
                .filter(actions::Column::ExpenseId.eq(cmd.expense_id))
                .filter(actions::Column::ApproverId.eq(cmd.approver_id))
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::DuplicateDecision(format!(
                    "approver {} already decided on this expense",
                    cmd.approver_id
                )));
            }

            let approver = self
                .require_company_member(&db_tx, expense.company_id, cmd.approver_id, "approver")
                .await?;
            if approver.status != UserStatus::Active.as_str() {
                return Err(EngineError::Forbidden(
                    "inactive users cannot decide on expenses".to_string(),
                ));
            }
            let approver = crate::User::try_from(approver)?;

            let employee = users::Entity::find_by_id(expense.employee_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("employee not exists".to_string()))?;
            let employee = crate::User::try_from(employee)?;

            let history: Vec<ApprovalAction> = actions::Entity::find()
                .filter(actions::Column::ExpenseId.eq(cmd.expense_id))
                .order_by_asc(actions::Column::DecidedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(ApprovalAction::try_from)
                .collect::<ResultEngine<_>>()?;

            let rule = self
                .resolve_rule(&db_tx, expense.company_id, expense.category_id)
                .await?;
            let evaluation = match &rule {
                Some(rule) => workflow::evaluate(
                    rule,
                    employee.manager_id,
                    expense.current_step,
                    &history,
                    cmd.approver_id,
                    cmd.decision,
                )?,
                None => workflow::evaluate_fallback(&employee, &approver, cmd.decision)?,
            };

            let action = ApprovalAction {
                id: Uuid::new_v4(),
                expense_id: cmd.expense_id,
                approver_id: cmd.approver_id,
                step_order: evaluation.step_order,
                decision: cmd.decision,
                comment: cmd.comment.clone(),
                decided_at: cmd.decided_at,
            };
            actions::ActiveModel {
                id: ActiveValue::Set(action.id),
                expense_id: ActiveValue::Set(action.expense_id),
                approver_id: ActiveValue::Set(action.approver_id),
                step_order: ActiveValue::Set(action.step_order),
                decision: ActiveValue::Set(action.decision.as_str().to_string()),
                comment: ActiveValue::Set(action.comment.clone()),
                decided_at: ActiveValue::Set(action.decided_at),
            }
            .insert(&db_tx)
            .await?;

            let (new_status, new_step) = match &evaluation.verdict {
                Verdict::Approved => (ExpenseStatus::Approved, expense.current_step),
                Verdict::Rejected => (ExpenseStatus::Rejected, expense.current_step),
                Verdict::Pending { step, .. } => (ExpenseStatus::Pending, *step),
            };

            let updated = expenses::Entity::update_many()
                .col_expr(expenses::Column::Status, Expr::value(new_status.as_str()))
                .col_expr(expenses::Column::CurrentStep, Expr::value(new_step))
                .col_expr(expenses::Column::Version, Expr::value(expense.version + 1))
                .filter(expenses::Column::Id.eq(cmd.expense_id))
                .filter(expenses::Column::Version.eq(expense.version))
                .exec(&db_tx)
                .await?;
            if updated.rows_affected != 1 {
                return Err(EngineError::ConcurrentModification(
                    "expense changed underneath the decision; retry".to_string(),
                ));
            }

            self.record_audit(
                &db_tx,
                "expense",
                cmd.expense_id,
                "decision_recorded",
                Some(cmd.approver_id),
                json!({
                    "decision": cmd.decision.as_str(),
                    "step_order": action.step_order,
                    "status": new_status.as_str(),
                    "current_step": new_step,
                }),
            )
            .await?;

            let (event, recipients) = match &evaluation.verdict {
                Verdict::Approved => (
                    Some(WorkflowEvent::Approved),
                    vec![expense.employee_id],
                ),
                Verdict::Rejected => (
                    Some(WorkflowEvent::Rejected),
                    vec![expense.employee_id],
                ),
                Verdict::Pending { awaiting, .. } => {
                    if awaiting.is_empty() {
                        (None, Vec::new())
                    } else {
                        (Some(WorkflowEvent::StepAdvanced), awaiting.clone())
                    }
                }
            };

            Ok::<_, EngineError>((
                DecisionOutcome {
                    action,
                    status: new_status,
                    current_step: new_step,
                },
                event,
                recipients,
            ))
        })?;

        if let Some(event) = event {
            self.notifier.notify(cmd.expense_id, event, &recipients);
        }
        Ok(outcome)
    }

    /// Full decision log of an expense, oldest first. Append-only: no
    /// update or delete operation exists anywhere in the engine.
    pub async fn list_actions(&self, expense_id: Uuid) -> ResultEngine<Vec<ApprovalAction>> {
        let models = actions::Entity::find()
            .filter(actions::Column::ExpenseId.eq(expense_id))
            .order_by_asc(actions::Column::DecidedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(ApprovalAction::try_from).collect()
    }
}
