//! Expense API endpoints.

use api_types::expense::{ExpenseListQuery, ExpenseListResponse, ExpenseSubmit, ExpenseView};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    ServerError,
    companies::{engine_currency, map_currency},
    server::ServerState,
    user,
};
use engine::{EngineError, ExpenseListFilter, SubmitExpenseCmd};

pub(crate) fn map_status(status: engine::ExpenseStatus) -> api_types::ExpenseStatus {
    match status {
        engine::ExpenseStatus::Pending => api_types::ExpenseStatus::Pending,
        engine::ExpenseStatus::Approved => api_types::ExpenseStatus::Approved,
        engine::ExpenseStatus::Rejected => api_types::ExpenseStatus::Rejected,
    }
}

fn engine_status(status: api_types::ExpenseStatus) -> engine::ExpenseStatus {
    match status {
        api_types::ExpenseStatus::Pending => engine::ExpenseStatus::Pending,
        api_types::ExpenseStatus::Approved => engine::ExpenseStatus::Approved,
        api_types::ExpenseStatus::Rejected => engine::ExpenseStatus::Rejected,
    }
}

pub(crate) fn map_expense(expense: engine::Expense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        employee_id: expense.employee_id,
        category_id: expense.category_id,
        description: expense.description,
        amount_original_minor: expense.amount_original_minor,
        currency_original: map_currency(expense.currency_original),
        amount_converted_minor: expense.amount_converted_minor,
        receipt_url: expense.receipt_url,
        date_incurred: expense.date_incurred,
        status: map_status(expense.status),
        current_step: expense.current_step,
        created_at: expense.created_at,
    }
}

pub async fn submit(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<ExpenseSubmit>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let mut cmd = SubmitExpenseCmd::new(
        user.id,
        payload.category_id,
        payload.description,
        payload.amount_original_minor,
        engine_currency(payload.currency_original),
        payload.date_incurred,
    );
    if let Some(url) = payload.receipt_url {
        cmd = cmd.receipt_url(url);
    }

    let expense = state.engine.submit_expense(cmd).await?;
    Ok((StatusCode::CREATED, Json(map_expense(expense))))
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Query(query): Query<ExpenseListQuery>,
) -> Result<Json<ExpenseListResponse>, ServerError> {
    // Employees only ever see their own expenses; admins and managers may
    // filter by employee.
    let employee_filter = if user.is_admin() || user.is_manager() {
        query.employee_id
    } else {
        Some(user.id)
    };

    let filter = ExpenseListFilter {
        employee_id: employee_filter,
        status: query.status.map(engine_status),
    };
    let page = state
        .engine
        .list_expenses(
            user.company_id,
            filter,
            query.limit.unwrap_or(50),
            query.cursor.as_deref(),
        )
        .await?;

    Ok(Json(ExpenseListResponse {
        expenses: page.expenses.into_iter().map(map_expense).collect(),
        next_cursor: page.next_cursor,
    }))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = state.engine.expense(expense_id).await?;
    if expense.company_id != user.company_id {
        return Err(ServerError::Engine(EngineError::KeyNotFound(
            "expense not exists".to_string(),
        )));
    }
    if !user.is_admin() && !user.is_manager() && expense.employee_id != user.id {
        return Err(ServerError::Engine(EngineError::Forbidden(
            "expense belongs to another employee".to_string(),
        )));
    }
    Ok(Json(map_expense(expense)))
}

pub async fn pending(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<ExpenseListResponse>, ServerError> {
    let expenses = state
        .engine
        .pending_approvals(user.id)
        .await?
        .into_iter()
        .map(map_expense)
        .collect();
    Ok(Json(ExpenseListResponse {
        expenses,
        next_cursor: None,
    }))
}
