//! Approval decision API endpoints.

use api_types::decision::{ActionView, ActionsResponse, DecisionCreate, DecisionRecorded};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{ServerError, expenses::map_status, server::ServerState, user};
use engine::{DecideCmd, EngineError};

fn map_decision(decision: engine::Decision) -> api_types::Decision {
    match decision {
        engine::Decision::Approved => api_types::Decision::Approved,
        engine::Decision::Rejected => api_types::Decision::Rejected,
    }
}

fn engine_decision(decision: api_types::Decision) -> engine::Decision {
    match decision {
        api_types::Decision::Approved => engine::Decision::Approved,
        api_types::Decision::Rejected => engine::Decision::Rejected,
    }
}

fn map_action(action: engine::ApprovalAction) -> ActionView {
    ActionView {
        id: action.id,
        approver_id: action.approver_id,
        step_order: action.step_order,
        decision: map_decision(action.decision),
        comment: action.comment,
        decided_at: action.decided_at,
    }
}

pub async fn decide(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<DecisionCreate>,
) -> Result<Json<DecisionRecorded>, ServerError> {
    let mut cmd = DecideCmd::new(
        expense_id,
        user.id,
        engine_decision(payload.decision),
        Utc::now(),
    );
    if let Some(comment) = payload.comment {
        cmd = cmd.comment(comment);
    }

    let outcome = state.engine.decide(cmd).await?;
    Ok(Json(DecisionRecorded {
        action_id: outcome.action.id,
        status: map_status(outcome.status),
        current_step: outcome.current_step,
    }))
}

pub async fn list_actions(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<ActionsResponse>, ServerError> {
    let expense = state.engine.expense(expense_id).await?;
    if expense.company_id != user.company_id {
        return Err(ServerError::Engine(EngineError::KeyNotFound(
            "expense not exists".to_string(),
        )));
    }

    let actions = state
        .engine
        .list_actions(expense_id)
        .await?
        .into_iter()
        .map(map_action)
        .collect();
    Ok(Json(ActionsResponse { actions }))
}
