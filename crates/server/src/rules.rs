//! Approval rule API endpoints.

use api_types::rule::{RuleApproverSpec, RuleCreate, RuleView, RulesResponse};
use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{ServerError, server::ServerState, user};
use engine::{ApproverSpec, CreateRuleCmd, EngineError};

fn map_rule(rule: engine::ApprovalRule) -> RuleView {
    RuleView {
        id: rule.id,
        name: rule.name,
        description: rule.description,
        sequential: rule.sequential,
        is_manager_first: rule.is_manager_first,
        minimum_percent_approval: rule.minimum_percent_approval,
        category_ids: rule.category_ids,
        approvers: rule
            .approvers
            .iter()
            .map(|a| RuleApproverSpec {
                user_id: a.user_id,
                position: a.position,
                required: a.required,
                can_override: a.can_override,
            })
            .collect(),
    }
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<RulesResponse>, ServerError> {
    if !user.is_admin() && !user.is_manager() {
        return Err(ServerError::Engine(EngineError::Forbidden(
            "admin or manager role required".to_string(),
        )));
    }

    let rules = state
        .engine
        .list_rules(user.company_id)
        .await?
        .into_iter()
        .map(map_rule)
        .collect();
    Ok(Json(RulesResponse { rules }))
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<RuleCreate>,
) -> Result<(StatusCode, Json<RuleView>), ServerError> {
    if !user.is_admin() {
        return Err(ServerError::Engine(EngineError::Forbidden(
            "only admins can manage approval rules".to_string(),
        )));
    }

    let mut cmd = CreateRuleCmd::new(user.company_id, payload.name);
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if !payload.sequential {
        cmd = cmd.parallel();
    }
    if payload.is_manager_first {
        cmd = cmd.manager_first();
    }
    if let Some(percent) = payload.minimum_percent_approval {
        cmd = cmd.minimum_percent(percent);
    }
    for category_id in payload.category_ids {
        cmd = cmd.category(category_id);
    }
    for approver in payload.approvers {
        cmd = cmd.approver(ApproverSpec {
            user_id: approver.user_id,
            position: approver.position,
            required: approver.required,
            can_override: approver.can_override,
        });
    }

    let rule = state.engine.create_rule(cmd).await?;
    Ok((StatusCode::CREATED, Json(map_rule(rule))))
}
