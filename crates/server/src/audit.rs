//! Audit trail API endpoints.

use api_types::audit::{AuditQuery, AuditResponse, AuditView};
use axum::{
    Extension, Json,
    extract::{Query, State},
};

use crate::{ServerError, server::ServerState, user};
use engine::EngineError;

fn map_entry(entry: engine::AuditEntry) -> AuditView {
    AuditView {
        id: entry.id,
        entity_type: entry.entity_type,
        entity_id: entry.entity_id,
        action: entry.action,
        user_id: entry.user_id,
        details: entry.details,
        timestamp: entry.timestamp,
    }
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditResponse>, ServerError> {
    if !user.is_admin() {
        return Err(ServerError::Engine(EngineError::Forbidden(
            "only admins can read the audit trail".to_string(),
        )));
    }

    let entries = state
        .engine
        .list_audit(&query.entity_type, query.entity_id)
        .await?
        .into_iter()
        .map(map_entry)
        .collect();
    Ok(Json(AuditResponse { entries }))
}
