//! User management API endpoints.

use api_types::user::{UserCreate, UserUpdate, UserView, UsersResponse};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};
use engine::{CreateUserCmd, EngineError};

pub(crate) fn map_role(role: engine::Role) -> api_types::Role {
    match role {
        engine::Role::Admin => api_types::Role::Admin,
        engine::Role::Manager => api_types::Role::Manager,
        engine::Role::Employee => api_types::Role::Employee,
    }
}

fn engine_role(role: api_types::Role) -> engine::Role {
    match role {
        api_types::Role::Admin => engine::Role::Admin,
        api_types::Role::Manager => engine::Role::Manager,
        api_types::Role::Employee => engine::Role::Employee,
    }
}

fn map_status(status: engine::UserStatus) -> api_types::UserStatus {
    match status {
        engine::UserStatus::Active => api_types::UserStatus::Active,
        engine::UserStatus::Inactive => api_types::UserStatus::Inactive,
    }
}

fn map_user(user: engine::User) -> UserView {
    UserView {
        id: user.id,
        name: user.name,
        email: user.email,
        role: map_role(user.role),
        manager_id: user.manager_id,
        status: map_status(user.status),
    }
}

fn require_admin(user: &user::Model) -> Result<(), ServerError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ServerError::Engine(EngineError::Forbidden(
            "admin role required".to_string(),
        )))
    }
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<UsersResponse>, ServerError> {
    if !user.is_admin() && !user.is_manager() {
        return Err(ServerError::Engine(EngineError::Forbidden(
            "admin or manager role required".to_string(),
        )));
    }

    let users = state
        .engine
        .list_users(user.company_id)
        .await?
        .into_iter()
        .map(map_user)
        .collect();
    Ok(Json(UsersResponse { users }))
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserView>), ServerError> {
    require_admin(&user)?;

    let mut cmd = CreateUserCmd::new(
        user.company_id,
        payload.name,
        payload.email,
        payload.password,
        engine_role(payload.role),
    );
    if let Some(manager_id) = payload.manager_id {
        cmd = cmd.manager(manager_id);
    }

    let created = state.engine.create_user(cmd).await?;
    Ok((StatusCode::CREATED, Json(map_user(created))))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<UserView>, ServerError> {
    require_admin(&user)?;

    if payload.manager_id.is_none() && payload.status.is_none() {
        return Err(ServerError::Generic(
            "provide at least one of manager_id or status".to_string(),
        ));
    }

    // Scope the target to the caller's company before mutating anything.
    let target = state.engine.user(user_id).await?;
    if target.company_id != user.company_id {
        return Err(ServerError::Engine(EngineError::KeyNotFound(
            "user not exists".to_string(),
        )));
    }

    let mut updated = target;
    if let Some(manager_id) = payload.manager_id {
        updated = state
            .engine
            .assign_manager(user_id, manager_id, user.id)
            .await?;
    }
    if let Some(status) = payload.status {
        let status = match status {
            api_types::UserStatus::Active => engine::UserStatus::Active,
            api_types::UserStatus::Inactive => engine::UserStatus::Inactive,
        };
        updated = state.engine.set_user_status(user_id, status, user.id).await?;
    }

    Ok(Json(map_user(updated)))
}
