//! Categories API endpoints.

use api_types::category::{CategoriesResponse, CategoryCreate, CategoryUpdate, CategoryView};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};
use engine::{CreateCategoryCmd, EngineError};

fn map_category(category: engine::Category) -> CategoryView {
    CategoryView {
        id: category.id,
        name: category.name,
        description: category.description,
        active: category.active,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    include_inactive: Option<bool>,
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<CategoriesResponse>, ServerError> {
    let categories = state
        .engine
        .list_categories(user.company_id, query.include_inactive.unwrap_or(false))
        .await?
        .into_iter()
        .map(map_category)
        .collect();
    Ok(Json(CategoriesResponse { categories }))
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<CategoryCreate>,
) -> Result<(StatusCode, Json<CategoryView>), ServerError> {
    if !user.is_admin() {
        return Err(ServerError::Engine(EngineError::Forbidden(
            "only admins can manage categories".to_string(),
        )));
    }

    let mut cmd = CreateCategoryCmd::new(user.company_id, payload.name);
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    let category = state.engine.create_category(cmd).await?;
    Ok((StatusCode::CREATED, Json(map_category(category))))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(category_id): Path<Uuid>,
    Json(payload): Json<CategoryUpdate>,
) -> Result<Json<CategoryView>, ServerError> {
    if !user.is_admin() {
        return Err(ServerError::Engine(EngineError::Forbidden(
            "only admins can manage categories".to_string(),
        )));
    }
    if payload.name.is_none() && payload.description.is_none() && payload.active.is_none() {
        return Err(ServerError::Generic(
            "provide at least one of name, description or active".to_string(),
        ));
    }

    let category = state
        .engine
        .update_category(
            category_id,
            payload.name.as_deref(),
            payload.description.as_deref(),
            payload.active,
            user.id,
        )
        .await?;
    Ok(Json(map_category(category)))
}
