//! Company API endpoints.

use api_types::company::{CompanyUpdate, CompanyView};
use axum::{Extension, Json, extract::State};

use crate::{ServerError, server::ServerState, user};

pub(crate) fn map_currency(currency: engine::Currency) -> api_types::Currency {
    match currency {
        engine::Currency::Eur => api_types::Currency::Eur,
        engine::Currency::Usd => api_types::Currency::Usd,
        engine::Currency::Gbp => api_types::Currency::Gbp,
        engine::Currency::Inr => api_types::Currency::Inr,
        engine::Currency::Jpy => api_types::Currency::Jpy,
    }
}

pub(crate) fn engine_currency(currency: api_types::Currency) -> engine::Currency {
    match currency {
        api_types::Currency::Eur => engine::Currency::Eur,
        api_types::Currency::Usd => engine::Currency::Usd,
        api_types::Currency::Gbp => engine::Currency::Gbp,
        api_types::Currency::Inr => engine::Currency::Inr,
        api_types::Currency::Jpy => engine::Currency::Jpy,
    }
}

fn map_company(company: engine::Company) -> CompanyView {
    CompanyView {
        id: company.id,
        name: company.name,
        country: company.country,
        base_currency: map_currency(company.base_currency),
    }
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<CompanyView>, ServerError> {
    let company = state.engine.company(user.company_id).await?;
    Ok(Json(map_company(company)))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<CompanyUpdate>,
) -> Result<Json<CompanyView>, ServerError> {
    if !user.is_admin() {
        return Err(ServerError::Engine(engine::EngineError::Forbidden(
            "only admins can update the company".to_string(),
        )));
    }

    let company = state
        .engine
        .update_company(
            user.company_id,
            payload.name.as_deref(),
            payload.country.as_deref(),
            payload.base_currency.map(engine_currency),
            user.id,
        )
        .await?;
    Ok(Json(map_company(company)))
}
