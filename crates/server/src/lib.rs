use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{run, run_with_listener, spawn_with_listener};

mod audit;
mod categories;
mod companies;
mod decisions;
mod expenses;
mod rules;
mod server;
mod user;
mod users;

pub mod types {
    pub mod company {
        pub use api_types::company::{CompanyUpdate, CompanyView};
    }

    pub mod user {
        pub use api_types::user::{UserCreate, UserUpdate, UserView, UsersResponse};
    }

    pub mod category {
        pub use api_types::category::{
            CategoriesResponse, CategoryCreate, CategoryUpdate, CategoryView,
        };
    }

    pub mod rule {
        pub use api_types::rule::{RuleApproverSpec, RuleCreate, RuleView, RulesResponse};
    }

    pub mod expense {
        pub use api_types::expense::{
            ExpenseListQuery, ExpenseListResponse, ExpenseSubmit, ExpenseView,
        };
    }

    pub mod decision {
        pub use api_types::decision::{
            ActionView, ActionsResponse, DecisionCreate, DecisionRecorded,
        };
    }

    pub mod audit {
        pub use api_types::audit::{AuditQuery, AuditResponse, AuditView};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

//TODO: Find a better solution
#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Forbidden(_) | EngineError::NotAnApprover(_) => StatusCode::FORBIDDEN,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_)
        | EngineError::DuplicateDecision(_)
        | EngineError::ExpenseClosed(_)
        | EngineError::ConcurrentModification(_) => StatusCode::CONFLICT,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidRule(_)
        | EngineError::ManagerCycle(_)
        | EngineError::InvalidInput(_)
        | EngineError::CurrencyMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => {
                (status_for_engine_error(&err), message_for_engine_error(err))
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_forbidden_maps_to_403() {
        let res =
            ServerError::from(EngineError::Forbidden("forbidden".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn engine_not_an_approver_maps_to_403() {
        let res = ServerError::from(EngineError::NotAnApprover("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_conflicts_map_to_409() {
        for err in [
            EngineError::ExistingKey("x".to_string()),
            EngineError::DuplicateDecision("x".to_string()),
            EngineError::ExpenseClosed("x".to_string()),
            EngineError::ConcurrentModification("x".to_string()),
        ] {
            let res = ServerError::from(err).into_response();
            assert_eq!(res.status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn engine_validation_maps_to_422() {
        for err in [
            EngineError::InvalidRule("x".to_string()),
            EngineError::ManagerCycle("x".to_string()),
            EngineError::InvalidInput("x".to_string()),
            EngineError::CurrencyMismatch("x".to_string()),
        ] {
            let res = ServerError::from(err).into_response();
            assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
