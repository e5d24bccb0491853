use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use std::sync::Arc;

use crate::{audit, categories, companies, decisions, expenses, rules, user, users};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
}

async fn auth(
    auth_header: TypedHeader<Authorization<Basic>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let email = auth_header.username().trim().to_lowercase();
    let user: Option<user::Model> = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user = match user {
        Some(user) if user.password == auth_header.password() => user,
        _ => return Err(StatusCode::UNAUTHORIZED),
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route(
            "/company",
            get(companies::get).patch(companies::update),
        )
        .route("/users", get(users::list).post(users::create))
        .route("/users/{id}", axum::routing::patch(users::update))
        .route(
            "/categories",
            get(categories::list).post(categories::create),
        )
        .route(
            "/categories/{id}",
            axum::routing::patch(categories::update),
        )
        .route("/rules", get(rules::list).post(rules::create))
        .route("/expenses", get(expenses::list).post(expenses::submit))
        .route("/expenses/{id}", get(expenses::get))
        .route("/expenses/{id}/decide", post(decisions::decide))
        .route("/expenses/{id}/actions", get(decisions::list_actions))
        .route("/approvals/pending", get(expenses::pending))
        .route("/audit", get(audit::list))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run(engine: Engine, db: DatabaseConnection) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, db, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
        db,
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, header};
    use base64::Engine as _;
    use engine::{CreateCompanyCmd, CreateUserCmd, Currency, Role};
    use http_body_util::BodyExt;
    use migration::MigratorTrait;
    use tower::ServiceExt;

    const ADMIN_EMAIL: &str = "admin@acme.test";
    const ADMIN_PASSWORD: &str = "secret";

    async fn test_router() -> Router {
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db.clone()).build().await.unwrap();

        let company = engine
            .create_company(CreateCompanyCmd::new("Acme", "IT", Currency::Eur))
            .await
            .unwrap();
        engine
            .create_user(CreateUserCmd::new(
                company.id,
                "Ada",
                ADMIN_EMAIL,
                ADMIN_PASSWORD,
                Role::Admin,
            ))
            .await
            .unwrap();

        router(ServerState {
            engine: Arc::new(engine),
            db,
        })
    }

    fn basic_auth(email: &str, password: &str) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{email}:{password}"));
        format!("Basic {encoded}")
    }

    #[tokio::test]
    async fn company_endpoint_returns_own_company() {
        let router = test_router().await;

        let response = router
            .oneshot(
                HttpRequest::get("/company")
                    .header(header::AUTHORIZATION, basic_auth(ADMIN_EMAIL, ADMIN_PASSWORD))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["name"], "Acme");
        assert_eq!(json["base_currency"], "EUR");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let router = test_router().await;

        let response = router
            .oneshot(
                HttpRequest::get("/company")
                    .header(header::AUTHORIZATION, basic_auth(ADMIN_EMAIL, "nope"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
