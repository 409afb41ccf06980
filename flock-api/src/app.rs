/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use flock_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = flock_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use flock_shared::auth::middleware::authenticate;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /health                          public
/// /v1/auth/login, /v1/auth/refresh public
/// /v1/auth/me, /v1/auth/password   authenticated
/// /v1/fields, /v1/churches, /v1/members, /v1/visitors, /v1/events,
/// /v1/attendance, /v1/transfers, /v1/missionary-reports, /v1/users,
/// /v1/dashboard, /v1/calendar, /v1/reports/members
///                                  authenticated, scope-filtered
/// ```
///
/// Middleware, outermost first: security headers, CORS, request tracing,
/// then JWT authentication on the protected routes only.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/v1/auth/login", post(routes::auth::login))
        .route("/v1/auth/refresh", post(routes::auth::refresh));

    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/password", post(routes::auth::change_password))
        .route(
            "/fields",
            get(routes::regions::list_fields).post(routes::regions::create_field),
        )
        .route(
            "/fields/:id/districts",
            get(routes::regions::list_districts).post(routes::regions::create_district),
        )
        .route(
            "/churches",
            get(routes::churches::list_churches).post(routes::churches::create_church),
        )
        .route(
            "/churches/:id",
            get(routes::churches::get_church)
                .put(routes::churches::update_church)
                .delete(routes::churches::delete_church),
        )
        .route(
            "/members",
            get(routes::members::list_members).post(routes::members::create_member),
        )
        .route(
            "/members/:id",
            get(routes::members::get_member)
                .put(routes::members::update_member)
                .delete(routes::members::delete_member),
        )
        .route(
            "/visitors",
            get(routes::visitors::list_visitors).post(routes::visitors::create_visitor),
        )
        .route(
            "/visitors/:id",
            get(routes::visitors::get_visitor).put(routes::visitors::update_visitor),
        )
        .route(
            "/visitors/:id/follow-up",
            patch(routes::visitors::update_follow_up),
        )
        .route(
            "/events",
            get(routes::events::list_events).post(routes::events::create_event),
        )
        .route(
            "/events/:id",
            get(routes::events::get_event)
                .put(routes::events::update_event)
                .delete(routes::events::delete_event),
        )
        .route(
            "/attendance",
            get(routes::attendance::list_attendance).post(routes::attendance::record_attendance),
        )
        .route("/attendance/confirm", post(routes::attendance::confirm_attendance))
        .route(
            "/transfers",
            get(routes::transfers::list_transfers).post(routes::transfers::request_transfer),
        )
        .route("/transfers/bulk", post(routes::transfers::bulk_request_transfers))
        .route("/transfers/:id", get(routes::transfers::get_transfer))
        .route("/transfers/:id/approve", post(routes::transfers::approve_transfer))
        .route("/transfers/:id/reject", post(routes::transfers::reject_transfer))
        .route(
            "/missionary-reports",
            get(routes::missionary_reports::list_reports)
                .post(routes::missionary_reports::submit_report),
        )
        .route(
            "/missionary-reports/:id",
            get(routes::missionary_reports::get_report)
                .put(routes::missionary_reports::update_report),
        )
        .route(
            "/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/users/:id",
            get(routes::users::get_user).put(routes::users::update_user),
        )
        .route("/dashboard", get(routes::dashboard::dashboard))
        .route("/calendar", get(routes::dashboard::calendar))
        .route("/reports/members", post(routes::reports::member_report))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Configure CORS based on environment
    let cors = if state.config.allows_any_origin() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(public_routes)
        .nest("/v1", protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Validates the bearer token, resolves the caller's role and church scope,
/// and injects the resulting `AccessContext` into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = authenticate(&state.db, state.jwt_secret(), req.headers()).await?;

    tracing::debug!(user_id = %ctx.user_id, role = %ctx.role, "Request authenticated");
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, DatabaseConfig, JwtConfig};
    use axum::body::Body;
    use axum::http::StatusCode;
    use flock_shared::auth::jwt::{create_token, Claims, TokenType};
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "router-test-secret-with-32-chars!!";

    fn test_state() -> AppState {
        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/flock_unused".to_string(),
                max_connections: 1,
                run_migrations: false,
            },
            jwt: JwtConfig {
                secret: SECRET.to_string(),
            },
        };
        let pool = PgPool::connect_lazy(&config.database.url).unwrap();
        AppState::new(pool, config)
    }

    async fn send(request: axum::http::Request<Body>) -> Response {
        build_router(test_state()).oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        for uri in ["/v1/members", "/v1/churches", "/v1/dashboard", "/v1/auth/me"] {
            let response = send(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_refresh_token_rejected_as_access_token() {
        let claims = Claims::new(Uuid::new_v4(), TokenType::Refresh);
        let token = create_token(&claims, SECRET).unwrap();

        let response = send(
            axum::http::Request::builder()
                .uri("/v1/members")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_rejected() {
        let claims = Claims::new(Uuid::new_v4(), TokenType::Access);
        let token = create_token(&claims, "another-secret-that-is-32-chars-long").unwrap();

        let response = send(
            axum::http::Request::builder()
                .uri("/v1/churches")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = send(
            axum::http::Request::builder()
                .uri("/v1/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_security_headers_on_every_response() {
        let response = send(
            axum::http::Request::builder()
                .uri("/v1/members")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.headers().get("X-Frame-Options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn test_login_rejects_invalid_email_before_database() {
        let response = send(
            axum::http::Request::builder()
                .method("POST")
                .uri("/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"not-an-email","password":"x"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_refresh_rejects_garbage_token() {
        let response = send(
            axum::http::Request::builder()
                .method("POST")
                .uri("/v1/auth/refresh")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"refresh_token":"garbage"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
