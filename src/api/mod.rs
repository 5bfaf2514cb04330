mod handlers;
mod middleware;

pub use middleware::{ClientKey, CurrentUser, RateLimiter, SecurityConfig, USER_ID_HEADER};

use axum::{
    extract::FromRef,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::db::Database;
use crate::engine::GoalEngine;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub goals: GoalEngine,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            goals: GoalEngine::new(db.clone()),
            db,
        }
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for GoalEngine {
    fn from_ref(state: &AppState) -> Self {
        state.goals.clone()
    }
}

/// Router with authentication and rate limiting disabled.
pub fn create_router(db: Database) -> Router {
    create_router_with_config(db, SecurityConfig::disabled())
}

pub fn create_router_with_config(db: Database, config: SecurityConfig) -> Router {
    let mut protected = Router::new()
        // Articles
        .route(
            "/articles",
            get(handlers::list_articles).post(handlers::create_article),
        )
        .route("/articles/{id}", get(handlers::get_article))
        // Goals
        .route(
            "/goals",
            get(handlers::list_goals).post(handlers::create_goal),
        )
        .route(
            "/goals/{id}",
            get(handlers::get_goal)
                .put(handlers::update_goal)
                .delete(handlers::delete_goal),
        )
        .route("/goals/{id}/progress", get(handlers::get_goal_progress))
        .route(
            "/goals/{id}/articles/{article_id}/complete",
            post(handlers::complete_article),
        )
        .route(
            "/goals/{id}/articles/{article_id}/reopen",
            post(handlers::reopen_article),
        )
        .layer(from_fn_with_state(
            config.clone(),
            middleware::auth_middleware,
        ));

    // Outermost, so throttled peers never reach the key check
    if let Some(limiter) = config.rate_limiter.clone() {
        protected = protected.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    let api = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected);

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config)),
        )
        .with_state(AppState::new(db))
}

fn cors_layer(config: &SecurityConfig) -> CorsLayer {
    match &config.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}
