//! # 路由配置

use axum::Router;
use axum::routing::{get, post};

use super::handlers;
use super::server::AppState;

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1/auth", auth_routes())
        .with_state(state)
}

/// 认证路由
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/via-google", post(handlers::login_via_google))
        .route("/register", post(handlers::register))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", post(handlers::logout))
        .route("/verify", get(handlers::verify))
        .route("/sessions", get(handlers::list_sessions))
        .route("/logout-all", post(handlers::logout_all))
        .route("/password", post(handlers::change_password))
}
