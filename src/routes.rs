//! 路由注册
//! 创建所有路由并应用中间件

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{handlers, middleware::AppState};

/// 请求体上限
const MAX_BODY_BYTES: usize = 64 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(state.guard.sign_in_path(), get(handlers::console::sign_in_page));

    // 认证操作
    let auth_routes = Router::new()
        .route("/api/v1/auth/sign-in", post(handlers::auth::sign_in))
        .route("/api/v1/auth/sign-out", post(handlers::auth::sign_out))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh))
        .route("/api/v1/auth/state", get(handlers::auth::current_state))
        .route("/api/v1/auth/permissions", get(handlers::auth::current_permissions));

    // 用户角色管理（处理器内检查权限）
    let user_routes = Router::new()
        .route(
            "/api/v1/users/{id}/permissions",
            get(handlers::users::get_user_permissions),
        )
        .route("/api/v1/users/{id}/role", put(handlers::users::update_user_role));

    // 控制台视图，经过路由守卫
    let console_routes = Router::new()
        .route("/console/{section}", get(handlers::console::console_view))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::route_guard_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(user_routes)
        .merge(console_routes)
        .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
