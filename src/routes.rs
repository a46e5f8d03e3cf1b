//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{auth::require_session, handlers, middleware::AppState};

/// multipart 头部和文本字段的额外余量
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.storage.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 注册接口单独放宽请求体上限
    let register_route = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit));

    // 认证路由（无需会话）
    let auth_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route("/api/auth/status", get(handlers::auth::status))
        .route(
            "/api/auth/verification-email",
            post(handlers::auth::send_verification_email),
        )
        .route("/api/auth/verify-email", post(handlers::auth::verify_email))
        .route(
            "/api/auth/password-reset",
            post(handlers::auth::request_password_reset),
        )
        .route(
            "/api/auth/change-password",
            post(handlers::auth::change_password),
        );

    // 需要会话的路由
    let authenticated_routes = Router::new()
        .route("/api/user/profile", get(handlers::user::profile))
        .route("/api/user/profile-pic", get(handlers::user::profile_pic))
        .layer(axum::middleware::from_fn_with_state(
            state.sessions.clone(),
            require_session,
        ));

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(register_route)
        .merge(auth_routes)
        .merge(authenticated_routes)
        .layer(axum::middleware::from_fn(
            crate::middleware::request_tracking_middleware,
        ))
        .with_state(state)
}
