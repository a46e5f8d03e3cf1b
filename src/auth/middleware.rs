//! 会话认证中间件

use crate::{auth::session::SessionBinder, error::AppError, models::Role};
use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub account_id: Uuid,
    pub role: Role,
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}

/// 会话认证中间件 - 必须认证
///
/// 每个请求都回查会话存储，不跨请求缓存结果。
pub async fn require_session(
    State(binder): State<Arc<SessionBinder>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let payload = binder.resolve(req.headers()).await?;

    req.extensions_mut().insert(AuthContext {
        account_id: payload.account_id,
        role: payload.role,
    });

    Ok(next.run(req).await)
}
