//! 用户资料处理器（需要会话）

use crate::{
    auth::AuthContext,
    error::AppError,
    handlers::profile_pic_url,
    middleware::AppState,
    models::{AccountResponse, ApiResponse},
};
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// 当前用户资料
pub async fn profile(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<AccountResponse>>, AppError> {
    let account = state.auth_service.account(auth.account_id).await?;
    let url = profile_pic_url(&headers, state.config.server.trust_proxy);

    Ok(Json(ApiResponse::ok(
        "The user is retrieved successfully",
        AccountResponse::from_account(&account, url),
    )))
}

/// 当前用户头像
pub async fn profile_pic(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let object = state.auth_service.profile_picture(auth.account_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::CACHE_CONTROL, "private, max-age=300".to_string()),
        ],
        object.bytes,
    ))
}
