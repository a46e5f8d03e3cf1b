//! 认证相关的 HTTP 处理器

use crate::{
    auth::{AuthStatus, PasswordHasher, SessionPayload},
    error::AppError,
    handlers::profile_pic_url,
    middleware::AppState,
    models::{
        Account, AccountResponse, ApiResponse, AuthOutcome, AuthStatusResponse, LoginRequest, RegisterForm,
        Registration,
    },
    validation::validate_profile_image,
};
use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{error, warn};
use validator::Validate;

/// 注册（multipart: email, password, fullName, profilePic）
pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::Validation(e.body_text()))?;

    let mut form = RegisterForm::default();
    let mut picture = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("email") => form.email = field.text().await.map_err(multipart_error)?.trim().to_string(),
            Some("password") => form.password = field.text().await.map_err(multipart_error)?,
            Some("fullName") => {
                form.full_name = field.text().await.map_err(multipart_error)?.trim().to_string()
            }
            Some("profilePic") => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                picture = Some((filename, bytes));
            }
            // 忽略未知字段
            _ => {}
        }
    }

    // 所有校验在产生副作用之前完成
    form.validate()?;
    PasswordHasher::validate_password_policy(&form.password, &state.config.security)?;
    let (filename, bytes) = picture
        .ok_or_else(|| AppError::Validation("Profile picture is required".to_string()))?;
    let image = validate_profile_image(filename, bytes)?;

    let outcome = state
        .auth_service
        .register(Registration {
            email: form.email,
            password: form.password,
            full_name: form.full_name,
            image,
        })
        .await?;

    let refresh_cookie = build_refresh_cookie(&state, &outcome)?;

    // 账户已提交：会话绑定失败时仍下发刷新令牌，客户端可经 /refresh 恢复
    let session_cookie = match bind_session(&state, &outcome.account).await {
        Ok(cookie) => cookie,
        Err(e) => {
            error!(
                account_id = %outcome.account.id,
                error = %e,
                "Account created but session could not be bound"
            );
            return Ok((
                AppendHeaders([(header::SET_COOKIE, refresh_cookie)]),
                e,
            )
                .into_response());
        }
    };

    let body = account_body(&state, &headers, &outcome, "The user is created successfully");
    Ok((
        StatusCode::CREATED,
        AppendHeaders([
            (header::SET_COOKIE, session_cookie),
            (header::SET_COOKIE, refresh_cookie),
        ]),
        Json(body),
    )
        .into_response())
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    req.validate()?;

    let account = state.auth_service.authenticate(req).await?;

    // 先绑定会话：失败时已存储的刷新令牌保持不变
    let session_cookie = bind_session(&state, &account).await?;
    let outcome = match state.auth_service.issue_refresh_token(account).await {
        Ok(outcome) => outcome,
        Err(e) => {
            discard_session(&state, &session_cookie).await;
            return Err(e);
        }
    };

    let body = account_body(&state, &headers, &outcome, "The user is logged in successfully");
    Ok((
        StatusCode::CREATED,
        AppendHeaders([
            (header::SET_COOKIE, session_cookie),
            (header::SET_COOKIE, build_refresh_cookie(&state, &outcome)?),
        ]),
        Json(body),
    ))
}

/// 登出：销毁会话、吊销刷新令牌、清除两个 Cookie（无会话时同样返回 204）
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let AuthStatus::Authenticated(payload) = state.sessions.status(&headers).await? {
        state.auth_service.logout(payload.account_id).await?;
    }

    let session_cookie = state.sessions.invalidate(&headers).await?;
    let refresh_cookie = state.refresh_cookie.expire()?;

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([
            (header::SET_COOKIE, session_cookie),
            (header::SET_COOKIE, refresh_cookie),
        ]),
    ))
}

/// 刷新：轮换刷新令牌并重新绑定会话
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = state
        .refresh_cookie
        .read(&headers)
        .ok_or(AppError::Unauthorized)?;

    let account = state.auth_service.refresh_account(&token).await?;

    // 新会话先于轮换建立：失败时旧刷新令牌仍然有效
    let session_cookie = bind_session(&state, &account).await?;
    let outcome = match state.auth_service.rotate_refresh_token(account, &token).await {
        Ok(outcome) => outcome,
        Err(e) => {
            discard_session(&state, &session_cookie).await;
            return Err(e);
        }
    };

    // 令牌已轮换，旧会话清理失败不能吞掉新令牌
    if let Err(e) = state.sessions.invalidate(&headers).await {
        warn!(account_id = %outcome.account.id, error = %e, "Previous session not destroyed");
    }

    let body = account_body(&state, &headers, &outcome, "The session is refreshed successfully");
    Ok((
        StatusCode::OK,
        AppendHeaders([
            (header::SET_COOKIE, session_cookie),
            (header::SET_COOKIE, build_refresh_cookie(&state, &outcome)?),
        ]),
        Json(body),
    ))
}

/// 当前会话状态
pub async fn status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AuthStatusResponse>, AppError> {
    let response = match state.sessions.status(&headers).await? {
        AuthStatus::Authenticated(payload) => AuthStatusResponse {
            authenticated: true,
            account_id: Some(payload.account_id),
            role: Some(payload.role),
        },
        AuthStatus::Unauthenticated => AuthStatusResponse {
            authenticated: false,
            account_id: None,
            role: None,
        },
    };

    Ok(Json(response))
}

pub async fn send_verification_email() -> Result<StatusCode, AppError> {
    Err(AppError::NotImplemented("Email verification"))
}

pub async fn verify_email() -> Result<StatusCode, AppError> {
    Err(AppError::NotImplemented("Email verification"))
}

pub async fn request_password_reset() -> Result<StatusCode, AppError> {
    Err(AppError::NotImplemented("Password reset"))
}

pub async fn change_password() -> Result<StatusCode, AppError> {
    Err(AppError::NotImplemented("Password change"))
}

fn multipart_error(e: MultipartError) -> AppError {
    tracing::debug!(error = %e, "Multipart body rejected");
    AppError::Validation("File too big or invalid format".to_string())
}

fn account_body(
    state: &AppState,
    headers: &HeaderMap,
    outcome: &AuthOutcome,
    message: &str,
) -> ApiResponse<AccountResponse> {
    let url = profile_pic_url(headers, state.config.server.trust_proxy);
    ApiResponse::ok(message, AccountResponse::from_account(&outcome.account, url))
}

async fn bind_session(state: &AppState, account: &Account) -> Result<HeaderValue, AppError> {
    state
        .sessions
        .bind(&SessionPayload {
            account_id: account.id,
            role: account.role,
        })
        .await
}

/// 撤销一个从未送达客户端的会话，失败只记录
async fn discard_session(state: &AppState, session_cookie: &HeaderValue) {
    if let Err(e) = state.sessions.discard(session_cookie).await {
        warn!(error = %e, "Unused session not destroyed, left for the purge task");
    }
}

fn build_refresh_cookie(state: &AppState, outcome: &AuthOutcome) -> Result<HeaderValue, AppError> {
    state.refresh_cookie.build_until(
        outcome.refresh_token.expose_secret(),
        state.auth_service.refresh_ttl_secs(),
        outcome.refresh_expires_at,
    )
}
