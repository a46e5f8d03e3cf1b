//! HTTP 中间件与应用状态
//! 请求追踪（trace_id / request_id、访问日志、请求指标）

use crate::{
    auth::{CookieSpec, JsonSessionCodec, PasswordHasher, SessionBinder, SessionCodec, SessionStore},
    config::AppConfig,
    error::AppError,
    repository::AccountStore,
    services::AuthService,
    storage::FileStore,
};
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// 存储后端均以 trait 对象注入，核心逻辑不感知具体实现。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub auth_service: Arc<AuthService>,
    pub sessions: Arc<SessionBinder>,
    pub refresh_cookie: CookieSpec,
}

impl AppState {
    /// 由配置和三个存储后端组装应用状态
    pub fn new(
        config: AppConfig,
        accounts: Arc<dyn AccountStore>,
        files: Arc<dyn FileStore>,
        session_store: Arc<dyn SessionStore>,
    ) -> Result<Self, AppError> {
        let hasher = Arc::new(PasswordHasher::new(&config.security)?);

        let auth_service = Arc::new(AuthService::new(
            accounts,
            files,
            hasher,
            config.security.refresh_token_exp_secs,
            config.storage.profile_pic_prefix.clone(),
        ));

        let sessions = Arc::new(SessionBinder::new(
            session_store,
            CookieSpec {
                name: config.session.cookie_name.clone(),
                path: config.session.cookie_path.clone(),
                secure: config.session.secure,
            },
            config.session.ttl_secs,
        ));

        let refresh_cookie = CookieSpec {
            name: config.refresh_cookie.name.clone(),
            path: config.refresh_cookie.path.clone(),
            secure: config.refresh_cookie.secure,
        };

        Ok(Self {
            config,
            auth_service,
            sessions,
            refresh_cookie,
        })
    }
}

/// 会话存储使用的默认编码
pub fn default_session_codec() -> Arc<dyn SessionCodec> {
    Arc::new(JsonSessionCodec)
}

tokio::task_local! {
    /// 当前请求的 request_id，错误响应体复用它
    static REQUEST_ID: String;
}

/// 当前请求的 request_id（请求作用域之外为 None）
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();
        let mut response = REQUEST_ID.scope(request_id.clone(), next.run(req)).await;
        let elapsed = start.elapsed();

        let status = response.status().as_u16();

        // 指标标签只使用有限取值
        let method_label = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "OTHER",
        };
        let status_label = match status {
            200 => "200",
            201 => "201",
            204 => "204",
            400 => "400",
            401 => "401",
            404 => "404",
            409 => "409",
            413 => "413",
            500 => "500",
            501 => "501",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_label, "status" => status_label)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
