//! HTTP 中间件
//! 请求追踪与控制台路由守卫

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    guard::{GuardDecision, RouteGuard},
    services::PermissionResolver,
    session::{AuthStateObserver, SessionLifecycleController, SignOutCoordinator},
};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: SessionLifecycleController,
    pub sign_out: SignOutCoordinator,
    pub auth_state: AuthStateObserver,
    pub permissions: Arc<PermissionResolver>,
    pub guard: Arc<RouteGuard>,
}

impl AppState {
    pub fn new(lifecycle: SessionLifecycleController, guard: RouteGuard) -> Self {
        Self {
            sign_out: lifecycle.sign_out_coordinator(),
            auth_state: lifecycle.observer(),
            permissions: lifecycle.permissions().clone(),
            lifecycle,
            guard: Arc::new(guard),
        }
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = start.elapsed();

        let status = response.status().as_u16();
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            _ => "OTHER",
        };
        let status_class = match status {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            _ => "5xx",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_class)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
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
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 控制台路由守卫
/// 认证未完成时返回 503，未登录跳转登录页，角色不符跳转首页
pub async fn route_guard_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let requested = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let snapshot = state.auth_state.snapshot();
    let decision = state.guard.decide(&snapshot, &requested);

    metrics::counter!("route_guard_decisions_total", "decision" => decision.as_str()).increment(1);
    tracing::debug!(path = %requested, decision = decision.as_str(), "Route guard decision");

    match decision {
        GuardDecision::Render => next.run(req).await,
        GuardDecision::Pending => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            "Authentication in progress",
        )
            .into_response(),
        GuardDecision::RedirectToSignIn { return_to } => {
            Redirect::to(&state.guard.sign_in_location(&return_to)).into_response()
        }
        GuardDecision::RedirectToLanding => Redirect::to(state.guard.landing_path()).into_response(),
    }
}
