//! 控制台视图处理器
//! 视图本身由前端渲染，这里只返回经过守卫后的视图描述

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::{
    error::AppError, guard::GuardDecision, middleware::AppState, models::user::UserProfile,
};

/// 控制台的全部栏目
pub const CONSOLE_SECTIONS: &[&str] = &[
    "dashboard",
    "bookings",
    "users",
    "api-users",
    "invoices",
    "vehicles",
    "drivers",
    "airports",
    "quality-reviews",
    "complaints",
];

#[derive(Debug, Deserialize)]
pub struct SignInPageQuery {
    pub redirect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignInPage {
    pub view: &'static str,
    pub redirect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConsoleView {
    pub section: String,
    pub user: UserProfile,
    pub permissions: Vec<String>,
    pub can_view: bool,
    pub can_manage: bool,
}

const LOCAL_ORIGIN: &str = "http://console.local/";

/// 只接受站内路径，避免开放重定向
fn local_path(target: Option<String>) -> Option<String> {
    let target = target?;
    if !target.starts_with('/') || target.chars().any(|c| c == '\\' || c.is_control()) {
        return None;
    }

    let base = Url::parse(LOCAL_ORIGIN).ok()?;
    let resolved = base.join(&target).ok()?;
    (resolved.origin() == base.origin()).then_some(target)
}

/// 栏目对应的权限前缀，如 `api-users` -> `api_users`
fn permission_prefix(section: &str) -> String {
    section.replace('-', "_")
}

/// 登录页；已登录时直接跳回目标页面
pub async fn sign_in_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignInPageQuery>,
) -> Response {
    let redirect = local_path(query.redirect);
    let snapshot = state.auth_state.snapshot();

    if !snapshot.loading && snapshot.is_authenticated_at(chrono::Utc::now()) {
        let target = redirect.as_deref().unwrap_or(state.guard.landing_path());
        return Redirect::to(target).into_response();
    }

    Json(SignInPage {
        view: "sign_in",
        redirect,
    })
    .into_response()
}

/// 控制台栏目
pub async fn console_view(
    State(state): State<Arc<AppState>>,
    Path(section): Path<String>,
) -> Result<Response, AppError> {
    if !CONSOLE_SECTIONS.contains(&section.as_str()) {
        return Err(AppError::NotFound);
    }

    // 按解码后的栏目再判一次
    let snapshot = state.auth_state.snapshot();
    match state.guard.decide(&snapshot, &format!("/console/{section}")) {
        GuardDecision::Render => {}
        GuardDecision::RedirectToLanding => {
            return Ok(Redirect::to(state.guard.landing_path()).into_response());
        }
        GuardDecision::Pending | GuardDecision::RedirectToSignIn { .. } => {
            return Err(AppError::Unauthorized);
        }
    }

    let user = snapshot.user.ok_or(AppError::Unauthorized)?;

    let prefix = permission_prefix(&section);
    let view = format!("{prefix}.view");
    let manage = format!("{prefix}.manage");
    let permissions = &state.permissions;

    Ok(Json(ConsoleView {
        can_view: permissions.has_any(&[view.as_str(), manage.as_str()]),
        can_manage: permissions.has_permission(&manage),
        permissions: permissions.permissions(),
        section,
        user,
    })
    .into_response())
}
