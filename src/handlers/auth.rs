//! 认证相关的 HTTP 处理器

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    error::AppError,
    middleware::AppState,
    models::{
        auth::{SignInRequest, SignOutRequest, SignOutResponse},
        role::PermissionSummary,
        user::UserProfile,
    },
    session::{AuthState, LifecyclePhase, RefreshOutcome},
};

/// 登录响应（不包含令牌）
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user: UserProfile,
    pub phase: LifecyclePhase,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub outcome: RefreshOutcome,
    pub expires_at: Option<DateTime<Utc>>,
}

/// 登录
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SessionView>, AppError> {
    let user = state.lifecycle.sign_in(req).await?;
    let snapshot = state.lifecycle.snapshot();

    Ok(Json(SessionView {
        user,
        phase: snapshot.phase,
        expires_at: snapshot.session_expires_at,
    }))
}

/// 登出，返回前端应跳转的登录页地址
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignOutRequest>,
) -> Result<Json<SignOutResponse>, AppError> {
    let guard = state.guard.clone();
    let mut redirect_to = guard.sign_in_path().to_string();

    state
        .sign_out
        .sign_out_and_navigate(req.current_path.as_deref(), |signed_out| {
            if let Some(path) = &signed_out.previous_path {
                redirect_to = guard.sign_in_location(path);
            }
        })
        .await?;

    Ok(Json(SignOutResponse {
        signed_out: true,
        redirect_to,
    }))
}

/// 手动刷新会话
pub async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<RefreshResponse>, AppError> {
    let outcome = state.lifecycle.refresh().await?;

    Ok(Json(RefreshResponse {
        outcome,
        expires_at: state.lifecycle.snapshot().session_expires_at,
    }))
}

/// 当前认证状态
pub async fn current_state(State(state): State<Arc<AppState>>) -> Json<AuthState> {
    Json(state.auth_state.snapshot())
}

/// 当前角色的权限概要
pub async fn current_permissions(State(state): State<Arc<AppState>>) -> Json<PermissionSummary> {
    Json(state.permissions.summary())
}
