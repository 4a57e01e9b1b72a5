//! 用户角色管理的 HTTP 处理器（仅管理员）

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::AppState,
    models::role::{Role, UpdateRoleRequest},
};

/// 用户管理所需权限
pub const USERS_MANAGE: &str = "users.manage";

#[derive(Debug, Serialize)]
pub struct UserPermissionsResponse {
    pub user_id: Uuid,
    pub role: Option<Role>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateRoleResponse {
    pub user_id: Uuid,
    pub role: Role,
    pub updated: bool,
}

/// 检查当前会话是否可以管理用户
fn require_manager(state: &AppState) -> Result<(), AppError> {
    if !state.auth_state.snapshot().is_authenticated_at(Utc::now()) {
        return Err(AppError::Unauthorized);
    }
    state.permissions.require(USERS_MANAGE)
}

/// 查询指定用户的角色与权限
pub async fn get_user_permissions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPermissionsResponse>, AppError> {
    require_manager(&state)?;

    let authority = state.permissions.authority();
    let role = authority.user_role(user_id).await?;
    if role.is_none() {
        return Err(AppError::NotFound);
    }
    let permissions = authority.user_permissions(user_id).await?;

    Ok(Json(UserPermissionsResponse {
        user_id,
        role,
        permissions,
    }))
}

/// 修改用户角色
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<UpdateRoleResponse>, AppError> {
    require_manager(&state)?;

    let updated = state
        .permissions
        .authority()
        .update_user_role(user_id, req.role)
        .await?;

    if !updated {
        return Err(AppError::NotFound);
    }

    Ok(Json(UpdateRoleResponse {
        user_id,
        role: req.role,
        updated,
    }))
}
