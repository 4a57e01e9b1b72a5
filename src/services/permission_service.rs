//! 权限检查服务
//! 缓存远程下发的角色-权限映射；映射或角色未就绪时所有判断都返回 false

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::role::{PermissionSummary, Role, RolePermissionMap},
};

/// 远程权限来源（角色、权限的权威数据）
#[async_trait]
pub trait PermissionAuthority: Send + Sync {
    /// 全量角色-权限映射
    async fn role_permissions(&self) -> Result<RolePermissionMap, AppError>;

    /// 某个用户实际拥有的权限
    async fn user_permissions(&self, user_id: Uuid) -> Result<Vec<String>, AppError>;

    /// 用户当前角色
    async fn user_role(&self, user_id: Uuid) -> Result<Option<Role>, AppError>;

    /// 修改用户角色，用户不存在时返回 false
    async fn update_user_role(&self, user_id: Uuid, role: Role) -> Result<bool, AppError>;
}

pub struct PermissionResolver {
    authority: Arc<dyn PermissionAuthority>,
    map: RwLock<Option<Arc<RolePermissionMap>>>,
    role: RwLock<Option<Role>>,
}

impl PermissionResolver {
    pub fn new(authority: Arc<dyn PermissionAuthority>) -> Self {
        Self {
            authority,
            map: RwLock::new(None),
            role: RwLock::new(None),
        }
    }

    pub fn authority(&self) -> &Arc<dyn PermissionAuthority> {
        &self.authority
    }

    /// 重新拉取映射并替换缓存
    pub async fn refresh(&self) -> Result<(), AppError> {
        let fetched = self.authority.role_permissions().await?;
        tracing::info!(fetched_at = %fetched.fetched_at, "Role permissions loaded");
        if let Ok(mut map) = self.map.write() {
            *map = Some(Arc::new(fetched));
        }
        Ok(())
    }

    /// 仅在缓存为空时拉取
    pub async fn ensure_loaded(&self) -> Result<(), AppError> {
        if self.is_loaded() {
            return Ok(());
        }
        self.refresh().await
    }

    pub fn is_loaded(&self) -> bool {
        self.map.read().map(|map| map.is_some()).unwrap_or(false)
    }

    pub(crate) fn set_role(&self, role: Option<Role>) {
        if let Ok(mut current) = self.role.write() {
            *current = role;
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role.read().ok().and_then(|role| *role)
    }

    fn with_map<T>(&self, f: impl FnOnce(Role, &RolePermissionMap) -> T) -> Option<T> {
        let role = self.role()?;
        let map = self.map.read().ok()?.clone()?;
        Some(f(role, &map))
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.with_map(|role, map| map.contains(role, name))
            .unwrap_or(false)
    }

    pub fn has_any(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.has_permission(name))
    }

    pub fn has_all(&self, names: &[&str]) -> bool {
        self.with_map(|_, _| ()).is_some() && names.iter().all(|name| self.has_permission(name))
    }

    /// 当前角色的权限列表（未就绪时为空）
    pub fn permissions(&self) -> Vec<String> {
        self.with_map(|role, map| map.permissions_for(role))
            .unwrap_or_default()
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn is_driver(&self) -> bool {
        self.role() == Some(Role::Driver)
    }

    pub fn is_dispatcher(&self) -> bool {
        self.role() == Some(Role::Dispatcher)
    }

    pub fn is_fleet(&self) -> bool {
        self.role() == Some(Role::Fleet)
    }

    pub fn is_customer(&self) -> bool {
        self.role() == Some(Role::Customer)
    }

    /// 检查权限，如果无权限则返回错误
    pub fn require(&self, name: &str) -> Result<(), AppError> {
        if self.has_permission(name) {
            return Ok(());
        }
        tracing::warn!(role = ?self.role(), permission = %name, "Permission denied");
        Err(AppError::Forbidden)
    }

    pub fn summary(&self) -> PermissionSummary {
        PermissionSummary {
            role: self.role(),
            permissions: self.permissions(),
            is_admin: self.is_admin(),
            is_driver: self.is_driver(),
            is_dispatcher: self.is_dispatcher(),
            is_fleet: self.is_fleet(),
            is_customer: self.is_customer(),
        }
    }
}
