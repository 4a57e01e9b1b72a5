//! Permission repository
//! 角色与权限的权威数据来自数据库存储过程

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::role::{Role, RolePermissionMap, RolePermissionRow},
    services::PermissionAuthority,
};

pub struct PermissionRepository {
    db: PgPool,
}

impl PermissionRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionAuthority for PermissionRepository {
    async fn role_permissions(&self) -> Result<RolePermissionMap, AppError> {
        let rows = sqlx::query_as::<_, RolePermissionRow>(
            "SELECT role_name, permission_name FROM get_role_permissions()",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(RolePermissionMap::from_rows(rows))
    }

    async fn user_permissions(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        let permissions = sqlx::query_scalar::<_, String>(
            "SELECT permission_name FROM get_user_permissions($1) ORDER BY permission_name",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }

    async fn user_role(&self, user_id: Uuid) -> Result<Option<Role>, AppError> {
        let name = sqlx::query_scalar::<_, Option<String>>("SELECT get_user_role_name($1)")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        match name {
            Some(name) => name
                .parse::<Role>()
                .map(Some)
                .map_err(|e| AppError::Internal(e.to_string())),
            None => Ok(None),
        }
    }

    async fn update_user_role(&self, user_id: Uuid, role: Role) -> Result<bool, AppError> {
        let updated = sqlx::query_scalar::<_, bool>("SELECT update_user_role($1, $2)")
            .bind(user_id)
            .bind(role.as_str())
            .fetch_one(&self.db)
            .await?;

        tracing::info!(user_id = %user_id, role = %role, updated, "User role updated");
        Ok(updated)
    }
}
