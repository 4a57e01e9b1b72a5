//! Authentication repository (认证数据访问)

use crate::{error::AppError, models::session::RefreshTokenRow};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

pub struct AuthRepository {
    db: PgPool,
}

impl AuthRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 刷新令牌只保存 SHA-256 哈希
    pub fn hash_token(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    /// 存储刷新令牌
    pub async fn store_refresh_token(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        replaces: Option<Uuid>,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, token_hash, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(id)
        .bind(Self::hash_token(token))
        .bind(user_id)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        // 轮换：旧令牌撤销并指向新令牌，且只能被消费一次
        if let Some(previous) = replaces {
            let rotated = sqlx::query(
                r#"
                UPDATE refresh_tokens
                SET revoked_at = NOW(), replaced_by = $2
                WHERE id = $1 AND revoked_at IS NULL
                "#,
            )
            .bind(previous)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if rotated != 1 {
                tx.rollback().await?;
                tracing::warn!(token_id = %previous, "Refresh token already rotated or revoked");
                return Err(AppError::Unauthorized);
            }
        }

        tx.commit().await?;
        Ok(id)
    }

    /// 根据令牌查找记录
    pub async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRow>, AppError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT id, token_hash, user_id, expires_at, revoked_at, replaced_by, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(Self::hash_token(token))
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    /// 撤销刷新令牌
    pub async fn revoke_refresh_token(&self, token: &str, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND user_id = $2 AND revoked_at IS NULL",
        )
        .bind(Self::hash_token(token))
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
