//! 基于 PostgreSQL + JWT 的身份服务实现

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, Secret};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::IdentityProvider;
use crate::{
    auth::{JwtService, PasswordHasher},
    error::AppError,
    models::{
        role::Role,
        session::{AuthSession, SessionRecord},
        user::{User, UserProfile, UserStatus},
    },
    repository::{AuthRepository, UserRepository},
};

pub struct PgIdentityProvider {
    db: PgPool,
    jwt: Arc<JwtService>,
    hasher: PasswordHasher,
}

impl PgIdentityProvider {
    pub fn new(db: PgPool, jwt: Arc<JwtService>) -> Self {
        Self {
            db,
            jwt,
            hasher: PasswordHasher::new(),
        }
    }

    /// 检查账户状态并转换为用户资料
    fn profile_of(user: User) -> Result<UserProfile, AppError> {
        let status = UserStatus::from(user.status.as_str());
        if status != UserStatus::Active {
            tracing::warn!(user_id = %user.id, status = %user.status, "Inactive account rejected");
            return Err(AppError::BadRequest("Account is not active".to_string()));
        }

        let role = user
            .role_name
            .parse::<Role>()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(UserProfile {
            id: user.id,
            display_name: user.display_name,
            email: user.email,
            role,
            status,
        })
    }

    /// 签发令牌并存储刷新令牌
    async fn issue(&self, user: UserProfile, replaces: Option<Uuid>) -> Result<AuthSession, AppError> {
        let pair = self.jwt.generate_token_pair(&user.id, user.role.as_str())?;

        AuthRepository::new(self.db.clone())
            .store_refresh_token(&pair.refresh_token, user.id, pair.refresh_expires_at, replaces)
            .await?;

        Ok(AuthSession {
            record: SessionRecord {
                subject: user.id,
                issued_at: pair.issued_at,
                expires_at: pair.access_expires_at,
                access_token: Secret::new(pair.access_token),
                refresh_token: Secret::new(pair.refresh_token),
            },
            user,
        })
    }

    async fn load_profile(&self, user_id: Uuid) -> Result<UserProfile, AppError> {
        let user = UserRepository::new(self.db.clone())
            .find_by_id(&user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Self::profile_of(user)
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let user = UserRepository::new(self.db.clone())
            .find_by_email(email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        self.hasher
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await?;

        let profile = Self::profile_of(user)?;
        self.issue(profile, None).await
    }

    async fn sign_out(&self, session: &SessionRecord) -> Result<(), AppError> {
        let revoked = AuthRepository::new(self.db.clone())
            .revoke_refresh_token(session.refresh_token.expose_secret(), session.subject)
            .await?;

        tracing::debug!(subject = %session.subject, revoked, "Refresh token revoked");
        Ok(())
    }

    async fn refresh_session(&self, session: &SessionRecord) -> Result<AuthSession, AppError> {
        let token = session.refresh_token.expose_secret();
        let claims = self.jwt.validate_refresh_token(token)?;

        let row = AuthRepository::new(self.db.clone())
            .find_refresh_token(token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if row.revoked_at.is_some() {
            tracing::warn!(
                user_id = %row.user_id,
                token_id = %row.id,
                "Revoked refresh token presented"
            );
            return Err(AppError::Unauthorized);
        }

        if !row.is_usable_at(Utc::now()) || claims.subject()? != row.user_id {
            return Err(AppError::Unauthorized);
        }

        let profile = self.load_profile(row.user_id).await?;
        self.issue(profile, Some(row.id)).await
    }

    async fn get_session(&self, session: &SessionRecord) -> Result<AuthSession, AppError> {
        let claims = self
            .jwt
            .validate_access_token(session.access_token.expose_secret())?;

        let subject = claims.subject()?;
        if subject != session.subject {
            return Err(AppError::Unauthorized);
        }

        let user = self.load_profile(subject).await?;

        Ok(AuthSession {
            record: SessionRecord {
                subject,
                issued_at: claims.issued_at(),
                expires_at: claims.expires_at(),
                access_token: session.access_token.clone(),
                refresh_token: session.refresh_token.clone(),
            },
            user,
        })
    }
}
