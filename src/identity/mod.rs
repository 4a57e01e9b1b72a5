//! Remote identity provider boundary

mod postgres;

pub use postgres::PgIdentityProvider;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::session::{AuthSession, SessionRecord},
};

/// Issues, confirms, refreshes and revokes sessions
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AppError>;

    /// Revoke the session. Revoking an unknown or already revoked session succeeds.
    async fn sign_out(&self, session: &SessionRecord) -> Result<(), AppError>;

    /// Exchange the record's refresh capability for a new session
    async fn refresh_session(&self, session: &SessionRecord) -> Result<AuthSession, AppError>;

    /// Confirm the record and return the authoritative profile
    async fn get_session(&self, session: &SessionRecord) -> Result<AuthSession, AppError>;
}
