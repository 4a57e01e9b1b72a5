//! Session records issued by the identity provider

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserProfile;

/// Durable proof of authentication
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub subject: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
}

impl SessionRecord {
    /// Strictly before `expires_at`
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn expires_within(&self, now: DateTime<Utc>, lead: Duration) -> bool {
        self.expires_at - now <= lead
    }
}

/// A session record together with the profile it authenticates
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub record: SessionRecord,
    pub user: UserProfile,
}

/// Refresh token row kept by the identity provider (hash only)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRow {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// On-disk shape of an [`AuthSession`]
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PersistedSession {
    pub version: u32,
    pub subject: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

impl PersistedSession {
    pub const VERSION: u32 = 1;
}

impl From<&AuthSession> for PersistedSession {
    fn from(session: &AuthSession) -> Self {
        Self {
            version: Self::VERSION,
            subject: session.record.subject,
            issued_at: session.record.issued_at,
            expires_at: session.record.expires_at,
            access_token: session.record.access_token.expose_secret().clone(),
            refresh_token: session.record.refresh_token.expose_secret().clone(),
            user: session.user.clone(),
        }
    }
}

impl From<PersistedSession> for AuthSession {
    fn from(p: PersistedSession) -> Self {
        Self {
            record: SessionRecord {
                subject: p.subject,
                issued_at: p.issued_at,
                expires_at: p.expires_at,
                access_token: Secret::new(p.access_token),
                refresh_token: Secret::new(p.refresh_token),
            },
            user: p.user,
        }
    }
}
