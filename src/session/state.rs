//! Process-wide authentication state.
//!
//! One [`AuthStateWriter`] feeds any number of [`AuthStateObserver`]s over a
//! `tokio::sync::watch` channel. Writer mutators are crate-private, so only
//! the lifecycle controller and the sign-out coordinator can change state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::models::user::UserProfile;

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    #[default]
    Uninitialized,
    FastPathAuthenticated,
    Revalidating,
    Authenticated,
    Unauthenticated,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Uninitialized => "uninitialized",
            LifecyclePhase::FastPathAuthenticated => "fast_path_authenticated",
            LifecyclePhase::Revalidating => "revalidating",
            LifecyclePhase::Authenticated => "authenticated",
            LifecyclePhase::Unauthenticated => "unauthenticated",
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(
            self,
            LifecyclePhase::FastPathAuthenticated
                | LifecyclePhase::Revalidating
                | LifecyclePhase::Authenticated
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthState {
    pub phase: LifecyclePhase,
    pub is_authenticated: bool,
    pub loading: bool,
    pub is_logging_out: bool,
    pub last_error: Option<String>,
    pub user: Option<UserProfile>,
    pub session_expires_at: Option<DateTime<Utc>>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            phase: LifecyclePhase::Uninitialized,
            is_authenticated: false,
            loading: true,
            is_logging_out: false,
            last_error: None,
            user: None,
            session_expires_at: None,
        }
    }
}

impl AuthState {
    /// Authenticated and the session has not run out since the last update
    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        self.is_authenticated
            && self.user.is_some()
            && self.session_expires_at.is_some_and(|exp| exp > now)
    }
}

pub(crate) struct AuthStateWriter {
    tx: watch::Sender<AuthState>,
}

/// Read-only view of the authentication state
#[derive(Clone)]
pub struct AuthStateObserver {
    rx: watch::Receiver<AuthState>,
}

pub(crate) fn channel() -> (AuthStateWriter, AuthStateObserver) {
    let (tx, rx) = watch::channel(AuthState::default());
    (AuthStateWriter { tx }, AuthStateObserver { rx })
}

impl AuthStateWriter {
    pub(crate) fn subscribe(&self) -> AuthStateObserver {
        AuthStateObserver {
            rx: self.tx.subscribe(),
        }
    }

    pub(crate) fn snapshot(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Enter a signed-in phase. The authenticated flag is derived from the
    /// expiry so the state can never claim a dead session.
    pub(crate) fn sign_in(
        &self,
        phase: LifecyclePhase,
        user: UserProfile,
        expires_at: DateTime<Utc>,
    ) {
        let live = expires_at > Utc::now();
        self.tx.send_modify(|state| {
            state.phase = if live { phase } else { LifecyclePhase::Unauthenticated };
            state.is_authenticated = live;
            state.loading = false;
            state.last_error = None;
            state.user = live.then_some(user);
            state.session_expires_at = live.then_some(expires_at);
        });
    }

    pub(crate) fn set_phase(&self, phase: LifecyclePhase) {
        self.tx.send_modify(|state| state.phase = phase);
    }

    pub(crate) fn sign_out(&self) {
        self.tx.send_modify(|state| {
            state.phase = LifecyclePhase::Unauthenticated;
            state.is_authenticated = false;
            state.loading = false;
            state.is_logging_out = false;
            state.user = None;
            state.session_expires_at = None;
        });
    }

    pub(crate) fn set_logging_out(&self, logging_out: bool) {
        self.tx.send_modify(|state| state.is_logging_out = logging_out);
    }

    pub(crate) fn set_error(&self, error: impl Into<String>) {
        let error = error.into();
        self.tx.send_modify(|state| state.last_error = Some(error));
    }
}

impl AuthStateObserver {
    pub fn snapshot(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    /// Wait for the next change. Returns false once the writer is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until `loading` has been released
    pub async fn settled(&mut self) -> AuthState {
        if let Ok(state) = self.rx.wait_for(|state| !state.loading).await {
            return state.clone();
        }
        self.snapshot()
    }
}
