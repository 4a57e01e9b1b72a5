//! 会话生命周期控制器
//! 启动时走本地快速通道，后台向身份服务确认会话，并在过期前主动刷新

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use validator::Validate;

use super::{
    lock::{AuthAction, AuthActionLock},
    sign_out::SignOutCoordinator,
    state::{self, AuthState, AuthStateObserver, AuthStateWriter, LifecyclePhase},
    store::SessionStore,
};
use crate::{
    error::AppError,
    identity::IdentityProvider,
    models::{auth::SignInRequest, session::AuthSession, user::UserProfile},
    services::PermissionResolver,
};

/// 控制器依赖
pub struct SessionLifecycleDeps {
    /// 会话存储的所有权交给控制器，其他组件无法直接写入
    pub store: SessionStore,
    pub identity: Arc<dyn IdentityProvider>,
    pub permissions: Arc<PermissionResolver>,
}

/// 控制器与登出协调器共享的内部状态
pub(crate) struct SessionCore {
    pub(crate) store: SessionStore,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) permissions: Arc<PermissionResolver>,
    pub(crate) state: AuthStateWriter,
    pub(crate) lock: AuthActionLock,
    refresh_in_flight: AtomicBool,
}

/// 启动结果
pub struct StartOutcome {
    pub phase: LifecyclePhase,
    /// 后台确认/刷新任务
    pub background: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Refreshed,
    /// 已有刷新在进行，本次请求被合并
    Coalesced,
}

/// 刷新进行中标记，drop 时清除
struct RefreshClaim<'a>(&'a AtomicBool);

impl Drop for RefreshClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct SessionLifecycleController {
    core: Arc<SessionCore>,
}

impl SessionLifecycleController {
    pub fn new(deps: SessionLifecycleDeps) -> Self {
        let (writer, _observer) = state::channel();
        Self {
            core: Arc::new(SessionCore {
                store: deps.store,
                identity: deps.identity,
                permissions: deps.permissions,
                state: writer,
                lock: AuthActionLock::new(),
                refresh_in_flight: AtomicBool::new(false),
            }),
        }
    }

    pub fn observer(&self) -> AuthStateObserver {
        self.core.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthState {
        self.core.state.snapshot()
    }

    pub fn permissions(&self) -> &Arc<PermissionResolver> {
        &self.core.permissions
    }

    pub fn sign_out_coordinator(&self) -> SignOutCoordinator {
        SignOutCoordinator::new(self.core.clone())
    }

    pub fn has_stored_session(&self) -> bool {
        self.core.store.has_session()
    }

    /// 启动：本地会话有效时立即进入快速通道，否则直接进入未登录状态
    pub fn start(&self) -> StartOutcome {
        let current = self.core.state.snapshot().phase;
        if current != LifecyclePhase::Uninitialized {
            return StartOutcome {
                phase: current,
                background: None,
            };
        }

        let store = &self.core.store;
        let cached = if store.has_session() && store.is_valid() {
            store.load()
        } else {
            None
        };

        let Some(session) = cached else {
            self.core.state.sign_out();
            tracing::info!("No valid stored session, starting unauthenticated");
            return StartOutcome {
                phase: LifecyclePhase::Unauthenticated,
                background: None,
            };
        };

        self.core.permissions.set_role(Some(session.user.role));
        self.core.state.sign_in(
            LifecyclePhase::FastPathAuthenticated,
            session.user.clone(),
            session.record.expires_at,
        );

        tracing::info!(
            user_id = %session.user.id,
            role = %session.user.role,
            expires_at = %session.record.expires_at,
            "Restored session from store, revalidating in background"
        );

        let controller = self.clone();
        let background = tokio::spawn(async move {
            if let Err(e) = controller.core.permissions.ensure_loaded().await {
                tracing::warn!(error = %e, "Failed to load role permissions");
            }
            let _ = controller.confirm_session().await;
            if let Some(refresh) = controller.schedule_refresh_if_due() {
                let _ = refresh.await;
            }
        });

        StartOutcome {
            phase: LifecyclePhase::FastPathAuthenticated,
            background: Some(background),
        }
    }

    /// 向身份服务确认本地会话。失败时保留快速通道状态，只记录错误
    pub async fn confirm_session(&self) -> Result<(), AppError> {
        let core = &self.core;
        if !core.state.snapshot().phase.is_signed_in() {
            return Err(AppError::SessionExpired);
        }
        let Some(session) = core.store.load() else {
            return Err(AppError::SessionExpired);
        };

        core.state.set_phase(LifecyclePhase::Revalidating);

        match core.identity.get_session(&session.record).await {
            Ok(confirmed) => {
                // 确认期间已登出或重新登录，丢弃本次结果
                if core.state.snapshot().phase != LifecyclePhase::Revalidating {
                    return Ok(());
                }
                core.permissions.set_role(Some(confirmed.user.role));
                core.state.sign_in(
                    LifecyclePhase::Authenticated,
                    confirmed.user.clone(),
                    confirmed.record.expires_at,
                );
                tracing::info!(user_id = %confirmed.user.id, "Session confirmed");
                Ok(())
            }
            Err(e) => {
                // 确认期间已登出或重新登录，不改写新状态
                if core.state.snapshot().phase == LifecyclePhase::Revalidating {
                    core.state.set_phase(LifecyclePhase::FastPathAuthenticated);
                    core.state.set_error(e.user_message());
                }
                tracing::warn!(error = %e, "Session confirmation failed, keeping cached session");
                Err(e)
            }
        }
    }

    /// 登录
    pub async fn sign_in(&self, req: SignInRequest) -> Result<UserProfile, AppError> {
        req.validate()?;
        let core = &self.core;
        let _permit = core.lock.try_acquire(AuthAction::SignIn)?;

        let session = match core.identity.sign_in(&req.email, &req.password).await {
            Ok(session) => session,
            Err(e) => {
                core.state.set_error(e.user_message());
                metrics::counter!("auth_sign_in_total", "outcome" => "failure").increment(1);
                tracing::warn!(error = %e, "Sign-in failed");
                return Err(e);
            }
        };

        self.establish(&session)?;

        if let Err(e) = core.permissions.ensure_loaded().await {
            tracing::warn!(error = %e, "Failed to load role permissions after sign-in");
        }

        metrics::counter!("auth_sign_in_total", "outcome" => "success").increment(1);
        tracing::info!(user_id = %session.user.id, role = %session.user.role, "Signed in");

        Ok(session.user)
    }

    /// 刷新会话；已有刷新在进行时直接合并
    pub async fn refresh(&self) -> Result<RefreshOutcome, AppError> {
        if !self.claim_refresh() {
            tracing::debug!("Refresh already in flight, coalescing");
            return Ok(RefreshOutcome::Coalesced);
        }
        let _claim = RefreshClaim(&self.core.refresh_in_flight);
        self.run_refresh().await
    }

    /// 需要刷新时启动一次后台刷新
    pub fn schedule_refresh_if_due(&self) -> Option<JoinHandle<()>> {
        if !self.core.state.snapshot().phase.is_signed_in() || !self.core.store.should_refresh() {
            return None;
        }
        if !self.claim_refresh() {
            return None;
        }

        let controller = self.clone();
        Some(tokio::spawn(async move {
            let _claim = RefreshClaim(&controller.core.refresh_in_flight);
            match controller.run_refresh().await {
                Ok(_) => tracing::debug!("Scheduled refresh completed"),
                Err(e) => tracing::warn!(error = %e, "Scheduled refresh failed"),
            }
        }))
    }

    /// 检测一次过期：已过期则清理本地会话，临近过期则安排刷新
    pub fn check_expiry(&self) -> Option<JoinHandle<()>> {
        if !self.core.state.snapshot().phase.is_signed_in() {
            return None;
        }

        if !self.core.store.is_valid() {
            match self.core.lock.try_acquire(AuthAction::Refresh) {
                Ok(_permit) => {
                    tracing::info!("Stored session expired");
                    self.expire_locally();
                }
                Err(_) => tracing::debug!("Auth action in flight, deferring expiry check"),
            }
            return None;
        }

        self.schedule_refresh_if_due()
    }

    pub fn spawn_expiry_monitor(&self, every: Duration) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                controller.check_expiry();
            }
        })
    }

    fn claim_refresh(&self) -> bool {
        self.core
            .refresh_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    async fn run_refresh(&self) -> Result<RefreshOutcome, AppError> {
        let core = &self.core;
        let _permit = core.lock.try_acquire(AuthAction::Refresh)?;

        let Some(current) = core.store.load() else {
            if core.state.snapshot().phase.is_signed_in() {
                self.expire_locally();
            }
            return Err(AppError::SessionExpired);
        };

        match core.identity.refresh_session(&current.record).await {
            Ok(next) => {
                self.establish(&next)?;
                metrics::counter!("auth_refresh_total", "outcome" => "success").increment(1);
                tracing::info!(expires_at = %next.record.expires_at, "Session refreshed");
                Ok(RefreshOutcome::Refreshed)
            }
            Err(e) => {
                metrics::counter!("auth_refresh_total", "outcome" => "failure").increment(1);
                core.state.set_error(e.user_message());
                tracing::warn!(error = %e, "Session refresh failed");
                if !core.store.is_valid() {
                    self.expire_locally();
                }
                Err(e)
            }
        }
    }

    /// 持久化新会话并进入已认证状态（调用方须持有操作许可）
    fn establish(&self, session: &AuthSession) -> Result<(), AppError> {
        let core = &self.core;
        if let Err(e) = core.store.write(session) {
            core.state.set_error("Failed to persist session");
            tracing::error!(error = %e, "Failed to write session record");
            return Err(e.into());
        }
        core.permissions.set_role(Some(session.user.role));
        core.state.sign_in(
            LifecyclePhase::Authenticated,
            session.user.clone(),
            session.record.expires_at,
        );
        Ok(())
    }

    /// 本地会话失效：清理存储并回到未登录状态（调用方须持有操作许可）
    fn expire_locally(&self) {
        let core = &self.core;
        if let Err(e) = core.store.clear() {
            tracing::error!(error = %e, "Failed to clear expired session record");
        }
        core.permissions.set_role(None);
        core.state.sign_out();
        core.state.set_error(AppError::SessionExpired.user_message());
    }
}
