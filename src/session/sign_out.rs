//! 登出协调器
//! 与登录/刷新共享操作许可，同一时间最多一个认证操作在执行

use std::sync::Arc;
use uuid::Uuid;

use super::lifecycle::SessionCore;
use super::lock::AuthAction;
use crate::error::AppError;

/// 登出结果，传给导航回调
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOut {
    /// 登出时所在页面
    pub previous_path: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct SignOutCoordinator {
    core: Arc<SessionCore>,
}

impl SignOutCoordinator {
    pub(crate) fn new(core: Arc<SessionCore>) -> Self {
        Self { core }
    }

    /// 登出
    pub async fn sign_out(&self, current_path: Option<&str>) -> Result<SignedOut, AppError> {
        self.run(current_path).await
    }

    /// 登出成功后调用导航回调；失败时不调用
    pub async fn sign_out_and_navigate<F>(
        &self,
        current_path: Option<&str>,
        navigate: F,
    ) -> Result<SignedOut, AppError>
    where
        F: FnOnce(&SignedOut) + Send,
    {
        let signed_out = self.run(current_path).await?;
        navigate(&signed_out);
        Ok(signed_out)
    }

    async fn run(&self, current_path: Option<&str>) -> Result<SignedOut, AppError> {
        let core = &self.core;
        let _permit = core.lock.try_acquire(AuthAction::SignOut)?;

        core.state.set_logging_out(true);

        let stored = core.store.load();
        if let Some(session) = &stored {
            if let Err(e) = core.identity.sign_out(&session.record).await {
                // 本地状态保持不变，重试是安全的
                core.state.set_logging_out(false);
                core.state.set_error(e.user_message());
                metrics::counter!("auth_sign_out_total", "outcome" => "failure").increment(1);
                tracing::warn!(error = %e, "Remote sign-out failed, local session kept");
                return Err(e);
            }
        }

        if let Err(e) = core.store.clear() {
            core.state.set_logging_out(false);
            core.state.set_error("Failed to clear session");
            tracing::error!(error = %e, "Failed to clear session record");
            return Err(e.into());
        }

        let user_id = stored
            .map(|session| session.user.id)
            .or_else(|| core.state.snapshot().user.map(|user| user.id));

        core.permissions.set_role(None);
        core.state.sign_out();

        metrics::counter!("auth_sign_out_total", "outcome" => "success").increment(1);
        tracing::info!(
            user_id = ?user_id,
            previous_path = ?current_path,
            "Signed out"
        );

        Ok(SignedOut {
            previous_path: current_path.map(str::to_string),
            user_id,
        })
    }
}
