//! 认证操作互斥锁
//! 登录、登出、刷新共享同一个单许可信号量；冲突时立即拒绝，不排队

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::AppError;

/// 受保护的认证操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthAction {
    SignIn,
    SignOut,
    Refresh,
}

impl AuthAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthAction::SignIn => "sign_in",
            AuthAction::SignOut => "sign_out",
            AuthAction::Refresh => "refresh",
        }
    }
}

impl fmt::Display for AuthAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单许可锁
#[derive(Clone)]
pub struct AuthActionLock {
    semaphore: Arc<Semaphore>,
    holder: Arc<Mutex<Option<AuthAction>>>,
}

/// 持有期间其他认证操作都会被拒绝；drop 时释放
pub struct AuthActionPermit {
    action: AuthAction,
    holder: Arc<Mutex<Option<AuthAction>>>,
    _permit: OwnedSemaphorePermit,
}

impl AuthActionPermit {
    pub fn action(&self) -> AuthAction {
        self.action
    }
}

impl Drop for AuthActionPermit {
    fn drop(&mut self) {
        if let Ok(mut holder) = self.holder.lock() {
            *holder = None;
        }
    }
}

impl AuthActionLock {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            holder: Arc::new(Mutex::new(None)),
        }
    }

    /// 非阻塞获取许可
    pub fn try_acquire(&self, action: AuthAction) -> Result<AuthActionPermit, AppError> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => {
                if let Ok(mut holder) = self.holder.lock() {
                    *holder = Some(action);
                }
                Ok(AuthActionPermit {
                    action,
                    holder: self.holder.clone(),
                    _permit: permit,
                })
            }
            Err(TryAcquireError::NoPermits) => {
                let running = self.in_flight().unwrap_or(action);
                tracing::warn!(
                    requested = %action,
                    running = %running,
                    "Authentication action rejected, another one is in progress"
                );
                Err(AppError::ActionInProgress(running))
            }
            Err(TryAcquireError::Closed) => {
                Err(AppError::Internal("auth action lock closed".to_string()))
            }
        }
    }

    /// 当前正在执行的操作
    pub fn in_flight(&self) -> Option<AuthAction> {
        self.holder.lock().ok().and_then(|holder| *holder)
    }
}

impl Default for AuthActionLock {
    fn default() -> Self {
        Self::new()
    }
}
