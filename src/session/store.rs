//! 持久化会话存储
//! 会话记录以 JSON 形式保存在键值存储中；任何解析失败都按"无会话"处理

use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::models::{
    session::{AuthSession, PersistedSession},
    user::UserProfile,
};

/// 键值存储错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 持久化的字符串键值存储
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// 基于文件的键值存储：每个键对应目录下的一个文件
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // 先写临时文件再 rename，读者不会看到写了一半的内容
        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4()));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 内存键值存储（测试与临时运行）
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// 会话存储
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    refresh_lead: Duration,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>, refresh_lead: Duration) -> Self {
        Self {
            backend,
            key: key.into(),
            refresh_lead,
        }
    }

    pub fn refresh_lead(&self) -> Duration {
        self.refresh_lead
    }

    /// 存储中是否存在会话记录（不校验内容）
    pub fn has_session(&self) -> bool {
        match self.backend.get(&self.key) {
            Ok(value) => value.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session store");
                false
            }
        }
    }

    /// 会话存在且尚未过期
    pub fn is_valid(&self) -> bool {
        self.load()
            .is_some_and(|session| session.record.is_live_at(Utc::now()))
    }

    /// 读取缓存的用户资料
    pub fn read(&self) -> Option<UserProfile> {
        self.load().map(|session| session.user)
    }

    /// 读取完整会话；格式错误时返回 None
    pub fn load(&self) -> Option<AuthSession> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session store");
                return None;
            }
        };

        match serde_json::from_str::<PersistedSession>(&raw) {
            Ok(persisted) if persisted.version == PersistedSession::VERSION => {
                Some(persisted.into())
            }
            Ok(persisted) => {
                tracing::warn!(version = persisted.version, "Unsupported session record version");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed session record, treating as signed out");
                None
            }
        }
    }

    pub fn write(&self, session: &AuthSession) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&PersistedSession::from(session))?;
        self.backend.set(&self.key, &raw)?;
        tracing::debug!(
            subject = %session.record.subject,
            expires_at = %session.record.expires_at,
            "Session record written"
        );
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.backend.remove(&self.key)?;
        tracing::debug!("Session record cleared");
        Ok(())
    }

    /// 会话有效且将在提前量窗口内过期
    pub fn should_refresh(&self) -> bool {
        let now = Utc::now();
        self.load().is_some_and(|session| {
            session.record.is_live_at(now) && session.record.expires_within(now, self.refresh_lead)
        })
    }
}
