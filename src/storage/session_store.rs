//! 会话存储
//!
//! 只保存一个活动会话（固定键）。读取失败或内容损坏一律视为"没有会话"，
//! 写入是同步、原子的，保证调用顺序即落盘顺序。

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::models::BatchSessionState;
use crate::storage::atomic::{remove_if_exists, write_json_atomic};

/// 会话存储能力
pub trait SessionStore: Send + Sync {
    /// 覆盖保存当前会话
    fn save(&self, state: &BatchSessionState) -> Result<(), StorageError>;

    /// 读取上次保存的会话；不存在或无法解析时返回 `None`
    fn load(&self) -> Option<BatchSessionState>;

    /// 删除会话
    fn clear(&self) -> Result<(), StorageError>;
}

/// 基于 JSON 文件的会话存储
pub struct FileSessionStore {
    path: PathBuf,
    // 串行化写入，保证 save 之后紧跟的 clear 按调用顺序生效
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, state: &BatchSessionState) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        write_json_atomic(&self.path, state)?;
        debug!(
            "会话已保存: 游标 {}/{} -> {}",
            state.cursor,
            state.total(),
            self.path.display()
        );
        Ok(())
    }

    fn load(&self) -> Option<BatchSessionState> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("⚠️ 无法读取会话文件 {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<BatchSessionState>(&content) {
            Ok(state) if state.is_valid() => Some(state),
            Ok(state) => {
                warn!("⚠️ 会话数据不一致（题目编号不连续，共 {} 题），忽略", state.total());
                None
            }
            Err(e) => {
                warn!("⚠️ 会话文件已损坏，忽略: {}", e);
                None
            }
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        remove_if_exists(&self.path)?;
        debug!("会话已清除: {}", self.path.display());
        Ok(())
    }
}

/// 内存会话存储（保存序列化后的副本，与文件存储行为一致）
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入原始内容，用于模拟损坏的数据
    pub fn put_raw(&self, raw: impl Into<String>) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(raw.into());
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, state: &BatchSessionState) -> Result<(), StorageError> {
        let json =
            serde_json::to_string(state).map_err(|e| StorageError::serialize("<memory>", e))?;
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(json);
        Ok(())
    }

    fn load(&self) -> Option<BatchSessionState> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let raw = slot.as_deref()?;
        match serde_json::from_str::<BatchSessionState>(raw) {
            Ok(state) if state.is_valid() => Some(state),
            Ok(_) => None,
            Err(e) => {
                warn!("⚠️ 会话数据已损坏，忽略: {}", e);
                None
            }
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
