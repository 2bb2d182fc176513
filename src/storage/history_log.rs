//! 历史日志
//!
//! 只追加：条目写入后不会被修改，唯一的删除方式是 `clear()`。
//! `list()` 读取失败时返回空列表（非关键读取，fail closed）。

use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::models::HistoryEntry;
use crate::storage::atomic::{remove_if_exists, write_json_atomic};

/// 历史日志能力
pub trait HistoryLog: Send + Sync {
    /// 追加一条记录，返回分配的 id
    fn append(&self, entry: HistoryEntry) -> Result<u64, StorageError>;

    /// 全部记录，最新的在前
    fn list(&self) -> Vec<HistoryEntry>;

    fn clear(&self) -> Result<(), StorageError>;

    fn get(&self, id: u64) -> Option<HistoryEntry> {
        self.list().into_iter().find(|e| e.id == Some(id))
    }
}

/// 分配 id 并插入；按插入顺序存储
fn insert(entries: &mut Vec<HistoryEntry>, mut entry: HistoryEntry) -> u64 {
    let id = entries.iter().filter_map(|e| e.id).max().map_or(1, |max| max + 1);
    entry.id = Some(id);
    entries.push(entry);
    id
}

fn newest_first(mut entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
    entries.reverse();
    entries
}

/// 基于 JSON 文件的历史日志
pub struct FileHistoryLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileHistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// 按存储顺序（旧 → 新）读取
    fn read_all(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };
        serde_json::from_str(&content).map_err(|e| StorageError::serialize(&self.path, e))
    }
}

impl HistoryLog for FileHistoryLog {
    fn append(&self, entry: HistoryEntry) -> Result<u64, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        // 已损坏的历史文件不能被静默覆盖
        let mut entries = self.read_all()?;
        let id = insert(&mut entries, entry);
        write_json_atomic(&self.path, &entries)?;

        debug!("历史记录已追加: #{} -> {}", id, self.path.display());
        Ok(id)
    }

    fn list(&self) -> Vec<HistoryEntry> {
        match self.read_all() {
            Ok(entries) => newest_first(entries),
            Err(e) => {
                warn!("⚠️ 无法读取历史记录: {}", e);
                Vec::new()
            }
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        remove_if_exists(&self.path)
    }
}

/// 内存历史日志
#[derive(Default)]
pub struct MemoryHistoryLog {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryLog for MemoryHistoryLog {
    fn append(&self, entry: HistoryEntry) -> Result<u64, StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(insert(&mut entries, entry))
    }

    fn list(&self) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        newest_first(entries.clone())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }
}
