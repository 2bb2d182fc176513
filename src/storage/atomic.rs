use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::StorageError;

/// 原子写入 JSON 文件
///
/// 临时文件 + 同步 + 重命名，中途中断时目标文件保持旧内容。
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(value).map_err(|e| StorageError::serialize(path, e))?;

    let temp_path = path.with_extension("json.tmp");
    let mut file = File::create(&temp_path).map_err(|e| StorageError::io(&temp_path, e))?;
    file.write_all(json.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| StorageError::io(&temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StorageError::io(path, e)
    })
}

/// 删除文件；文件不存在不算错误
pub fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}
