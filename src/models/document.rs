use std::path::Path;
use tokio::fs;

use crate::error::PipelineError;

pub const MIME_TEXT: &str = "text/plain";

/// 上传的文档
#[derive(Debug, Clone)]
pub struct Document {
    /// 文件名（仅用于日志）
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// 从磁盘读取文档，根据扩展名推断 MIME 类型
    pub async fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let bytes = fs::read(path).await.map_err(|e| {
            PipelineError::Extraction(format!("无法读取文件 {}: {}", path.display(), e))
        })?;

        if bytes.is_empty() {
            return Err(PipelineError::Extraction(format!(
                "文件为空: {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        Ok(Self::new(name, mime_from_path(path), bytes))
    }

    pub fn is_text(&self) -> bool {
        self.mime_type == MIME_TEXT
    }
}

fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());

    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("txt") | Some("md") => MIME_TEXT,
        _ => "application/octet-stream",
    }
}
