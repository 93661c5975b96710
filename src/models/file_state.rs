//! 单个文件的生命周期状态与输入类型

use super::processor::ProcessingStatus;
use super::status::FileStatus;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 每个被跟踪文件一份，以文件名为唯一键
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLifecycleState {
    pub name: String,
    pub upload_progress: u8,
    pub status: FileStatus,
    pub status_message: String,
    pub processing_status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
}

impl FileLifecycleState {
    pub fn new(name: impl Into<String>, status: FileStatus, upload_progress: u8) -> Self {
        Self {
            name: name.into(),
            upload_progress: upload_progress.min(100),
            status,
            status_message: status.message().to_string(),
            processing_status: ProcessingStatus::default(),
            error_code: None,
        }
    }

    /// 新上传：pending，进度 0
    pub fn pending(name: impl Into<String>) -> Self {
        Self::new(name, FileStatus::Pending, 0)
    }

    /// 已存在的附件：字节已在服务端，进度直接为 100
    pub fn loading(name: impl Into<String>) -> Self {
        Self::new(name, FileStatus::Loading, 100)
    }

    /// 状态与文案一起更新，保证文案只由状态决定
    pub(crate) fn set_status(&mut self, status: FileStatus) {
        self.status = status;
        self.status_message = status.message().to_string();
    }
}

/// 待上传的文件
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub size: u64,
    pub content: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len() as u64,
            content,
        }
    }
}

/// 已上传附件的引用（来自业务实体）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl AttachmentRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
        }
    }

    /// id 和 name 都非空时返回 (id, name)
    pub fn resolved(&self) -> Option<(&str, &str)> {
        match (self.id.as_deref(), self.name.as_deref()) {
            (Some(id), Some(name)) if !id.is_empty() && !name.is_empty() => Some((id, name)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_follows_status() {
        let mut state = FileLifecycleState::pending("a.pdf");
        assert_eq!(state.status_message, FileStatus::Pending.message());
        state.set_status(FileStatus::Processing);
        assert_eq!(state.status_message, FileStatus::Processing.message());
    }

    #[test]
    fn test_attachment_ref_resolution() {
        assert_eq!(AttachmentRef::new("1", "a.pdf").resolved(), Some(("1", "a.pdf")));
        assert_eq!(
            AttachmentRef { id: None, name: Some("a.pdf".into()) }.resolved(),
            None
        );
        assert_eq!(
            AttachmentRef { id: Some("1".into()), name: Some(String::new()) }.resolved(),
            None
        );
    }

    #[test]
    fn test_upload_file_size_from_content() {
        let file = UploadFile::new("a.pdf", vec![0u8; 42]);
        assert_eq!(file.size, 42);
    }
}
