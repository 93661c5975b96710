//! 文件状态词汇表
//!
//! 对调用方暴露的字符串常量与 `FileStatus` 一一对应

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 单个文件的生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileStatus {
    /// 已存在的附件，正在拉取内容
    Loading,
    /// 正在上传
    Pending,
    /// 上传完成，服务端处理中（杀毒 / 内容处理）
    Processing,
    Success,
    Failure,
    /// HTTP 415
    UnsupportedType,
    /// HTTP 410 / 403
    FailedAntivirusCheck,
    /// 客户端预检，从未发送到服务端
    SizeExceeded,
}

impl FileStatus {
    pub const ALL: [FileStatus; 8] = [
        FileStatus::Loading,
        FileStatus::Pending,
        FileStatus::Processing,
        FileStatus::Success,
        FileStatus::Failure,
        FileStatus::UnsupportedType,
        FileStatus::FailedAntivirusCheck,
        FileStatus::SizeExceeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Loading => "loading",
            FileStatus::Pending => "pending",
            FileStatus::Processing => "processing",
            FileStatus::Success => "success",
            FileStatus::Failure => "failure",
            FileStatus::UnsupportedType => "unsupportedType",
            FileStatus::FailedAntivirusCheck => "failedAntivirusCheck",
            FileStatus::SizeExceeded => "sizeExceeded",
        }
    }

    /// 面向用户的提示文案，只由状态决定
    pub fn message(&self) -> &'static str {
        match self {
            FileStatus::Loading => "Loading document",
            FileStatus::Pending => "Uploading",
            FileStatus::Processing => "Scanning document",
            FileStatus::Success => "Upload complete",
            FileStatus::Failure => "Upload failed. Please try again",
            FileStatus::UnsupportedType => "File type is not supported",
            FileStatus::FailedAntivirusCheck => "Document failed the antivirus check",
            FileStatus::SizeExceeded => "File exceeds the maximum upload size",
        }
    }

    /// 计入 error_count 的状态
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FileStatus::Failure
                | FileStatus::UnsupportedType
                | FileStatus::FailedAntivirusCheck
                | FileStatus::SizeExceeded
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == FileStatus::Success || self.is_failure()
    }

    /// 状态机的合法边
    ///
    /// 终态之后不允许任何迁移，只能移除后重新创建。
    /// sizeExceeded 只在创建条目时写入（预检），不是任何状态的后继。
    pub fn can_transition_to(&self, next: FileStatus) -> bool {
        if self.is_terminal() || next == FileStatus::SizeExceeded {
            return false;
        }
        if next.is_failure() {
            return true;
        }
        match (self, next) {
            (FileStatus::Pending, FileStatus::Processing) => true,
            (FileStatus::Loading, FileStatus::Processing) => true,
            (FileStatus::Processing, FileStatus::Processing) => true,
            (FileStatus::Processing, FileStatus::Success) => true,
            _ => false,
        }
    }
}

impl Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_strings() {
        let names: Vec<&str> = FileStatus::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "loading",
                "pending",
                "processing",
                "success",
                "failure",
                "unsupportedType",
                "failedAntivirusCheck",
                "sizeExceeded"
            ]
        );
        // serde 与字符串常量保持一致
        for status in FileStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        for terminal in FileStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for next in FileStatus::ALL {
                assert!(!terminal.can_transition_to(next), "{} -> {}", terminal, next);
            }
        }
    }

    #[test]
    fn test_documented_edges() {
        use FileStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Loading.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Success));
        assert!(Processing.can_transition_to(Failure));
        assert!(Pending.can_transition_to(UnsupportedType));
        assert!(Loading.can_transition_to(FailedAntivirusCheck));

        assert!(!Pending.can_transition_to(Success));
        assert!(!Loading.can_transition_to(Pending));
        assert!(!Processing.can_transition_to(Pending));
    }

    #[test]
    fn test_size_exceeded_is_preflight_only() {
        for from in FileStatus::ALL {
            assert!(!from.can_transition_to(FileStatus::SizeExceeded), "{} -> sizeExceeded", from);
        }
    }
}
