//! 错误分类 - 业务能力层
//!
//! 纯函数：HTTP 状态码 → 终态。上传与处理两条路径共用

use crate::error::AppError;
use crate::models::{FileStatus, ProcessingStatus, ProcessorResult};
use crate::store::Transition;

/// 分类结果
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: FileStatus,
    pub processing_status: ProcessingStatus,
    /// 只有网络类错误才有
    pub error_code: Option<u16>,
}

impl Classification {
    fn new(status: FileStatus, processors: Vec<ProcessorResult>, error_code: Option<u16>) -> Self {
        Self {
            status,
            processing_status: ProcessingStatus {
                failed: true,
                processors,
            },
            error_code,
        }
    }

    /// 未知错误：通用 failure，处理器列表为空
    pub fn generic(error_code: Option<u16>) -> Self {
        Self::new(FileStatus::Failure, Vec::new(), error_code)
    }

    pub fn into_transition(self) -> Transition {
        Transition::to(self.status)
            .with_processing_status(self.processing_status)
            .with_error_code(self.error_code)
    }
}

/// 按状态码分类
///
/// - 415 → unsupportedType
/// - 410 / 403 → failedAntivirusCheck，并合成一条杀毒处理器结果
/// - 其他 → failure
pub fn classify(code: u16) -> Classification {
    match code {
        415 => Classification::new(FileStatus::UnsupportedType, Vec::new(), Some(code)),
        410 | 403 => Classification::new(
            FileStatus::FailedAntivirusCheck,
            vec![ProcessorResult::quarantined()],
            Some(code),
        ),
        _ => Classification::generic(Some(code)),
    }
}

/// 按错误分类；没有状态码的错误（网络中断、解析失败等）归为 failure
pub fn classify_error(err: &AppError) -> Classification {
    match err.status_code() {
        Some(code) => classify(code),
        None => Classification::generic(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ANTIVIRUS_PROCESSOR_ID, QUARANTINE_MESSAGE};

    #[test]
    fn test_unsupported_media_type() {
        let c = classify(415);
        assert_eq!(c.status, FileStatus::UnsupportedType);
        assert!(c.processing_status.processors.is_empty());
        assert_eq!(c.error_code, Some(415));
    }

    #[test]
    fn test_antivirus_codes_share_classification() {
        for code in [410, 403] {
            let c = classify(code);
            assert_eq!(c.status, FileStatus::FailedAntivirusCheck);
            assert_eq!(c.processing_status.processors.len(), 1);
            let card = &c.processing_status.processors[0];
            assert_eq!(card.processor_id, ANTIVIRUS_PROCESSOR_ID);
            assert_eq!(card.result["message"], QUARANTINE_MESSAGE);
        }
        assert_eq!(classify(410).status, classify(403).status);
    }

    #[test]
    fn test_everything_else_is_generic_failure() {
        for code in [999, 500, 404, 401, 0] {
            let c = classify(code);
            assert_eq!(c.status, FileStatus::Failure);
            assert!(c.processing_status.processors.is_empty());
        }
    }

    #[test]
    fn test_classify_error_without_status() {
        let c = classify_error(&AppError::Other("连接被重置".into()));
        assert_eq!(c, Classification::generic(None));

        let c = classify_error(&AppError::status("/documents", 415, None));
        assert_eq!(c.status, FileStatus::UnsupportedType);
    }
}
