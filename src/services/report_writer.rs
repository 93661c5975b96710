//! 失败报告写入服务 - 业务能力层
//!
//! 只负责"追加失败记录"能力，不关心流程

use crate::models::FileLifecycleState;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

/// 失败报告写入服务
///
/// 每个失败文件一行：文件名、状态、错误码、提示文案
pub struct ReportWriter {
    report_file_path: String,
}

impl ReportWriter {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            report_file_path: path.into(),
        }
    }

    /// 追加一条失败记录
    pub fn write(&self, state: &FileLifecycleState) -> Result<()> {
        debug!("写入失败报告: {} | {}", state.name, state.status);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.report_file_path)
            .with_context(|| format!("无法打开报告文件: {}", self.report_file_path))?;

        let code = state
            .error_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let line = format!(
            "文件 {} | 状态 {} | 错误码 {} | {}\n",
            state.name, state.status, code, state.status_message
        );

        file.write_all(line.as_bytes())?;

        Ok(())
    }
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::with_path("failed_uploads.txt")
    }
}
