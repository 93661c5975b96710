//! 服务端处理器相关的数据结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// 杀毒处理器 ID
pub const ANTIVIRUS_PROCESSOR_ID: &str = "antivirus-scanner";

/// 隔离提示文案（410 / 403 时合成）
pub const QUARANTINE_MESSAGE: &str = "Malware detected. Document has been quarantined";

/// 单个处理器的执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessorState {
    Pending,
    Complete,
    Unprocessable,
}

impl ProcessorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessorState::Complete | ProcessorState::Unprocessable)
    }
}

/// 某个处理器对文档的评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorResult {
    pub processor_id: String,
    pub status: ProcessorState,
    /// 处理器自定义负载
    #[serde(default)]
    pub result: JsonValue,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProcessorResult {
    pub fn new(processor_id: impl Into<String>, status: ProcessorState, result: JsonValue) -> Self {
        Self {
            processor_id: processor_id.into(),
            status,
            result,
            timestamp: Some(Utc::now()),
        }
    }

    /// 服务端没有返回真实负载时，为隔离结果合成一个杀毒卡片
    pub fn quarantined() -> Self {
        Self::new(
            ANTIVIRUS_PROCESSOR_ID,
            ProcessorState::Complete,
            json!({ "error": true, "message": QUARANTINE_MESSAGE }),
        )
    }

    pub fn is_antivirus(&self) -> bool {
        self.processor_id.starts_with("antivirus")
    }

    /// 结果是否需要向用户展示错误
    ///
    /// 负载里 `error: true`，或处理器判定文档无法处理
    pub fn is_error(&self) -> bool {
        self.status == ProcessorState::Unprocessable
            || self
                .result
                .get("error")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
    }
}

/// 文件的处理状态汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatus {
    pub failed: bool,
    pub processors: Vec<ProcessorResult>,
}

impl ProcessingStatus {
    /// 根据处理器结果计算：存在错误结果即失败
    pub fn from_results(processors: Vec<ProcessorResult>) -> Self {
        let failed = processors.iter().any(|p| p.is_error());
        Self { failed, processors }
    }
}

/// 提交处理后服务端返回的处理器列表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSubmission {
    #[serde(default)]
    pub processors: Vec<String>,
}

/// 已持久化的上传文档引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
}

impl DocumentRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}
