//! 单个文档的处理流程 - 流程层
//!
//! 核心职责：定义"一个文件"的完整流程
//!
//! 流程顺序：
//! 1. 上传（进度 → 文档引用）
//! 2. 提交处理 → 轮询到终态

use tracing::{debug, info};

use crate::models::{FileStatus, UploadFile};
use crate::orchestrator::{ProcessOutcome, UploadOrchestrator, UploadOutcome};
use crate::workflow::processing_ctx::ProcessingCtx;

/// 单个文件的最终结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowResult {
    /// 上传并处理成功
    Success,
    /// 以某个失败终态结束
    Failed(FileStatus),
    /// 同名文件已在跟踪中，或已是终态
    Skipped,
    /// 中途被移除
    Cancelled,
}

/// 文档处理流程
///
/// - 编排上传与处理的先后顺序
/// - 不持有任何状态，状态全部在编排器的 store 中
pub struct DocumentFlow {
    ctx: ProcessingCtx,
}

impl DocumentFlow {
    pub fn new(ctx: ProcessingCtx) -> Self {
        Self { ctx }
    }

    pub fn ctx(&self) -> &ProcessingCtx {
        &self.ctx
    }

    pub async fn run(&self, orchestrator: &UploadOrchestrator, file: UploadFile) -> FlowResult {
        let name = file.name.clone();
        debug!("[文件 {}] {} 开始处理流程", name, self.ctx);

        // ========== 流程 1: 上传 ==========
        let document = match orchestrator.upload_file(file).await {
            UploadOutcome::Uploaded(document) => document,
            UploadOutcome::Duplicate => return FlowResult::Skipped,
            UploadOutcome::Failed(status) => return FlowResult::Failed(status),
            UploadOutcome::Cancelled => return FlowResult::Cancelled,
        };

        // ========== 流程 2: 提交处理并轮询 ==========
        let outcome = orchestrator
            .process_file(&document, &name, &self.ctx.context_id, &self.ctx.path)
            .await;

        let result = match outcome {
            ProcessOutcome::Succeeded => FlowResult::Success,
            ProcessOutcome::Failed(status) => FlowResult::Failed(status),
            ProcessOutcome::Skipped => FlowResult::Skipped,
            ProcessOutcome::Cancelled => FlowResult::Cancelled,
        };
        info!("[文件 {}] 流程结束: {:?}", name, result);
        result
    }
}
