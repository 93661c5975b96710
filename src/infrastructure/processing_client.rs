//! 处理服务接口 - 基础设施层
//!
//! 编排层只依赖这个 trait，不关心具体传输协议

use crate::error::AppResult;
use crate::models::{DocumentRef, ProcessingSubmission, ProcessorResult, UploadFile};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// 上传流中的单个事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// 上传进度（0-100）
    Progress(u8),
    /// 上传完成，服务端已持久化
    Completed(DocumentRef),
}

/// 上传事件流：若干 Progress，最后一个 Completed
pub type UploadStream = BoxStream<'static, AppResult<UploadEvent>>;

/// 处理服务
///
/// 职责：
/// - 上传字节、拉取字节
/// - 启动服务端处理、查询处理状态
/// - 不认识文件状态 / 计数器
#[async_trait]
pub trait ProcessingClient: Send + Sync {
    /// 上传文件，返回进度事件流
    fn upload(&self, file: &UploadFile) -> UploadStream;

    /// 拉取已存储文档的原始字节
    async fn get_bytes(&self, document_id: &str) -> AppResult<Bytes>;

    /// 提交文档进行服务端处理，返回本次参与的处理器 ID
    async fn start_processing(
        &self,
        context_id: &str,
        document_id: &str,
        path: &str,
    ) -> AppResult<ProcessingSubmission>;

    /// 查询文档当前的处理器结果
    async fn get_processing_status(&self, document_id: &str) -> AppResult<Vec<ProcessorResult>>;

    /// 用于日志的名称
    fn name(&self) -> &str;
}
