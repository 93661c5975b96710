//! 上传编排器 - 编排层核心
//!
//! ## 职责
//!
//! 对外暴露单文件操作（上传、提交处理、加载已有附件、查询、移除、预检失败），
//! 以及供表单使用的只读聚合信号。
//!
//! ## 设计特点
//!
//! - **每个文件一条独立的任务链**：上传 → 提交 → 轮询，互不影响
//! - **按文件名取消**：每个条目持有自己的 `CancellationToken`，移除即取消
//! - **错误不外抛**：所有失败都被分类后写入文件状态与 `has_error`
//! - **唯一写者**：只有本模块修改 `FileLifecycleStore`

use crate::error::{AppError, AppResult, ClientError};
use crate::infrastructure::{ProcessingClient, UploadEvent};
use crate::models::{
    AttachmentRef, DocumentRef, FileLifecycleState, FileStatus, ProcessingStatus, ProcessorResult,
    UploadFile,
};
use crate::services::{classify_error, poll_until_terminal, submit_with_retry, PollTarget, RetryPolicy};
use crate::store::{
    AggregateSignals, FileLifecycleStore, ProcessingClaim, StoreSnapshot, Transition,
};
use crate::utils::logging::truncate_text;
use bytes::Bytes;
use futures::future::join_all;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 编排器的时间参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// 处理状态轮询间隔
    pub poll_interval: Duration,
    /// 提交处理的重试策略
    pub submit_retry: RetryPolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
            submit_retry: RetryPolicy::default(),
        }
    }
}

/// 上传结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// 上传成功，返回已持久化的文档引用
    Uploaded(DocumentRef),
    /// 同名文件已在跟踪中，本次调用什么都没做
    Duplicate,
    /// 上传失败，已写入终态
    Failed(FileStatus),
    /// 上传过程中文件被移除
    Cancelled,
}

impl UploadOutcome {
    pub fn document(&self) -> Option<&DocumentRef> {
        match self {
            UploadOutcome::Uploaded(document) => Some(document),
            _ => None,
        }
    }
}

/// 处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Succeeded,
    Failed(FileStatus),
    /// 条目已是终态，没有再处理
    Skipped,
    /// 处理过程中文件被移除
    Cancelled,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        *self == ProcessOutcome::Succeeded
    }
}

/// 已标记为 loading、等待拉取内容的附件
struct PendingLoad {
    document_id: String,
    name: String,
    token: CancellationToken,
}

/// 上传编排器
///
/// 可廉价克隆，克隆体共享同一个 store 和 client
#[derive(Clone)]
pub struct UploadOrchestrator {
    client: Arc<dyn ProcessingClient>,
    store: Arc<FileLifecycleStore>,
    settings: OrchestratorSettings,
}

impl UploadOrchestrator {
    pub fn new(client: Arc<dyn ProcessingClient>, settings: OrchestratorSettings) -> Self {
        Self {
            client,
            store: Arc::new(FileLifecycleStore::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    // ========== 上传 ==========

    /// 上传单个文件
    ///
    /// 调用方需要事先拒绝超出大小限制的文件（见 `get_error_status`）。
    /// 同名文件已存在时直接返回 `Duplicate`。
    pub async fn upload_file(&self, file: UploadFile) -> UploadOutcome {
        let name = file.name.clone();
        let Some(token) = self.store.begin_upload(&name) else {
            debug!("[文件 {}] 同名文件已在跟踪中，忽略本次上传", name);
            return UploadOutcome::Duplicate;
        };

        info!("[文件 {}] 📤 开始上传 ({} 字节)", name, file.size);

        let outcome = match self.drive_upload(&file, &token).await {
            Ok(document) => self.complete_upload(&name, &token, document, file.content.clone()),
            Err(e) if e.is_cancelled() => {
                info!("[文件 {}] 上传已取消", name);
                UploadOutcome::Cancelled
            }
            Err(e) => match self.record_failure(&name, &token, &e) {
                Some(status) => UploadOutcome::Failed(status),
                None => UploadOutcome::Cancelled,
            },
        };

        self.store.finish_upload(&name, &token);
        outcome
    }

    /// 消费上传事件流，直到拿到文档引用
    async fn drive_upload(&self, file: &UploadFile, token: &CancellationToken) -> AppResult<DocumentRef> {
        let name = file.name.as_str();
        let mut events = self.client.upload(file);

        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(AppError::cancelled(name)),
                event = events.next() => event,
            };

            match event {
                Some(Ok(UploadEvent::Progress(progress))) => {
                    debug!("[文件 {}] 上传进度 {}%", name, progress);
                    self.store.update_progress(name, token, progress);
                }
                Some(Ok(UploadEvent::Completed(document))) => return Ok(document),
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(ClientError::UploadStreamEnded {
                        name: name.to_string(),
                    }
                    .into())
                }
            }
        }
    }

    fn complete_upload(
        &self,
        name: &str,
        token: &CancellationToken,
        document: DocumentRef,
        content: Bytes,
    ) -> UploadOutcome {
        // 预览在服务端处理之前就可用，不必等待杀毒扫描
        self.store.update_progress(name, token, 100);
        self.store.set_preview(name, token, content);
        if !self
            .store
            .transition(name, token, Transition::to(FileStatus::Processing))
        {
            return match self.current_status(name, token) {
                Some(status) => {
                    warn!("[文件 {}] ⚠️ 上传完成时已是 {}，不再处理", name, status);
                    UploadOutcome::Failed(status)
                }
                None => UploadOutcome::Cancelled,
            };
        }
        info!("[文件 {}] ✓ 上传完成，文档 ID: {}", name, document.id);
        UploadOutcome::Uploaded(document)
    }

    // ========== 提交处理 ==========

    /// 提交已上传的文件进行服务端处理，并轮询到终态
    pub async fn process_file(
        &self,
        document: &DocumentRef,
        file_name: &str,
        context_id: &str,
        path: &str,
    ) -> ProcessOutcome {
        let token = match self.store.claim_processing(file_name) {
            ProcessingClaim::Claimed(token) => token,
            ProcessingClaim::Missing => {
                info!("[文件 {}] 不在跟踪中（可能已移除），不提交处理", file_name);
                return ProcessOutcome::Cancelled;
            }
            ProcessingClaim::Terminal(status) => {
                warn!("[文件 {}] ⚠️ 已是终态 {}，跳过处理", file_name, status);
                return ProcessOutcome::Skipped;
            }
            ProcessingClaim::Busy => {
                warn!("[文件 {}] ⚠️ 已有处理任务在进行，跳过", file_name);
                return ProcessOutcome::Skipped;
            }
        };
        self.store
            .transition(file_name, &token, Transition::to(FileStatus::Processing));

        info!("[文件 {}] 🔍 提交处理 (文档 ID: {})", file_name, document.id);

        let result = async {
            let submission = submit_with_retry(
                self.client.as_ref(),
                file_name,
                context_id,
                &document.id,
                path,
                self.settings.submit_retry,
                &token,
            )
            .await?;

            info!(
                "[文件 {}] ✓ 已提交，等待处理器: {:?}",
                file_name, submission.processors
            );

            self.poll(
                file_name,
                &document.id,
                PollTarget::Submitted(submission.processors),
                &token,
            )
            .await
        }
        .await;

        let outcome = self.settle(file_name, &token, result);
        self.store.finish_processing(file_name, &token);
        outcome
    }

    async fn poll(
        &self,
        name: &str,
        document_id: &str,
        target: PollTarget,
        token: &CancellationToken,
    ) -> AppResult<Vec<ProcessorResult>> {
        let store = &self.store;
        poll_until_terminal(
            self.client.as_ref(),
            name,
            document_id,
            &target,
            self.settings.poll_interval,
            token,
            |results| {
                store.update_processing_status(
                    name,
                    token,
                    ProcessingStatus::from_results(results.to_vec()),
                );
            },
        )
        .await
    }

    /// 根据轮询结果写入终态
    fn settle(
        &self,
        name: &str,
        token: &CancellationToken,
        result: AppResult<Vec<ProcessorResult>>,
    ) -> ProcessOutcome {
        match result {
            Ok(results) => {
                let processing_status = ProcessingStatus::from_results(results);
                let status = if processing_status.failed {
                    FileStatus::Failure
                } else {
                    FileStatus::Success
                };
                let applied = self.store.transition(
                    name,
                    token,
                    Transition::to(status).with_processing_status(processing_status),
                );
                if !applied {
                    return if token.is_cancelled() {
                        ProcessOutcome::Cancelled
                    } else {
                        ProcessOutcome::Skipped
                    };
                }
                if status == FileStatus::Success {
                    info!("[文件 {}] ✅ 处理完成", name);
                    ProcessOutcome::Succeeded
                } else {
                    warn!("[文件 {}] ❌ 处理器报告错误", name);
                    ProcessOutcome::Failed(status)
                }
            }
            Err(e) if e.is_cancelled() => {
                info!("[文件 {}] 处理已取消", name);
                ProcessOutcome::Cancelled
            }
            Err(e) => match self.record_failure(name, token, &e) {
                Some(status) => ProcessOutcome::Failed(status),
                None => ProcessOutcome::Cancelled,
            },
        }
    }

    /// 分类错误并写入终态
    ///
    /// 返回条目最终的状态；令牌已取消（文件被移除）时返回 None
    fn record_failure(
        &self,
        name: &str,
        token: &CancellationToken,
        err: &AppError,
    ) -> Option<FileStatus> {
        let classification = classify_error(err);
        let status = classification.status;
        let detail = truncate_text(&err.to_string(), 200);
        if self
            .store
            .transition(name, token, classification.into_transition())
        {
            warn!("[文件 {}] ❌ {} ({})", name, status, detail);
            return Some(status);
        }

        let current = self.current_status(name, token)?;
        warn!(
            "[文件 {}] ⚠️ 已是 {}，忽略错误: {}",
            name, current, detail
        );
        Some(current)
    }

    /// 令牌仍有效时条目的当前状态
    fn current_status(&self, name: &str, token: &CancellationToken) -> Option<FileStatus> {
        if token.is_cancelled() {
            return None;
        }
        self.store.get(name).map(|state| state.status)
    }

    // ========== 加载已有附件 ==========

    /// 加载一批已上传的附件
    ///
    /// 所有有效条目先同步标记为 loading，再并发地拉取内容、轮询处理状态。
    /// 单个文件出错不影响其他文件。缺少 id 或 name 的引用被跳过。
    pub async fn load_existing(&self, refs: &[AttachmentRef]) -> Vec<(String, ProcessOutcome)> {
        let pending = self.mark_loading(refs);
        self.run_loads(pending).await
    }

    /// 与 `load_existing` 相同，但在后台任务中运行
    ///
    /// 返回前所有条目已经标记为 loading
    pub fn spawn_load_existing(
        &self,
        refs: &[AttachmentRef],
    ) -> JoinHandle<Vec<(String, ProcessOutcome)>> {
        let pending = self.mark_loading(refs);
        let this = self.clone();
        tokio::spawn(async move { this.run_loads(pending).await })
    }

    fn mark_loading(&self, refs: &[AttachmentRef]) -> Vec<PendingLoad> {
        let mut pending = Vec::new();
        for attachment in refs {
            let Some((document_id, name)) = attachment.resolved() else {
                debug!("跳过缺少 id 或 name 的附件: {:?}", attachment);
                continue;
            };
            match self.store.begin_loading(name) {
                Some(token) => pending.push(PendingLoad {
                    document_id: document_id.to_string(),
                    name: name.to_string(),
                    token,
                }),
                None => debug!("[文件 {}] 同名文件已在跟踪中，跳过加载", name),
            }
        }
        info!("📁 {} 个已有附件开始加载", pending.len());
        pending
    }

    async fn run_loads(&self, pending: Vec<PendingLoad>) -> Vec<(String, ProcessOutcome)> {
        let pipelines = pending.into_iter().map(|load| async move {
            let outcome = self.load_one(&load).await;
            (load.name, outcome)
        });
        join_all(pipelines).await
    }

    async fn load_one(&self, load: &PendingLoad) -> ProcessOutcome {
        let PendingLoad {
            document_id,
            name,
            token,
        } = load;

        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => return ProcessOutcome::Cancelled,
            r = self.client.get_bytes(document_id) => r,
        };
        match fetched {
            Ok(bytes) => {
                debug!("[文件 {}] 已拉取 {} 字节", name, bytes.len());
                self.store.set_preview(name, token, bytes);
            }
            Err(e) => {
                return match self.record_failure(name, token, &e) {
                    Some(status) => ProcessOutcome::Failed(status),
                    None => ProcessOutcome::Cancelled,
                }
            }
        }

        if !self
            .store
            .transition(name, token, Transition::to(FileStatus::Processing))
            || !self.store.begin_processing(name, token)
        {
            return if token.is_cancelled() {
                ProcessOutcome::Cancelled
            } else {
                ProcessOutcome::Skipped
            };
        }

        let result = self
            .poll(name, document_id, PollTarget::Discovered, token)
            .await;
        let outcome = self.settle(name, token, result);
        self.store.finish_processing(name, token);
        outcome
    }

    // ========== 移除 / 预检失败 ==========

    /// 取消该文件的所有在途任务，并删除状态与预览
    pub fn remove_file(&self, name: &str) -> bool {
        match self.store.remove(name) {
            Some(state) => {
                info!("[文件 {}] 🗑️ 已移除 (状态: {})", name, state.status);
                true
            }
            None => {
                debug!("[文件 {}] 不在跟踪中，无需移除", name);
                false
            }
        }
    }

    /// 移除所有文件
    pub fn remove_all(&self) -> usize {
        let removed = self.store.remove_all();
        info!("🗑️ 已移除全部 {} 个文件", removed);
        removed
    }

    /// 客户端预检失败（文件过大），直接写入 sizeExceeded，不访问服务端
    ///
    /// 同名文件已在跟踪中时不修改它，返回它当前的状态
    pub fn get_error_status(&self, name: &str, code: u16, message: &str) -> FileLifecycleState {
        warn!("[文件 {}] ⚠️ 预检未通过 ({}): {}", name, code, message);
        self.store.record_terminal(
            name,
            Transition::to(FileStatus::SizeExceeded).with_error_code(Some(code)),
        )
    }

    // ========== 只读访问 ==========

    pub fn get_status(&self, name: &str) -> Option<FileLifecycleState> {
        self.store.get(name)
    }

    pub fn preview(&self, name: &str) -> Option<Bytes> {
        self.store.preview(name)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.store.subscribe()
    }

    pub fn aggregates(&self) -> AggregateSignals {
        self.store.aggregates()
    }

    pub fn subscribe_aggregates(&self) -> watch::Receiver<AggregateSignals> {
        self.store.subscribe_aggregates()
    }

    pub fn is_uploading(&self) -> watch::Receiver<bool> {
        self.store.watch_uploading()
    }

    pub fn is_processing(&self) -> watch::Receiver<bool> {
        self.store.watch_processing()
    }

    pub fn has_error(&self) -> watch::Receiver<bool> {
        self.store.watch_error()
    }
}
