//! 批量上传处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量文件的上传和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：写日志头、创建处理服务客户端和 `UploadOrchestrator`
//! 2. **批量加载**：扫描上传目录（`Vec<UploadFile>`），可选加载已有附件清单
//! 3. **预检**：超出大小限制的文件直接记为 sizeExceeded，不上传
//! 4. **并发控制**：使用 Semaphore 限制同时上传的文件数
//! 5. **全局统计**：从 store 快照汇总结果，失败文件写入报告
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个文件的细节，委托 `DocumentFlow`
//! - **资源所有者**：唯一持有客户端和编排器的模块

use crate::clients::HttpProcessingClient;
use crate::config::Config;
use crate::models::{
    load_attachment_manifest, load_upload_folder, AttachmentRef, FileStatus, UploadFile,
};
use crate::orchestrator::UploadOrchestrator;
use crate::services::ReportWriter;
use crate::utils::logging;
use crate::workflow::{DocumentFlow, FlowResult, ProcessingCtx};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 客户端预检失败时记录的状态码
const PAYLOAD_TOO_LARGE: u16 = 413;

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: UploadOrchestrator,
    report_writer: ReportWriter,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        logging::log_startup(&config);

        let client = Arc::new(HttpProcessingClient::new(&config));
        let orchestrator = UploadOrchestrator::new(client, config.orchestrator_settings());
        let report_writer = ReportWriter::with_path(config.report_file.clone());

        Ok(Self::with_orchestrator(config, orchestrator, report_writer))
    }

    /// 使用现成的编排器组装应用（测试时注入假客户端）
    pub fn with_orchestrator(
        config: Config,
        orchestrator: UploadOrchestrator,
        report_writer: ReportWriter,
    ) -> Self {
        Self {
            config,
            orchestrator,
            report_writer,
        }
    }

    pub fn orchestrator(&self) -> &UploadOrchestrator {
        &self.orchestrator
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunStats> {
        let files = self.load_files().await?;
        let manifest = self.load_manifest().await?;

        if files.is_empty() && manifest.is_empty() {
            warn!("⚠️ 没有找到待上传的文件，程序结束");
            return Ok(RunStats::default());
        }

        let (accepted, rejected) = self.precheck(files);
        logging::log_files_loaded(
            accepted.len() + rejected,
            rejected,
            self.config.max_concurrent_uploads,
        );

        let monitor = self.spawn_aggregate_monitor();

        // 已有附件在后台加载，与新文件上传并行
        let loads = (!manifest.is_empty()).then(|| self.orchestrator.spawn_load_existing(&manifest));

        self.upload_all(accepted).await?;

        if let Some(loads) = loads {
            match loads.await {
                Ok(outcomes) => info!("📁 已有附件加载结束: {} 个", outcomes.len()),
                Err(e) => error!("已有附件加载任务失败: {}", e),
            }
        }
        monitor.abort();

        let stats = self.collect_stats();
        logging::print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(stats)
    }

    /// 扫描上传目录
    async fn load_files(&self) -> Result<Vec<UploadFile>> {
        info!("\n📁 正在扫描待上传的文件...");
        load_upload_folder(&self.config.upload_folder).await
    }

    async fn load_manifest(&self) -> Result<Vec<AttachmentRef>> {
        match &self.config.attachments_manifest {
            Some(path) => Ok(load_attachment_manifest(Path::new(path)).await?.attachments),
            None => Ok(Vec::new()),
        }
    }

    /// 拒绝超出大小限制的文件，返回可上传的文件和被拒绝的数量
    fn precheck(&self, files: Vec<UploadFile>) -> (Vec<UploadFile>, usize) {
        let limit = self.config.max_file_size_bytes;
        let mut accepted = Vec::with_capacity(files.len());
        let mut rejected = 0;

        for file in files {
            if file.size > limit {
                let message = format!("文件大小 {} 字节，超过上限 {} 字节", file.size, limit);
                self.orchestrator
                    .get_error_status(&file.name, PAYLOAD_TOO_LARGE, &message);
                rejected += 1;
            } else {
                accepted.push(file);
            }
        }

        (accepted, rejected)
    }

    /// 并发上传并处理所有文件
    async fn upload_all(&self, files: Vec<UploadFile>) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_uploads));
        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            let permit = semaphore.clone().acquire_owned().await?;
            let orchestrator = self.orchestrator.clone();
            let flow = DocumentFlow::new(ProcessingCtx::new(
                self.config.context_id.clone(),
                self.config.processing_path.clone(),
            ));
            let name = file.name.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                flow.run(&orchestrator, file).await
            });
            handles.push((name, handle));
        }

        for (name, handle) in handles {
            match handle.await {
                Ok(FlowResult::Failed(status)) => warn!("[文件 {}] ❌ {}", name, status.message()),
                Ok(_) => {}
                Err(e) => error!("[文件 {}] 任务执行失败: {}", name, e),
            }
        }

        Ok(())
    }

    /// 聚合信号变化时输出一行日志
    fn spawn_aggregate_monitor(&self) -> JoinHandle<()> {
        let mut signals = self.orchestrator.subscribe_aggregates();
        tokio::spawn(async move {
            while signals.changed().await.is_ok() {
                let current = *signals.borrow_and_update();
                logging::log_aggregates(&current);
            }
        })
    }

    /// 从 store 快照汇总结果，失败文件写入报告
    fn collect_stats(&self) -> RunStats {
        let snapshot = self.orchestrator.snapshot();
        let mut stats = RunStats {
            total: snapshot.files.len(),
            success: snapshot.count_by_status(FileStatus::Success),
            failed: 0,
        };

        for file in &snapshot.files {
            if !file.state.status.is_failure() {
                continue;
            }
            stats.failed += 1;
            if let Err(e) = self.report_writer.write(&file.state) {
                warn!("写入失败报告出错: {}", e);
            }
        }

        stats
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}
