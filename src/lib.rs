//! # Document Upload
//!
//! 文档上传与异步处理编排
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 只暴露能力，不认识文件状态
//! - `ProcessingClient` - 上传、拉取、提交处理、查询状态
//! - `clients/` - 基于 reqwest 的 HTTP 实现
//!
//! ### ② 状态层（Store）
//! - `store/` - 每个文件的生命周期状态、预览和取消令牌
//! - 三个聚合计数器及其派生的布尔信号
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个文件
//! - `submission` - 带重试的提交处理
//! - `status_poller` - 轮询到终态
//! - `error_classifier` - 错误码分类
//! - `ReportWriter` - 写失败报告
//!
//! ### ④ 流程层（Workflow）
//! - `DocumentFlow` - 上传 → 提交 → 轮询
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/upload_orchestrator` - 单文件编排，唯一的状态写者
//! - `orchestrator/batch_processor` - 批量上传，管理资源和并发

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::HttpProcessingClient;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{ProcessingClient, UploadEvent};
pub use models::{FileLifecycleState, FileStatus, UploadFile};
pub use orchestrator::{App, OrchestratorSettings, ProcessOutcome, UploadOrchestrator, UploadOutcome};
pub use store::{AggregateSignals, FileLifecycleStore};
pub use workflow::{DocumentFlow, FlowResult, ProcessingCtx};
