//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责文件生命周期和批量调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `upload_orchestrator` - 单文件编排器
//! - 上传 → 提交处理（带重试）→ 轮询到终态
//! - 加载已有附件
//! - 按文件名移除并取消在途任务
//! - 唯一修改 `FileLifecycleStore` 的模块
//!
//! ### `batch_processor` - 批量上传处理器
//! - 管理应用生命周期（初始化、运行）
//! - 扫描上传目录、预检文件大小
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息和失败报告
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<UploadFile>)
//!     ↓
//! workflow::DocumentFlow (处理单个文件)
//!     ↓
//! upload_orchestrator (状态 + 取消)
//!     ↓
//! services (能力层：submit / poll / classify / report)
//!     ↓
//! infrastructure (基础设施：ProcessingClient)
//! ```

pub mod batch_processor;
pub mod upload_orchestrator;

// 重新导出主要类型
pub use batch_processor::{App, RunStats};
pub use upload_orchestrator::{OrchestratorSettings, ProcessOutcome, UploadOrchestrator, UploadOutcome};
