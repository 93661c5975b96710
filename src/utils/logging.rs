/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use crate::config::Config;
use crate::error::{AppError, FileError};
use crate::store::AggregateSignals;
use anyhow::Result;
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing
///
/// `RUST_LOG` 优先，否则按 `verbose` 选择 debug / info。重复调用无副作用。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n文档上传日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header).map_err(|e| {
        AppError::File(FileError::WriteFailed {
            path: log_file_path.to_string(),
            source: Box::new(e),
        })
    })?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量文档上传模式");
    info!("🌐 处理服务: {}", config.api_base_url);
    info!("📊 最大并发数: {}", config.max_concurrent_uploads);
    info!(
        "⏱️ 轮询间隔: {}ms / 提交重试: {} 次",
        config.poll_interval_ms, config.submit_max_attempts
    );
    info!("{}", "=".repeat(60));
}

/// 记录文件加载信息
///
/// # 参数
/// - `total`: 文件总数
/// - `rejected`: 预检未通过的文件数
/// - `max_concurrent`: 最大并发数
pub fn log_files_loaded(total: usize, rejected: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 个待上传的文件", total);
    if rejected > 0 {
        info!("⚠️ 其中 {} 个超出大小限制，不会上传", rejected);
    }
    info!("📋 最多同时上传 {} 个文件\n", max_concurrent);
}

/// 记录聚合信号变化
pub fn log_aggregates(signals: &AggregateSignals) {
    info!(
        "📈 上传中: {} | 处理中: {} | 失败: {}",
        signals.uploading_count, signals.processing_count, signals.error_count
    );
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(success: usize, failed: usize, total: usize, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
