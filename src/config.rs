use crate::error::{AppError, AppResult, ConfigError, FileError};
use crate::orchestrator::OrchestratorSettings;
use crate::services::RetryPolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 处理服务 API 配置 ---
    pub api_base_url: String,
    pub api_token: String,
    /// 提交处理时使用的业务上下文 ID
    pub context_id: String,
    /// 提交处理时使用的服务端路径
    pub processing_path: String,
    // --- 时间参数 ---
    pub poll_interval_ms: u64,
    pub submit_max_attempts: u32,
    pub submit_retry_delay_ms: u64,
    // --- 批量上传 ---
    /// 单个文件大小上限（字节），超出的文件不会上传
    pub max_file_size_bytes: u64,
    /// 待上传文件所在目录
    pub upload_folder: String,
    /// 已有附件清单（TOML），为空则不加载
    pub attachments_manifest: Option<String>,
    /// 同时上传的文件数量
    pub max_concurrent_uploads: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行日志文件
    pub output_log_file: String,
    /// 失败报告文件
    pub report_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            api_token: String::new(),
            context_id: "default".to_string(),
            processing_path: "documents".to_string(),
            poll_interval_ms: 3000,
            submit_max_attempts: 5,
            submit_retry_delay_ms: 1000,
            max_file_size_bytes: 25 * 1024 * 1024,
            upload_folder: "uploads".to_string(),
            attachments_manifest: None,
            max_concurrent_uploads: 4,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            report_file: "failed_uploads.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(default.api_base_url),
            api_token: std::env::var("API_TOKEN").unwrap_or(default.api_token),
            context_id: std::env::var("CONTEXT_ID").unwrap_or(default.context_id),
            processing_path: std::env::var("PROCESSING_PATH").unwrap_or(default.processing_path),
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_interval_ms),
            submit_max_attempts: std::env::var("SUBMIT_MAX_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.submit_max_attempts),
            submit_retry_delay_ms: std::env::var("SUBMIT_RETRY_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.submit_retry_delay_ms),
            max_file_size_bytes: std::env::var("MAX_FILE_SIZE_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_file_size_bytes),
            upload_folder: std::env::var("UPLOAD_FOLDER").unwrap_or(default.upload_folder),
            attachments_manifest: std::env::var("ATTACHMENTS_MANIFEST").ok().or(default.attachments_manifest),
            max_concurrent_uploads: std::env::var("MAX_CONCURRENT_UPLOADS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_uploads),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            report_file: std::env::var("REPORT_FILE").unwrap_or(default.report_file),
        }
    }

    /// 从 TOML 文件加载，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            AppError::File(FileError::TomlParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `UPLOAD_CONFIG` 指向配置文件时从文件加载，否则读取环境变量
    pub fn load() -> AppResult<Self> {
        match std::env::var("UPLOAD_CONFIG") {
            Ok(path) => Self::from_toml_file(Path::new(&path)),
            Err(_) => {
                let config = Self::from_env();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.max_concurrent_uploads == 0 {
            return Err(invalid("max_concurrent_uploads", "必须大于 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "必须大于 0"));
        }
        if self.submit_max_attempts == 0 {
            return Err(invalid("submit_max_attempts", "至少为 1"));
        }
        Ok(())
    }

    /// 编排器使用的时间参数
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            submit_retry: RetryPolicy {
                max_attempts: self.submit_max_attempts,
                delay: Duration::from_millis(self.submit_retry_delay_ms),
            },
        }
    }
}

fn invalid(field: &str, reason: &str) -> AppError {
    AppError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    })
}
