//! 提交处理服务 - 业务能力层
//!
//! 只负责"提交处理"能力：带固定间隔重试

use crate::error::{AppError, AppResult};
use crate::infrastructure::ProcessingClient;
use crate::models::ProcessingSubmission;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 固定间隔重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// 提交文档进行服务端处理
///
/// 只有提交本身失败（非 415 / 410 / 403）才重试；取消立即返回
pub async fn submit_with_retry(
    client: &dyn ProcessingClient,
    file_name: &str,
    context_id: &str,
    document_id: &str,
    path: &str,
    policy: RetryPolicy,
    token: &CancellationToken,
) -> AppResult<ProcessingSubmission> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!(
            "[文件 {}] 提交处理 (尝试 {}/{})",
            file_name, attempt, max_attempts
        );

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AppError::cancelled(file_name)),
            r = client.start_processing(context_id, document_id, path) => r,
        };

        match result {
            Ok(submission) => return Ok(submission),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    "[文件 {}] 提交处理失败 (尝试 {}/{}), {:?} 后重试: {}",
                    file_name, attempt, max_attempts, policy.delay, e
                );
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(AppError::cancelled(file_name)),
                    _ = sleep(policy.delay) => {}
                }
            }
            Err(e) => {
                warn!(
                    "[文件 {}] 提交处理失败，已尝试 {} 次: {}",
                    file_name, attempt, e
                );
                return Err(e);
            }
        }
    }
}
