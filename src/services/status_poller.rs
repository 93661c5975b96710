//! 处理状态轮询 - 业务能力层
//!
//! 只负责"轮询到终态"能力，不修改文件状态

use crate::error::{AppError, AppResult};
use crate::infrastructure::ProcessingClient;
use crate::models::{ProcessorResult, ProcessorState};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 需要等待哪些处理器
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTarget {
    /// 提交处理时服务端返回的处理器
    Submitted(Vec<String>),
    /// 已有附件没有提交记录：等待轮询结果中出现的所有处理器
    Discovered,
}

/// 是否需要继续轮询
///
/// - 杀毒类处理器仍为 PENDING
/// - 或者有要求的处理器尚未到达终态（COMPLETE / UNPROCESSABLE）
pub fn should_continue_polling(results: &[ProcessorResult], target: &PollTarget) -> bool {
    let antivirus_pending = results
        .iter()
        .any(|r| r.is_antivirus() && r.status == ProcessorState::Pending);
    if antivirus_pending {
        return true;
    }

    match target {
        PollTarget::Submitted(required) => required.iter().any(|id| {
            !results
                .iter()
                .any(|r| &r.processor_id == id && r.status.is_terminal())
        }),
        PollTarget::Discovered => results.iter().any(|r| !r.status.is_terminal()),
    }
}

/// 以固定间隔轮询，直到终止条件不再满足
///
/// 第一次查询发生在一个间隔之后。每次结果都会交给 `on_update`，
/// 返回最后一次结果。查询出错或被取消时立即结束。
pub async fn poll_until_terminal(
    client: &dyn ProcessingClient,
    file_name: &str,
    document_id: &str,
    target: &PollTarget,
    period: Duration,
    token: &CancellationToken,
    mut on_update: impl FnMut(&[ProcessorResult]),
) -> AppResult<Vec<ProcessorResult>> {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut polls = 0usize;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AppError::cancelled(file_name)),
            _ = ticker.tick() => {}
        }

        let results = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AppError::cancelled(file_name)),
            r = client.get_processing_status(document_id) => r?,
        };
        polls += 1;

        on_update(&results);

        if !should_continue_polling(&results, target) {
            debug!(
                "[文件 {}] 轮询结束，共 {} 次，{} 个处理器结果",
                file_name,
                polls,
                results.len()
            );
            return Ok(results);
        }
        debug!("[文件 {}] 处理中，继续轮询 (第 {} 次)", file_name, polls);
    }
}
