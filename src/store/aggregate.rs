//! 全局聚合计数器
//!
//! 三个计数器及其派生布尔值，供表单作为提交闸门

use serde::Serialize;
use tracing::warn;

/// 计数器的一次完整快照
///
/// 布尔值总是从同一份计数派生，不会出现计数与布尔值不一致的中间态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateSignals {
    pub uploading_count: usize,
    pub processing_count: usize,
    pub error_count: usize,
}

impl AggregateSignals {
    pub fn is_uploading(&self) -> bool {
        self.uploading_count > 0
    }

    pub fn is_processing(&self) -> bool {
        self.processing_count > 0
    }

    pub fn has_error(&self) -> bool {
        self.error_count > 0
    }
}

/// 计数器的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Uploading,
    Processing,
    Error,
}

/// 只在 store 的锁内修改
#[derive(Debug, Default)]
pub(crate) struct AggregateCounters {
    signals: AggregateSignals,
}

impl AggregateCounters {
    pub(crate) fn signals(&self) -> AggregateSignals {
        self.signals
    }

    fn slot(&mut self, counter: Counter) -> &mut usize {
        match counter {
            Counter::Uploading => &mut self.signals.uploading_count,
            Counter::Processing => &mut self.signals.processing_count,
            Counter::Error => &mut self.signals.error_count,
        }
    }

    pub(crate) fn increment(&mut self, counter: Counter) {
        *self.slot(counter) += 1;
    }

    pub(crate) fn decrement(&mut self, counter: Counter) {
        let slot = self.slot(counter);
        if *slot == 0 {
            // 每个贡献都由条目上的标记记账，走到这里说明记账出错
            warn!("⚠️ 计数器 {:?} 已为 0，忽略递减", counter);
            debug_assert!(false, "counter {:?} underflow", counter);
            return;
        }
        *slot -= 1;
    }
}
