//! 文件生命周期存储
//!
//! ## 职责
//!
//! - 以文件名为键，同时持有状态与预览字节（同一个条目，移除时不会不同步）
//! - 持有三个聚合计数器
//! - 每个条目持有一个取消令牌
//!
//! ## 并发约定
//!
//! 所有修改都在同一把锁内完成："检查令牌 → 修改条目 → 调整计数 → 发布快照"
//! 是一个原子步骤。`remove` 在同一把锁内取消令牌，所以令牌一旦被取消，
//! 持有它的任务再也无法修改任何状态，哪怕它的网络响应稍后才到达。
//!
//! 锁从不跨越 `.await`。

use super::aggregate::{AggregateCounters, AggregateSignals, Counter};
use crate::models::{FileLifecycleState, FileStatus, ProcessingStatus};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 快照中的单个文件
#[derive(Debug, Clone, PartialEq)]
pub struct FileSnapshot {
    pub state: FileLifecycleState,
    pub preview: Option<Bytes>,
}

/// 存储的只读快照，按创建顺序排列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub files: Vec<FileSnapshot>,
    pub aggregates: AggregateSignals,
}

impl StoreSnapshot {
    pub fn get(&self, name: &str) -> Option<&FileSnapshot> {
        self.files.iter().find(|f| f.state.name == name)
    }

    pub fn count_by_status(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|f| f.state.status == status).count()
    }
}

struct FileEntry {
    state: FileLifecycleState,
    preview: Option<Bytes>,
    cancel: CancellationToken,
    /// 是否正计入 uploading_count
    uploading: bool,
    /// 是否正计入 processing_count
    processing: bool,
    seq: u64,
}

impl FileEntry {
    fn new(state: FileLifecycleState, seq: u64) -> Self {
        Self {
            state,
            preview: None,
            cancel: CancellationToken::new(),
            uploading: false,
            processing: false,
            seq,
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, FileEntry>,
    counters: AggregateCounters,
    next_seq: u64,
}

impl Inner {
    fn insert(&mut self, state: FileLifecycleState) -> &mut FileEntry {
        let seq = self.next_seq;
        self.next_seq += 1;
        let name = state.name.clone();
        if state.status.is_failure() {
            self.counters.increment(Counter::Error);
        }
        self.entries.entry(name).or_insert(FileEntry::new(state, seq))
    }

    /// 移除条目并撤销它对所有计数器的贡献
    fn remove(&mut self, name: &str) -> Option<FileEntry> {
        let entry = self.entries.remove(name)?;
        entry.cancel.cancel();
        if entry.uploading {
            self.counters.decrement(Counter::Uploading);
        }
        if entry.processing {
            self.counters.decrement(Counter::Processing);
        }
        if entry.state.status.is_failure() {
            self.counters.decrement(Counter::Error);
        }
        Some(entry)
    }

    fn snapshot(&self) -> StoreSnapshot {
        let mut entries: Vec<&FileEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        StoreSnapshot {
            files: entries
                .into_iter()
                .map(|e| FileSnapshot {
                    state: e.state.clone(),
                    preview: e.preview.clone(),
                })
                .collect(),
            aggregates: self.counters.signals(),
        }
    }
}

/// 条目状态迁移所需的全部信息
#[derive(Debug, Clone)]
pub struct Transition {
    pub status: FileStatus,
    pub processing_status: Option<ProcessingStatus>,
    pub error_code: Option<u16>,
}

impl Transition {
    pub fn to(status: FileStatus) -> Self {
        Self {
            status,
            processing_status: None,
            error_code: None,
        }
    }

    pub fn with_processing_status(mut self, processing_status: ProcessingStatus) -> Self {
        self.processing_status = Some(processing_status);
        self
    }

    pub fn with_error_code(mut self, error_code: Option<u16>) -> Self {
        self.error_code = error_code;
        self
    }
}

/// `claim_processing` 的结果
#[derive(Debug, Clone)]
pub enum ProcessingClaim {
    Claimed(CancellationToken),
    /// 条目不存在（从未跟踪，或已被移除）
    Missing,
    /// 条目已是终态
    Terminal(FileStatus),
    /// 已有处理任务在进行
    Busy,
}

/// 文件生命周期存储（单写者：只有编排层修改）
pub struct FileLifecycleStore {
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<StoreSnapshot>,
    signals_tx: watch::Sender<AggregateSignals>,
    uploading_tx: watch::Sender<bool>,
    processing_tx: watch::Sender<bool>,
    error_tx: watch::Sender<bool>,
}

impl FileLifecycleStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            snapshot_tx: watch::Sender::new(StoreSnapshot::default()),
            signals_tx: watch::Sender::new(AggregateSignals::default()),
            uploading_tx: watch::Sender::new(false),
            processing_tx: watch::Sender::new(false),
            error_tx: watch::Sender::new(false),
        }
    }

    /// 在锁内调用：发布快照与聚合信号
    fn publish(&self, inner: &Inner) {
        let signals = inner.counters.signals();
        self.snapshot_tx.send_replace(inner.snapshot());
        self.signals_tx.send_if_modified(|current| replace_if_changed(current, signals));
        self.uploading_tx
            .send_if_modified(|current| replace_if_changed(current, signals.is_uploading()));
        self.processing_tx
            .send_if_modified(|current| replace_if_changed(current, signals.is_processing()));
        self.error_tx
            .send_if_modified(|current| replace_if_changed(current, signals.has_error()));
    }

    /// 令牌仍有效且条目存在时执行修改并发布
    fn with_live_entry<R>(
        &self,
        name: &str,
        token: &CancellationToken,
        f: impl FnOnce(&mut FileEntry, &mut AggregateCounters) -> R,
    ) -> Option<R> {
        let mut guard = self.inner.lock();
        if token.is_cancelled() {
            debug!("[文件 {}] 已取消，丢弃迟到的更新", name);
            return None;
        }
        let inner = &mut *guard;
        let entry = inner.entries.get_mut(name)?;
        let result = f(entry, &mut inner.counters);
        self.publish(inner);
        Some(result)
    }

    // ========== 创建条目 ==========

    /// 开始上传：创建 pending 条目并计入 uploading_count
    ///
    /// 同名条目已存在时返回 None
    pub fn begin_upload(&self, name: &str) -> Option<CancellationToken> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.entries.contains_key(name) {
            return None;
        }
        let entry = inner.insert(FileLifecycleState::pending(name));
        entry.uploading = true;
        let token = entry.cancel.clone();
        inner.counters.increment(Counter::Uploading);
        self.publish(inner);
        Some(token)
    }

    /// 已有附件：创建 loading 条目
    ///
    /// 同名条目已存在时返回 None
    pub fn begin_loading(&self, name: &str) -> Option<CancellationToken> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.entries.contains_key(name) {
            return None;
        }
        let token = inner.insert(FileLifecycleState::loading(name)).cancel.clone();
        self.publish(inner);
        Some(token)
    }

    /// 为提交处理认领条目：计入 processing_count 并返回条目的令牌
    ///
    /// 只认领已跟踪、非终态、且没有其他处理任务的条目，从不创建新条目
    pub fn claim_processing(&self, name: &str) -> ProcessingClaim {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(entry) = inner.entries.get_mut(name) else {
            return ProcessingClaim::Missing;
        };
        if entry.state.status.is_terminal() {
            return ProcessingClaim::Terminal(entry.state.status);
        }
        // 上传中与 loading 的条目由各自的任务负责
        if entry.processing || entry.uploading || entry.state.status == FileStatus::Loading {
            return ProcessingClaim::Busy;
        }
        entry.processing = true;
        let token = entry.cancel.clone();
        inner.counters.increment(Counter::Processing);
        self.publish(inner);
        ProcessingClaim::Claimed(token)
    }

    /// 直接写入终态（客户端预检失败，不经过任何任务）
    ///
    /// 同名条目已存在时不做任何修改，返回它当前的状态
    pub fn record_terminal(&self, name: &str, transition: Transition) -> FileLifecycleState {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if let Some(entry) = inner.entries.get(name) {
            debug!("[文件 {}] 已在跟踪中 ({})，忽略预检结果", name, entry.state.status);
            return entry.state.clone();
        }

        let mut state = FileLifecycleState::new(name, transition.status, 0);
        state.error_code = transition.error_code;
        if let Some(processing_status) = transition.processing_status {
            state.processing_status = processing_status;
        }
        let recorded = inner.insert(state).state.clone();
        self.publish(inner);
        recorded
    }

    // ========== 任务内的修改（需要有效令牌） ==========

    pub fn update_progress(&self, name: &str, token: &CancellationToken, progress: u8) -> bool {
        self.with_live_entry(name, token, |entry, _| {
            entry.state.upload_progress = progress.min(100);
        })
        .is_some()
    }

    pub fn set_preview(&self, name: &str, token: &CancellationToken, bytes: Bytes) -> bool {
        self.with_live_entry(name, token, |entry, _| {
            entry.preview = Some(bytes);
        })
        .is_some()
    }

    /// 轮询中间结果：只更新处理器列表，不改变状态
    pub fn update_processing_status(
        &self,
        name: &str,
        token: &CancellationToken,
        processing_status: ProcessingStatus,
    ) -> bool {
        self.with_live_entry(name, token, |entry, _| {
            entry.state.processing_status = processing_status;
        })
        .is_some()
    }

    /// 状态迁移；非法迁移会被拒绝并返回 false
    pub fn transition(&self, name: &str, token: &CancellationToken, transition: Transition) -> bool {
        self.with_live_entry(name, token, |entry, counters| {
            apply_transition(entry, counters, transition)
        })
        .unwrap_or(false)
    }

    /// 加载任务计入 processing_count；条目已有处理任务时返回 false
    pub fn begin_processing(&self, name: &str, token: &CancellationToken) -> bool {
        self.with_live_entry(name, token, |entry, counters| {
            if entry.processing {
                return false;
            }
            entry.processing = true;
            counters.increment(Counter::Processing);
            true
        })
        .unwrap_or(false)
    }

    /// 撤销 uploading_count 贡献，恰好一次
    pub fn finish_upload(&self, name: &str, token: &CancellationToken) {
        self.with_live_entry(name, token, |entry, counters| {
            if entry.uploading {
                entry.uploading = false;
                counters.decrement(Counter::Uploading);
            }
        });
    }

    /// 撤销 processing_count 贡献，恰好一次
    pub fn finish_processing(&self, name: &str, token: &CancellationToken) {
        self.with_live_entry(name, token, |entry, counters| {
            if entry.processing {
                entry.processing = false;
                counters.decrement(Counter::Processing);
            }
        });
    }

    // ========== 移除 ==========

    /// 取消并移除条目，同时修正计数器
    pub fn remove(&self, name: &str) -> Option<FileLifecycleState> {
        let mut guard = self.inner.lock();
        let removed = guard.remove(name)?;
        self.publish(&guard);
        Some(removed.state)
    }

    /// 清空所有条目（表单重置）
    pub fn remove_all(&self) -> usize {
        let mut guard = self.inner.lock();
        let names: Vec<String> = guard.entries.keys().cloned().collect();
        for name in &names {
            guard.remove(name);
        }
        self.publish(&guard);
        names.len()
    }

    // ========== 只读访问 ==========

    pub fn get(&self, name: &str) -> Option<FileLifecycleState> {
        self.inner.lock().entries.get(name).map(|e| e.state.clone())
    }

    pub fn preview(&self, name: &str) -> Option<Bytes> {
        self.inner
            .lock()
            .entries
            .get(name)
            .and_then(|e| e.preview.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().entries.contains_key(name)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn aggregates(&self) -> AggregateSignals {
        self.inner.lock().counters.signals()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn subscribe_aggregates(&self) -> watch::Receiver<AggregateSignals> {
        self.signals_tx.subscribe()
    }

    pub fn watch_uploading(&self) -> watch::Receiver<bool> {
        self.uploading_tx.subscribe()
    }

    pub fn watch_processing(&self) -> watch::Receiver<bool> {
        self.processing_tx.subscribe()
    }

    pub fn watch_error(&self) -> watch::Receiver<bool> {
        self.error_tx.subscribe()
    }
}

impl Default for FileLifecycleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn replace_if_changed<T: PartialEq>(current: &mut T, next: T) -> bool {
    if *current == next {
        return false;
    }
    *current = next;
    true
}

fn apply_transition(
    entry: &mut FileEntry,
    counters: &mut AggregateCounters,
    transition: Transition,
) -> bool {
    let from = entry.state.status;
    let to = transition.status;
    if !from.can_transition_to(to) {
        warn!(
            "[文件 {}] ⚠️ 拒绝非法状态迁移: {} -> {}",
            entry.state.name, from, to
        );
        return false;
    }

    entry.state.set_status(to);
    if let Some(processing_status) = transition.processing_status {
        entry.state.processing_status = processing_status;
    }
    if transition.error_code.is_some() {
        entry.state.error_code = transition.error_code;
    }
    if !from.is_failure() && to.is_failure() {
        counters.increment(Counter::Error);
    }
    debug!("[文件 {}] 状态: {} -> {}", entry.state.name, from, to);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_begin_upload_is_rejected() {
        let store = FileLifecycleStore::new();
        assert!(store.begin_upload("a.pdf").is_some());
        assert!(store.begin_upload("a.pdf").is_none());
        assert!(store.begin_loading("a.pdf").is_none());
        assert_eq!(store.aggregates().uploading_count, 1);
    }

    #[test]
    fn test_remove_reconciles_every_counter() {
        let store = FileLifecycleStore::new();
        let before = store.aggregates();

        let token = store.begin_upload("a.pdf").unwrap();
        assert!(store.begin_processing("a.pdf", &token));
        assert!(store.transition("a.pdf", &token, Transition::to(FileStatus::Failure)));
        let during = store.aggregates();
        assert_eq!(during.uploading_count, 1);
        assert_eq!(during.processing_count, 1);
        assert_eq!(during.error_count, 1);

        let removed = store.remove("a.pdf").unwrap();
        assert_eq!(removed.status, FileStatus::Failure);
        assert!(token.is_cancelled());
        assert_eq!(store.aggregates(), before);
    }

    #[test]
    fn test_cancelled_token_cannot_touch_new_entry() {
        let store = FileLifecycleStore::new();
        let old = store.begin_upload("a.pdf").unwrap();
        store.remove("a.pdf");
        let fresh = store.begin_upload("a.pdf").unwrap();

        assert!(!store.update_progress("a.pdf", &old, 80));
        assert!(!store.transition("a.pdf", &old, Transition::to(FileStatus::Failure)));
        store.finish_upload("a.pdf", &old);

        let state = store.get("a.pdf").unwrap();
        assert_eq!(state.upload_progress, 0);
        assert_eq!(state.status, FileStatus::Pending);
        assert_eq!(store.aggregates().uploading_count, 1);

        store.finish_upload("a.pdf", &fresh);
        store.finish_upload("a.pdf", &fresh);
        assert_eq!(store.aggregates().uploading_count, 0);
    }

    #[test]
    fn test_terminal_state_rejects_further_transitions() {
        let store = FileLifecycleStore::new();
        let token = store.begin_upload("a.pdf").unwrap();
        assert!(store.transition("a.pdf", &token, Transition::to(FileStatus::UnsupportedType)));
        assert!(!store.transition("a.pdf", &token, Transition::to(FileStatus::Failure)));
        assert!(!store.transition("a.pdf", &token, Transition::to(FileStatus::Processing)));
        assert_eq!(store.get("a.pdf").unwrap().status, FileStatus::UnsupportedType);
        assert_eq!(store.aggregates().error_count, 1);
        assert!(matches!(
            store.claim_processing("a.pdf"),
            ProcessingClaim::Terminal(FileStatus::UnsupportedType)
        ));
    }

    #[test]
    fn test_record_terminal_counts_error_once() {
        let store = FileLifecycleStore::new();
        let state = store.record_terminal(
            "big.pdf",
            Transition::to(FileStatus::SizeExceeded).with_error_code(Some(413)),
        );
        assert_eq!(state.status, FileStatus::SizeExceeded);
        assert_eq!(state.error_code, Some(413));

        store.record_terminal("big.pdf", Transition::to(FileStatus::SizeExceeded));
        assert_eq!(store.aggregates().error_count, 1);
    }

    #[test]
    fn test_snapshot_keeps_creation_order_and_signals() {
        let store = FileLifecycleStore::new();
        let rx = store.subscribe();
        let mut uploading = store.watch_uploading();

        store.begin_upload("b.pdf");
        store.begin_loading("a.pdf");

        let snapshot = rx.borrow().clone();
        let names: Vec<&str> = snapshot.files.iter().map(|f| f.state.name.as_str()).collect();
        assert_eq!(names, vec!["b.pdf", "a.pdf"]);
        assert_eq!(snapshot.aggregates.uploading_count, 1);
        assert!(*uploading.borrow_and_update());

        store.remove_all();
        assert!(rx.borrow().files.is_empty());
        assert!(uploading.has_changed().unwrap());
        assert!(!*uploading.borrow_and_update());
        assert_eq!(store.aggregates(), AggregateSignals::default());
    }

    #[test]
    fn test_preview_lives_with_status() {
        let store = FileLifecycleStore::new();
        let token = store.begin_loading("a.pdf").unwrap();
        assert!(store.set_preview("a.pdf", &token, Bytes::from_static(b"%PDF")));
        assert_eq!(store.preview("a.pdf").unwrap(), Bytes::from_static(b"%PDF"));
        store.remove("a.pdf");
        assert!(store.preview("a.pdf").is_none());
        assert!(!store.contains("a.pdf"));
    }

    #[test]
    fn test_claim_processing_never_creates_entries() {
        let store = FileLifecycleStore::new();
        assert!(matches!(store.claim_processing("gone.pdf"), ProcessingClaim::Missing));
        assert!(!store.contains("gone.pdf"));
        assert_eq!(store.aggregates(), AggregateSignals::default());

        let token = store.begin_upload("gone.pdf").unwrap();
        store.finish_upload("gone.pdf", &token);
        store.remove("gone.pdf");
        assert!(matches!(store.claim_processing("gone.pdf"), ProcessingClaim::Missing));
        assert_eq!(store.aggregates().processing_count, 0);
    }

    #[test]
    fn test_second_claim_is_busy_until_finished() {
        let store = FileLifecycleStore::new();
        let upload = store.begin_upload("a.pdf").unwrap();
        store.finish_upload("a.pdf", &upload);

        let ProcessingClaim::Claimed(token) = store.claim_processing("a.pdf") else {
            panic!("第一次认领应成功");
        };
        assert!(matches!(store.claim_processing("a.pdf"), ProcessingClaim::Busy));
        assert!(!store.begin_processing("a.pdf", &token));
        assert_eq!(store.aggregates().processing_count, 1);

        store.finish_processing("a.pdf", &token);
        assert_eq!(store.aggregates().processing_count, 0);
        assert!(matches!(store.claim_processing("a.pdf"), ProcessingClaim::Claimed(_)));
    }

    #[test]
    fn test_loading_entry_belongs_to_load_task() {
        let store = FileLifecycleStore::new();
        store.begin_loading("a.pdf").unwrap();
        assert!(matches!(store.claim_processing("a.pdf"), ProcessingClaim::Busy));

        store.begin_upload("b.pdf").unwrap();
        assert!(matches!(store.claim_processing("b.pdf"), ProcessingClaim::Busy));
    }

    #[test]
    fn test_record_terminal_leaves_tracked_entry_alone() {
        let store = FileLifecycleStore::new();
        let token = store.begin_upload("a.pdf").unwrap();

        let state = store.record_terminal(
            "a.pdf",
            Transition::to(FileStatus::SizeExceeded).with_error_code(Some(413)),
        );
        assert_eq!(state.status, FileStatus::Pending);
        assert_eq!(state.error_code, None);
        assert_eq!(store.aggregates().error_count, 0);
        assert!(store.transition("a.pdf", &token, Transition::to(FileStatus::Processing)));
    }
}
