//! 状态层：文件生命周期存储与聚合计数器

pub mod aggregate;
pub mod lifecycle_store;

pub use aggregate::{AggregateSignals, Counter};
pub use lifecycle_store::{
    FileLifecycleStore, FileSnapshot, ProcessingClaim, StoreSnapshot, Transition,
};
