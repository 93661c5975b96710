pub mod document_flow;
pub mod processing_ctx;

pub use document_flow::{DocumentFlow, FlowResult};
pub use processing_ctx::ProcessingCtx;
