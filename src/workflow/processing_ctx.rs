//! 文档处理上下文
//!
//! 封装"这个文件提交到哪个业务上下文、哪个路径"这一信息

use std::fmt::Display;

/// 文档处理上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingCtx {
    /// 业务上下文 ID（例如事务 ID）
    pub context_id: String,

    /// 服务端存放路径
    pub path: String,
}

impl ProcessingCtx {
    pub fn new(context_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            path: path.into(),
        }
    }
}

impl Display for ProcessingCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[上下文 #{} 路径 {}]", self.context_id, self.path)
    }
}
