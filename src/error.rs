use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 处理服务（ProcessingClient）调用错误
    #[error("处理服务错误: {0}")]
    Client(#[from] ClientError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件已被移除，任务被取消
    #[error("文件 {name} 已取消")]
    Cancelled { name: String },
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 处理服务调用错误
#[derive(Debug, Error)]
pub enum ClientError {
    /// 网络请求失败
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 服务端返回非 2xx 状态码
    #[error("服务返回错误状态 ({endpoint}): code={code}, message={message:?}")]
    Status {
        endpoint: String,
        code: u16,
        message: Option<String>,
    },
    /// 上传流在返回文档引用之前结束
    #[error("上传流提前结束: {name}")]
    UploadStreamEnded { name: String },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    InvalidValue { field: String, reason: String },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Client(ClientError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        match err.status() {
            Some(status) => AppError::Client(ClientError::Status {
                endpoint,
                code: status.as_u16(),
                message: Some(err.to_string()),
            }),
            None => AppError::Client(ClientError::RequestFailed {
                endpoint,
                source: Box::new(err),
            }),
        }
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建服务端状态码错误
    pub fn status(endpoint: impl Into<String>, code: u16, message: Option<String>) -> Self {
        AppError::Client(ClientError::Status {
            endpoint: endpoint.into(),
            code,
            message,
        })
    }

    /// 创建请求失败错误
    pub fn request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Client(ClientError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建取消错误
    pub fn cancelled(name: impl Into<String>) -> Self {
        AppError::Cancelled { name: name.into() }
    }

    /// 服务端返回的 HTTP 状态码（仅网络类错误有）
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AppError::Client(ClientError::Status { code, .. }) => Some(*code),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled { .. })
    }

    /// 提交处理时是否值得重试
    ///
    /// 415 / 410 / 403 是终态，重试也不会改变结果
    pub fn is_retryable(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        !matches!(self.status_code(), Some(415 | 410 | 403))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
