/// 文档处理服务 HTTP 客户端
///
/// 封装所有与处理服务 API 相关的调用逻辑
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{ProcessingClient, UploadEvent, UploadStream};
use crate::models::{DocumentRef, ProcessingSubmission, ProcessorResult, UploadFile};
use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::{stream, StreamExt};
use reqwest::{Body, Response};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 上传时每个分块的大小
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// 处理服务客户端
#[derive(Clone)]
pub struct HttpProcessingClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

/// 上传接口的响应体
#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

impl HttpProcessingClient {
    /// 创建新的处理服务客户端
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.token)
        }
    }
}

/// 非 2xx 响应转换为带状态码的错误，响应体作为错误信息
async fn check_status(endpoint: &str, response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.ok().filter(|b| !b.is_empty());
    Err(AppError::status(endpoint, status.as_u16(), body))
}

/// 已发送字节数换算成百分比，上限 99，100 留给服务端确认之后
fn progress_percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 99;
    }
    ((sent * 100 / total).min(99)) as u8
}

#[async_trait]
impl ProcessingClient for HttpProcessingClient {
    /// 请求在返回的流内部驱动。流被丢弃（文件被移除）时令牌被取消，
    /// 请求体随即以错误结束，连接被关闭，服务端不会收到完整文件
    fn upload(&self, file: &UploadFile) -> UploadStream {
        let endpoint = "/documents".to_string();
        let cancel = CancellationToken::new();
        let (progress_tx, progress_rx) = mpsc::unbounded::<u8>();
        let _ = progress_tx.unbounded_send(0);

        let total = file.content.len();
        let chunks: Vec<Bytes> = (0..total)
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(|start| file.content.slice(start..(start + UPLOAD_CHUNK_SIZE).min(total)))
            .collect();

        let mut sent = 0usize;
        let body_cancel = cancel.clone();
        let body = stream::iter(chunks).map(move |chunk| {
            if body_cancel.is_cancelled() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "上传已取消",
                ));
            }
            sent += chunk.len();
            let _ = progress_tx.unbounded_send(progress_percent(sent, total));
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let request = self
            .authorized(self.http.post(self.url(&endpoint)))
            .query(&[("name", file.name.as_str())])
            .body(Body::wrap_stream(body));
        let name = file.name.clone();

        let completion = async move {
            let response = request
                .send()
                .await
                .map_err(|e| AppError::request_failed(endpoint.as_str(), e))?;
            let response = check_status(&endpoint, response).await?;
            let uploaded: UploadResponse = response.json().await?;
            debug!("[文件 {}] 服务端已确认上传: {}", name, uploaded.id);
            Ok::<_, AppError>(UploadEvent::Completed(DocumentRef::new(uploaded.id)))
        };

        let guard = cancel.drop_guard();
        let progress = progress_rx.map(|p| Ok(UploadEvent::Progress(p)));
        stream::select(progress, stream::once(completion))
            .map(move |event| {
                let _guard = &guard;
                event
            })
            .boxed()
    }

    async fn get_bytes(&self, document_id: &str) -> AppResult<Bytes> {
        let endpoint = format!("/documents/{}/content", document_id);
        let response = self
            .authorized(self.http.get(self.url(&endpoint)))
            .send()
            .await
            .map_err(|e| AppError::request_failed(endpoint.as_str(), e))?;
        let response = check_status(&endpoint, response).await?;
        Ok(response.bytes().await?)
    }

    async fn start_processing(
        &self,
        context_id: &str,
        document_id: &str,
        path: &str,
    ) -> AppResult<ProcessingSubmission> {
        let endpoint = format!("/contexts/{}/documents/{}/process", context_id, document_id);
        debug!("提交处理: {}", endpoint);
        let response = self
            .authorized(self.http.post(self.url(&endpoint)))
            .json(&json!({ "path": path }))
            .send()
            .await
            .map_err(|e| AppError::request_failed(endpoint.as_str(), e))?;
        let response = check_status(&endpoint, response).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_processing_status(&self, document_id: &str) -> AppResult<Vec<ProcessorResult>> {
        let endpoint = format!("/documents/{}/processing-status", document_id);
        let response = self
            .authorized(self.http.get(self.url(&endpoint)))
            .send()
            .await
            .map_err(|e| AppError::request_failed(endpoint.as_str(), e))?;
        let response = check_status(&endpoint, response).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    fn name(&self) -> &str {
        "http"
    }
}
