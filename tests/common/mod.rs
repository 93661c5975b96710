//! 测试用的处理服务替身
//!
//! 所有响应都由脚本决定，配合 `start_paused` 使用时时间完全可控

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use document_upload::infrastructure::{ProcessingClient, UploadEvent, UploadStream};
use document_upload::models::{
    DocumentRef, ProcessingSubmission, ProcessorResult, ProcessorState, UploadFile,
};
use document_upload::{AppError, AppResult, OrchestratorSettings, UploadOrchestrator};
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 上传流中的一步
#[derive(Debug, Clone)]
pub enum UploadStep {
    Progress(u8),
    Done(&'static str),
    /// 服务端返回该状态码
    Fail(u16),
}

/// 一次提交处理的结果
#[derive(Debug, Clone)]
pub enum SubmitStep {
    Accepted(Vec<&'static str>),
    Status(u16),
    /// 没有状态码的网络错误
    Transient,
}

#[derive(Default)]
pub struct FakeProcessingClient {
    uploads: Mutex<HashMap<String, VecDeque<Vec<UploadStep>>>>,
    upload_step_delay: Duration,
    submits: Mutex<VecDeque<SubmitStep>>,
    statuses: Mutex<HashMap<String, VecDeque<Vec<ProcessorResult>>>>,
    bytes: Mutex<HashMap<String, Result<Bytes, u16>>>,
    bytes_delay: Duration,
    upload_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    bytes_calls: AtomicUsize,
    status_calls: Mutex<HashMap<String, usize>>,
}

impl FakeProcessingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upload_step_delay(mut self, delay: Duration) -> Self {
        self.upload_step_delay = delay;
        self
    }

    pub fn with_bytes_delay(mut self, delay: Duration) -> Self {
        self.bytes_delay = delay;
        self
    }

    /// 同名文件的多次上传按顺序消费脚本
    pub fn script_upload(self, name: &str, steps: Vec<UploadStep>) -> Self {
        self.uploads
            .lock()
            .entry(name.to_string())
            .or_default()
            .push_back(steps);
        self
    }

    pub fn script_submits(self, steps: Vec<SubmitStep>) -> Self {
        self.submits.lock().extend(steps);
        self
    }

    /// 按顺序返回；只剩最后一个时一直返回它
    pub fn script_statuses(self, document_id: &str, responses: Vec<Vec<ProcessorResult>>) -> Self {
        self.statuses
            .lock()
            .insert(document_id.to_string(), responses.into());
        self
    }

    pub fn script_bytes(self, document_id: &str, response: Result<&'static [u8], u16>) -> Self {
        self.bytes
            .lock()
            .insert(document_id.to_string(), response.map(Bytes::from_static));
        self
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn bytes_calls(&self) -> usize {
        self.bytes_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self, document_id: &str) -> usize {
        self.status_calls.lock().get(document_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.upload_calls()
            + self.submit_calls()
            + self.bytes_calls()
            + self.status_calls.lock().values().sum::<usize>()
    }
}

fn status_error(endpoint: &str, code: u16) -> AppError {
    AppError::status(endpoint, code, None)
}

#[async_trait]
impl ProcessingClient for FakeProcessingClient {
    fn upload(&self, file: &UploadFile) -> UploadStream {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let steps = self
            .uploads
            .lock()
            .get_mut(&file.name)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| vec![UploadStep::Progress(0), UploadStep::Done("doc-default")]);

        let events: Vec<AppResult<UploadEvent>> = steps
            .into_iter()
            .map(|step| match step {
                UploadStep::Progress(p) => Ok(UploadEvent::Progress(p)),
                UploadStep::Done(id) => Ok(UploadEvent::Completed(DocumentRef::new(id))),
                UploadStep::Fail(code) => Err(status_error("/documents", code)),
            })
            .collect();

        let delay = self.upload_step_delay;
        stream::iter(events)
            .then(move |event| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                event
            })
            .boxed()
    }

    async fn get_bytes(&self, document_id: &str) -> AppResult<Bytes> {
        self.bytes_calls.fetch_add(1, Ordering::SeqCst);
        if !self.bytes_delay.is_zero() {
            tokio::time::sleep(self.bytes_delay).await;
        }
        let scripted = self.bytes.lock().get(document_id).cloned();
        match scripted {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(code)) => Err(status_error("/content", code)),
            None => Ok(Bytes::from_static(b"%PDF-1.7")),
        }
    }

    async fn start_processing(
        &self,
        _context_id: &str,
        _document_id: &str,
        _path: &str,
    ) -> AppResult<ProcessingSubmission> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .submits
            .lock()
            .pop_front()
            .unwrap_or(SubmitStep::Accepted(vec!["antivirus-scanner"]));
        match step {
            SubmitStep::Accepted(ids) => Ok(ProcessingSubmission {
                processors: ids.into_iter().map(String::from).collect(),
            }),
            SubmitStep::Status(code) => Err(status_error("/process", code)),
            SubmitStep::Transient => Err(AppError::Other("连接被重置".to_string())),
        }
    }

    async fn get_processing_status(&self, document_id: &str) -> AppResult<Vec<ProcessorResult>> {
        *self
            .status_calls
            .lock()
            .entry(document_id.to_string())
            .or_default() += 1;
        let mut statuses = self.statuses.lock();
        let Some(queue) = statuses.get_mut(document_id) else {
            return Ok(vec![antivirus(ProcessorState::Complete, json!("clean"))]);
        };
        let response = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(response)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub fn antivirus(status: ProcessorState, result: serde_json::Value) -> ProcessorResult {
    ProcessorResult::new("antivirus-scanner", status, result)
}

pub fn processor(id: &str, status: ProcessorState, result: serde_json::Value) -> ProcessorResult {
    ProcessorResult::new(id, status, result)
}

pub fn orchestrator(client: &Arc<FakeProcessingClient>) -> UploadOrchestrator {
    UploadOrchestrator::new(client.clone(), OrchestratorSettings::default())
}

pub fn file(name: &str) -> UploadFile {
    UploadFile::new(name, Bytes::from_static(b"%PDF-1.7 test"))
}
