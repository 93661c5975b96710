//! 需要真实处理服务的测试
//!
//! 通过 `API_BASE_URL` / `API_TOKEN` 等环境变量指定服务地址

use bytes::Bytes;
use document_upload::models::{FileStatus, UploadFile};
use document_upload::utils::logging;
use document_upload::{Config, HttpProcessingClient, UploadOrchestrator, UploadOutcome};
use std::sync::Arc;

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_upload_and_process_single_file() {
    // 初始化日志
    logging::init(true);

    // 加载配置
    let config = Config::from_env();

    let client = Arc::new(HttpProcessingClient::new(&config));
    let orchestrator = UploadOrchestrator::new(client, config.orchestrator_settings());

    let file = UploadFile::new("integration.txt", Bytes::from_static(b"hello processing service"));
    let document = match orchestrator.upload_file(file).await {
        UploadOutcome::Uploaded(document) => document,
        other => panic!("上传失败: {:?}", other),
    };

    orchestrator
        .process_file(
            &document,
            "integration.txt",
            &config.context_id,
            &config.processing_path,
        )
        .await;

    let state = orchestrator.get_status("integration.txt").expect("文件应在跟踪中");
    assert!(state.status.is_terminal(), "处理应该到达终态");
    assert_ne!(state.status, FileStatus::Pending);
}

#[tokio::test]
#[ignore]
async fn test_fetch_existing_document() {
    logging::init(true);

    let config = Config::from_env();
    let document_id = std::env::var("EXISTING_DOCUMENT_ID").expect("需要 EXISTING_DOCUMENT_ID");

    let client = HttpProcessingClient::new(&config);
    let bytes = document_upload::ProcessingClient::get_bytes(&client, &document_id)
        .await
        .expect("拉取文档失败");

    assert!(!bytes.is_empty(), "文档内容不应为空");
}
