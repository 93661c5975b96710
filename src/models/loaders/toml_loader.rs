use crate::models::file_state::AttachmentRef;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 已上传附件清单
///
/// ```toml
/// [[attachments]]
/// id = "doc-1"
/// name = "passport.pdf"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentManifest {
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

/// 从 TOML 文件加载附件清单
///
/// 缺少 id 或 name 的条目原样保留，由编排层跳过
pub async fn load_attachment_manifest(manifest_path: &Path) -> Result<AttachmentManifest> {
    let content = fs::read_to_string(manifest_path)
        .await
        .with_context(|| format!("无法读取附件清单: {}", manifest_path.display()))?;

    let manifest: AttachmentManifest = toml::from_str(&content)
        .with_context(|| format!("无法解析附件清单: {}", manifest_path.display()))?;

    tracing::info!(
        "成功加载 {} 个已有附件: {}",
        manifest.attachments.len(),
        manifest_path.display()
    );

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_manifest_keeps_incomplete_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attachments.toml");
        std::fs::write(
            &path,
            r#"
[[attachments]]
id = "doc-1"
name = "passport.pdf"

[[attachments]]
name = "orphan.pdf"
"#,
        )
        .unwrap();

        let manifest = load_attachment_manifest(&path).await.unwrap();
        assert_eq!(manifest.attachments.len(), 2);
        assert_eq!(manifest.attachments[0].resolved(), Some(("doc-1", "passport.pdf")));
        assert!(manifest.attachments[1].resolved().is_none());
    }

    #[tokio::test]
    async fn test_missing_manifest_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_attachment_manifest(&dir.path().join("nope.toml")).await;
        assert!(result.is_err());
    }
}
