use crate::error::{AppError, FileError};
use crate::models::file_state::UploadFile;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;

/// 扫描上传目录，读取所有普通文件（不递归）
///
/// 单个文件读取失败只记录警告，不影响其他文件
pub async fn load_upload_folder(folder_path: &str) -> Result<Vec<UploadFile>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(AppError::File(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        })
        .into());
    }

    let mut files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };

        match fs::read(&path).await {
            Ok(content) => {
                tracing::debug!("正在加载: {} ({} 字节)", name, content.len());
                files.push(UploadFile::new(name, content));
            }
            Err(e) => {
                tracing::warn!("读取文件失败 {}: {}", path.display(), e);
            }
        }
    }

    // read_dir 的顺序不稳定
    files.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loads_files_sorted_and_skips_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"bbbb").unwrap();
        std::fs::write(dir.path().join("a.png"), b"aa").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let files = load_upload_folder(dir.path().to_str().unwrap()).await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.pdf"]);
        assert_eq!(files[1].size, 4);
    }

    #[tokio::test]
    async fn test_missing_folder_is_error() {
        assert!(load_upload_folder("/definitely/not/here").await.is_err());
    }
}
