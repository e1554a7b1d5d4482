use crate::error::{ReceiptAiError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// incomingフォルダで見つかったレシートファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptFile {
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: &'static str,
}

const RECEIPT_EXTENSIONS: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
];

/// 拡張子からMIMEタイプを判定（大文字小文字は区別しない）
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    RECEIPT_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

pub fn scan_folder(folder: &Path) -> Result<Vec<ReceiptFile>> {
    if !folder.is_dir() {
        return Err(ReceiptAiError::FolderNotFound(folder.display().to_string()));
    }

    let mut receipts = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)  // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if let Some(mime_type) = mime_type_for(path) {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            receipts.push(ReceiptFile {
                path: path.to_path_buf(),
                file_name,
                mime_type,
            });
        }
    }

    // ファイル名でソート
    receipts.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(receipts)
}
