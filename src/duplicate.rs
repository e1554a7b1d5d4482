//! 重複検出モジュール
//!
//! 新しいファイルのハッシュを既知のハッシュ一覧と照合する。
//! 一覧の順序は処理順（古いものが先）で、最初に一致したものを返す。

use crate::hashing::{FileHasher, Sha256Hasher};
use receipt_ai_common::FileHash;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 重複チェック結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateDetectionResult {
    pub file_path: PathBuf,
    pub is_duplicate: bool,
    pub duplicate_location: Option<PathBuf>,
    pub hash_value: Option<String>,
    pub error_message: Option<String>,
}

impl DuplicateDetectionResult {
    fn unique(file_path: &Path, hash: String) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            is_duplicate: false,
            duplicate_location: None,
            hash_value: Some(hash),
            error_message: None,
        }
    }

    fn duplicate(file_path: &Path, hash: String, location: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            is_duplicate: true,
            duplicate_location: Some(location.to_path_buf()),
            hash_value: Some(hash),
            error_message: None,
        }
    }

    fn error(file_path: &Path, message: impl Into<String>) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            is_duplicate: false,
            duplicate_location: None,
            hash_value: None,
            error_message: Some(message.into()),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error_message.is_some()
    }

    /// 重複元の親フォルダ名（不明なら "unknown"）
    pub fn location_name(&self) -> String {
        self.duplicate_location
            .as_deref()
            .and_then(Path::parent)
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// 重複検出器
pub struct DuplicateDetector<H = Sha256Hasher> {
    hasher: H,
}

impl Default for DuplicateDetector<Sha256Hasher> {
    fn default() -> Self {
        Self::new(Sha256Hasher)
    }
}

impl<H: FileHasher> DuplicateDetector<H> {
    pub fn new(hasher: H) -> Self {
        Self { hasher }
    }

    /// ファイルが既知のハッシュと一致するか確認
    ///
    /// 失敗はすべて `error_message` 付きの結果として返す
    pub fn check_duplicate(&self, file_path: &Path, existing: &[FileHash]) -> DuplicateDetectionResult {
        let hashed = panic::catch_unwind(AssertUnwindSafe(|| self.hasher.hash_file(file_path)));

        let hash = match hashed {
            Ok(Ok(hash)) if !hash.trim().is_empty() => hash,
            Ok(Ok(_)) => {
                return DuplicateDetectionResult::error(file_path, "ハッシュ値が空です");
            }
            Ok(Err(e)) => {
                warn!(file = %file_path.display(), error = %e, "hash calculation failed");
                return DuplicateDetectionResult::error(file_path, e.to_string());
            }
            Err(_) => {
                warn!(file = %file_path.display(), "hash calculation panicked");
                return DuplicateDetectionResult::error(file_path, "ハッシュ計算中に予期しないエラーが発生しました");
            }
        };

        match existing.iter().find(|known| known.hash_value() == hash) {
            Some(known) => {
                debug!(file = %file_path.display(), original = %known.file_path().display(), "duplicate found");
                DuplicateDetectionResult::duplicate(file_path, hash, known.file_path())
            }
            None => DuplicateDetectionResult::unique(file_path, hash),
        }
    }
}

/// 1回のバッチ実行中に保持する既知ハッシュ一覧
///
/// 起動時に台帳とステージングCSVから一度だけ構築し、
/// 以降はステージングに追加したものを末尾に積む
#[derive(Debug, Clone, Default)]
pub struct KnownHashes {
    entries: Vec<FileHash>,
}

impl KnownHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(ハッシュ, ファイル名)` の組を `folder` 内の場所として追加
    ///
    /// ハッシュが空の行は無視する
    pub fn extend_from<'a, I>(&mut self, folder: &Path, rows: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (hash, file_name) in rows {
            if let Ok(entry) = FileHash::new(folder.join(file_name), hash.trim()) {
                self.entries.push(entry);
            }
        }
    }

    pub fn push(&mut self, entry: FileHash) {
        self.entries.push(entry);
    }

    pub fn as_slice(&self) -> &[FileHash] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
