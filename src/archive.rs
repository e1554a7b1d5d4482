//! ファイル移動モジュール
//!
//! incoming → scanned / failed → imported の各段階でファイルを配置する。
//! 失敗時は移動元に手を付けず、原因を `ArchiveError` で返す。

use chrono::{DateTime, Local};
use receipt_ai_common::unique_file_name;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// ファイル移動の失敗要因
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("フォルダへのアクセス権がありません: {0}")]
    FolderPermission(String),

    #[error("フォルダを作成できません: {path}: {source}")]
    FolderCreation {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("移動元ファイルにアクセスできません: {path}: {reason}")]
    SourceInaccessible { path: String, reason: String },

    #[error("移動先に同名ファイルがあります: {0}")]
    DestinationExists(String),

    #[error("書き込みエラー: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// 配置結果（監査用の来歴）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResult {
    pub source_filename: String,
    pub archived_filename: String,
    pub archive_timestamp: DateTime<Local>,
    /// 配置先フォルダ内で一意なID（配置後ファイル名の拡張子なし部分）
    pub file_id: String,
    pub archived_path: PathBuf,
}

/// ファイル配置の差し替え口
pub trait FileArchiver {
    /// コピー（移動元は残す）
    fn copy_into(&self, source: &Path, dest_folder: &Path, file_name: &str)
        -> Result<ArchiveResult, ArchiveError>;

    /// 移動（移動元を削除）
    fn move_into(&self, source: &Path, dest_folder: &Path, file_name: &str)
        -> Result<ArchiveResult, ArchiveError>;
}

/// ローカルファイルシステム実装
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArchiver;

impl FileArchiver for FsArchiver {
    fn copy_into(
        &self,
        source: &Path,
        dest_folder: &Path,
        file_name: &str,
    ) -> Result<ArchiveResult, ArchiveError> {
        let dest = prepare(source, dest_folder, file_name)?;
        copy_exclusive(source, &dest)?;
        debug!(from = %source.display(), to = %dest.display(), "copied");
        Ok(archive_result(source, &dest))
    }

    fn move_into(
        &self,
        source: &Path,
        dest_folder: &Path,
        file_name: &str,
    ) -> Result<ArchiveResult, ArchiveError> {
        let dest = prepare(source, dest_folder, file_name)?;
        copy_exclusive(source, &dest)?;

        // 移動元を消せなければコピーを取り消して元の状態に戻す
        if let Err(e) = fs::remove_file(source) {
            let _ = fs::remove_file(&dest);
            return Err(ArchiveError::SourceInaccessible {
                path: source.display().to_string(),
                reason: format!("削除できません（使用中の可能性）: {}", e),
            });
        }

        debug!(from = %source.display(), to = %dest.display(), "moved");
        Ok(archive_result(source, &dest))
    }
}

/// フォルダを用意し、移動元と移動先を検証
fn prepare(source: &Path, dest_folder: &Path, file_name: &str) -> Result<PathBuf, ArchiveError> {
    ensure_folder(dest_folder)?;

    match fs::metadata(source) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            return Err(ArchiveError::SourceInaccessible {
                path: source.display().to_string(),
                reason: "通常ファイルではありません".into(),
            })
        }
        Err(e) => {
            return Err(ArchiveError::SourceInaccessible {
                path: source.display().to_string(),
                reason: e.to_string(),
            })
        }
    }

    let dest = dest_folder.join(file_name);
    if dest.exists() {
        return Err(ArchiveError::DestinationExists(dest.display().to_string()));
    }
    Ok(dest)
}

/// フォルダがなければ作成
pub fn ensure_folder(folder: &Path) -> Result<(), ArchiveError> {
    if folder.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(folder).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => ArchiveError::FolderPermission(folder.display().to_string()),
        _ => ArchiveError::FolderCreation {
            path: folder.display().to_string(),
            source: e,
        },
    })
}

/// 既存ファイルを上書きしないコピー。途中で失敗したら書きかけを消す
fn copy_exclusive(source: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let mut reader = File::open(source).map_err(|e| ArchiveError::SourceInaccessible {
        path: source.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => ArchiveError::DestinationExists(dest.display().to_string()),
            ErrorKind::PermissionDenied => ArchiveError::FolderPermission(
                dest.parent().unwrap_or(dest).display().to_string(),
            ),
            _ => ArchiveError::Io {
                path: dest.display().to_string(),
                source: e,
            },
        })?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    if let Err(e) = copied {
        drop(writer);
        let _ = fs::remove_file(dest);
        return Err(ArchiveError::Io {
            path: dest.display().to_string(),
            source: e,
        });
    }
    Ok(())
}

fn archive_result(source: &Path, dest: &Path) -> ArchiveResult {
    let name_of = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    };
    let file_id = dest
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    ArchiveResult {
        source_filename: name_of(source),
        archived_filename: name_of(dest),
        archive_timestamp: Local::now(),
        file_id,
        archived_path: dest.to_path_buf(),
    }
}

/// フォルダ内で未使用のファイル名を探す
pub fn unique_name_in(folder: &Path, file_name: &str) -> Result<String, ArchiveError> {
    unique_file_name(file_name, |candidate| folder.join(candidate).exists())
        .map_err(|_| ArchiveError::DestinationExists(folder.join(file_name).display().to_string()))
}

/// failedフォルダへ移動し、`{ファイル名}.error.log` を書く
pub fn route_to_failed<A>(
    archiver: &A,
    source: &Path,
    failed_dir: &Path,
    message: &str,
) -> Result<ArchiveResult, ArchiveError>
where
    A: FileArchiver + ?Sized,
{
    ensure_folder(failed_dir)?;

    let original = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "receipt".to_string());
    let file_name = unique_name_in(failed_dir, &original)?;

    let result = archiver.move_into(source, failed_dir, &file_name)?;

    let log_path = failed_dir.join(format!("{}.error.log", result.archived_filename));
    fs::write(&log_path, format!("{}\n", message)).map_err(|e| ArchiveError::Io {
        path: log_path.display().to_string(),
        source: e,
    })?;

    info!(file = %original, to = %result.archived_filename, "moved to failed folder");
    Ok(result)
}
