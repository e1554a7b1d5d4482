//! レシート読取処理
//!
//! incoming → ハッシュ → 重複チェック → AI抽出 → scanned / failed → ステージングCSV
//!
//! 1ファイルずつ完了させてから次に進む。1ファイルの失敗でバッチは止めない。

use super::load_known_hashes;
use crate::archive::{ensure_folder, route_to_failed, ArchiveResult, FileArchiver, FsArchiver};
use crate::config::FolderLayout;
use crate::duplicate::{DuplicateDetector, KnownHashes};
use crate::error::Result;
use crate::extractor::ReceiptExtractor;
use crate::hashing::{FileHasher, Sha256Hasher};
use crate::scanner::{scan_folder, ReceiptFile};
use crate::staging::{CsvStagingStore, StagingStore};
use indicatif::ProgressBar;
use receipt_ai_common::{
    generate_unique_scanned_filename, ErrorReceiptData, ExtractionErrorKind, FileHash, Receipt,
};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// 1ファイルの処理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// scannedへ配置済み（配置後のファイル名）
    Completed(String),
    /// failedへ配置済み（配置後のファイル名）
    Failed(String),
    /// failedへ配置したがステージングに記録できなかった（配置後のファイル名, 理由）
    FailedUnstaged(String, String),
    /// 既知のハッシュと一致（一致した場所）
    Duplicate(String),
}

/// バッチ全体の集計
#[derive(Debug, Clone, Default)]
pub struct ProcessSummary {
    pub completed: usize,
    pub failed: usize,
    pub duplicates: usize,
    /// failedへも移せなかったファイル（incomingに残る）
    pub errors: Vec<(String, String)>,
    /// failedへ移したがステージング行を書けなかったファイル（`failed` にも数える）
    pub unstaged: Vec<(String, String)>,
}

impl ProcessSummary {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.duplicates + self.errors.len()
    }
}

pub struct ReceiptProcessor<'a, H = Sha256Hasher, A = FsArchiver, S = CsvStagingStore> {
    layout: &'a FolderLayout,
    extractor: &'a dyn ReceiptExtractor,
    detector: DuplicateDetector<H>,
    archiver: A,
    store: S,
    progress: ProgressBar,
}

impl<'a> ReceiptProcessor<'a> {
    pub fn new(layout: &'a FolderLayout, extractor: &'a dyn ReceiptExtractor) -> Self {
        Self::with_parts(layout, extractor, Sha256Hasher, FsArchiver, CsvStagingStore)
    }
}

impl<'a, H, A, S> ReceiptProcessor<'a, H, A, S>
where
    H: FileHasher,
    A: FileArchiver,
    S: StagingStore,
{
    pub fn with_parts(
        layout: &'a FolderLayout,
        extractor: &'a dyn ReceiptExtractor,
        hasher: H,
        archiver: A,
        store: S,
    ) -> Self {
        Self {
            layout,
            extractor,
            detector: DuplicateDetector::new(hasher),
            archiver,
            store,
            progress: ProgressBar::hidden(),
        }
    }

    /// 進捗バーを表示する
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// incomingフォルダの全ファイルを処理
    pub fn process_all(&self) -> Result<ProcessSummary> {
        ensure_folder(&self.layout.scanned)?;
        ensure_folder(&self.layout.failed)?;

        let files = scan_folder(&self.layout.incoming)?;
        let mut known = load_known_hashes(self.layout, &self.store)?;
        info!(files = files.len(), known = known.len(), "processing incoming folder");

        let mut summary = ProcessSummary::default();
        self.progress.set_length(files.len() as u64);

        for file in &files {
            self.progress.set_message(file.file_name.clone());

            match self.process_file(file, &mut known) {
                Ok(FileOutcome::Completed(name)) => {
                    info!(file = %file.file_name, scanned = %name, "receipt staged");
                    summary.completed += 1;
                }
                Ok(FileOutcome::Failed(name)) => {
                    summary.failed += 1;
                    warn!(file = %file.file_name, failed = %name, "receipt moved to failed folder");
                }
                Ok(FileOutcome::FailedUnstaged(name, reason)) => {
                    summary.failed += 1;
                    warn!(file = %file.file_name, failed = %name, error = %reason, "receipt moved to failed folder but not staged");
                    summary.unstaged.push((name, reason));
                }
                Ok(FileOutcome::Duplicate(location)) => {
                    info!(file = %file.file_name, original = %location, "duplicate skipped");
                    summary.duplicates += 1;
                }
                Err(e) => {
                    warn!(file = %file.file_name, error = %e, "receipt left in incoming");
                    summary.errors.push((file.file_name.clone(), e.to_string()));
                }
            }
            self.progress.inc(1);
        }

        self.progress.finish_and_clear();
        Ok(summary)
    }

    /// 1ファイルを処理
    ///
    /// `Err` はfailedへの移動にも失敗した場合のみ（ファイルはincomingに残る）
    pub fn process_file(&self, file: &ReceiptFile, known: &mut KnownHashes) -> Result<FileOutcome> {
        let check = self.detector.check_duplicate(&file.path, known.as_slice());

        let hash = match check.hash_value.clone() {
            Some(hash) if !check.has_error() => hash,
            _ => {
                // ハッシュが無いのでステージングには記録しない
                let message = check
                    .error_message
                    .as_deref()
                    .unwrap_or("ハッシュ値を取得できません");
                let error = ErrorReceiptData::new(ExtractionErrorKind::CorruptFile, message);
                let routed =
                    route_to_failed(&self.archiver, &file.path, &self.layout.failed, &error.log_message())?;
                return Ok(FileOutcome::Failed(routed.archived_filename));
            }
        };

        let mut receipt = Receipt::new(&file.path, &hash);

        if check.is_duplicate {
            receipt.mark_duplicate()?;
            let location = check
                .duplicate_location
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| check.location_name());
            return Ok(FileOutcome::Duplicate(location));
        }

        receipt.start_processing()?;

        let data = match self.extractor.extract(&file.path, file.mime_type) {
            Ok(data) => data,
            Err(error) => return self.fail_receipt(file, receipt, error, known),
        };

        let extension = extension_of(&file.path);
        let scanned = &self.layout.scanned;
        let name = match generate_unique_scanned_filename(
            data.date(),
            data.description(),
            &extension,
            |candidate| scanned.join(candidate).exists(),
        ) {
            Ok(name) => name,
            Err(e) => {
                // 日付・説明から名前が作れない場合は読取結果が不正とみなす
                let error = ErrorReceiptData::new(ExtractionErrorKind::InvalidResponse, e.to_string());
                return self.fail_receipt(file, receipt, error, known);
            }
        };

        let copied = match self.archiver.copy_into(&file.path, scanned, &name) {
            Ok(copied) => copied,
            Err(e) => {
                let error = ErrorReceiptData::new(ExtractionErrorKind::ArchiveFailure, e.to_string());
                return self.fail_receipt(file, receipt, error, known);
            }
        };

        receipt.complete(data)?;
        self.stage_completed(file, &receipt, copied, known)
    }

    /// failedへ移し、エラー行をステージングに追記する
    ///
    /// failedへ移した後は `Err` を返さない（ファイルはもうincomingに無い）
    fn fail_receipt(
        &self,
        file: &ReceiptFile,
        mut receipt: Receipt,
        error: ErrorReceiptData,
        known: &mut KnownHashes,
    ) -> Result<FileOutcome> {
        let routed = route_to_failed(&self.archiver, &file.path, &self.layout.failed, &error.log_message())?;
        receipt.fail(error)?;
        known.push(FileHash::new(&routed.archived_path, receipt.file_hash())?);

        let row = receipt.to_csv_row(&routed.archived_filename);
        if let Err(e) = self.store.save(std::slice::from_ref(&row), &self.layout.staging_csv) {
            return Ok(FileOutcome::FailedUnstaged(routed.archived_filename, e.to_string()));
        }
        Ok(FileOutcome::Failed(routed.archived_filename))
    }

    /// ステージング追記 → incomingから削除
    fn stage_completed(
        &self,
        file: &ReceiptFile,
        receipt: &Receipt,
        copied: ArchiveResult,
        known: &mut KnownHashes,
    ) -> Result<FileOutcome> {
        let row = receipt.to_csv_row(&copied.archived_filename);
        if let Err(e) = self.store.save(std::slice::from_ref(&row), &self.layout.staging_csv) {
            // 記録できなかったコピーは残さない（次回やり直す）
            let _ = fs::remove_file(&copied.archived_path);
            return Err(e);
        }
        known.push(FileHash::new(&copied.archived_path, receipt.file_hash())?);

        if let Err(e) = fs::remove_file(&file.path) {
            // 記録済みなので次回は重複として扱われる
            warn!(file = %file.file_name, error = %e, "could not remove processed file from incoming");
        }

        Ok(FileOutcome::Completed(copied.archived_filename))
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default()
}
