//! レシート読取処理テスト
//!
//! 抽出器を差し替えて incoming → scanned / failed → ステージング の流れを検証

use receipt_ai_common::{ErrorReceiptData, ExtractionErrorKind, ReceiptData, StagingRow};
use receipt_ai_rust::archive::{ArchiveError, ArchiveResult, FileArchiver, FsArchiver};
use receipt_ai_rust::config::FolderLayout;
use receipt_ai_rust::error::{ReceiptAiError, Result};
use receipt_ai_rust::extractor::{ExtractionResult, ReceiptExtractor};
use receipt_ai_rust::hashing::Sha256Hasher;
use receipt_ai_rust::pipeline::ReceiptProcessor;
use receipt_ai_rust::staging::{CsvStagingStore, StagingStore, StagingTableData};
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// ファイル名に "fail" を含むものはAPIエラー、"blank" を含むものは
/// ファイル名に使えない説明、それ以外は固定の読取結果
struct FakeExtractor {
    calls: RefCell<Vec<String>>,
}

impl FakeExtractor {
    fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ReceiptExtractor for FakeExtractor {
    fn extract(&self, path: &Path, _mime_type: &str) -> ExtractionResult {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        self.calls.borrow_mut().push(name.clone());

        if name.contains("fail") {
            return Err(ErrorReceiptData::new(ExtractionErrorKind::ApiFailure, "timeout"));
        }
        let description = if name.contains("blank") { "***" } else { "Coffee Company" };
        Ok(ReceiptData::new(
            Decimal::new(4567, 2),
            Some(Decimal::new(299, 2)),
            Some(Decimal::new(7, 0)),
            description,
            "eur",
            "10.07.2025",
            92,
        )
        .unwrap())
    }
}

/// scannedへのコピーだけ失敗する
struct NoCopyArchiver;

impl FileArchiver for NoCopyArchiver {
    fn copy_into(
        &self,
        _source: &Path,
        dest_folder: &Path,
        _file_name: &str,
    ) -> std::result::Result<ArchiveResult, ArchiveError> {
        Err(ArchiveError::FolderPermission(dest_folder.display().to_string()))
    }

    fn move_into(
        &self,
        source: &Path,
        dest_folder: &Path,
        file_name: &str,
    ) -> std::result::Result<ArchiveResult, ArchiveError> {
        FsArchiver.move_into(source, dest_folder, file_name)
    }
}

/// 追記できないステージング
struct ReadOnlyStore;

impl StagingStore for ReadOnlyStore {
    fn save(&self, _rows: &[StagingRow], _path: &Path) -> Result<()> {
        Err(ReceiptAiError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only staging",
        )))
    }

    fn read(&self, path: &Path) -> Result<StagingTableData> {
        CsvStagingStore.read(path)
    }

    fn rewrite(&self, _rows: &[StagingRow], _path: &Path) -> Result<()> {
        Ok(())
    }
}

fn setup(root: &Path) -> FolderLayout {
    let layout = FolderLayout::under(root);
    fs::create_dir_all(&layout.incoming).unwrap();
    layout
}

#[test]
fn test_process_stages_and_archives() {
    let dir = tempdir().expect("Failed to create temp dir");
    let layout = setup(dir.path());
    fs::write(layout.incoming.join("a.jpg"), b"receipt-a").unwrap();
    fs::write(layout.incoming.join("b.jpg"), b"receipt-b").unwrap();
    fs::write(layout.incoming.join("notes.txt"), b"ignored").unwrap();

    let extractor = FakeExtractor::new();
    let summary = ReceiptProcessor::new(&layout, &extractor).process_all().unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.duplicates, 0);
    assert!(summary.errors.is_empty());

    // 同じ日付・説明なので2件目は -2
    assert!(layout.scanned.join("20250710-CoffeeCompany.jpg").exists());
    assert!(layout.scanned.join("20250710-CoffeeCompany-2.jpg").exists());
    assert!(!layout.incoming.join("a.jpg").exists());
    assert!(!layout.incoming.join("b.jpg").exists());
    assert!(layout.incoming.join("notes.txt").exists());

    let data = CsvStagingStore.read(&layout.staging_csv).unwrap();
    assert_eq!(data.entry_count, 2);
    let row = &data.receipts[0];
    assert_eq!(row.amount, "45.67");
    assert_eq!(row.tax, "2.99");
    assert_eq!(row.tax_percentage, "7");
    assert_eq!(row.currency, "EUR");
    assert_eq!(row.date, "10-07-2025");
    assert_eq!(row.confidence, "92");
    assert_eq!(row.hash.len(), 64);
    assert_eq!(row.done_filename, "20250710-CoffeeCompany.jpg");
}

#[test]
fn test_duplicate_is_skipped_and_left_in_incoming() {
    let dir = tempdir().expect("Failed to create temp dir");
    let layout = setup(dir.path());
    fs::write(layout.incoming.join("a.jpg"), b"same bytes").unwrap();
    fs::write(layout.incoming.join("b.jpg"), b"same bytes").unwrap();

    let extractor = FakeExtractor::new();
    let summary = ReceiptProcessor::new(&layout, &extractor).process_all().unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.duplicates, 1);
    // 重複は抽出を呼ばない
    assert_eq!(*extractor.calls.borrow(), vec!["a.jpg".to_string()]);
    assert!(layout.incoming.join("b.jpg").exists());
    assert_eq!(CsvStagingStore.read(&layout.staging_csv).unwrap().entry_count, 1);
}

#[test]
fn test_failed_extraction_goes_to_failed_folder() {
    let dir = tempdir().expect("Failed to create temp dir");
    let layout = setup(dir.path());
    fs::write(layout.incoming.join("fail.pdf"), b"%PDF-broken").unwrap();

    let extractor = FakeExtractor::new();
    let summary = ReceiptProcessor::new(&layout, &extractor).process_all().unwrap();

    assert_eq!(summary.failed, 1);
    assert!(!layout.incoming.join("fail.pdf").exists());
    assert!(layout.failed.join("fail.pdf").exists());

    let log = fs::read_to_string(layout.failed.join("fail.pdf.error.log")).unwrap();
    assert_eq!(log.trim(), "API failure: timeout");

    let data = CsvStagingStore.read(&layout.staging_csv).unwrap();
    assert_eq!(data.entry_count, 1);
    let row = &data.receipts[0];
    assert_eq!(row.amount, "0");
    assert_eq!(row.confidence, "0");
    assert_eq!(row.description, "API_FAILURE");
    assert_eq!(row.currency, "");
    assert_eq!(row.date, "");
    assert_eq!(row.done_filename, "fail.pdf");
}

#[test]
fn test_rerun_detects_previously_staged_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let layout = setup(dir.path());
    fs::write(layout.incoming.join("a.jpg"), b"receipt-a").unwrap();

    let extractor = FakeExtractor::new();
    ReceiptProcessor::new(&layout, &extractor).process_all().unwrap();

    // 同じ内容を別名で再投入
    fs::write(layout.incoming.join("a-copy.jpg"), b"receipt-a").unwrap();
    let summary = ReceiptProcessor::new(&layout, &extractor).process_all().unwrap();

    assert_eq!(summary.completed, 0);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(extractor.calls.borrow().len(), 1);
}

#[test]
fn test_missing_incoming_folder_is_error() {
    let dir = tempdir().expect("Failed to create temp dir");
    let layout = FolderLayout::under(dir.path());

    let extractor = FakeExtractor::new();
    assert!(ReceiptProcessor::new(&layout, &extractor).process_all().is_err());
}

/// 名前を作れない読取結果は INVALID_RESPONSE として記録され、再投入は重複になる
#[test]
fn test_unnameable_extraction_is_staged_as_failed() {
    let dir = tempdir().expect("Failed to create temp dir");
    let layout = setup(dir.path());
    fs::write(layout.incoming.join("blank.jpg"), b"receipt-blank").unwrap();

    let extractor = FakeExtractor::new();
    let summary = ReceiptProcessor::new(&layout, &extractor).process_all().unwrap();

    assert_eq!(summary.failed, 1);
    assert!(layout.failed.join("blank.jpg").exists());
    let log = fs::read_to_string(layout.failed.join("blank.jpg.error.log")).unwrap();
    assert!(log.starts_with("Invalid response: "));

    let data = CsvStagingStore.read(&layout.staging_csv).unwrap();
    assert_eq!(data.entry_count, 1);
    assert_eq!(data.receipts[0].description, "INVALID_RESPONSE");
    assert_eq!(data.receipts[0].done_filename, "blank.jpg");
    assert_eq!(data.receipts[0].hash.len(), 64);

    fs::write(layout.incoming.join("blank-again.jpg"), b"receipt-blank").unwrap();
    let summary = ReceiptProcessor::new(&layout, &extractor).process_all().unwrap();
    assert_eq!(summary.duplicates, 1);
    assert_eq!(extractor.calls.borrow().len(), 1);
}

/// scannedへコピーできなければ ARCHIVE_FAILURE としてfailedへ
#[test]
fn test_copy_failure_is_staged_as_failed() {
    let dir = tempdir().expect("Failed to create temp dir");
    let layout = setup(dir.path());
    fs::write(layout.incoming.join("a.jpg"), b"receipt-a").unwrap();

    let extractor = FakeExtractor::new();
    let processor =
        ReceiptProcessor::with_parts(&layout, &extractor, Sha256Hasher, NoCopyArchiver, CsvStagingStore);
    let summary = processor.process_all().unwrap();

    assert_eq!(summary.completed, 0);
    assert_eq!(summary.failed, 1);
    assert!(!layout.incoming.join("a.jpg").exists());
    assert!(layout.failed.join("a.jpg").exists());
    assert!(!layout.scanned.join("20250710-CoffeeCompany.jpg").exists());

    let log = fs::read_to_string(layout.failed.join("a.jpg.error.log")).unwrap();
    assert!(log.starts_with("Archive failure: "));

    let data = CsvStagingStore.read(&layout.staging_csv).unwrap();
    assert_eq!(data.entry_count, 1);
    assert_eq!(data.receipts[0].description, "ARCHIVE_FAILURE");
    assert_eq!(data.receipts[0].amount, "0");
}

/// failedへ移した後にステージングへ書けなくても、incomingに残ったとは報告しない
#[test]
fn test_unstaged_failure_is_reported_separately() {
    let dir = tempdir().expect("Failed to create temp dir");
    let layout = setup(dir.path());
    fs::write(layout.incoming.join("fail.pdf"), b"%PDF-broken").unwrap();

    let extractor = FakeExtractor::new();
    let processor =
        ReceiptProcessor::with_parts(&layout, &extractor, Sha256Hasher, FsArchiver, ReadOnlyStore);
    let summary = processor.process_all().unwrap();

    assert_eq!(summary.failed, 1);
    assert!(summary.errors.is_empty());
    assert_eq!(summary.unstaged.len(), 1);
    assert_eq!(summary.unstaged[0].0, "fail.pdf");
    assert!(summary.unstaged[0].1.contains("read-only staging"));
    assert!(layout.failed.join("fail.pdf").exists());
    assert!(!layout.incoming.join("fail.pdf").exists());
}
