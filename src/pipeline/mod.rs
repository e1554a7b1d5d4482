//! 処理パイプライン
//!
//! - `process`: incoming → scanned / failed → ステージングCSV
//! - `import`: ステージングCSV → 台帳 + imported

pub mod import;
pub mod process;

pub use import::{ImportPipeline, ImportSummary};
pub use process::{FileOutcome, ProcessSummary, ReceiptProcessor};

use crate::config::FolderLayout;
use crate::duplicate::KnownHashes;
use crate::error::Result;
use crate::staging::StagingStore;
use crate::workbook::WorkbookLedger;
use tracing::debug;

/// 既知ハッシュ一覧を構築（バッチ開始時に一度だけ）
///
/// 台帳（imported）→ ステージング（scanned / failed）の順。
/// 取込済みの行はステージングから消えるため台帳側も必要
pub fn load_known_hashes<S>(layout: &FolderLayout, store: &S) -> Result<KnownHashes>
where
    S: StagingStore + ?Sized,
{
    let mut known = KnownHashes::new();

    let ledger = WorkbookLedger::load(&layout.workbook)?;
    known.extend_from(
        &layout.imported,
        ledger
            .rows()
            .map(|r| (r.hash.as_str(), r.filename.as_str())),
    );

    let staging = store.read(&layout.staging_csv)?;
    for row in &staging.receipts {
        let folder = if row.error_kind().is_some() {
            &layout.failed
        } else {
            &layout.scanned
        };
        known.extend_from(folder, [(row.hash.as_str(), row.done_filename.as_str())]);
    }

    debug!(
        workbook = ledger.len(),
        staging = staging.entry_count,
        known = known.len(),
        "known hashes loaded"
    );
    Ok(known)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::CsvStagingStore;
    use receipt_ai_common::StagingRow;
    use tempfile::tempdir;

    #[test]
    fn test_known_hashes_from_staging() {
        let dir = tempdir().unwrap();
        let layout = FolderLayout::under(dir.path());

        let ok = StagingRow {
            amount: "1.00".into(),
            hash: "h-ok".into(),
            done_filename: "20250710-Shop.jpg".into(),
            ..Default::default()
        };
        let failed = StagingRow {
            amount: "0".into(),
            description: "API_FAILURE".into(),
            confidence: "0".into(),
            hash: "h-failed".into(),
            done_filename: "blurry.jpg".into(),
            ..Default::default()
        };
        let blank = StagingRow {
            hash: "  ".into(),
            ..Default::default()
        };
        CsvStagingStore
            .save(&[ok, failed, blank], &layout.staging_csv)
            .unwrap();

        let known = load_known_hashes(&layout, &CsvStagingStore).unwrap();
        assert_eq!(known.len(), 2);
        assert_eq!(
            known.as_slice()[0].file_path(),
            layout.scanned.join("20250710-Shop.jpg")
        );
        assert_eq!(known.as_slice()[1].file_path(), layout.failed.join("blurry.jpg"));
    }

    #[test]
    fn test_known_hashes_empty() {
        let dir = tempdir().unwrap();
        let layout = FolderLayout::under(dir.path());
        let known = load_known_hashes(&layout, &CsvStagingStore).unwrap();
        assert!(known.is_empty());
    }
}
