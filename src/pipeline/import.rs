//! 台帳取込
//!
//! ステージングCSVの行を順に台帳へ追加し、scannedのファイルを
//! 通し番号付きの名前でimportedへ移動する。
//! 1行の失敗では止めず、失敗した行はステージングに残す。

use crate::archive::{FileArchiver, FsArchiver};
use crate::config::FolderLayout;
use crate::error::Result;
use crate::staging::{CsvStagingStore, StagingStore};
use crate::workbook::{WorkbookLedger, WorkbookRow};
use indicatif::ProgressBar;
use receipt_ai_common::{generate_imported_filename, Error as CommonError, StagingRow};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    /// importedへ移したファイル名（取込順）
    pub imported: Vec<String>,
    /// 抽出失敗の行（ステージングに残す）
    pub skipped: usize,
    /// `(DoneFilename, 理由)`
    pub failed: Vec<(String, String)>,
}

pub struct ImportPipeline<'a, A = FsArchiver, S = CsvStagingStore> {
    layout: &'a FolderLayout,
    archiver: A,
    store: S,
    progress: ProgressBar,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(layout: &'a FolderLayout) -> Self {
        Self::with_parts(layout, FsArchiver, CsvStagingStore)
    }
}

impl<'a, A, S> ImportPipeline<'a, A, S>
where
    A: FileArchiver,
    S: StagingStore,
{
    pub fn with_parts(layout: &'a FolderLayout, archiver: A, store: S) -> Self {
        Self {
            layout,
            archiver,
            store,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(&self) -> Result<ImportSummary> {
        let staging = self.store.read(&self.layout.staging_csv)?;
        let mut summary = ImportSummary::default();
        if staging.is_empty() {
            info!(path = %self.layout.staging_csv.display(), "nothing staged");
            return Ok(summary);
        }

        let mut ledger = WorkbookLedger::load(&self.layout.workbook)?;
        info!(
            staged = staging.entry_count,
            last_sequence = ledger.max_sequence(),
            "importing staged receipts"
        );

        let mut remaining: Vec<StagingRow> = Vec::new();
        self.progress.set_length(staging.entry_count as u64);

        for row in staging.receipts {
            self.progress.set_message(row.done_filename.clone());

            if let Some(kind) = row.error_kind() {
                // 抽出失敗の行は手動確認用に残す
                info!(file = %row.done_filename, tag = %kind, "failed extraction left staged");
                summary.skipped += 1;
                remaining.push(row);
            } else {
                match self.import_row(&row, &mut ledger) {
                    Ok(name) => {
                        info!(file = %row.done_filename, imported = %name, "receipt imported");
                        summary.imported.push(name);
                    }
                    Err(e) => {
                        warn!(file = %row.done_filename, error = %e, "import failed");
                        summary.failed.push((row.done_filename.clone(), e.to_string()));
                        remaining.push(row);
                    }
                }
            }
            self.progress.inc(1);
        }

        if !summary.imported.is_empty() {
            self.store.rewrite(&remaining, &self.layout.staging_csv)?;
        }

        self.progress.finish_and_clear();
        Ok(summary)
    }

    /// 1行を取込み、importedでのファイル名を返す
    fn import_row(&self, row: &StagingRow, ledger: &mut WorkbookLedger) -> Result<String> {
        if row.done_filename.trim().is_empty() {
            return Err(CommonError::Validation("DoneFilenameが空です".into()).into());
        }

        let sequence = ledger.max_sequence() + 1;
        let extension = Path::new(&row.done_filename)
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = generate_imported_filename(sequence, &row.date, &row.description, &extension)?;

        let source = self.layout.scanned.join(&row.done_filename);
        let moved = self.archiver.move_into(&source, &self.layout.imported, &name)?;

        let entry = WorkbookRow {
            sequence,
            amount: row.amount.clone(),
            tax: row.tax.clone(),
            tax_percentage: row.tax_percentage.clone(),
            description: row.description.clone(),
            currency: row.currency.clone(),
            date: row.date.clone(),
            confidence: row.confidence.clone(),
            hash: row.hash.clone(),
            filename: moved.archived_filename.clone(),
            imported_at: moved.archive_timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        };

        if let Err(e) = ledger.append(entry) {
            // 台帳に書けなければファイルをscannedへ戻す
            if let Err(back) =
                self.archiver
                    .move_into(&moved.archived_path, &self.layout.scanned, &row.done_filename)
            {
                warn!(file = %moved.archived_filename, error = %back, "could not return file to scanned");
            }
            return Err(e);
        }

        Ok(moved.archived_filename)
    }
}
