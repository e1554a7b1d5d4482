//! ステージングCSVモジュール
//!
//! 処理済みレシートの追記専用台帳。取込前の確認用であり、
//! Hash列は次回以降の重複チェックにも使う。

use crate::error::Result;
use chrono::{DateTime, Local};
use receipt_ai_common::{StagingRow, STAGING_HEADERS};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// ステージングCSVの読み込み結果（毎回読み直す）
#[derive(Debug, Clone, Default)]
pub struct StagingTableData {
    pub file_path: PathBuf,
    pub exists: bool,
    pub headers: Vec<String>,
    pub receipts: Vec<StagingRow>,
    pub modified_time: Option<DateTime<Local>>,
    pub entry_count: usize,
}

impl StagingTableData {
    /// ヘッダー以外の行がない
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }
}

/// 表形式ストレージの差し替え口
pub trait StagingStore {
    /// 末尾に追記（新規・空ファイルならヘッダーから書く）
    fn save(&self, rows: &[StagingRow], path: &Path) -> Result<()>;

    /// 全行を読む。ファイルがなければ空
    fn read(&self, path: &Path) -> Result<StagingTableData>;

    /// 全体を書き換える
    fn rewrite(&self, rows: &[StagingRow], path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvStagingStore;

impl StagingStore for CsvStagingStore {
    fn save(&self, rows: &[StagingRow], path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let len = file.metadata()?.len();
        if len > 0 && !ends_with_newline(&mut file, len)? {
            file.write_all(b"\n")?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if len == 0 {
            writer.write_record(STAGING_HEADERS)?;
        }
        for row in rows {
            writer.write_record(row.values())?;
        }
        writer.flush()?;

        debug!(path = %path.display(), rows = rows.len(), "staging rows appended");
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<StagingTableData> {
        if !path.exists() {
            return Ok(StagingTableData {
                file_path: path.to_path_buf(),
                ..Default::default()
            });
        }

        let modified_time = fs::metadata(path)?.modified().ok().map(DateTime::<Local>::from);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_path(path)?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut receipts = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row = StagingRow::from_lookup(|name| {
                headers
                    .iter()
                    .position(|h| h.eq_ignore_ascii_case(name))
                    .and_then(|idx| record.get(idx))
            });
            receipts.push(row);
        }

        let entry_count = receipts.len();
        Ok(StagingTableData {
            file_path: path.to_path_buf(),
            exists: true,
            headers,
            receipts,
            modified_time,
            entry_count,
        })
    }

    fn rewrite(&self, rows: &[StagingRow], path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            writer.write_record(STAGING_HEADERS)?;
            for row in rows {
                writer.write_record(row.values())?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;

        debug!(path = %path.display(), rows = rows.len(), "staging rewritten");
        Ok(())
    }
}

fn ends_with_newline(file: &mut fs::File, len: u64) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(amount: &str, hash: &str, done: &str) -> StagingRow {
        StagingRow {
            amount: amount.into(),
            tax: "1.00".into(),
            tax_percentage: "7".into(),
            description: "Coffee, Tea & \"More\"".into(),
            currency: "EUR".into(),
            date: "10-07-2025".into(),
            confidence: "90".into(),
            hash: hash.into(),
            done_filename: done.into(),
        }
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let data = CsvStagingStore.read(&dir.path().join("staging.csv")).unwrap();
        assert!(!data.exists);
        assert!(data.is_empty());
        assert_eq!(data.entry_count, 0);
    }

    #[test]
    fn test_read_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("staging.csv");
        fs::write(&path, "").unwrap();

        let data = CsvStagingStore.read(&path).unwrap();
        assert!(data.exists);
        assert!(data.is_empty());
        assert_eq!(data.entry_count, 0);
    }

    #[test]
    fn test_save_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("staging.csv");

        CsvStagingStore.save(&[row("1.00", "a", "a.jpg")], &path).unwrap();
        CsvStagingStore.save(&[row("2.00", "b", "b.jpg")], &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("Amount,Tax,TaxPercentage").count(), 1);
        assert!(content.starts_with(
            "Amount,Tax,TaxPercentage,Description,Currency,Date,Confidence,Hash,DoneFilename"
        ));

        let data = CsvStagingStore.read(&path).unwrap();
        assert_eq!(data.entry_count, 2);
        assert_eq!(data.receipts[0].hash, "a");
        assert_eq!(data.receipts[1].hash, "b");
        assert!(data.modified_time.is_some());
    }

    #[test]
    fn test_append_after_missing_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("staging.csv");
        fs::write(
            &path,
            "Amount,Tax,TaxPercentage,Description,Currency,Date,Confidence,Hash,DoneFilename\n1,,,,,,,h1,f1.jpg",
        )
        .unwrap();

        CsvStagingStore.save(&[row("2", "h2", "f2.jpg")], &path).unwrap();

        let data = CsvStagingStore.read(&path).unwrap();
        assert_eq!(data.entry_count, 2);
        assert_eq!(data.receipts[0].done_filename, "f1.jpg");
        assert_eq!(data.receipts[1].hash, "h2");
    }

    #[test]
    fn test_rewrite_replaces_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("staging.csv");
        CsvStagingStore
            .save(&[row("1", "a", "a.jpg"), row("2", "b", "b.jpg")], &path)
            .unwrap();

        CsvStagingStore.rewrite(&[row("2", "b", "b.jpg")], &path).unwrap();

        let data = CsvStagingStore.read(&path).unwrap();
        assert_eq!(data.entry_count, 1);
        assert_eq!(data.receipts[0].hash, "b");
        assert!(!dir.path().join("staging.csv.tmp").exists());
    }
}
