//! レシート集約
//!
//! 状態遷移:
//! - Pending → Processing → Completed / Failed
//! - Pending / Processing → Duplicate
//!
//! Completed / Failed / Duplicate は終端状態

use crate::error::{Error, Result};
use crate::types::{ErrorReceiptData, ReceiptData, StagingRow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// 処理状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Duplicate,
}

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::Completed | ProcessingStatus::Failed | ProcessingStatus::Duplicate
        )
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessingStatus::Pending => "PENDING",
            ProcessingStatus::Processing => "PROCESSING",
            ProcessingStatus::Completed => "COMPLETED",
            ProcessingStatus::Failed => "FAILED",
            ProcessingStatus::Duplicate => "DUPLICATE",
        };
        f.write_str(s)
    }
}

/// 1ファイル分のレシート処理状態
#[derive(Debug, Clone)]
pub struct Receipt {
    file_path: PathBuf,
    file_hash: String,
    status: ProcessingStatus,
    extraction_data: Option<ReceiptData>,
    error: Option<ErrorReceiptData>,
}

impl Receipt {
    /// 検出時はPending
    pub fn new(file_path: impl Into<PathBuf>, file_hash: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            file_hash: file_hash.into(),
            status: ProcessingStatus::Pending,
            extraction_data: None,
            error: None,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn file_hash(&self) -> &str {
        &self.file_hash
    }

    pub fn status(&self) -> ProcessingStatus {
        self.status
    }

    pub fn extraction_data(&self) -> Option<&ReceiptData> {
        self.extraction_data.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorReceiptData> {
        self.error.as_ref()
    }

    fn transition(&mut self, allowed: &[ProcessingStatus], to: ProcessingStatus) -> Result<()> {
        if !allowed.contains(&self.status) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn start_processing(&mut self) -> Result<()> {
        self.transition(&[ProcessingStatus::Pending], ProcessingStatus::Processing)
    }

    pub fn complete(&mut self, data: ReceiptData) -> Result<()> {
        self.transition(&[ProcessingStatus::Processing], ProcessingStatus::Completed)?;
        self.extraction_data = Some(data);
        Ok(())
    }

    pub fn fail(&mut self, error: ErrorReceiptData) -> Result<()> {
        self.transition(&[ProcessingStatus::Processing], ProcessingStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    pub fn mark_duplicate(&mut self) -> Result<()> {
        self.transition(
            &[ProcessingStatus::Pending, ProcessingStatus::Processing],
            ProcessingStatus::Duplicate,
        )
    }

    /// ステージングCSV行に変換
    ///
    /// 失敗時は Amount/Confidence を `0`、Description をエラータグにする
    pub fn to_csv_row(&self, done_filename: &str) -> StagingRow {
        let mut row = StagingRow {
            hash: self.file_hash.clone(),
            done_filename: done_filename.to_string(),
            ..Default::default()
        };

        match (&self.extraction_data, &self.error) {
            (Some(data), _) => {
                row.amount = data.amount().to_string();
                row.tax = data.tax().map(|t| t.to_string()).unwrap_or_default();
                row.tax_percentage = data.tax_percentage().map(|t| t.to_string()).unwrap_or_default();
                row.description = data.description().to_string();
                row.currency = data.currency().to_string();
                row.date = data.date().to_string();
                row.confidence = data.confidence().to_string();
            }
            (None, Some(error)) => {
                row.amount = error.amount().to_string();
                row.description = error.description().to_string();
                row.confidence = error.confidence().to_string();
            }
            (None, None) => {
                row.amount = "0".into();
                row.confidence = "0".into();
            }
        }

        row
    }
}
