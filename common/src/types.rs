//! レシート関連の型定義
//!
//! - FileHash: ファイル内容のハッシュ
//! - ReceiptData: AI抽出結果（検証済み）
//! - ErrorReceiptData: 抽出失敗時の代替データ
//! - StagingRow: ステージングCSVの1行

use crate::error::{Error, Result};
use crate::naming::{format_receipt_date, parse_receipt_date};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// ファイルとその内容ハッシュの組
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHash {
    file_path: PathBuf,
    hash_value: String,
}

impl FileHash {
    /// 空白のみのハッシュは受け付けない
    pub fn new(file_path: impl Into<PathBuf>, hash_value: impl Into<String>) -> Result<Self> {
        let hash_value = hash_value.into();
        if hash_value.trim().is_empty() {
            return Err(Error::Validation("ハッシュ値が空です".into()));
        }
        Ok(Self {
            file_path: file_path.into(),
            hash_value,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn hash_value(&self) -> &str {
        &self.hash_value
    }
}

/// 抽出失敗の種別（固定語彙）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionErrorKind {
    ApiFailure,
    CorruptFile,
    UnsupportedFormat,
    InvalidResponse,
    /// 読取後にscannedへ配置できなかった
    ArchiveFailure,
}

impl ExtractionErrorKind {
    pub const ALL: [ExtractionErrorKind; 5] = [
        ExtractionErrorKind::ApiFailure,
        ExtractionErrorKind::CorruptFile,
        ExtractionErrorKind::UnsupportedFormat,
        ExtractionErrorKind::InvalidResponse,
        ExtractionErrorKind::ArchiveFailure,
    ];

    /// AIが `error` として返してよいタグ
    pub const REPORTABLE: [ExtractionErrorKind; 4] = [
        ExtractionErrorKind::ApiFailure,
        ExtractionErrorKind::CorruptFile,
        ExtractionErrorKind::UnsupportedFormat,
        ExtractionErrorKind::InvalidResponse,
    ];

    /// CSVのDescription列に書くタグ
    pub fn tag(&self) -> &'static str {
        match self {
            ExtractionErrorKind::ApiFailure => "API_FAILURE",
            ExtractionErrorKind::CorruptFile => "CORRUPT_FILE",
            ExtractionErrorKind::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ExtractionErrorKind::InvalidResponse => "INVALID_RESPONSE",
            ExtractionErrorKind::ArchiveFailure => "ARCHIVE_FAILURE",
        }
    }

    /// エラーログ用の表示名
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionErrorKind::ApiFailure => "API failure",
            ExtractionErrorKind::CorruptFile => "Corrupt file",
            ExtractionErrorKind::UnsupportedFormat => "Unsupported format",
            ExtractionErrorKind::InvalidResponse => "Invalid response",
            ExtractionErrorKind::ArchiveFailure => "Archive failure",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        Self::ALL.into_iter().find(|k| k.tag().eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for ExtractionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// AIで抽出したレシート内容
///
/// `new` で検証してから生成する。生成後は変更不可
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptData {
    amount: Decimal,
    tax: Option<Decimal>,
    tax_percentage: Option<Decimal>,
    description: String,
    currency: String,
    date: String,
    confidence: u8,
}

impl ReceiptData {
    /// 検証付きコンストラクタ
    ///
    /// - 金額は0以上
    /// - 通貨は大文字化して3文字
    /// - 日付は日-月-年（`dd-mm-yyyy` に正規化）
    /// - 信頼度は0〜100に丸める
    pub fn new(
        amount: Decimal,
        tax: Option<Decimal>,
        tax_percentage: Option<Decimal>,
        description: &str,
        currency: &str,
        date: &str,
        confidence: i64,
    ) -> Result<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(Error::Validation(format!("金額が負の値です: {}", amount)));
        }

        let currency = currency.trim().to_uppercase();
        if currency.chars().count() != 3 {
            return Err(Error::Validation(format!(
                "通貨コードは3文字である必要があります: '{}'",
                currency
            )));
        }

        let date = format_receipt_date(parse_receipt_date(date)?);

        Ok(Self {
            amount,
            tax,
            tax_percentage,
            description: description.trim().to_string(),
            currency,
            date,
            confidence: confidence.clamp(0, 100) as u8,
        })
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn tax(&self) -> Option<Decimal> {
        self.tax
    }

    pub fn tax_percentage(&self) -> Option<Decimal> {
        self.tax_percentage
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }
}

/// 抽出失敗時のレシートデータ
///
/// 数値は0、通貨・日付は空、説明はエラータグ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReceiptData {
    pub kind: ExtractionErrorKind,
    pub reason: String,
}

impl ErrorReceiptData {
    pub fn new(kind: ExtractionErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn amount(&self) -> Decimal {
        Decimal::ZERO
    }

    pub fn confidence(&self) -> u8 {
        0
    }

    pub fn description(&self) -> &'static str {
        self.kind.tag()
    }

    /// `{filename}.error.log` に書く内容
    pub fn log_message(&self) -> String {
        format!("{}: {}", self.kind.label(), self.reason)
    }
}

impl fmt::Display for ErrorReceiptData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.log_message())
    }
}

impl std::error::Error for ErrorReceiptData {}

/// ステージングCSVの列（順序固定）
pub const STAGING_HEADERS: [&str; 9] = [
    "Amount",
    "Tax",
    "TaxPercentage",
    "Description",
    "Currency",
    "Date",
    "Confidence",
    "Hash",
    "DoneFilename",
];

/// ステージングCSVの1行
///
/// 読み込んだ文字列をそのまま保持する（欠けた列は空文字）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StagingRow {
    pub amount: String,
    pub tax: String,
    pub tax_percentage: String,
    pub description: String,
    pub currency: String,
    pub date: String,
    pub confidence: String,
    pub hash: String,
    pub done_filename: String,
}

impl StagingRow {
    /// `STAGING_HEADERS` と同じ順序の値
    pub fn values(&self) -> [&str; 9] {
        [
            &self.amount,
            &self.tax,
            &self.tax_percentage,
            &self.description,
            &self.currency,
            &self.date,
            &self.confidence,
            &self.hash,
            &self.done_filename,
        ]
    }

    /// 列名から値を引く関数で行を組み立てる
    pub fn from_lookup<'a, F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let get = |name: &str| lookup(name).unwrap_or_default().to_string();
        Self {
            amount: get("Amount"),
            tax: get("Tax"),
            tax_percentage: get("TaxPercentage"),
            description: get("Description"),
            currency: get("Currency"),
            date: get("Date"),
            confidence: get("Confidence"),
            hash: get("Hash"),
            done_filename: get("DoneFilename"),
        }
    }

    /// 抽出失敗行ならその種別
    pub fn error_kind(&self) -> Option<ExtractionErrorKind> {
        ExtractionErrorKind::from_tag(&self.description)
    }
}
