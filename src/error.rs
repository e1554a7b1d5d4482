use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReceiptAiError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("必須設定が不足しています: {}", .0.join(", "))]
    MissingSettings(Vec<String>),

    #[error("APIキーが設定されていません。`receipt-ai config --set-api-key YOUR_KEY` で設定してください")]
    MissingApiKey,

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("ハッシュ計算エラー: {path}: {source}")]
    Hash {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("入力エラー: {0}")]
    Prompt(String),

    #[error("API呼び出しエラー: {0}")]
    ApiCall(String),

    #[error("ステージングCSVエラー: {0}")]
    Staging(#[from] csv::Error),

    #[error("台帳読み込みエラー: {0}")]
    WorkbookRead(String),

    #[error("通し番号 {sequence} は使用済みです（最大 {max}）")]
    SequenceConflict { sequence: u64, max: u64 },

    #[error("台帳書き込みエラー: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("ファイル移動エラー: {0}")]
    Archive(#[from] crate::archive::ArchiveError),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] receipt_ai_common::Error),
}

pub type Result<T> = std::result::Result<T, ReceiptAiError>;
