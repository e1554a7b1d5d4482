//! レシート読取（外部AI）モジュール
//!
//! 1ファイルにつき1回のブロッキング呼び出し。リトライはしない。

mod claude_cli;
mod gemini;

pub use claude_cli::ClaudeCliExtractor;
pub use gemini::GeminiExtractor;

use crate::ai_provider::AiProvider;
use crate::config::Config;
use crate::error::Result;
use receipt_ai_common::{ErrorReceiptData, ExtractionErrorKind, ReceiptData};
use std::path::Path;

pub type ExtractionResult = std::result::Result<ReceiptData, ErrorReceiptData>;

/// 外部AIによる抽出の差し替え口
pub trait ReceiptExtractor {
    fn extract(&self, path: &Path, mime_type: &str) -> ExtractionResult;
}

/// 設定に応じた抽出器を作成
pub fn create_extractor(
    config: &Config,
    provider: AiProvider,
    verbose: bool,
) -> Result<Box<dyn ReceiptExtractor>> {
    Ok(match provider {
        AiProvider::Claude => Box::new(ClaudeCliExtractor::new(verbose)),
        AiProvider::Gemini => Box::new(GeminiExtractor::new(
            config.get_api_key()?,
            &config.model,
            config.timeout_seconds,
        )?),
    })
}

/// 送信前のファイル確認
fn preflight(path: &Path, mime_type: &str) -> std::result::Result<Vec<u8>, ErrorReceiptData> {
    if !matches!(mime_type, "application/pdf" | "image/jpeg" | "image/png") {
        return Err(ErrorReceiptData::new(
            ExtractionErrorKind::UnsupportedFormat,
            format!("未対応の形式です: {}", mime_type),
        ));
    }

    let bytes = std::fs::read(path).map_err(|e| {
        ErrorReceiptData::new(ExtractionErrorKind::CorruptFile, format!("読み込めません: {}", e))
    })?;
    if bytes.is_empty() {
        return Err(ErrorReceiptData::new(
            ExtractionErrorKind::CorruptFile,
            "ファイルが空です",
        ));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_preflight_unsupported() {
        let err = preflight(Path::new("a.gif"), "image/gif").unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::UnsupportedFormat);
    }

    #[test]
    fn test_preflight_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::write(&path, b"").unwrap();

        let err = preflight(&path, "image/jpeg").unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::CorruptFile);
    }

    #[test]
    fn test_preflight_ok() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.png");
        std::fs::write(&path, b"\x89PNG").unwrap();
        assert_eq!(preflight(&path, "image/png").unwrap(), b"\x89PNG");
    }
}
