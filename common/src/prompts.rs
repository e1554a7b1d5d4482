//! プロンプト生成モジュール
//!
//! CLI（Claude）とHTTP（Gemini）で共有するレシート読取プロンプト

use crate::types::ExtractionErrorKind;

/// レシート読取用プロンプト
///
/// # Arguments
/// * `file_name` - 解析対象のファイル名（プロンプト内で参照する）
pub fn build_receipt_prompt(file_name: &str) -> String {
    let error_tags = ExtractionErrorKind::REPORTABLE
        .iter()
        .map(|k| k.tag())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are reading a scanned receipt ({file_name}).
Extract the purchase data and answer with a single JSON object only.

## Output format (exactly this JSON object)
{{
  "amount": total amount paid including tax (number),
  "tax": tax amount (number, or null if not printed),
  "taxPercentage": tax rate in percent (number, or null),
  "description": shop or vendor name,
  "currency": ISO 4217 code, 3 letters (e.g. "EUR", "USD", "JPY"),
  "date": purchase date as DD-MM-YYYY,
  "confidence": how sure you are about these values, integer 0-100
}}

## When the receipt cannot be read
Answer {{"error": "<TAG>"}} where TAG is one of: {error_tags}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_receipt_prompt() {
        let prompt = build_receipt_prompt("scan_001.jpg");
        assert!(prompt.contains("scan_001.jpg"));
        assert!(prompt.contains("DD-MM-YYYY"));
        assert!(prompt.contains("\"taxPercentage\""));
        assert!(prompt.contains("CORRUPT_FILE"));
        assert!(prompt.contains("UNSUPPORTED_FORMAT"));
        assert!(!prompt.contains("ARCHIVE_FAILURE"));
    }
}
