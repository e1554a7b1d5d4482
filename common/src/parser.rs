//! APIレスポンスパーサー
//!
//! AIのレスポンスからJSONオブジェクトを抽出し、ReceiptDataに変換する

use crate::error::{Error, Result};
use crate::types::{ErrorReceiptData, ExtractionErrorKind, ReceiptData};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// APIレスポンスからJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} オブジェクト
/// 3. エラー
///
/// # Examples
/// ```
/// use receipt_ai_common::extract_json;
///
/// let response = "結果: {\"amount\": 12.5}";
/// assert_eq!(extract_json(response).unwrap(), "{\"amount\": 12.5}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7;
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// AIが返すJSONの形
///
/// 数値は数値・文字列どちらでも受け付ける
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawExtraction {
    amount: Option<Value>,
    tax: Option<Value>,
    #[serde(alias = "tax_percentage")]
    tax_percentage: Option<Value>,
    description: Option<String>,
    currency: Option<String>,
    date: Option<String>,
    confidence: Option<Value>,
    error: Option<String>,
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('%')
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Decimal::from_str(&cleaned).ok()
            }
        }
        _ => None,
    }
}

fn to_confidence(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .map(|f| f.round() as i64)
            .unwrap_or(0),
        _ => 0,
    }
}

/// レシート抽出レスポンスをパース
///
/// - JSONが無い、または必須項目が不正 → `INVALID_RESPONSE`
/// - `error` フィールドあり → 対応するタグ（不明なら `API_FAILURE`）
pub fn parse_extraction_response(response: &str) -> std::result::Result<ReceiptData, ErrorReceiptData> {
    let invalid = |reason: String| ErrorReceiptData::new(ExtractionErrorKind::InvalidResponse, reason);

    let json_str = extract_json(response).map_err(|e| invalid(e.to_string()))?;
    let raw: RawExtraction = serde_json::from_str(json_str.trim())
        .map_err(|e| invalid(format!("JSONパースエラー: {}", e)))?;

    if let Some(error) = raw.error.filter(|e| !e.trim().is_empty()) {
        let kind = ExtractionErrorKind::from_tag(&error).unwrap_or(ExtractionErrorKind::ApiFailure);
        return Err(ErrorReceiptData::new(kind, error));
    }

    let amount = raw
        .amount
        .as_ref()
        .and_then(to_decimal)
        .ok_or_else(|| invalid("金額が読み取れません".into()))?;
    let tax = raw.tax.as_ref().and_then(to_decimal);
    let tax_percentage = raw.tax_percentage.as_ref().and_then(to_decimal);
    let confidence = to_confidence(raw.confidence.as_ref());

    ReceiptData::new(
        amount,
        tax,
        tax_percentage,
        raw.description.as_deref().unwrap_or_default(),
        raw.currency.as_deref().unwrap_or_default(),
        raw.date.as_deref().unwrap_or_default(),
        confidence,
    )
    .map_err(|e| invalid(e.to_string()))
}
