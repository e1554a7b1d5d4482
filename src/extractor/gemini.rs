//! Gemini API連携
//!
//! 画像/PDFをBase64のinline_dataとして送信する

use super::{preflight, ExtractionResult, ReceiptExtractor};
use crate::error::{ReceiptAiError, Result};
use base64::Engine;
use receipt_ai_common::{
    build_receipt_prompt, parse_extraction_response, ErrorReceiptData, ExtractionErrorKind,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini APIリクエスト
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini APIレスポンス
#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiExtractor {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl GeminiExtractor {
    pub fn new(api_key: String, model: &str, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ReceiptAiError::ApiCall(format!("HTTPクライアント初期化エラー: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
        })
    }

    fn call_api(&self, request: &GeminiRequest) -> std::result::Result<String, String> {
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .map_err(|e| format!("送信エラー: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(format!("HTTP {}: {}", status, preview));
        }

        let payload: GeminiResponse = response
            .json()
            .map_err(|e| format!("レスポンス解析エラー: {}", e))?;

        payload
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| "Empty response".to_string())
    }
}

impl ReceiptExtractor for GeminiExtractor {
    fn extract(&self, path: &Path, mime_type: &str) -> ExtractionResult {
        let bytes = preflight(path, mime_type)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: build_receipt_prompt(&file_name),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                response_mime_type: "application/json".to_string(),
            },
        };

        let text = self
            .call_api(&request)
            .map_err(|reason| ErrorReceiptData::new(ExtractionErrorKind::ApiFailure, reason))?;
        debug!(file = %file_name, chars = text.len(), "gemini response received");

        parse_extraction_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "prompt".into() },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png".into(),
                            data: "AAAA".into(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                response_mime_type: "application/json".into(),
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_response_deserialization() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"amount\": 1}"}]}}]}"#;
        let response: GeminiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.candidates[0].content.parts[0].text, r#"{"amount": 1}"#);
    }

    #[test]
    fn test_unsupported_format_skips_api_call() {
        let extractor = GeminiExtractor::new("dummy".into(), "gemini-2.0-flash", 5).unwrap();
        let err = extractor.extract(Path::new("receipt.tiff"), "image/tiff").unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::UnsupportedFormat);
    }
}
