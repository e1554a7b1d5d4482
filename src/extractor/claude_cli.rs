//! Claude CLI連携
//!
//! `claude -p` にファイルパスを渡して読ませる

use super::{preflight, ExtractionResult, ReceiptExtractor};
use receipt_ai_common::{
    build_receipt_prompt, parse_extraction_response, ErrorReceiptData, ExtractionErrorKind,
};
use std::path::Path;
use std::process::Command;
use tracing::debug;

pub struct ClaudeCliExtractor {
    verbose: bool,
}

impl ClaudeCliExtractor {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ReceiptExtractor for ClaudeCliExtractor {
    fn extract(&self, path: &Path, mime_type: &str) -> ExtractionResult {
        preflight(path, mime_type)?;

        let abs_path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let prompt = format!(
            "Read the following receipt file: {}\n\n{}",
            abs_path.display().to_string().replace('\\', "/"),
            build_receipt_prompt(&file_name)
        );

        if self.verbose {
            println!("  プロンプト長: {} chars", prompt.len());
        }

        let response = run_claude_cli(&prompt).map_err(|reason| {
            ErrorReceiptData::new(ExtractionErrorKind::ApiFailure, reason)
        })?;

        if self.verbose {
            let preview: String = response.chars().take(500).collect();
            println!("  レスポンス: {}", preview);
        }
        debug!(file = %file_name, chars = response.len(), "claude response received");

        parse_extraction_response(&response)
    }
}

fn run_claude_cli(prompt: &str) -> std::result::Result<String, String> {
    // Claude CLI呼び出し（Windowsではcmd /c経由、改行と引用符をエスケープ）
    #[cfg(windows)]
    let escaped = prompt.replace('\n', " ").replace('"', "\\\"");
    #[cfg(windows)]
    let output = Command::new("cmd")
        .args(["/c", "claude", "-p", escaped.as_str(), "--output-format", "text"])
        .output()
        .map_err(|e| format!("Claude CLI実行エラー: {}", e))?;

    #[cfg(not(windows))]
    let output = Command::new("claude")
        .args(["-p", prompt, "--output-format", "text"])
        .output()
        .map_err(|e| format!("Claude CLI実行エラー: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "Claude CLI failed (code {:?}): {}",
            output.status.code(),
            stderr.trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
