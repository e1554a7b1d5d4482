//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Name collision: {0}")]
    NameCollision(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_parse() {
        let error = Error::Parse("JSONが見つかりません".to_string());
        assert_eq!(format!("{}", error), "Parse error: JSONが見つかりません");
    }

    #[test]
    fn test_error_display_validation() {
        let error = Error::Validation("通貨コードは3文字です".to_string());
        assert_eq!(format!("{}", error), "Validation error: 通貨コードは3文字です");
    }

    #[test]
    fn test_error_display_transition() {
        let error = Error::InvalidTransition {
            from: "COMPLETED".to_string(),
            to: "FAILED".to_string(),
        };
        assert_eq!(format!("{}", error), "Invalid status transition: COMPLETED -> FAILED");
    }
}
