//! Receipt AI Common Library
//!
//! レシート処理で共有される型とユーティリティ

pub mod error;
pub mod naming;
pub mod parser;
pub mod prompts;
pub mod receipt;
pub mod types;

pub use error::{Error, Result};
pub use naming::{
    generate_imported_filename, generate_scanned_filename, generate_unique_scanned_filename,
    normalize_extension, parse_receipt_date, sanitize_description, unique_file_name,
    DEFAULT_DESCRIPTION_LENGTH,
};
pub use parser::{extract_json, parse_extraction_response};
pub use prompts::build_receipt_prompt;
pub use receipt::{ProcessingStatus, Receipt};
pub use types::{
    ErrorReceiptData, ExtractionErrorKind, FileHash, ReceiptData, StagingRow, STAGING_HEADERS,
};
