//! レシートAI読取・ステージング・台帳取込
//!
//! incoming → scanned / failed → imported の各フォルダ間でファイルを動かし、
//! 読取結果をステージングCSVと台帳（xlsx）に記録する。

pub mod ai_provider;
pub mod archive;
pub mod cli;
pub mod config;
pub mod duplicate;
pub mod error;
pub mod extractor;
pub mod hashing;
pub mod logging;
pub mod menu;
pub mod pipeline;
pub mod scanner;
pub mod staging;
pub mod workbook;
