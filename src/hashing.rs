//! ファイルハッシュ計算モジュール
//!
//! ファイル内容全体のSHA-256をレシートの識別子として使う

use crate::error::{ReceiptAiError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// ハッシュ計算の差し替え口
pub trait FileHasher {
    fn hash_file(&self, path: &Path) -> Result<String>;
}

/// SHA-256（16進小文字64桁）
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl FileHasher for Sha256Hasher {
    fn hash_file(&self, path: &Path) -> Result<String> {
        compute_file_hash(path)
    }
}

/// ファイル内容のSHA-256を計算
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let hash_err = |source: std::io::Error| ReceiptAiError::Hash {
        path: path.display().to_string(),
        source,
    };

    let file = File::open(path).map_err(hash_err)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buffer).map_err(hash_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
