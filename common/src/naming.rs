//! ファイル名生成モジュール
//!
//! レシートのライフサイクルで使うファイル名:
//! - scanned: `{yyyyMMdd}-{説明}[-{連番}].{拡張子}`
//! - imported: `{通し番号}-{yyyyMMdd}-{説明}.{拡張子}`
//!
//! 日付入力は常に日-月-年（例: `10-07-2025`）

use crate::error::{Error, Result};
use chrono::NaiveDate;
use regex::Regex;

/// ファイル名に使う説明の最大文字数
pub const DEFAULT_DESCRIPTION_LENGTH: usize = 15;

/// 一意な名前を探す試行回数の上限
pub const MAX_NAME_ATTEMPTS: usize = 1000;

/// 日-月-年の文字列を日付に変換
///
/// 区切りは `-` `.` `/` のいずれか
pub fn parse_receipt_date(date: &str) -> Result<NaiveDate> {
    lazy_static::lazy_static! {
        static ref DMY_RE: Regex = Regex::new(r"^(\d{1,2})[-./](\d{1,2})[-./](\d{4})$").unwrap();
    }

    let invalid = || Error::Validation(format!("日付形式が不正です (DD-MM-YYYY): '{}'", date));

    let caps = DMY_RE.captures(date.trim()).ok_or_else(invalid)?;
    let day: u32 = caps[1].parse().map_err(|_| invalid())?;
    let month: u32 = caps[2].parse().map_err(|_| invalid())?;
    let year: i32 = caps[3].parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// 日付を `dd-mm-yyyy` 形式に整形
pub fn format_receipt_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// 日付を `yyyyMMdd` 形式に整形
pub fn compact_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// 説明をファイル名用の英数字トークンに変換
///
/// 記号を除去し、空白を詰めてから `max_len` 文字で切り詰める
pub fn sanitize_description(description: &str, max_len: usize) -> String {
    description
        .split_whitespace()
        .flat_map(|word| word.chars().filter(|c| c.is_alphanumeric()))
        .take(max_len)
        .collect()
}

/// 拡張子の先頭にドットを付与（大文字小文字はそのまま）
pub fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim();
    if ext.is_empty() || ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{}", ext)
    }
}

fn name_parts(date: &str, description: &str) -> Result<(String, String)> {
    let date = compact_date(parse_receipt_date(date)?);
    let token = sanitize_description(description, DEFAULT_DESCRIPTION_LENGTH);
    if token.is_empty() {
        return Err(Error::Validation(format!(
            "ファイル名に使える文字が説明にありません: '{}'",
            description
        )));
    }
    Ok((date, token))
}

/// scannedフォルダ用のファイル名を生成
///
/// `suffix` が `None` または `0` の場合は連番を付けない
pub fn generate_scanned_filename(
    date: &str,
    description: &str,
    extension: &str,
    suffix: Option<u32>,
) -> Result<String> {
    let (date, token) = name_parts(date, description)?;
    let ext = normalize_extension(extension);

    Ok(match suffix {
        Some(n) if n > 0 => format!("{}-{}-{}{}", date, token, n, ext),
        _ => format!("{}-{}{}", date, token, ext),
    })
}

/// importedフォルダ用のファイル名を生成
///
/// # Examples
/// ```
/// use receipt_ai_common::generate_imported_filename;
///
/// let name = generate_imported_filename(76, "10-07-2025", "Coffeecompany", ".jpg").unwrap();
/// assert_eq!(name, "76-20250710-Coffeecompany.jpg");
/// ```
pub fn generate_imported_filename(
    sequence: u64,
    date: &str,
    description: &str,
    extension: &str,
) -> Result<String> {
    let (date, token) = name_parts(date, description)?;
    Ok(format!("{}-{}-{}{}", sequence, date, token, normalize_extension(extension)))
}

/// 既存ファイルと重複しないscanned用ファイル名を生成
///
/// 連番なし → `-2` → `-3` … の順に `exists` で確認する
pub fn generate_unique_scanned_filename<F>(
    date: &str,
    description: &str,
    extension: &str,
    exists: F,
) -> Result<String>
where
    F: Fn(&str) -> bool,
{
    // 日付・説明の検証を先に済ませる
    let base = generate_scanned_filename(date, description, extension, None)?;
    probe_unique(&base, exists, |suffix| {
        generate_scanned_filename(date, description, extension, suffix)
    })
}

/// 任意のファイル名に連番を付けて重複を回避
///
/// `receipt.jpg` → `receipt-2.jpg` → `receipt-3.jpg` …
pub fn unique_file_name<F>(file_name: &str, exists: F) -> Result<String>
where
    F: Fn(&str) -> bool,
{
    probe_unique(file_name, exists, |suffix| Ok(with_suffix(file_name, suffix)))
}

fn with_suffix(file_name: &str, suffix: Option<u32>) -> String {
    let Some(n) = suffix.filter(|n| *n > 0) else {
        return file_name.to_string();
    };
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, n, ext),
        _ => format!("{}-{}", file_name, n),
    }
}

fn probe_unique<F, C>(label: &str, exists: F, mut candidate: C) -> Result<String>
where
    F: Fn(&str) -> bool,
    C: FnMut(Option<u32>) -> Result<String>,
{
    let suffixes = std::iter::once(None)
        .chain((2u32..).map(Some))
        .take(MAX_NAME_ATTEMPTS);

    for suffix in suffixes {
        let name = candidate(suffix)?;
        if !exists(&name) {
            return Ok(name);
        }
    }

    Err(Error::NameCollision(format!(
        "{}: {}回試行しても空きがありません",
        label, MAX_NAME_ATTEMPTS
    )))
}
