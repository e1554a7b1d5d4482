//! 取込台帳（Excel）モジュール
//!
//! calamineで既存の台帳を読み、rust_xlsxwriterで全体を書き直す。
//! 台帳以外のシートや列もセルの値として書き戻す。
//! 通し番号（No列）は単調増加で再利用しない。

use crate::error::{ReceiptAiError, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{ColNum, Color, Format, FormatBorder, RowNum, Workbook, Worksheet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const SHEET_NAME: &str = "Receipts";

pub const WORKBOOK_HEADERS: [&str; 11] = [
    "No",
    "Amount",
    "Tax",
    "TaxPercentage",
    "Description",
    "Currency",
    "Date",
    "Confidence",
    "Hash",
    "Filename",
    "ImportedAt",
];

/// 台帳の1行
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookRow {
    pub sequence: u64,
    pub amount: String,
    pub tax: String,
    pub tax_percentage: String,
    pub description: String,
    pub currency: String,
    pub date: String,
    pub confidence: String,
    pub hash: String,
    pub filename: String,
    pub imported_at: String,
}

impl WorkbookRow {
    /// `WORKBOOK_HEADERS` の列番号に対応する文字列値（No列は空）
    fn text(&self, column: usize) -> &str {
        match column {
            1 => &self.amount,
            2 => &self.tax,
            3 => &self.tax_percentage,
            4 => &self.description,
            5 => &self.currency,
            6 => &self.date,
            7 => &self.confidence,
            8 => &self.hash,
            9 => &self.filename,
            10 => &self.imported_at,
            _ => "",
        }
    }
}

/// 台帳シート以外のシート（値だけ保持して書き戻す）
#[derive(Debug, Clone)]
struct SheetCells {
    name: String,
    origin: (u32, u32),
    rows: Vec<Vec<Data>>,
}

/// 台帳シートの1行
///
/// 通し番号のない行（空行・メモ等）は `entry` が無く、セルをそのまま書き戻す
#[derive(Debug, Clone)]
struct LedgerLine {
    entry: Option<WorkbookRow>,
    cells: Vec<Data>,
}

/// メモリ上に保持した台帳
///
/// 書き直しても他のシート、知らない列、メモ行は残す。
/// 書式や数式は値として書き戻される
#[derive(Debug, Clone)]
pub struct WorkbookLedger {
    path: PathBuf,
    sheet_name: String,
    /// 台帳シートのブック内での位置
    sheet_index: usize,
    origin: (u32, u32),
    headers: Vec<String>,
    lines: Vec<LedgerLine>,
    other_sheets: Vec<SheetCells>,
}

impl WorkbookLedger {
    /// 台帳を読み込み（存在しなければ空）
    ///
    /// 台帳シートにNo列が無い場合は上書きしないようエラーにする
    pub fn load(path: &Path) -> Result<Self> {
        let mut ledger = Self {
            path: path.to_path_buf(),
            sheet_name: SHEET_NAME.to_string(),
            sheet_index: 0,
            origin: (0, 0),
            headers: WORKBOOK_HEADERS.iter().map(|h| h.to_string()).collect(),
            lines: Vec::new(),
            other_sheets: Vec::new(),
        };
        if path.exists() {
            ledger.read_workbook()?;
        }
        debug!(
            path = %path.display(),
            rows = ledger.len(),
            sheets = ledger.other_sheets.len() + 1,
            "workbook loaded"
        );
        Ok(ledger)
    }

    pub fn rows(&self) -> impl Iterator<Item = &WorkbookRow> + '_ {
        self.lines.iter().filter_map(|line| line.entry.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rows().count()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().next().is_none()
    }

    /// 使用済みの最大通し番号（空なら0）
    pub fn max_sequence(&self) -> u64 {
        self.rows().map(|r| r.sequence).max().unwrap_or(0)
    }

    /// 行を追加して保存
    pub fn append(&mut self, row: WorkbookRow) -> Result<()> {
        let max = self.max_sequence();
        if row.sequence <= max {
            return Err(ReceiptAiError::SequenceConflict {
                sequence: row.sequence,
                max,
            });
        }
        self.lines.push(LedgerLine {
            entry: Some(row),
            cells: Vec::new(),
        });
        if let Err(e) = self.save() {
            self.lines.pop();
            return Err(e);
        }
        Ok(())
    }

    /// 一時ファイルに書いてから置き換える
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("xlsx.tmp");
        self.write_workbook(&tmp_path)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    fn read_workbook(&mut self) -> Result<()> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path)
            .map_err(|e| ReceiptAiError::WorkbookRead(format!("{}: {}", self.path.display(), e)))?;

        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            return Ok(());
        }
        let target = sheet_names
            .iter()
            .position(|name| name.as_str() == SHEET_NAME)
            .unwrap_or(0);

        for (index, name) in sheet_names.iter().enumerate() {
            let range = workbook
                .worksheet_range(name)
                .map_err(|e| ReceiptAiError::WorkbookRead(format!("{}: {}", name, e)))?;
            let origin = range.start().unwrap_or((0, 0));
            let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();

            if index == target {
                self.sheet_name = name.clone();
                self.sheet_index = index;
                self.read_ledger_sheet(origin, rows)?;
            } else {
                self.other_sheets.push(SheetCells {
                    name: name.clone(),
                    origin,
                    rows,
                });
            }
        }
        Ok(())
    }

    fn read_ledger_sheet(&mut self, origin: (u32, u32), rows: Vec<Vec<Data>>) -> Result<()> {
        let mut rows = rows.into_iter();
        // 空のシートは見出しから書く
        let Some(header) = rows.next() else {
            return Ok(());
        };

        let headers: Vec<String> = header.iter().map(|c| c.to_string().trim().to_string()).collect();
        if !headers.iter().any(|h| h.eq_ignore_ascii_case(WORKBOOK_HEADERS[0])) {
            return Err(ReceiptAiError::WorkbookRead(format!(
                "{}: シート「{}」の1行目に{}列がありません",
                self.path.display(),
                self.sheet_name,
                WORKBOOK_HEADERS[0]
            )));
        }
        self.origin = origin;
        self.headers = headers;

        // 足りない列は右端に足す
        for name in WORKBOOK_HEADERS {
            if self.column(name).is_none() {
                self.headers.push(name.to_string());
            }
        }
        let columns: Vec<Option<usize>> = WORKBOOK_HEADERS.iter().map(|h| self.column(h)).collect();

        for cells in rows {
            let get = |i: usize| columns[i].and_then(|idx| cells.get(idx));
            let entry = cell_sequence(get(0)).map(|sequence| WorkbookRow {
                sequence,
                amount: money_text(get(1)),
                tax: money_text(get(2)),
                tax_percentage: cell_text(get(3)),
                description: cell_text(get(4)),
                currency: cell_text(get(5)),
                date: cell_text(get(6)),
                confidence: cell_text(get(7)),
                hash: cell_text(get(8)),
                filename: cell_text(get(9)),
                imported_at: cell_text(get(10)),
            });
            self.lines.push(LedgerLine { entry, cells });
        }
        Ok(())
    }

    fn write_workbook(&self, path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();
        let formats = CellFormats::new();

        let mut others = self.other_sheets.iter();
        for index in 0..=self.other_sheets.len() {
            let worksheet = workbook.add_worksheet();
            if index == self.sheet_index {
                worksheet.set_name(&self.sheet_name)?;
                self.write_ledger_sheet(worksheet, &formats)?;
            } else if let Some(sheet) = others.next() {
                worksheet.set_name(&sheet.name)?;
                for (i, cells) in sheet.rows.iter().enumerate() {
                    let r = sheet.origin.0 + i as u32;
                    for (c, cell) in cells.iter().enumerate() {
                        write_cell(worksheet, r, col_num(sheet.origin.1, c), cell, &formats)?;
                    }
                }
            }
        }

        workbook.save(path)?;
        Ok(())
    }

    fn write_ledger_sheet(&self, worksheet: &mut Worksheet, formats: &CellFormats) -> Result<()> {
        let (r0, c0) = self.origin;
        let known: Vec<Option<usize>> = self
            .headers
            .iter()
            .map(|h| WORKBOOK_HEADERS.iter().position(|k| k.eq_ignore_ascii_case(h)))
            .collect();

        for (c, header) in self.headers.iter().enumerate() {
            if !header.is_empty() {
                worksheet.write_string_with_format(r0, col_num(c0, c), header, &formats.header)?;
            }
        }

        for (i, line) in self.lines.iter().enumerate() {
            let r = r0 + 1 + i as u32;
            let width = self.headers.len().max(line.cells.len());
            for c in 0..width {
                let col = col_num(c0, c);
                match (&line.entry, known.get(c).copied().flatten()) {
                    (Some(entry), Some(0)) => {
                        worksheet.write_number(r, col, entry.sequence as f64)?;
                    }
                    // 数値として読めるものは数値セルで書く
                    (Some(entry), Some(k @ (1 | 2))) => {
                        write_number_or_text(worksheet, r, col, entry.text(k), Some(&formats.money))?
                    }
                    (Some(entry), Some(k @ (3 | 7))) => {
                        write_number_or_text(worksheet, r, col, entry.text(k), None)?
                    }
                    (Some(entry), Some(k)) => {
                        let value = entry.text(k);
                        if !value.is_empty() {
                            worksheet.write_string(r, col, value)?;
                        }
                    }
                    _ => {
                        if let Some(cell) = line.cells.get(c) {
                            write_cell(worksheet, r, col, cell, formats)?;
                        }
                    }
                }
            }
        }

        worksheet.set_freeze_panes(r0 + 1, 0)?;
        worksheet.autofit();
        Ok(())
    }
}

struct CellFormats {
    header: Format,
    money: Format,
    datetime: Format,
}

impl CellFormats {
    fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(0xF5F5F5))
                .set_border(FormatBorder::Thin)
                .set_border_color(Color::RGB(0xAAAAAA)),
            money: Format::new().set_num_format("0.00"),
            datetime: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
        }
    }
}

fn col_num(origin: u32, offset: usize) -> ColNum {
    (origin as usize + offset) as ColNum
}

fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => String::new(),
        Some(Data::Float(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Some(other) => other.to_string(),
    }
}

/// 金額は書式 `0.00` と同じく小数2桁以上で読む
fn money_text(cell: Option<&Data>) -> String {
    let text = cell_text(cell);
    if !matches!(cell, Some(Data::Float(_) | Data::Int(_))) {
        return text;
    }
    match text.split_once('.') {
        None => format!("{}.00", text),
        Some((_, fraction)) if fraction.len() < 2 => format!("{}0", text),
        Some(_) => text,
    }
}

fn cell_sequence(cell: Option<&Data>) -> Option<u64> {
    match cell? {
        Data::Int(i) if *i > 0 => Some(*i as u64),
        Data::Float(f) if *f >= 1.0 => Some(*f as u64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn write_number_or_text(
    worksheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    value: &str,
    format: Option<&Format>,
) -> Result<()> {
    match (value.trim().parse::<f64>(), format) {
        (Ok(n), Some(f)) => {
            worksheet.write_number_with_format(row, col, n, f)?;
        }
        (Ok(n), None) => {
            worksheet.write_number(row, col, n)?;
        }
        // 空文字はセルを作らない
        (Err(_), _) if value.is_empty() => {}
        (Err(_), _) => {
            worksheet.write_string(row, col, value)?;
        }
    }
    Ok(())
}

/// 読み込んだセルを値のまま書き戻す
fn write_cell(
    worksheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    cell: &Data,
    formats: &CellFormats,
) -> Result<()> {
    match cell {
        Data::Empty => {}
        Data::Int(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        Data::Float(f) => {
            worksheet.write_number(row, col, *f)?;
        }
        Data::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Data::DateTime(dt) => {
            worksheet.write_number_with_format(row, col, dt.as_f64(), &formats.datetime)?;
        }
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            worksheet.write_string(row, col, s)?;
        }
        Data::Error(e) => {
            worksheet.write_string(row, col, e.to_string())?;
        }
    }
    Ok(())
}
