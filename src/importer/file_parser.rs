// ==========================================
// 薪酬批量导入管道 - 文件解析器
// ==========================================
// 阶段 0: 文件读取与解析（纯函数，不落库）
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 行号口径: 源文件行号，表头为第 1 行
// ==========================================

use crate::config::ImportConfig;
use crate::domain::record::{ParsedFile, RawRecord};
use crate::domain::types::CellValue;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::normalizer::excel_serial_to_datetime;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

// ==========================================
// FileParser Trait
// ==========================================
pub trait FileParser {
    /// 解析内存中的文件内容
    ///
    /// # 参数
    /// - file_name: 原始文件名（仅用于结果与日志）
    /// - bytes: 文件内容
    fn parse_bytes(&self, file_name: &str, bytes: &[u8]) -> ImportResult<ParsedFile>;
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_bytes(&self, file_name: &str, bytes: &[u8]) -> ImportResult<ParsedFile> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致，由下方逐行判定
            .from_reader(bytes);

        let mut records = reader.byte_records();

        // 读取表头（首个非空行）
        let header_record = match records.next() {
            Some(result) => result?,
            None => return Err(ImportError::MissingHeader),
        };
        let raw_headers: Vec<String> = header_record
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect();
        if raw_headers
            .iter()
            .all(|h| h.trim_start_matches('\u{feff}').trim().is_empty())
        {
            return Err(ImportError::MissingHeader);
        }
        let headers = normalize_headers(raw_headers.into_iter());

        let mut rows = Vec::new();
        let mut dropped_rows = Vec::new();
        for result in records {
            let record = result?;
            let row_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(rows.len() + dropped_rows.len() + 2);

            let values: Vec<CellValue> = record
                .iter()
                .map(|v| CellValue::from_text(&String::from_utf8_lossy(v)))
                .collect();

            // 跳过完全空白的行
            if values.iter().all(|v| v.is_null()) {
                continue;
            }

            if values.len() != headers.len() {
                debug!(
                    row = row_number,
                    columns = values.len(),
                    expected = headers.len(),
                    "列数与表头不一致，丢弃该行"
                );
                dropped_rows.push(row_number);
                continue;
            }

            rows.push(RawRecord::new(
                row_number,
                headers.iter().cloned().zip(values).collect(),
            ));
        }

        finish(file_name, headers, rows, dropped_rows)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
// 只读第一个工作表；xls/xlsx 均由 calamine 自动识别
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_bytes(&self, file_name: &str, bytes: &[u8]) -> ImportResult<ParsedFile> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))??;

        // Range 可能不从 A1 开始
        let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);

        let mut sheet_rows = range.rows().enumerate();
        let header_row = match sheet_rows.next() {
            Some((_, row)) => row,
            None => return Err(ImportError::MissingHeader),
        };

        let mut raw_headers: Vec<String> = header_row
            .iter()
            .map(|cell| excel_cell_to_value(cell).to_string())
            .collect();
        while raw_headers.last().is_some_and(|h| h.is_empty()) {
            raw_headers.pop();
        }
        if raw_headers.is_empty() {
            return Err(ImportError::MissingHeader);
        }
        let headers = normalize_headers(raw_headers.into_iter());

        let mut rows = Vec::new();
        let mut dropped_rows = Vec::new();
        for (idx, data_row) in sheet_rows {
            let row_number = first_row + idx + 1;
            let values: Vec<CellValue> = data_row.iter().map(excel_cell_to_value).collect();

            if values.iter().all(|v| v.is_null()) {
                continue;
            }

            // 表头之外的列有值 → 视为列数不一致
            if values.iter().skip(headers.len()).any(|v| !v.is_null()) {
                dropped_rows.push(row_number);
                continue;
            }

            let cells = headers
                .iter()
                .cloned()
                .zip(values.into_iter().chain(std::iter::repeat(CellValue::Null)))
                .collect();
            rows.push(RawRecord::new(row_number, cells));
        }

        finish(file_name, headers, rows, dropped_rows)
    }
}

/// Excel 单元格 → CellValue
fn excel_cell_to_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::from_text(s),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(value) if value.time() == chrono::NaiveTime::MIN => {
                CellValue::Text(value.format("%Y-%m-%d").to_string())
            }
            Some(value) => CellValue::Text(value.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Null,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from_text(s),
        Data::Error(_) => CellValue::Null,
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub max_file_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for ParseOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UniversalFileParser {
    options: ParseOptions,
}

impl UniversalFileParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// 解析内存中的文件（扩展名 + 大小检查后分派）
    pub fn parse_bytes(&self, file_name: &str, bytes: &[u8]) -> ImportResult<ParsedFile> {
        let ext = self.check_extension(file_name)?;
        self.check_size(bytes.len() as u64)?;

        match ext.as_str() {
            "csv" => CsvParser.parse_bytes(file_name, bytes),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => ExcelParser.parse_bytes(file_name, bytes),
            _ => Err(self.unsupported(ext)),
        }
    }

    /// 从磁盘读取并解析（先按元数据检查大小，避免读入超大文件）
    pub fn parse_path<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<ParsedFile> {
        let path = file_path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.check_extension(&file_name)?;
        self.check_size(std::fs::metadata(path)?.len())?;

        let bytes = std::fs::read(path)?;
        self.parse_bytes(&file_name, &bytes)
    }

    fn check_extension(&self, file_name: &str) -> ImportResult<String> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if self.options.allowed_extensions.iter().any(|a| *a == ext) {
            Ok(ext)
        } else {
            Err(self.unsupported(ext))
        }
    }

    fn check_size(&self, size: u64) -> ImportResult<()> {
        if size > self.options.max_file_size_bytes {
            warn!(size, limit = self.options.max_file_size_bytes, "文件超过大小上限");
            return Err(ImportError::FileTooLarge {
                size,
                limit: self.options.max_file_size_bytes,
            });
        }
        Ok(())
    }

    fn unsupported(&self, extension: String) -> ImportError {
        ImportError::UnsupportedFormat {
            extension,
            allowed: self.options.allowed_extensions.join(", "),
        }
    }
}

// ==========================================
// 公共收尾
// ==========================================
/// 表头规整: 去 BOM、TRIM；空表头 → "Column N"；重名表头追加序号
fn normalize_headers(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for (idx, header) in raw.enumerate() {
        let mut name = header.trim_start_matches('\u{feff}').trim().to_string();
        if name.is_empty() {
            name = format!("Column {}", idx + 1);
        }
        if headers.contains(&name) {
            let mut n = 2;
            while headers.contains(&format!("{} ({})", name, n)) {
                n += 1;
            }
            name = format!("{} ({})", name, n);
        }
        headers.push(name);
    }
    headers
}

fn finish(
    file_name: &str,
    headers: Vec<String>,
    rows: Vec<RawRecord>,
    dropped_rows: Vec<usize>,
) -> ImportResult<ParsedFile> {
    if rows.is_empty() {
        if dropped_rows.is_empty() {
            return Err(ImportError::NoDataRows);
        }
        return Err(ImportError::NoValidRows {
            dropped: dropped_rows.len(),
        });
    }

    if !dropped_rows.is_empty() {
        warn!(
            file = file_name,
            dropped = dropped_rows.len(),
            "部分行列数与表头不一致，已丢弃"
        );
    }

    Ok(ParsedFile {
        file_name: file_name.to_string(),
        total_rows: rows.len(),
        headers,
        rows,
        dropped_rows,
    })
}
