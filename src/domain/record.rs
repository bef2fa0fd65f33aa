// ==========================================
// 薪酬批量导入管道 - 记录与结果模型
// ==========================================
// 职责: 各阶段之间流转的数据结构
// 流转: RawRecord → NormalizedRecord → ImportRecord → ImportOutcome
// ==========================================

use crate::domain::types::{
    CellValue, DuplicateHandling, PipelineStage, RowStatus, Severity,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static NULL_CELL: CellValue = CellValue::Null;

// ==========================================
// RawRecord - 文件原始行
// ==========================================
// 表头 → 原始值（保持列顺序），解析后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub row_number: usize, // 源文件行号（表头为第 1 行）
    cells: Vec<(String, CellValue)>,
}

impl RawRecord {
    pub fn new(row_number: usize, cells: Vec<(String, CellValue)>) -> Self {
        Self { row_number, cells }
    }

    /// 按表头取值（不存在时返回 Null）
    pub fn get(&self, header: &str) -> &CellValue {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v)
            .unwrap_or(&NULL_CELL)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

// ==========================================
// ParsedFile - 解析结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFile {
    pub file_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
    pub total_rows: usize,
    pub dropped_rows: Vec<usize>, // 列数与表头不一致而被丢弃的行号
}

// ==========================================
// NormalizationResult - 单元格标准化结果
// ==========================================
// normalized = Null 且 raw 非空 → 无法识别，由 Validator 报错
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationResult {
    pub raw: CellValue,
    pub normalized: CellValue,
    pub has_changed: bool,
}

impl NormalizationResult {
    pub fn new(raw: CellValue, normalized: CellValue) -> Self {
        let has_changed = raw != normalized;
        Self {
            raw,
            normalized,
            has_changed,
        }
    }

    /// 原值非空但无法识别
    pub fn is_unparseable(&self) -> bool {
        !self.raw.is_blank() && self.normalized.is_null()
    }
}

// ==========================================
// NormalizedRecord - 标准化后的行
// ==========================================
// 标准字段名 → 标准化结果（仅包含已映射字段）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub row_number: usize,
    pub fields: BTreeMap<String, NormalizationResult>,
}

impl NormalizedRecord {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            fields: BTreeMap::new(),
        }
    }

    pub fn result(&self, field: &str) -> Option<&NormalizationResult> {
        self.fields.get(field)
    }

    /// 标准化值（未映射字段视为 Null）
    pub fn value(&self, field: &str) -> &CellValue {
        self.fields
            .get(field)
            .map(|r| &r.normalized)
            .unwrap_or(&NULL_CELL)
    }

    pub fn text(&self, field: &str) -> Option<String> {
        self.value(field).as_text().map(|t| t.into_owned())
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.value(field).as_f64()
    }

    /// 读取规范日期（YYYY-MM-DD 或 YYYY-MM-DD HH:MM:SS 的日期部分）
    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        match self.value(field) {
            CellValue::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|dt| dt.date())
                }),
            _ => None,
        }
    }

    /// 落库载荷: 标准字段 → 标准化值（空值省略）
    pub fn payload(&self) -> BTreeMap<String, CellValue> {
        self.fields
            .iter()
            .filter(|(_, r)| !r.normalized.is_null())
            .map(|(k, r)| (k.clone(), r.normalized.clone()))
            .collect()
    }
}

// ==========================================
// ValidationIssue - 校验问题
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub row: usize,
    pub field: String,
    pub severity: Severity,
    pub message: String,
}

// ==========================================
// StagedRecord - 校验 + 去重后的行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedRecord {
    pub record: NormalizedRecord,
    pub business_key: String,
    pub has_error: bool,
    pub warning_count: usize,
    pub is_duplicate: bool,
    pub duplicate_of: Option<usize>, // 首次出现的行号
}

impl StagedRecord {
    pub fn row_number(&self) -> usize {
        self.record.row_number
    }

    pub fn is_valid(&self) -> bool {
        !self.has_error
    }

    pub fn is_importable(&self, include_duplicates: bool) -> bool {
        self.is_valid() && (include_duplicates || !self.is_duplicate)
    }
}

// ==========================================
// ImportSummary - 校验汇总（界面展示用）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub valid_rows: usize,     // 无错误且非重复
    pub error_rows: usize,     // 至少一个 Error
    pub warning_rows: usize,   // 至少一个 Warning
    pub duplicate_rows: usize, // 文件内重复（非首次出现）
    pub dropped_rows: usize,   // 解析阶段丢弃
}

// ==========================================
// ImportRecord / ImportBatch - 待落库数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub row_number: usize,
    pub business_key: String,
    pub payload: BTreeMap<String, CellValue>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub duplicate_handling: DuplicateHandling,
    /// 文件内重复行是否也导入（默认不导入）
    #[serde(default)]
    pub include_duplicates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,
    pub entity: String,
    pub records: Vec<ImportRecord>,
    pub options: ImportOptions,
}

// ==========================================
// ImportOutcome - 导入结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowOutcome {
    pub row: usize,
    pub business_key: String,
    pub status: RowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
    pub errored: usize,
    pub cancelled: bool,
    pub rows: Vec<RowOutcome>,
}

impl ImportOutcome {
    /// 追加单行结果并累计计数
    pub fn push(&mut self, outcome: RowOutcome) {
        match outcome.status {
            RowStatus::Imported => self.imported += 1,
            RowStatus::Skipped => self.skipped += 1,
            RowStatus::Errored => self.errored += 1,
        }
        self.rows.push(outcome);
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }
}

// ==========================================
// ImportProgress - 进度回调参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub percent: u8,
    pub completed_batches: usize,
    pub total_batches: usize,
}

// ==========================================
// ImportBatchRecord - 导入批次记录（落库留痕）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatchRecord {
    pub batch_id: String,
    pub entity: String,
    pub file_name: Option<String>,
    pub duplicate_handling: DuplicateHandling,
    pub total_rows: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errored: usize,
    pub error_rows: usize,
    pub duplicate_rows: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: i64,
}

// ==========================================
// SessionSnapshot - 会话对外可见状态
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub stage: PipelineStage,
    pub file_name: Option<String>,
    pub summary: Option<ImportSummary>,
    pub outcome: Option<ImportOutcome>,
}
