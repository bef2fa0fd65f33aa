// ==========================================
// 薪酬批量导入管道 - 领域模型层
// ==========================================
// 职责: 定义单元格值、字段 Schema、各阶段记录与结果
// 红线: 不含数据访问逻辑,不含管道逻辑
// ==========================================

pub mod catalog;
pub mod record;
pub mod schema;
pub mod types;

// 重导出核心类型
pub use record::{
    ImportBatch, ImportBatchRecord, ImportOptions, ImportOutcome, ImportProgress, ImportRecord,
    ImportSummary, NormalizationResult, NormalizedRecord, ParsedFile, RawRecord, RowOutcome,
    SessionSnapshot, StagedRecord, ValidationIssue,
};
pub use schema::{FieldSchema, ImportSchema, ValidationRule};
pub use types::{
    CellValue, DuplicateHandling, FieldFormat, PipelineStage, RowStatus, Severity, ValueType,
};
