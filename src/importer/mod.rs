// ==========================================
// 薪酬批量导入管道 - 导入层
// ==========================================
// 流程: 解析 → 列映射 → 标准化 → 校验 → 去重 → 分批落库
// 支持: Excel, CSV
// ==========================================
// 职责: 外部表格数据导入,生成标准化业务记录
// 入口: pipeline::ImportSession（显式状态机）
// ==========================================

// 模块声明
pub mod batch_importer;
pub mod column_mapper;
pub mod deduplicator;
pub mod error;
pub mod file_parser;
pub mod normalizer;
pub mod pipeline;
pub mod report;
pub mod validator;

// 重导出核心类型
pub use batch_importer::{BatchImporter, CancelToken};
pub use column_mapper::{ColumnMapper, FieldMapping};
pub use deduplicator::Deduplicator;
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileParser, ParseOptions, UniversalFileParser};
pub use normalizer::{split_person_name, AliasTable, Normalizer, PersonName};
pub use pipeline::ImportSession;
pub use report::{issues_to_csv, outcome_to_csv};
pub use validator::{ValidationReport, Validator};
