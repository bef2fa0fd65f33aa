// ==========================================
// 薪酬批量导入管道 - 核心库
// ==========================================
// 职责: CSV/Excel 表格数据批量导入（员工 / 员工标识 / 薪资代码 / 打卡）
// 技术栈: Rust + SQLite
// 流程: 解析 → 列映射 → 标准化 → 校验 → 去重 → 分批落库
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 单元格/Schema/记录
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 管道各阶段
pub mod importer;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CellValue, DuplicateHandling, FieldFormat, PipelineStage, RowStatus, Severity,
};

// 领域实体
pub use domain::{
    FieldSchema, ImportOptions, ImportOutcome, ImportProgress, ImportSchema, ImportSummary,
    ValidationIssue,
};

// 导入管道
pub use importer::{CancelToken, ImportError, ImportResult, ImportSession};

// 仓储
pub use repository::{ImportStore, SqliteImportStore};

// 配置
pub use config::{ConfigManager, ImportConfig};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "薪酬批量导入管道";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";
