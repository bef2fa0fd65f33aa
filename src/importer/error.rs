// ==========================================
// 薪酬批量导入管道 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 传播口径: 仅解析/映射阶段的问题中断整个管道;
//          校验及之后的问题按行记录（ValidationIssue / RowOutcome），不走 Err
// ==========================================

use crate::domain::types::PipelineStage;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误（ParseError，致命）=====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {extension}（仅支持 {allowed}）")]
    UnsupportedFormat { extension: String, allowed: String },

    #[error("文件过大: {size} 字节，上限 {limit} 字节")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("文件缺少表头行")]
    MissingHeader,

    #[error("文件只有表头，没有数据行")]
    NoDataRows,

    #[error("所有数据行列数均与表头不一致（丢弃 {dropped} 行）")]
    NoValidRows { dropped: usize },

    // ===== 映射错误（阻断进入下一阶段）=====
    #[error("未知标准字段: {0}")]
    UnknownField(String),

    #[error("文件中不存在该列: {0}")]
    UnknownHeader(String),

    #[error("字段映射未完成: 缺少必填字段 [{}]，重复使用的列 [{}]", missing.join(", "), duplicates.join(", "))]
    MappingIncomplete {
        missing: Vec<String>,
        duplicates: Vec<String>,
    },

    // ===== Schema / 会话错误 =====
    #[error("Schema 定义错误: {0}")]
    SchemaError(String),

    #[error("无效的阶段转换: from={from} to={to}")]
    InvalidTransition {
        from: PipelineStage,
        to: PipelineStage,
    },

    // ===== 持久化错误 =====
    #[error("数据存储失败: {0}")]
    StoreError(#[from] RepositoryError),

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== 报告导出 =====
    #[error("报告导出失败: {0}")]
    ReportError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ImportError {
    /// 是否为文件解析类错误（需要用户重新选择文件）
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            ImportError::FileNotFound(_)
                | ImportError::UnsupportedFormat { .. }
                | ImportError::FileTooLarge { .. }
                | ImportError::FileReadError(_)
                | ImportError::ExcelParseError(_)
                | ImportError::CsvParseError(_)
                | ImportError::MissingHeader
                | ImportError::NoDataRows
                | ImportError::NoValidRows { .. }
        )
    }

    /// 是否为映射类错误（需要用户调整列映射）
    pub fn is_mapping_error(&self) -> bool {
        matches!(
            self,
            ImportError::UnknownField(_)
                | ImportError::UnknownHeader(_)
                | ImportError::MappingIncomplete { .. }
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
