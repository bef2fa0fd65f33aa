// ==========================================
// 薪酬批量导入管道 - 领域类型定义
// ==========================================
// 职责: 单元格标量、字段类型、严重级别、导入策略、管道阶段
// 红线: 类型转换只发生在 Normalizer 边界，此处不做隐式转换
// ==========================================

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

// ==========================================
// CellValue - 单元格标量
// ==========================================
// 文件中读出的原始值: 字符串 / 数字 / 布尔 / 空
// 序列化为 JSON 原生标量（untagged）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// 由文本构造（TRIM 后为空 → Null）
    pub fn from_text(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            CellValue::Null
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    /// 是否为空值（Null 或空白文本）
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// 文本视图（数字去掉无意义的 .0）
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            CellValue::Null => None,
            CellValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            CellValue::Bool(b) => Some(Cow::Owned(b.to_string())),
            CellValue::Number(n) => Some(Cow::Owned(format_number(*n))),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "{}", text),
            None => Ok(()),
        }
    }
}

/// 整数值的浮点数按整数输出（Excel 中的工号/卡号常被读成 Float）
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ==========================================
// ValueType - 字段值类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Date,
    Enum,
}

// ==========================================
// FieldFormat - 标准化规则选择器
// ==========================================
// 同一 ValueType 下可有不同的标准化口径（如 Date 与 Timestamp）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "table", rename_all = "snake_case")]
pub enum FieldFormat {
    Text,         // TRIM + 空白折叠
    Code,         // TRIM + UPPER
    Email,        // TRIM + lower
    Date,         // YYYY-MM-DD
    Timestamp,    // YYYY-MM-DD HH:MM:SS
    Region,       // 省/地区两位代码
    PersonName,   // "Last, First"
    NationalId,   // 仅保留数字
    PostalCode,   // 去空白 + UPPER
    Rate,         // 浮点数
    Boolean,      // true / false
    Enum,         // 选项集内的规范值
    Lookup(String), // 运行时注册的别名表（如工会）
}

impl FieldFormat {
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldFormat::Date | FieldFormat::Timestamp => ValueType::Date,
            FieldFormat::Rate => ValueType::Number,
            FieldFormat::Boolean => ValueType::Boolean,
            FieldFormat::Enum | FieldFormat::Region | FieldFormat::Lookup(_) => ValueType::Enum,
            _ => ValueType::String,
        }
    }

    /// 用于错误消息的格式描述
    pub fn describe(&self) -> &'static str {
        match self {
            FieldFormat::Text => "文本",
            FieldFormat::Code => "代码",
            FieldFormat::Email => "邮箱",
            FieldFormat::Date => "日期",
            FieldFormat::Timestamp => "日期时间",
            FieldFormat::Region => "省/地区代码",
            FieldFormat::PersonName => "姓名",
            FieldFormat::NationalId => "证件号",
            FieldFormat::PostalCode => "邮编",
            FieldFormat::Rate => "数值",
            FieldFormat::Boolean => "是/否",
            FieldFormat::Enum => "选项值",
            FieldFormat::Lookup(_) => "参照代码",
        }
    }
}

// ==========================================
// Severity - 校验问题严重级别
// ==========================================
// Error 阻断该行导入; Warning 仅提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

// ==========================================
// DuplicateHandling - 库内已存在记录的处理策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateHandling {
    #[default]
    Skip,   // insert-if-absent
    Update, // upsert
}

impl fmt::Display for DuplicateHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateHandling::Skip => write!(f, "skip"),
            DuplicateHandling::Update => write!(f, "update"),
        }
    }
}

// ==========================================
// RowStatus - 单行落库结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Imported,
    Skipped,
    Errored,
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowStatus::Imported => write!(f, "imported"),
            RowStatus::Skipped => write!(f, "skipped"),
            RowStatus::Errored => write!(f, "errored"),
        }
    }
}

// ==========================================
// PipelineStage - 导入会话阶段
// ==========================================
// Idle → Parsed → Mapped → Validated → Importing → Complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Idle,
    Parsed,
    Mapped,
    Validated,
    Importing,
    Complete,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Idle => write!(f, "IDLE"),
            PipelineStage::Parsed => write!(f, "PARSED"),
            PipelineStage::Mapped => write!(f, "MAPPED"),
            PipelineStage::Validated => write!(f, "VALIDATED"),
            PipelineStage::Importing => write!(f, "IMPORTING"),
            PipelineStage::Complete => write!(f, "COMPLETE"),
        }
    }
}
