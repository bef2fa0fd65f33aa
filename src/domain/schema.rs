// ==========================================
// 薪酬批量导入管道 - 字段 Schema
// ==========================================
// 职责: 标准字段定义 + 校验规则 + 业务主键
// 消费方: ColumnMapper / Normalizer / Validator / Deduplicator
// ==========================================

use crate::domain::types::{FieldFormat, Severity, ValueType};
use serde::{Deserialize, Serialize};

// ==========================================
// FieldSchema - 标准字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,         // 标准字段名（如 hire_date）
    pub label: String,        // 展示名
    pub aliases: Vec<String>, // 可接受的表头别名（大小写/标点不敏感）
    pub required: bool,
    pub format: FieldFormat,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>, // 仅 Enum 使用
}

impl FieldSchema {
    pub fn new(name: &str, label: &str, format: FieldFormat) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            aliases: Vec::new(),
            required: false,
            format,
            options: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    pub fn value_type(&self) -> ValueType {
        self.format.value_type()
    }

    /// 自动识别用的候选名（字段名 + 展示名 + 别名）
    pub fn match_candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(std::iter::once(self.label.as_str()))
            .chain(self.aliases.iter().map(|a| a.as_str()))
    }
}

// ==========================================
// ValidationRule - 跨字段/格式/范围规则
// ==========================================
// 必填与"无法识别"由字段定义隐式产生，不在此列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    /// 9 位证件号模10加权校验
    Checksum { field: String, severity: Severity },
    /// 邮箱形态
    Email { field: String },
    /// 自定义正则
    Pattern {
        field: String,
        pattern: String,
        message: String,
        severity: Severity,
    },
    /// 出生日期推算的最低年龄
    MinimumAge { birth_field: String, years: u32 },
    /// 日期不得晚于今天
    NotInFuture { field: String, severity: Severity },
    /// 结束日期不得早于开始日期
    DateOrder {
        start_field: String,
        end_field: String,
    },
    /// 数值范围
    Range {
        field: String,
        min: Option<f64>,
        max: Option<f64>,
        severity: Severity,
    },
}

impl ValidationRule {
    /// 规则涉及的字段（用于 Schema 自检）
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ValidationRule::Checksum { field, .. }
            | ValidationRule::Email { field }
            | ValidationRule::Pattern { field, .. }
            | ValidationRule::NotInFuture { field, .. }
            | ValidationRule::Range { field, .. } => vec![field.as_str()],
            ValidationRule::MinimumAge { birth_field, .. } => vec![birth_field.as_str()],
            ValidationRule::DateOrder {
                start_field,
                end_field,
            } => vec![start_field.as_str(), end_field.as_str()],
        }
    }

    /// 规则要求的字段值类型（None 表示不限）
    pub fn expected_type(&self) -> Option<ValueType> {
        match self {
            ValidationRule::MinimumAge { .. }
            | ValidationRule::NotInFuture { .. }
            | ValidationRule::DateOrder { .. } => Some(ValueType::Date),
            ValidationRule::Range { .. } => Some(ValueType::Number),
            _ => None,
        }
    }
}

// ==========================================
// ImportSchema - 一类导入的完整定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSchema {
    pub entity: String,
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub rules: Vec<ValidationRule>,
    pub business_key: Vec<String>,
}

impl ImportSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.required)
    }

    /// 自检: 规则与业务主键引用的字段必须存在且类型相符、Enum 必须有选项
    pub fn check(&self) -> Result<(), String> {
        for rule in &self.rules {
            for name in rule.fields() {
                let field = self
                    .field(name)
                    .ok_or_else(|| format!("规则引用了未定义字段: {}", name))?;
                if let Some(expected) = rule.expected_type() {
                    if field.value_type() != expected {
                        return Err(format!(
                            "规则要求 {} 为 {:?} 类型，实际为 {:?}",
                            name,
                            expected,
                            field.value_type()
                        ));
                    }
                }
            }
        }
        for key in &self.business_key {
            if self.field(key).is_none() {
                return Err(format!("业务主键引用了未定义字段: {}", key));
            }
        }
        if self.business_key.is_empty() {
            return Err(format!("{} 未定义业务主键", self.entity));
        }
        for field in &self.fields {
            if field.format == FieldFormat::Enum && field.options.is_empty() {
                return Err(format!("枚举字段缺少选项: {}", field.name));
            }
        }
        Ok(())
    }

    /// Schema 中引用的参照表名
    pub fn lookup_tables(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter_map(|f| match &f.format {
                FieldFormat::Lookup(table) => Some(table.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> ImportSchema {
        ImportSchema {
            entity: "sample".to_string(),
            fields: vec![
                FieldSchema::new("code", "Code", FieldFormat::Code).required(),
                FieldSchema::new("kind", "Kind", FieldFormat::Enum).options(&["a", "b"]),
                FieldSchema::new("rate", "Rate", FieldFormat::Rate),
                FieldSchema::new("start", "Start", FieldFormat::Timestamp),
            ],
            rules: vec![ValidationRule::Range {
                field: "rate".to_string(),
                min: Some(0.0),
                max: None,
                severity: Severity::Error,
            }],
            business_key: vec!["code".to_string()],
        }
    }

    #[test]
    fn test_schema_check_ok() {
        assert!(sample_schema().check().is_ok());
    }

    #[test]
    fn test_schema_check_unknown_rule_field() {
        let mut schema = sample_schema();
        schema.rules.push(ValidationRule::Email {
            field: "email".to_string(),
        });
        let err = schema.check().unwrap_err();
        assert!(err.contains("email"));
    }

    #[test]
    fn test_schema_check_rule_field_type() {
        let mut schema = sample_schema();
        schema.rules.push(ValidationRule::NotInFuture {
            field: "start".to_string(),
            severity: Severity::Warning,
        });
        assert!(schema.check().is_ok());

        schema.rules.push(ValidationRule::Range {
            field: "code".to_string(),
            min: Some(0.0),
            max: None,
            severity: Severity::Error,
        });
        let err = schema.check().unwrap_err();
        assert!(err.contains("code"));
        assert_eq!(schema.field("code").unwrap().value_type(), ValueType::String);
    }

    #[test]
    fn test_schema_check_enum_without_options() {
        let mut schema = sample_schema();
        schema.fields[1].options.clear();
        assert!(schema.check().is_err());
    }

    #[test]
    fn test_match_candidates_include_label() {
        let field = FieldSchema::new("hire_date", "Hire Date", FieldFormat::Date)
            .aliases(&["Start Date"]);
        let candidates: Vec<&str> = field.match_candidates().collect();
        assert_eq!(candidates, vec!["hire_date", "Hire Date", "Start Date"]);
    }
}
