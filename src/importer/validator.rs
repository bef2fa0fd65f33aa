// ==========================================
// 薪酬批量导入管道 - 校验器
// ==========================================
// 阶段 3: 对标准化后的记录执行 Schema 规则
// 产出: ValidationIssue 列表（按文件行序）
// 红线: 纯读，不修改记录；today 由调用方注入
// ==========================================
// 严重级别:
// - Error:   阻断该行导入（必填缺失 / 无法识别 / 年龄不足 / 日期倒挂 / 负数）
// - Warning: 仅提示（邮箱形态 / 入职日期在未来 / 超阈值 / 证件号校验，可配置为 Error）
// ==========================================

use crate::domain::record::{NormalizedRecord, ValidationIssue};
use crate::domain::schema::{ImportSchema, ValidationRule};
use crate::domain::types::{format_number, Severity};
use crate::importer::error::{ImportError, ImportResult};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

/// 9 位证件号校验（模10加权）
///
/// 规则: 必须 9 位数字、首位非 0、Luhn 校验和为 0
pub fn is_valid_sin(digits: &str) -> bool {
    if digits.len() != 9 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if digits.starts_with('0') {
        return false;
    }

    let sum: u32 = digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(idx, d)| {
            if idx % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// 周岁
fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

// ==========================================
// ValidationReport
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// 无任何 Error
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn row_has_error(&self, row: usize) -> bool {
        self.issues
            .iter()
            .any(|i| i.row == row && i.severity == Severity::Error)
    }

    pub fn row_warning_count(&self, row: usize) -> usize {
        self.issues
            .iter()
            .filter(|i| i.row == row && i.severity == Severity::Warning)
            .count()
    }

    pub fn issues_for_row(&self, row: usize) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.row == row)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// 至少含一条该级别问题的行数
    pub fn rows_with(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == severity)
            .map(|i| i.row)
            .collect::<BTreeSet<_>>()
            .len()
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

// ==========================================
// Validator
// ==========================================
pub struct Validator<'a> {
    schema: &'a ImportSchema,
    today: NaiveDate,
    patterns: HashMap<usize, Regex>, // 规则下标 → 已编译正则
}

impl<'a> Validator<'a> {
    /// 创建校验器（预编译 Pattern 规则）
    ///
    /// # 错误
    /// - SchemaError: 正则无法编译
    pub fn new(schema: &'a ImportSchema, today: NaiveDate) -> ImportResult<Self> {
        let mut patterns = HashMap::new();
        for (idx, rule) in schema.rules.iter().enumerate() {
            if let ValidationRule::Pattern { field, pattern, .. } = rule {
                let re = Regex::new(pattern).map_err(|e| {
                    ImportError::SchemaError(format!("字段 {} 的正则无效: {}", field, e))
                })?;
                patterns.insert(idx, re);
            }
        }
        Ok(Self {
            schema,
            today,
            patterns,
        })
    }

    /// 校验全部记录
    pub fn validate(&self, records: &[NormalizedRecord]) -> ValidationReport {
        ValidationReport {
            issues: records
                .iter()
                .flat_map(|r| self.validate_record(r))
                .collect(),
        }
    }

    /// 校验单行: 先字段级（必填 / 无法识别），再规则级
    pub fn validate_record(&self, record: &NormalizedRecord) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let row = record.row_number;
        let mut push = |field: &str, severity: Severity, message: String| {
            issues.push(ValidationIssue {
                row,
                field: field.to_string(),
                severity,
                message,
            });
        };

        // ===== 字段级 =====
        for field in &self.schema.fields {
            match record.result(&field.name) {
                None if field.required => {
                    push(&field.name, Severity::Error, format!("缺少必填字段: {}", field.label));
                }
                None => {}
                Some(result) if result.raw.is_blank() => {
                    if field.required {
                        push(&field.name, Severity::Error, format!("{}不能为空", field.label));
                    }
                }
                Some(result) if result.is_unparseable() => {
                    push(
                        &field.name,
                        Severity::Error,
                        format!(
                            "{}无法识别为{}: {}",
                            field.label,
                            field.format.describe(),
                            result.raw
                        ),
                    );
                }
                Some(_) => {}
            }
        }

        // ===== 规则级（值为空时跳过，缺失/无法识别已在上面报告）=====
        for (idx, rule) in self.schema.rules.iter().enumerate() {
            match rule {
                ValidationRule::Checksum { field, severity } => {
                    if let Some(digits) = record.text(field) {
                        if !is_valid_sin(&digits) {
                            push(field, *severity, format!("证件号校验失败: {}", digits));
                        }
                    }
                }
                ValidationRule::Email { field } => {
                    if let Some(email) = record.text(field) {
                        if !EMAIL_RE.is_match(&email) {
                            push(field, Severity::Warning, format!("邮箱格式可疑: {}", email));
                        }
                    }
                }
                ValidationRule::Pattern {
                    field,
                    message,
                    severity,
                    ..
                } => {
                    if let (Some(value), Some(re)) = (record.text(field), self.patterns.get(&idx)) {
                        if !re.is_match(&value) {
                            push(field, *severity, message.clone());
                        }
                    }
                }
                ValidationRule::MinimumAge { birth_field, years } => {
                    if let Some(birth) = record.date(birth_field) {
                        let age = age_on(birth, self.today);
                        if age < *years as i32 {
                            push(
                                birth_field,
                                Severity::Error,
                                format!("年龄不足 {} 周岁（出生日期 {}）", years, birth),
                            );
                        }
                    }
                }
                ValidationRule::NotInFuture { field, severity } => {
                    if let Some(date) = record.date(field) {
                        if date > self.today {
                            push(field, *severity, format!("日期晚于今天: {}", date));
                        }
                    }
                }
                ValidationRule::DateOrder {
                    start_field,
                    end_field,
                } => {
                    if let (Some(start), Some(end)) =
                        (record.date(start_field), record.date(end_field))
                    {
                        if end < start {
                            push(
                                end_field,
                                Severity::Error,
                                format!("结束日期 {} 早于开始日期 {}", end, start),
                            );
                        }
                    }
                }
                ValidationRule::Range {
                    field,
                    min,
                    max,
                    severity,
                } => {
                    if let Some(n) = record.number(field) {
                        if let Some(min) = min.filter(|m| n < *m) {
                            push(
                                field,
                                *severity,
                                format!("数值 {} 小于下限 {}", format_number(n), format_number(min)),
                            );
                        }
                        if let Some(max) = max.filter(|m| n > *m) {
                            push(
                                field,
                                *severity,
                                format!("数值 {} 超过上限 {}", format_number(n), format_number(max)),
                            );
                        }
                    }
                }
            }
        }

        issues
    }
}
