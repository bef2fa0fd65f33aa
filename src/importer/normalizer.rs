// ==========================================
// 薪酬批量导入管道 - 标准化器
// ==========================================
// 阶段 2: 原始单元格 → 规范值（按字段格式分派）
// 红线: 无法识别的值返回 Null，由 Validator 报错；此处不产生错误
// 红线: 幂等，normalize(normalize(x)) == normalize(x)
// ==========================================
// 规范形式:
// - 日期      YYYY-MM-DD
// - 时间戳    YYYY-MM-DD HH:MM:SS
// - 省份      两位代码（ON / QC ...）
// - 姓名      "Last, First" 或 "Last"
// - 证件号    仅数字
// - 邮编      去空白 + 大写
// - 金额/费率 Number
// - 布尔      Bool
// ==========================================

use crate::config::DateOrder;
use crate::domain::record::{NormalizationResult, NormalizedRecord, RawRecord};
use crate::domain::schema::{FieldSchema, ImportSchema};
use crate::domain::types::{CellValue, FieldFormat};
use crate::importer::column_mapper::{fold_key, ColumnMapper};
use crate::repository::LookupEntry;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::sync::LazyLock;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Excel 序列号上限（9999-12-31）
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

// ==========================================
// AliasTable - 参照表（代码 + 别名 → 代码）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, String>, // fold_key(别名) → 代码
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记代码及其别名（代码自身也可被识别）
    pub fn insert(&mut self, code: &str, alias: &str) {
        let code = code.trim().to_string();
        for key in [fold_key(&code), fold_key(alias)] {
            if !key.is_empty() {
                self.entries.insert(key, code.clone());
            }
        }
    }

    pub fn from_entries(entries: &[LookupEntry]) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.insert(&entry.code, &entry.alias);
        }
        table
    }

    pub fn resolve(&self, value: &str) -> Option<&str> {
        self.entries.get(&fold_key(value)).map(|c| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==========================================
// 省份/地区别名表
// ==========================================
static REGION_TABLE: LazyLock<AliasTable> = LazyLock::new(|| {
    const REGIONS: [(&str, &str, &[&str]); 13] = [
        ("AB", "Alberta", &["Alta"]),
        ("BC", "British Columbia", &["Colombie-Britannique"]),
        ("MB", "Manitoba", &["Man"]),
        ("NB", "New Brunswick", &["Nouveau-Brunswick"]),
        (
            "NL",
            "Newfoundland and Labrador",
            &["Newfoundland", "NF", "Terre-Neuve-et-Labrador"],
        ),
        ("NS", "Nova Scotia", &["Nouvelle-Écosse"]),
        (
            "NT",
            "Northwest Territories",
            &["NWT", "Territoires du Nord-Ouest"],
        ),
        ("NU", "Nunavut", &[]),
        ("ON", "Ontario", &["Ont"]),
        ("PE", "Prince Edward Island", &["PEI", "Île-du-Prince-Édouard"]),
        ("QC", "Quebec", &["Québec", "PQ", "Que"]),
        ("SK", "Saskatchewan", &["Sask"]),
        ("YT", "Yukon", &["Yukon Territory", "YK"]),
    ];

    let mut table = AliasTable::new();
    for (code, name, aliases) in REGIONS {
        table.insert(code, name);
        table.insert(code, &format!("{} - {}", code, name));
        for alias in aliases {
            table.insert(code, alias);
        }
    }
    table
});

/// 省份/地区 → 两位代码
pub fn resolve_region(value: &str) -> Option<&'static str> {
    REGION_TABLE.resolve(value)
}

// ==========================================
// Normalizer
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    date_order: DateOrder,
    lookups: HashMap<String, AliasTable>,
}

impl Normalizer {
    pub fn new(date_order: DateOrder) -> Self {
        Self {
            date_order,
            lookups: HashMap::new(),
        }
    }

    /// 注册参照表（如 union）
    pub fn with_lookup(mut self, name: &str, table: AliasTable) -> Self {
        self.set_lookup(name, table);
        self
    }

    pub fn set_lookup(&mut self, name: &str, table: AliasTable) {
        self.lookups.insert(name.to_string(), table);
    }

    pub fn has_lookup(&self, name: &str) -> bool {
        self.lookups.contains_key(name)
    }

    pub fn date_order(&self) -> DateOrder {
        self.date_order
    }

    /// 标准化单个字段值
    pub fn normalize_field(&self, field: &FieldSchema, raw: &CellValue) -> NormalizationResult {
        self.normalize(&field.format, &field.options, raw)
    }

    /// 按格式标准化
    pub fn normalize(
        &self,
        format: &FieldFormat,
        options: &[String],
        raw: &CellValue,
    ) -> NormalizationResult {
        let normalized = if raw.is_blank() {
            CellValue::Null
        } else {
            match format {
                FieldFormat::Text => normalize_text(raw),
                FieldFormat::Code => normalize_code(raw),
                FieldFormat::Email => normalize_email(raw),
                FieldFormat::Date => normalize_date_cell(raw, self.date_order),
                FieldFormat::Timestamp => normalize_timestamp_cell(raw, self.date_order),
                FieldFormat::Region => text_of(raw)
                    .and_then(|t| resolve_region(&t))
                    .map(|code| CellValue::Text(code.to_string()))
                    .unwrap_or(CellValue::Null),
                FieldFormat::PersonName => text_of(raw)
                    .and_then(|t| split_person_name(&t))
                    .map(|name| CellValue::Text(name.canonical()))
                    .unwrap_or(CellValue::Null),
                FieldFormat::NationalId => normalize_national_id(raw),
                FieldFormat::PostalCode => normalize_postal_code(raw),
                FieldFormat::Rate => normalize_rate(raw),
                FieldFormat::Boolean => normalize_boolean(raw),
                FieldFormat::Enum => normalize_enum(raw, options),
                FieldFormat::Lookup(table) => self
                    .lookups
                    .get(table)
                    .and_then(|t| text_of(raw).and_then(|v| t.resolve(&v).map(str::to_string)))
                    .map(CellValue::Text)
                    .unwrap_or(CellValue::Null),
            }
        };

        NormalizationResult::new(raw.clone(), normalized)
    }

    /// 标准化整行（仅处理已映射字段）
    pub fn normalize_record(
        &self,
        schema: &ImportSchema,
        mapper: &ColumnMapper,
        raw: &RawRecord,
    ) -> NormalizedRecord {
        let mut record = NormalizedRecord::new(raw.row_number);
        for field in &schema.fields {
            if let Some(header) = mapper.header_for(&field.name) {
                let result = self.normalize_field(field, raw.get(header));
                record.fields.insert(field.name.clone(), result);
            }
        }
        record
    }
}

// ==========================================
// 文本类
// ==========================================

fn text_of(raw: &CellValue) -> Option<String> {
    raw.as_text().map(|t| collapse_whitespace(&t)).filter(|t| !t.is_empty())
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_text(raw: &CellValue) -> CellValue {
    text_of(raw).map(CellValue::Text).unwrap_or(CellValue::Null)
}

fn normalize_code(raw: &CellValue) -> CellValue {
    text_of(raw)
        .map(|t| CellValue::Text(t.to_uppercase()))
        .unwrap_or(CellValue::Null)
}

fn normalize_email(raw: &CellValue) -> CellValue {
    text_of(raw)
        .map(|t| CellValue::Text(t.replace(' ', "").to_lowercase()))
        .unwrap_or(CellValue::Null)
}

fn normalize_national_id(raw: &CellValue) -> CellValue {
    let digits: String = text_of(raw)
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        CellValue::Null
    } else {
        CellValue::Text(digits)
    }
}

fn normalize_postal_code(raw: &CellValue) -> CellValue {
    text_of(raw)
        .map(|t| {
            t.chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|t| !t.is_empty())
        .map(CellValue::Text)
        .unwrap_or(CellValue::Null)
}

fn normalize_enum(raw: &CellValue, options: &[String]) -> CellValue {
    let key = match text_of(raw) {
        Some(t) => fold_key(&t),
        None => return CellValue::Null,
    };
    options
        .iter()
        .find(|o| fold_key(o) == key)
        .map(|o| CellValue::Text(o.clone()))
        .unwrap_or(CellValue::Null)
}

// ==========================================
// 姓名
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName {
    pub first: Option<String>,
    pub last: String,
}

impl PersonName {
    /// "Last, First" 或 "Last"
    pub fn canonical(&self) -> String {
        match &self.first {
            Some(first) => format!("{}, {}", self.last, first),
            None => self.last.clone(),
        }
    }
}

/// 拆分姓名
///
/// - 含逗号: "Last, First"
/// - 不含逗号: 首个词为名，其余为姓
/// - 单个词: 仅姓
pub fn split_person_name(value: &str) -> Option<PersonName> {
    let value = collapse_whitespace(value);
    if value.is_empty() {
        return None;
    }

    if let Some((last, first)) = value.split_once(',') {
        let last = collapse_whitespace(last);
        let first = collapse_whitespace(&first.replace(',', " "));
        return match (last.is_empty(), first.is_empty()) {
            (true, true) => None,
            (false, true) => Some(PersonName { first: None, last }),
            (true, false) => Some(PersonName {
                first: None,
                last: first,
            }),
            (false, false) => Some(PersonName {
                first: Some(first),
                last,
            }),
        };
    }

    let mut tokens = value.split(' ');
    let first_token = tokens.next()?.to_string();
    let rest: Vec<&str> = tokens.collect();
    if rest.is_empty() {
        Some(PersonName {
            first: None,
            last: first_token,
        })
    } else {
        Some(PersonName {
            first: Some(first_token),
            last: rest.join(" "),
        })
    }
}

// ==========================================
// 数值 / 布尔
// ==========================================

fn normalize_rate(raw: &CellValue) -> CellValue {
    match raw {
        CellValue::Number(n) if n.is_finite() => CellValue::Number(*n),
        CellValue::Text(t) => parse_amount(t)
            .map(CellValue::Number)
            .unwrap_or(CellValue::Null),
        _ => CellValue::Null,
    }
}

/// 解析金额: 允许 $、千分位逗号、会计负数括号
pub fn parse_amount(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let (negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ' | '\u{a0}'))
        .collect();
    let amount = cleaned.parse::<f64>().ok().filter(|n| n.is_finite())?;
    Some(if negative { -amount } else { amount })
}

fn normalize_boolean(raw: &CellValue) -> CellValue {
    match raw {
        CellValue::Bool(b) => CellValue::Bool(*b),
        CellValue::Number(n) if *n == 1.0 => CellValue::Bool(true),
        CellValue::Number(n) if *n == 0.0 => CellValue::Bool(false),
        CellValue::Text(t) => match t.trim().to_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => CellValue::Bool(true),
            "no" | "n" | "false" | "0" => CellValue::Bool(false),
            _ => CellValue::Null,
        },
        _ => CellValue::Null,
    }
}

// ==========================================
// 日期 / 时间戳
// ==========================================

fn normalize_date_cell(raw: &CellValue, order: DateOrder) -> CellValue {
    let date = match raw {
        CellValue::Number(n) => excel_serial_to_datetime(*n)
            .map(|dt| dt.date())
            .or_else(|| parse_date(&crate::domain::types::format_number(*n), order)),
        CellValue::Text(t) => parse_date(t, order),
        _ => None,
    };
    date.map(|d| CellValue::Text(d.format(DATE_FORMAT).to_string()))
        .unwrap_or(CellValue::Null)
}

fn normalize_timestamp_cell(raw: &CellValue, order: DateOrder) -> CellValue {
    let timestamp = match raw {
        CellValue::Number(n) => excel_serial_to_datetime(*n),
        CellValue::Text(t) => parse_timestamp(t, order),
        _ => None,
    };
    timestamp
        .map(|dt| CellValue::Text(dt.format(TIMESTAMP_FORMAT).to_string()))
        .unwrap_or(CellValue::Null)
}

/// 解析日期文本
///
/// 顺序:
/// 1. ISO（YYYY-MM-DD / RFC3339 / 带时间）
/// 2. YYYYMMDD
/// 3. a/b/c（分隔符 / - .）：首段 4 位 → 年月日；否则年在末段，
///    首段 > 12 → 日月年，次段 > 12 → 月日年，均 ≤ 12 → 按 order
/// 4. 英文月份名（15 Jan 2024 / Jan 15, 2024）
pub fn parse_date(value: &str, order: DateOrder) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local().date());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }

    if value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(value, "%Y%m%d").ok();
    }

    // 仅取日期部分（"31/01/2024 08:00" 之类）
    let date_part = value.split_whitespace().next().unwrap_or(value);
    if let Some(date) = parse_numeric_date(date_part, order) {
        return Some(date);
    }

    for fmt in [
        "%d %b %Y", "%d %B %Y", "%b %d, %Y", "%B %d, %Y", "%b %d %Y", "%B %d %Y", "%d-%b-%Y",
        "%d-%b-%y",
    ] {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date);
        }
    }

    None
}

fn parse_numeric_date(value: &str, order: DateOrder) -> Option<NaiveDate> {
    let segments: Vec<&str> = value.split(['/', '-', '.']).collect();
    if segments.len() != 3
        || segments
            .iter()
            .any(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    if segments[0].len() == 4 {
        let year: i32 = segments[0].parse().ok()?;
        let month: u32 = segments[1].parse().ok()?;
        let day: u32 = segments[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let year = expand_year(segments[2])?;
    let a: u32 = segments[0].parse().ok()?;
    let b: u32 = segments[1].parse().ok()?;

    let (day, month) = if a > 12 {
        (a, b)
    } else if b > 12 {
        (b, a)
    } else {
        match order {
            DateOrder::DayFirst => (a, b),
            DateOrder::MonthFirst => (b, a),
        }
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// 两位年份以 50 为界: 00–49 → 20xx，50–99 → 19xx
fn expand_year(segment: &str) -> Option<i32> {
    let year: i32 = segment.parse().ok()?;
    match segment.len() {
        2 if year < 50 => Some(2000 + year),
        2 => Some(1900 + year),
        4 => Some(year),
        _ => None,
    }
}

/// 解析时间戳文本（日期部分沿用 parse_date 的口径）
pub fn parse_timestamp(value: &str, order: DateOrder) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for fmt in [
        TIMESTAMP_FORMAT,
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }

    // "<日期> <时间>"
    let (date_part, time_part) = value.split_once(char::is_whitespace)?;
    let date = parse_date(date_part, order)?;
    let time_part = time_part.trim();
    for fmt in ["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p", "%I:%M:%S%p", "%I:%M%p"] {
        if let Ok(time) = NaiveTime::parse_from_str(time_part, fmt) {
            return Some(date.and_time(time));
        }
    }
    None
}

/// Excel 1900 日期系统序列号 → 日期时间
///
/// Excel 把 1900 视为闰年，序列号 60 为不存在的 1900-02-29；
/// 小于 60 的序列号以 1899-12-31 为基准，其余以 1899-12-30 为基准
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }

    let base = if serial < 60.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };

    let total_seconds = (serial * 86_400.0).round() as i64;
    let days = total_seconds.div_euclid(86_400);
    let seconds = total_seconds.rem_euclid(86_400);

    base.and_time(NaiveTime::MIN)
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))
}
