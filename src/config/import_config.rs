// ==========================================
// 薪酬批量导入管道 - 导入配置
// ==========================================
// 职责: 导入管道可调参数及默认值
// 来源: 默认值 → config_kv 覆写（见 ConfigManager）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 默认文件大小上限: 20 MiB
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 20 * 1024 * 1024;

/// 默认每批行数
pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 10;

/// 默认时薪告警阈值
pub const DEFAULT_HOURLY_RATE_WARNING_THRESHOLD: f64 = 500.0;

/// 默认最低雇佣年龄（周岁）
pub const DEFAULT_MINIMUM_EMPLOYEE_AGE_YEARS: u32 = 14;

/// 默认允许的扩展名
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 3] = ["csv", "xlsx", "xls"];

// ==========================================
// DateOrder - 日/月歧义时的默认口径
// ==========================================
// 两段都 ≤ 12 时采用该口径；默认日在前（加拿大/ISO 习惯）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
}

impl fmt::Display for DateOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateOrder::DayFirst => write!(f, "day_first"),
            DateOrder::MonthFirst => write!(f, "month_first"),
        }
    }
}

impl FromStr for DateOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day_first" | "dmy" => Ok(DateOrder::DayFirst),
            "month_first" | "mdy" => Ok(DateOrder::MonthFirst),
            other => Err(format!("未知日期口径: {}", other)),
        }
    }
}

// ==========================================
// ImportConfig - 导入配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    pub max_file_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub import_batch_size: usize,
    pub hourly_rate_warning_threshold: f64,
    pub minimum_employee_age_years: u32,
    /// 证件号校验失败是否阻断（默认仅告警）
    pub sin_checksum_blocking: bool,
    pub date_order: DateOrder,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            import_batch_size: DEFAULT_IMPORT_BATCH_SIZE,
            hourly_rate_warning_threshold: DEFAULT_HOURLY_RATE_WARNING_THRESHOLD,
            minimum_employee_age_years: DEFAULT_MINIMUM_EMPLOYEE_AGE_YEARS,
            sin_checksum_blocking: false,
            date_order: DateOrder::DayFirst,
        }
    }
}
