// ==========================================
// 薪酬批量导入管道 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config::{
    DateOrder, ImportConfig, DEFAULT_HOURLY_RATE_WARNING_THRESHOLD, DEFAULT_IMPORT_BATCH_SIZE,
    DEFAULT_MAX_FILE_SIZE_BYTES, DEFAULT_MINIMUM_EMPLOYEE_AGE_YEARS,
};
use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(|e| ImportError::ConfigReadError {
            key: "*".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ImportResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;
            crate::db::configure_sqlite_connection(&conn_guard).map_err(|e| {
                ImportError::ConfigReadError {
                    key: "*".to_string(),
                    message: e.to_string(),
                }
            })?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;

        conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// 写入 global scope 配置值（存在则覆盖）
    pub fn set_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )
        .map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        Ok(())
    }

    /// 读取并解析配置值，缺失时返回默认值
    ///
    /// 说明：值存在但格式错误时不静默回退，返回 ConfigValueError
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ImportResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| ImportError::ConfigValueError {
                    key: key.to_string(),
                    value: raw.clone(),
                    message: e.to_string(),
                }),
        }
    }
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_max_file_size_bytes(&self) -> ImportResult<u64> {
        self.get_parsed_or_default(config_keys::MAX_FILE_SIZE_BYTES, DEFAULT_MAX_FILE_SIZE_BYTES)
    }

    async fn get_allowed_extensions(&self) -> ImportResult<Vec<String>> {
        let default = ImportConfig::default().allowed_extensions;
        let value = match self.get_config_value(config_keys::ALLOWED_EXTENSIONS)? {
            Some(v) => v,
            None => return Ok(default),
        };

        let extensions: Vec<String> = value
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        if extensions.is_empty() {
            warn!(config_key = config_keys::ALLOWED_EXTENSIONS, "扩展名配置为空，使用默认值");
            Ok(default)
        } else {
            Ok(extensions)
        }
    }

    async fn get_date_order(&self) -> ImportResult<DateOrder> {
        self.get_parsed_or_default(config_keys::DATE_ORDER, DateOrder::DayFirst)
    }

    async fn get_import_batch_size(&self) -> ImportResult<usize> {
        let size =
            self.get_parsed_or_default(config_keys::IMPORT_BATCH_SIZE, DEFAULT_IMPORT_BATCH_SIZE)?;
        if size == 0 {
            return Err(ImportError::ConfigValueError {
                key: config_keys::IMPORT_BATCH_SIZE.to_string(),
                value: "0".to_string(),
                message: "批大小必须大于 0".to_string(),
            });
        }
        Ok(size)
    }

    async fn get_hourly_rate_warning_threshold(&self) -> ImportResult<f64> {
        self.get_parsed_or_default(
            config_keys::HOURLY_RATE_WARNING_THRESHOLD,
            DEFAULT_HOURLY_RATE_WARNING_THRESHOLD,
        )
    }

    async fn get_minimum_employee_age_years(&self) -> ImportResult<u32> {
        self.get_parsed_or_default(
            config_keys::MINIMUM_EMPLOYEE_AGE_YEARS,
            DEFAULT_MINIMUM_EMPLOYEE_AGE_YEARS,
        )
    }

    async fn get_sin_checksum_blocking(&self) -> ImportResult<bool> {
        self.get_parsed_or_default(config_keys::SIN_CHECKSUM_BLOCKING, false)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 文件解析
    pub const MAX_FILE_SIZE_BYTES: &str = "import_max_file_size_bytes";
    pub const ALLOWED_EXTENSIONS: &str = "import_allowed_extensions"; // 逗号分隔
    pub const DATE_ORDER: &str = "import_date_order"; // day_first / month_first

    // 落库
    pub const IMPORT_BATCH_SIZE: &str = "import_batch_size";

    // 校验阈值
    pub const HOURLY_RATE_WARNING_THRESHOLD: &str = "hourly_rate_warning_threshold";
    pub const MINIMUM_EMPLOYEE_AGE_YEARS: &str = "minimum_employee_age_years";
    pub const SIN_CHECKSUM_BLOCKING: &str = "sin_checksum_blocking";
}
