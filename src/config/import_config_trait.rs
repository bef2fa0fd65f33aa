// ==========================================
// 薪酬批量导入管道 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::import_config::{DateOrder, ImportConfig};
use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（config_kv 表）、ImportConfig（静态配置）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 文件解析 =====

    /// 文件大小上限（字节）
    ///
    /// # 默认值
    /// - 20 MiB
    async fn get_max_file_size_bytes(&self) -> ImportResult<u64>;

    /// 允许的扩展名（小写，不含点）
    ///
    /// # 默认值
    /// - ["csv", "xlsx", "xls"]
    async fn get_allowed_extensions(&self) -> ImportResult<Vec<String>>;

    /// 日/月歧义时的日期口径
    ///
    /// # 默认值
    /// - DayFirst
    async fn get_date_order(&self) -> ImportResult<DateOrder>;

    // ===== 落库 =====

    /// 每批行数（每批结束回调一次进度）
    ///
    /// # 默认值
    /// - 10
    async fn get_import_batch_size(&self) -> ImportResult<usize>;

    // ===== 校验阈值 =====

    /// 时薪告警阈值（超过则 Warning）
    ///
    /// # 默认值
    /// - 500.0
    async fn get_hourly_rate_warning_threshold(&self) -> ImportResult<f64>;

    /// 最低雇佣年龄（周岁，低于则 Error）
    ///
    /// # 默认值
    /// - 14
    async fn get_minimum_employee_age_years(&self) -> ImportResult<u32>;

    /// 证件号校验失败是否阻断
    ///
    /// # 默认值
    /// - false（仅 Warning）
    async fn get_sin_checksum_blocking(&self) -> ImportResult<bool>;

    /// 汇总为配置快照
    async fn load_import_config(&self) -> ImportResult<ImportConfig> {
        Ok(ImportConfig {
            max_file_size_bytes: self.get_max_file_size_bytes().await?,
            allowed_extensions: self.get_allowed_extensions().await?,
            import_batch_size: self.get_import_batch_size().await?,
            hourly_rate_warning_threshold: self.get_hourly_rate_warning_threshold().await?,
            minimum_employee_age_years: self.get_minimum_employee_age_years().await?,
            sin_checksum_blocking: self.get_sin_checksum_blocking().await?,
            date_order: self.get_date_order().await?,
        })
    }
}

// 静态配置直接作为读取器（测试与命令行使用）
#[async_trait]
impl ImportConfigReader for ImportConfig {
    async fn get_max_file_size_bytes(&self) -> ImportResult<u64> {
        Ok(self.max_file_size_bytes)
    }

    async fn get_allowed_extensions(&self) -> ImportResult<Vec<String>> {
        Ok(self.allowed_extensions.clone())
    }

    async fn get_date_order(&self) -> ImportResult<DateOrder> {
        Ok(self.date_order)
    }

    async fn get_import_batch_size(&self) -> ImportResult<usize> {
        Ok(self.import_batch_size)
    }

    async fn get_hourly_rate_warning_threshold(&self) -> ImportResult<f64> {
        Ok(self.hourly_rate_warning_threshold)
    }

    async fn get_minimum_employee_age_years(&self) -> ImportResult<u32> {
        Ok(self.minimum_employee_age_years)
    }

    async fn get_sin_checksum_blocking(&self) -> ImportResult<bool> {
        Ok(self.sin_checksum_blocking)
    }
}
