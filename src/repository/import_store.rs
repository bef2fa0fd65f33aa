// ==========================================
// 薪酬批量导入管道 - 导入存储 Trait
// ==========================================
// 职责: 定义导入落库所需的数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做按业务主键的写入/查询
// 红线: 每次调用自带单行事务范围，不跨行包事务
// ==========================================

use crate::domain::record::{ImportBatchRecord, ImportRecord};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ==========================================
// WriteResult - 单行写入结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteResult {
    Inserted,
    Updated,
    AlreadyExists,
}

// ==========================================
// LookupEntry - 参照表别名
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub code: String,
    pub alias: String,
}

// ==========================================
// ImportStore Trait
// ==========================================
// 用途: 批量导入的持久化协作方
// 实现者: SqliteImportStore（使用 rusqlite）
#[async_trait]
pub trait ImportStore: Send + Sync {
    /// 按 (entity, business_key) 插入或更新
    ///
    /// # 返回
    /// - Ok(Inserted): 新增
    /// - Ok(Updated): 覆盖已存在记录
    /// - Err: 单行失败（不影响其他行）
    async fn upsert(
        &self,
        entity: &str,
        batch_id: &str,
        record: &ImportRecord,
    ) -> RepositoryResult<WriteResult>;

    /// 仅当 (entity, business_key) 不存在时插入
    ///
    /// # 返回
    /// - Ok(Inserted): 新增
    /// - Ok(AlreadyExists): 已存在，未写入
    async fn insert_if_absent(
        &self,
        entity: &str,
        batch_id: &str,
        record: &ImportRecord,
    ) -> RepositoryResult<WriteResult>;

    /// 批量检查业务主键是否已存在
    ///
    /// # 返回
    /// - Ok(Vec<String>): 已存在的业务主键
    async fn existing_keys(&self, entity: &str, keys: &[String]) -> RepositoryResult<Vec<String>>;

    /// 读取参照表（如工会）的代码与别名
    async fn load_lookup(&self, table: &str) -> RepositoryResult<Vec<LookupEntry>>;

    /// 记录导入批次
    async fn record_batch(&self, batch: &ImportBatchRecord) -> RepositoryResult<()>;
}
