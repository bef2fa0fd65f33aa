// ==========================================
// 薪酬批量导入管道 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供导入落库接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod import_store;
pub mod import_store_impl;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use import_store::{ImportStore, LookupEntry, WriteResult};
pub use import_store_impl::SqliteImportStore;
