// ==========================================
// 薪酬批量导入管道 - 导入存储 SQLite 实现
// ==========================================
// 职责: 实现 ImportStore（使用 rusqlite）
// 幂等: (entity, business_key) 主键 + ON CONFLICT，重跑不会产生重复
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::domain::record::{ImportBatchRecord, ImportRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_store::{ImportStore, LookupEntry, WriteResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

/// 建表并确认库的 schema 版本不高于本程序
fn prepare_schema(conn: &Connection) -> RepositoryResult<()> {
    ensure_schema(conn)?;
    match read_schema_version(conn)? {
        Some(version) if version > CURRENT_SCHEMA_VERSION => {
            Err(RepositoryError::DatabaseConnectionError(format!(
                "数据库 schema 版本 {} 高于程序支持的 {}",
                version, CURRENT_SCHEMA_VERSION
            )))
        }
        version => {
            tracing::debug!(?version, "schema 就绪");
            Ok(())
        }
    }
}

// ==========================================
// SqliteImportStore
// ==========================================
pub struct SqliteImportStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteImportStore {
    /// 创建新的 Store 实例（自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        prepare_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（与 ConfigManager 共享连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
            prepare_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 共享连接句柄
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(format!("锁获取失败: {}", e)))
    }

    /// 写入参照表别名（代码本身也作为别名）
    pub fn insert_lookup(&self, table: &str, code: &str, aliases: &[&str]) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO lookup_alias (table_name, code, alias) VALUES (?1, ?2, ?3)",
            )?;
            for alias in std::iter::once(&code).chain(aliases.iter()) {
                count += stmt.execute(params![table, code, alias])?;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    /// 读取单条记录的载荷（JSON）
    pub fn get_payload(&self, entity: &str, business_key: &str) -> RepositoryResult<Option<serde_json::Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT payload_json FROM import_record WHERE entity = ?1 AND business_key = ?2",
                params![entity, business_key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// 统计某实体的记录数
    pub fn count_records(&self, entity: &str) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM import_record WHERE entity = ?1",
            params![entity],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// 查询最近的导入批次
    pub fn recent_batches(&self, limit: usize) -> RepositoryResult<Vec<ImportBatchRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT batch_id, entity, file_name, duplicate_handling, total_rows,
                   imported, skipped, errored, error_rows, duplicate_rows,
                   cancelled, started_at, finished_at, elapsed_ms
            FROM import_batch
            ORDER BY finished_at DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            let handling: String = row.get(3)?;
            Ok(ImportBatchRecord {
                batch_id: row.get(0)?,
                entity: row.get(1)?,
                file_name: row.get(2)?,
                duplicate_handling: if handling == "update" {
                    crate::domain::types::DuplicateHandling::Update
                } else {
                    crate::domain::types::DuplicateHandling::Skip
                },
                total_rows: row.get::<_, i64>(4)? as usize,
                imported: row.get::<_, i64>(5)? as usize,
                skipped: row.get::<_, i64>(6)? as usize,
                errored: row.get::<_, i64>(7)? as usize,
                error_rows: row.get::<_, i64>(8)? as usize,
                duplicate_rows: row.get::<_, i64>(9)? as usize,
                cancelled: row.get::<_, i64>(10)? != 0,
                started_at: row.get(11)?,
                finished_at: row.get(12)?,
                elapsed_ms: row.get(13)?,
            })
        })?;

        let mut batches = Vec::new();
        for batch in rows {
            batches.push(batch?);
        }
        Ok(batches)
    }
}

#[async_trait]
impl ImportStore for SqliteImportStore {
    async fn upsert(
        &self,
        entity: &str,
        batch_id: &str,
        record: &ImportRecord,
    ) -> RepositoryResult<WriteResult> {
        let payload = serde_json::to_string(&record.payload)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM import_record WHERE entity = ?1 AND business_key = ?2",
                params![entity, record.business_key],
                |_row| Ok(()),
            )
            .optional()?
            .is_some();

        tx.execute(
            r#"
            INSERT INTO import_record (
                entity, business_key, payload_json, source_row, batch_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(entity, business_key) DO UPDATE SET
                payload_json = excluded.payload_json,
                source_row = excluded.source_row,
                batch_id = excluded.batch_id,
                updated_at = excluded.updated_at
            "#,
            params![
                entity,
                record.business_key,
                payload,
                record.row_number as i64,
                batch_id,
                now,
            ],
        )?;

        tx.commit()?;

        Ok(if exists {
            WriteResult::Updated
        } else {
            WriteResult::Inserted
        })
    }

    async fn insert_if_absent(
        &self,
        entity: &str,
        batch_id: &str,
        record: &ImportRecord,
    ) -> RepositoryResult<WriteResult> {
        let payload = serde_json::to_string(&record.payload)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;

        let changed = conn.execute(
            r#"
            INSERT INTO import_record (
                entity, business_key, payload_json, source_row, batch_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(entity, business_key) DO NOTHING
            "#,
            params![
                entity,
                record.business_key,
                payload,
                record.row_number as i64,
                batch_id,
                now,
            ],
        )?;

        Ok(if changed == 0 {
            WriteResult::AlreadyExists
        } else {
            WriteResult::Inserted
        })
    }

    async fn existing_keys(&self, entity: &str, keys: &[String]) -> RepositoryResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT 1 FROM import_record WHERE entity = ?1 AND business_key = ?2")?;

        let mut existing = Vec::new();
        for key in keys {
            if stmt.exists(params![entity, key])? {
                existing.push(key.clone());
            }
        }
        Ok(existing)
    }

    async fn load_lookup(&self, table: &str) -> RepositoryResult<Vec<LookupEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT code, alias FROM lookup_alias WHERE table_name = ?1 ORDER BY code, alias",
        )?;

        let rows = stmt.query_map(params![table], |row| {
            Ok(LookupEntry {
                code: row.get(0)?,
                alias: row.get(1)?,
            })
        })?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    async fn record_batch(&self, batch: &ImportBatchRecord) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO import_batch (
                batch_id, entity, file_name, duplicate_handling, total_rows,
                imported, skipped, errored, error_rows, duplicate_rows,
                cancelled, started_at, finished_at, elapsed_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                batch.batch_id,
                batch.entity,
                batch.file_name,
                batch.duplicate_handling.to_string(),
                batch.total_rows as i64,
                batch.imported as i64,
                batch.skipped as i64,
                batch.errored as i64,
                batch.error_rows as i64,
                batch.duplicate_rows as i64,
                batch.cancelled as i64,
                batch.started_at,
                batch.finished_at,
                batch.elapsed_ms,
            ],
        )?;
        Ok(())
    }
}
