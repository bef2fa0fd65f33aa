// ==========================================
// 内存版 ImportStore - 用于集成测试
// ==========================================
// 支持: 预置已存在主键 / 指定行号写入失败 / 参照表 / 批次记录
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use payroll_import::domain::{ImportBatchRecord, ImportRecord};
use payroll_import::repository::{
    ImportStore, LookupEntry, RepositoryError, RepositoryResult, WriteResult,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(String, String), ImportRecord>>,
    lookups: Mutex<HashMap<String, Vec<LookupEntry>>>,
    batches: Mutex<Vec<ImportBatchRecord>>,
    failing_rows: HashSet<usize>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定行号写入时返回错误
    pub fn failing_rows(mut self, rows: &[usize]) -> Self {
        self.failing_rows = rows.iter().copied().collect();
        self
    }

    /// 预置已存在记录
    pub fn seed(&self, entity: &str, key: &str) {
        self.records.lock().unwrap().insert(
            (entity.to_string(), key.to_string()),
            ImportRecord {
                row_number: 0,
                business_key: key.to_string(),
                payload: BTreeMap::new(),
            },
        );
    }

    pub fn add_lookup(&self, table: &str, code: &str, aliases: &[&str]) {
        let mut lookups = self.lookups.lock().unwrap();
        let entries = lookups.entry(table.to_string()).or_default();
        for alias in std::iter::once(&code).chain(aliases.iter()) {
            entries.push(LookupEntry {
                code: code.to_string(),
                alias: alias.to_string(),
            });
        }
    }

    pub fn get(&self, entity: &str, key: &str) -> Option<ImportRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(entity.to_string(), key.to_string()))
            .cloned()
    }

    pub fn record_count(&self, entity: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .keys()
            .filter(|(e, _)| e == entity)
            .count()
    }

    pub fn batches(&self) -> Vec<ImportBatchRecord> {
        self.batches.lock().unwrap().clone()
    }

    /// 写入调用次数（含失败）
    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_failure(&self, record: &ImportRecord) -> RepositoryResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing_rows.contains(&record.row_number) {
            return Err(RepositoryError::Rejected {
                key: record.business_key.clone(),
                message: "模拟写入失败".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ImportStore for MemoryStore {
    async fn upsert(
        &self,
        entity: &str,
        _batch_id: &str,
        record: &ImportRecord,
    ) -> RepositoryResult<WriteResult> {
        self.check_failure(record)?;
        let previous = self.records.lock().unwrap().insert(
            (entity.to_string(), record.business_key.clone()),
            record.clone(),
        );
        Ok(if previous.is_some() {
            WriteResult::Updated
        } else {
            WriteResult::Inserted
        })
    }

    async fn insert_if_absent(
        &self,
        entity: &str,
        _batch_id: &str,
        record: &ImportRecord,
    ) -> RepositoryResult<WriteResult> {
        self.check_failure(record)?;
        let mut records = self.records.lock().unwrap();
        let key = (entity.to_string(), record.business_key.clone());
        if records.contains_key(&key) {
            return Ok(WriteResult::AlreadyExists);
        }
        records.insert(key, record.clone());
        Ok(WriteResult::Inserted)
    }

    async fn existing_keys(&self, entity: &str, keys: &[String]) -> RepositoryResult<Vec<String>> {
        let records = self.records.lock().unwrap();
        Ok(keys
            .iter()
            .filter(|k| records.contains_key(&(entity.to_string(), (*k).clone())))
            .cloned()
            .collect())
    }

    async fn load_lookup(&self, table: &str) -> RepositoryResult<Vec<LookupEntry>> {
        Ok(self
            .lookups
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default())
    }

    async fn record_batch(&self, batch: &ImportBatchRecord) -> RepositoryResult<()> {
        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }
}
