// ==========================================
// 薪酬批量导入管道 - 分批落库
// ==========================================
// 阶段 5: 按批次顺序写入存储，单行失败不影响其他行
// 冲突策略:
// - Update: upsert（已存在则覆盖，计 Imported）
// - Skip:   insert_if_absent（已存在计 Skipped）
// 并发: 单任务协作式；每行一次 await，每批结束 yield 一次
// 取消: 批次之间检查 CancelToken，剩余行计 Skipped("cancelled")
// ==========================================

use crate::config::import_config::DEFAULT_IMPORT_BATCH_SIZE;
use crate::domain::record::{ImportBatch, ImportOutcome, ImportProgress, ImportRecord, RowOutcome};
use crate::domain::types::{DuplicateHandling, RowStatus};
use crate::repository::{ImportStore, WriteResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const REASON_CANCELLED: &str = "cancelled";
pub const REASON_ALREADY_EXISTS: &str = "already exists";

// ==========================================
// CancelToken - 取消标记（可跨任务共享）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ==========================================
// BatchImporter
// ==========================================
#[derive(Debug, Clone)]
pub struct BatchImporter {
    batch_size: usize,
    cancel: Option<CancelToken>,
}

impl Default for BatchImporter {
    fn default() -> Self {
        Self::new(DEFAULT_IMPORT_BATCH_SIZE)
    }
}

impl BatchImporter {
    /// batch_size 为 0 时按 1 处理
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            cancel: None,
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 执行导入
    ///
    /// # 参数
    /// - store: 持久化协作方
    /// - batch: 待导入记录（已过滤错误行/重复行）
    /// - on_progress: 每批结束后回调（percent 0..=100）
    ///
    /// # 返回
    /// 逐行结果（文件顺序）+ 汇总计数；不返回 Err
    #[instrument(skip_all, fields(batch_id = %batch.batch_id, entity = %batch.entity, rows = batch.records.len()))]
    pub async fn run<S, F>(&self, store: &S, batch: &ImportBatch, mut on_progress: F) -> ImportOutcome
    where
        S: ImportStore + ?Sized,
        F: FnMut(ImportProgress),
    {
        let mut outcome = ImportOutcome::default();
        let total_batches = batch.records.len().div_ceil(self.batch_size);

        if total_batches == 0 {
            on_progress(ImportProgress {
                percent: 100,
                completed_batches: 0,
                total_batches: 0,
            });
            return outcome;
        }

        info!(
            total_batches,
            batch_size = self.batch_size,
            policy = %batch.options.duplicate_handling,
            "开始分批导入"
        );

        for (idx, chunk) in batch.records.chunks(self.batch_size).enumerate() {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                let remaining = &batch.records[idx * self.batch_size..];
                warn!(completed_batches = idx, remaining = remaining.len(), "导入已取消");
                for record in remaining {
                    outcome.push(row_outcome(
                        record,
                        RowStatus::Skipped,
                        Some(REASON_CANCELLED.to_string()),
                    ));
                }
                outcome.cancelled = true;
                break;
            }

            for record in chunk {
                let row = self.import_row(store, batch, record).await;
                outcome.push(row);
            }

            let completed_batches = idx + 1;
            on_progress(ImportProgress {
                percent: progress_percent(completed_batches, total_batches),
                completed_batches,
                total_batches,
            });
            debug!(completed_batches, total_batches, "批次完成");

            tokio::task::yield_now().await;
        }

        info!(
            imported = outcome.imported,
            skipped = outcome.skipped,
            errored = outcome.errored,
            cancelled = outcome.cancelled,
            "分批导入结束"
        );
        outcome
    }

    async fn import_row<S>(&self, store: &S, batch: &ImportBatch, record: &ImportRecord) -> RowOutcome
    where
        S: ImportStore + ?Sized,
    {
        let result = match batch.options.duplicate_handling {
            DuplicateHandling::Update => store.upsert(&batch.entity, &batch.batch_id, record).await,
            DuplicateHandling::Skip => {
                store
                    .insert_if_absent(&batch.entity, &batch.batch_id, record)
                    .await
            }
        };

        match result {
            Ok(WriteResult::Inserted) | Ok(WriteResult::Updated) => {
                row_outcome(record, RowStatus::Imported, None)
            }
            Ok(WriteResult::AlreadyExists) => row_outcome(
                record,
                RowStatus::Skipped,
                Some(REASON_ALREADY_EXISTS.to_string()),
            ),
            Err(e) => {
                warn!(row = record.row_number, key = %record.business_key, error = %e, "单行导入失败");
                row_outcome(record, RowStatus::Errored, Some(e.to_string()))
            }
        }
    }
}

/// 已完成批次占比（向下取整，最后一批恰为 100）
fn progress_percent(completed_batches: usize, total_batches: usize) -> u8 {
    if total_batches == 0 {
        return 100;
    }
    ((completed_batches.min(total_batches) * 100) / total_batches) as u8
}

fn row_outcome(record: &ImportRecord, status: RowStatus, reason: Option<String>) -> RowOutcome {
    RowOutcome {
        row: record.row_number,
        business_key: record.business_key.clone(),
        status,
        reason,
    }
}
