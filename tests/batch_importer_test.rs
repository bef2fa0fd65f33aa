// ==========================================
// BatchImporter 集成测试
// ==========================================
// 测试目标: 单行失败隔离 / 进度回调 / 批次间取消 / 冲突策略
// ==========================================

mod helpers;

use helpers::memory_store::MemoryStore;
use payroll_import::domain::{CellValue, ImportBatch, ImportRecord};
use payroll_import::importer::batch_importer::{REASON_ALREADY_EXISTS, REASON_CANCELLED};
use payroll_import::importer::{BatchImporter, CancelToken};
use payroll_import::{logging, DuplicateHandling, ImportOptions, RowStatus};
use std::collections::BTreeMap;

const ENTITY: &str = "pay_code";

fn make_batch(count: usize, handling: DuplicateHandling) -> ImportBatch {
    let records = (0..count)
        .map(|i| {
            let mut payload = BTreeMap::new();
            payload.insert(
                "code".to_string(),
                CellValue::Text(format!("PC{:02}", i + 1)),
            );
            ImportRecord {
                row_number: i + 2,
                business_key: format!("PC{:02}", i + 1),
                payload,
            }
        })
        .collect();

    ImportBatch {
        batch_id: "batch-test".to_string(),
        entity: ENTITY.to_string(),
        records,
        options: ImportOptions {
            duplicate_handling: handling,
            include_duplicates: false,
        },
    }
}

#[tokio::test]
async fn test_row_failure_is_isolated() {
    logging::init_test();

    // 10 条记录中第 5 条（文件第 6 行）写入失败，跨 4 条一批
    let store = MemoryStore::new().failing_rows(&[6]);
    let batch = make_batch(10, DuplicateHandling::Skip);

    let outcome = BatchImporter::new(4).run(&store, &batch, |_| {}).await;

    assert_eq!(outcome.imported, 9);
    assert_eq!(outcome.errored, 1);
    assert_eq!(outcome.skipped, 0);

    let failed = &outcome.rows[4];
    assert_eq!(failed.row, 6);
    assert_eq!(failed.status, RowStatus::Errored);
    assert_eq!(failed.business_key, "PC05");
    assert!(failed.reason.as_deref().unwrap().contains("模拟写入失败"));

    // 前后相邻行不受影响
    assert_eq!(outcome.rows[3].business_key, "PC04");
    assert_eq!(outcome.rows[3].status, RowStatus::Imported);
    assert_eq!(outcome.rows[5].business_key, "PC06");
    assert_eq!(outcome.rows[5].status, RowStatus::Imported);

    assert!(store.get(ENTITY, "PC04").is_some());
    assert!(store.get(ENTITY, "PC05").is_none());
    assert!(store.get(ENTITY, "PC06").is_some());
    assert_eq!(store.record_count(ENTITY), 9);

    // 结果按文件顺序
    let rows: Vec<usize> = outcome.rows.iter().map(|r| r.row).collect();
    assert_eq!(rows, (2..=11).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_progress_reports_each_batch() {
    logging::init_test();

    let store = MemoryStore::new();
    let batch = make_batch(12, DuplicateHandling::Skip);

    let mut progress = Vec::new();
    let outcome = BatchImporter::new(5)
        .run(&store, &batch, |p| progress.push(p))
        .await;

    assert_eq!(outcome.imported, 12);
    let percents: Vec<u8> = progress.iter().map(|p| p.percent).collect();
    assert_eq!(percents, vec![33, 66, 100]);
    assert!(progress.iter().all(|p| p.total_batches == 3));
    assert_eq!(progress.last().unwrap().completed_batches, 3);
}

#[tokio::test]
async fn test_empty_batch_reports_complete() {
    let store = MemoryStore::new();
    let batch = make_batch(0, DuplicateHandling::Skip);

    let mut progress = Vec::new();
    let outcome = BatchImporter::default()
        .run(&store, &batch, |p| progress.push(p.percent))
        .await;

    assert_eq!(outcome.total(), 0);
    assert_eq!(progress, vec![100]);
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test]
async fn test_cancel_between_batches() {
    logging::init_test();

    let store = MemoryStore::new();
    let batch = make_batch(12, DuplicateHandling::Skip);
    let token = CancelToken::new();

    // 第一批完成后取消
    let cancel = token.clone();
    let outcome = BatchImporter::new(5)
        .with_cancel_token(token)
        .run(&store, &batch, |_| cancel.cancel())
        .await;

    assert!(outcome.cancelled);
    assert_eq!(outcome.imported, 5);
    assert_eq!(outcome.skipped, 7);
    assert_eq!(outcome.rows.len(), 12);
    assert!(outcome.rows[5..]
        .iter()
        .all(|r| r.status == RowStatus::Skipped && r.reason.as_deref() == Some(REASON_CANCELLED)));
    assert_eq!(store.record_count(ENTITY), 5);
    assert_eq!(store.write_calls(), 5);
}

#[tokio::test]
async fn test_cancel_before_start_writes_nothing() {
    let store = MemoryStore::new();
    let batch = make_batch(3, DuplicateHandling::Skip);
    let token = CancelToken::new();
    token.cancel();

    let outcome = BatchImporter::new(2)
        .with_cancel_token(token)
        .run(&store, &batch, |_| {})
        .await;

    assert!(outcome.cancelled);
    assert_eq!(outcome.skipped, 3);
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test]
async fn test_skip_policy_keeps_existing() {
    logging::init_test();

    let store = MemoryStore::new();
    store.seed(ENTITY, "PC02");
    let batch = make_batch(3, DuplicateHandling::Skip);

    let outcome = BatchImporter::new(10).run(&store, &batch, |_| {}).await;

    assert_eq!(outcome.imported, 2);
    assert_eq!(outcome.skipped, 1);
    let skipped = outcome.rows.iter().find(|r| r.business_key == "PC02").unwrap();
    assert_eq!(skipped.reason.as_deref(), Some(REASON_ALREADY_EXISTS));
    // 已存在记录未被覆盖
    assert_eq!(store.get(ENTITY, "PC02").unwrap().row_number, 0);
}

#[tokio::test]
async fn test_update_policy_overwrites_existing() {
    logging::init_test();

    let store = MemoryStore::new();
    store.seed(ENTITY, "PC02");
    let batch = make_batch(3, DuplicateHandling::Update);

    let outcome = BatchImporter::new(10).run(&store, &batch, |_| {}).await;

    assert_eq!(outcome.imported, 3);
    assert_eq!(outcome.skipped, 0);
    assert!(outcome.rows.iter().all(|r| r.reason.is_none()));
    assert_eq!(store.get(ENTITY, "PC02").unwrap().row_number, 3);
}

#[test]
fn test_zero_batch_size_is_clamped() {
    assert_eq!(BatchImporter::new(0).batch_size(), 1);
    assert_eq!(BatchImporter::default().batch_size(), 10);
}
