// ==========================================
// 配置覆写 → 导入会话 集成测试
// ==========================================
// 测试目标: config_kv 中的覆写项改变解析/校验/分批行为
// ==========================================

mod helpers;

use helpers::memory_store::MemoryStore;
use payroll_import::config::{config_keys, ConfigManager, DateOrder, ImportConfigReader};
use payroll_import::domain::catalog;
use payroll_import::importer::ImportSession;
use payroll_import::{logging, ImportConfig, ImportOptions};
use test_helpers::{create_test_db, employee_csv_12_rows, fixed_today};

async fn session_with(overrides: &[(&str, &str)]) -> ImportSession {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let manager = ConfigManager::new(&db_path).unwrap();
    for (key, value) in overrides {
        manager.set_config_value(key, value).unwrap();
    }
    let config = manager.load_import_config().await.unwrap();

    let mut session = ImportSession::for_entity(catalog::EMPLOYEE, config).unwrap();
    session
        .load_bytes("employees.csv", employee_csv_12_rows().as_bytes())
        .unwrap();
    session.auto_map().unwrap();
    session
}

#[tokio::test]
async fn test_defaults_without_overrides() {
    logging::init_test();

    let session = session_with(&[]).await;
    assert_eq!(session.config(), &ImportConfig::default());
}

#[tokio::test]
async fn test_month_first_date_order() {
    logging::init_test();

    let mut session = session_with(&[(config_keys::DATE_ORDER, "month_first")]).await;
    assert_eq!(session.config().date_order, DateOrder::MonthFirst);
    session.validate(fixed_today()).unwrap();

    // 02/03/1992 → 2 月 3 日；15/01/2020 仍按日在前
    let records = session.records();
    assert_eq!(
        records[2].record.text("birth_date").as_deref(),
        Some("1992-02-03")
    );
    assert_eq!(
        records[0].record.text("hire_date").as_deref(),
        Some("2020-01-15")
    );
}

#[tokio::test]
async fn test_thresholds_change_validation() {
    logging::init_test();

    let mut session = session_with(&[
        (config_keys::HOURLY_RATE_WARNING_THRESHOLD, "700"),
        (config_keys::SIN_CHECKSUM_BLOCKING, "true"),
    ])
    .await;
    let summary = session.validate(fixed_today()).unwrap();

    // 时薪 600 不再告警；证件号校验失败改为阻断
    assert_eq!(summary.warning_rows, 1);
    assert_eq!(summary.error_rows, 2);
    assert_eq!(summary.valid_rows, 9);
}

#[tokio::test]
async fn test_minimum_age_override() {
    logging::init_test();

    // 1995-01-30 / 1993-08-08 / 1994-03-03 至 2024-06-01 不满 31 周岁
    let mut session = session_with(&[(config_keys::MINIMUM_EMPLOYEE_AGE_YEARS, "31")]).await;
    let summary = session.validate(fixed_today()).unwrap();

    let age_errors: Vec<usize> = session
        .issues()
        .iter()
        .filter(|i| i.field == "birth_date")
        .map(|i| i.row)
        .collect();
    assert_eq!(age_errors, vec![7, 9, 13]);
    // 另有第 8 行缺少入职日期
    assert_eq!(summary.error_rows, 4);
}

#[tokio::test]
async fn test_batch_size_override() {
    logging::init_test();

    let mut session = session_with(&[(config_keys::IMPORT_BATCH_SIZE, "4")]).await;
    session.validate(fixed_today()).unwrap();

    let store = MemoryStore::new();
    let mut percents = Vec::new();
    let outcome = session
        .import(
            &store,
            ImportOptions::default(),
            |p| percents.push(p.percent),
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome.imported, 10);
    assert_eq!(percents, vec![33, 66, 100]);
}

#[tokio::test]
async fn test_extension_whitelist_override() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().unwrap();
    let manager = ConfigManager::new(&db_path).unwrap();
    manager
        .set_config_value(config_keys::ALLOWED_EXTENSIONS, "xlsx")
        .unwrap();
    let config = manager.load_import_config().await.unwrap();

    let mut session = ImportSession::for_entity(catalog::EMPLOYEE, config).unwrap();
    let err = session
        .load_bytes("employees.csv", employee_csv_12_rows().as_bytes())
        .unwrap_err();
    assert!(err.is_parse_error());
}

#[tokio::test]
async fn test_file_size_limit_override() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().unwrap();
    let manager = ConfigManager::new(&db_path).unwrap();
    manager
        .set_config_value(config_keys::MAX_FILE_SIZE_BYTES, "64")
        .unwrap();
    let config = manager.load_import_config().await.unwrap();
    assert_eq!(config.max_file_size_bytes, 64);

    let mut session = ImportSession::for_entity(catalog::EMPLOYEE, config).unwrap();
    assert!(session
        .load_bytes("employees.csv", employee_csv_12_rows().as_bytes())
        .is_err());
}
