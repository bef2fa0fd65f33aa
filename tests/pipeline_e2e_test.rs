// ==========================================
// 导入会话端到端测试
// ==========================================
// 测试目标: 解析 → 自动映射 → 校验/去重 → 分批导入 → 报告
// 存储: 内存版 ImportStore
// ==========================================

mod helpers;

use helpers::memory_store::MemoryStore;
use payroll_import::domain::catalog;
use payroll_import::importer::{CancelToken, ImportSession};
use payroll_import::{
    logging, DuplicateHandling, ImportConfig, ImportError, ImportOptions, PipelineStage,
    RowStatus, Severity,
};
use test_helpers::{employee_csv_12_rows, fixed_today, write_csv};

fn employee_session() -> ImportSession {
    ImportSession::for_entity(catalog::EMPLOYEE, ImportConfig::default()).unwrap()
}

// ==========================================
// 员工文件: 12 行
// ==========================================

#[tokio::test]
async fn test_employee_file_summary() {
    logging::init_test();

    let file = write_csv(&employee_csv_12_rows());
    let mut session = employee_session();

    let parsed = session.load_file(file.path()).unwrap();
    assert_eq!(parsed.total_rows, 12);
    assert_eq!(session.stage(), PipelineStage::Parsed);

    let mapper = session.auto_map().unwrap();
    assert!(mapper.can_proceed());
    assert_eq!(mapper.header_for("employee_number"), Some("Employee ID"));
    assert_eq!(mapper.header_for("employee_name"), Some("Full Name"));
    assert_eq!(mapper.header_for("birth_date"), Some("Date of Birth"));
    assert_eq!(mapper.header_for("hourly_rate"), Some("Hourly Rate"));
    assert_eq!(mapper.header_for("postal_code"), None);
    assert!(mapper.unmapped_headers().is_empty());

    let summary = session.validate(fixed_today()).unwrap();
    assert_eq!(summary.total_rows, 12);
    assert_eq!(summary.valid_rows, 10);
    assert_eq!(summary.error_rows, 1);
    assert_eq!(summary.duplicate_rows, 1);
    assert_eq!(summary.warning_rows, 3);
    assert_eq!(summary.dropped_rows, 0);
    assert_eq!(session.stage(), PipelineStage::Validated);

    // 问题按文件行序排列
    let issues = session.issues();
    assert_eq!(issues.len(), 4);
    let rows: Vec<usize> = issues.iter().map(|i| i.row).collect();
    assert_eq!(rows, vec![6, 7, 8, 13]);

    assert_eq!(issues[0].field, "email");
    assert_eq!(issues[0].severity, Severity::Warning);
    assert_eq!(issues[1].field, "hourly_rate");
    assert_eq!(issues[1].severity, Severity::Warning);
    assert_eq!(issues[2].field, "hire_date");
    assert_eq!(issues[2].severity, Severity::Error);
    assert_eq!(issues[3].field, "sin");
    assert_eq!(issues[3].severity, Severity::Warning);

    // 第 10 行重复第 4 行
    let duplicate = session
        .records()
        .iter()
        .find(|r| r.is_duplicate)
        .unwrap();
    assert_eq!(duplicate.row_number(), 10);
    assert_eq!(duplicate.duplicate_of, Some(4));
    assert_eq!(duplicate.business_key, "E003");
}

#[tokio::test]
async fn test_employee_values_are_normalized() {
    logging::init_test();

    let file = write_csv(&employee_csv_12_rows());
    let mut session = employee_session();
    session.load_file(file.path()).unwrap();
    session.auto_map().unwrap();
    session.validate(fixed_today()).unwrap();

    let first = &session.records()[0].record;
    assert_eq!(first.row_number, 2);
    assert_eq!(first.text("employee_name").as_deref(), Some("Smith, Jane"));
    assert_eq!(first.text("sin").as_deref(), Some("130692544"));
    assert_eq!(first.text("hire_date").as_deref(), Some("2020-01-15"));
    assert_eq!(first.text("province").as_deref(), Some("ON"));
    assert_eq!(first.number("hourly_rate"), Some(25.0));

    let second = &session.records()[1].record;
    assert_eq!(second.text("employee_name").as_deref(), Some("Doe, John"));
    assert_eq!(second.text("province").as_deref(), Some("QC"));

    // 日在前: 02/03/1992 → 3 月 2 日
    let third = &session.records()[2].record;
    assert_eq!(third.text("birth_date").as_deref(), Some("1992-03-02"));
}

#[tokio::test]
async fn test_employee_import_skips_existing() {
    logging::init_test();

    let store = MemoryStore::new();
    store.seed(catalog::EMPLOYEE, "E002");
    store.seed(catalog::EMPLOYEE, "E004");

    let file = write_csv(&employee_csv_12_rows());
    let mut session = employee_session();
    session.load_file(file.path()).unwrap();
    session.auto_map().unwrap();
    session.validate(fixed_today()).unwrap();

    assert_eq!(session.preview_existing(&store).await.unwrap(), 2);
    assert_eq!(session.existing_count(), Some(2));

    let mut progress = Vec::new();
    let outcome = session
        .import(
            &store,
            ImportOptions::default(),
            |p| progress.push(p.percent),
            None,
        )
        .await
        .unwrap()
        .clone();

    assert_eq!(outcome.imported, 8);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.errored, 0);
    assert!(!outcome.cancelled);
    assert_eq!(outcome.rows.len(), 10);
    assert_eq!(progress, vec![100]);

    let skipped: Vec<&str> = outcome
        .rows
        .iter()
        .filter(|r| r.status == RowStatus::Skipped)
        .map(|r| r.business_key.as_str())
        .collect();
    assert_eq!(skipped, vec!["E002", "E004"]);
    assert!(outcome
        .rows
        .iter()
        .filter(|r| r.status == RowStatus::Skipped)
        .all(|r| r.reason.as_deref() == Some("already exists")));

    // 错误行与重复行不落库
    assert!(outcome.rows.iter().all(|r| r.row != 8 && r.row != 10));
    assert_eq!(store.record_count(catalog::EMPLOYEE), 10);

    let stored = store.get(catalog::EMPLOYEE, "E001").unwrap();
    assert_eq!(stored.row_number, 2);
    assert_eq!(
        stored.payload.get("province").and_then(|v| v.as_text()).as_deref(),
        Some("ON")
    );

    assert_eq!(session.stage(), PipelineStage::Complete);
    let batches = store.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].imported, 8);
    assert_eq!(batches[0].skipped, 2);
    assert_eq!(batches[0].error_rows, 1);
    assert_eq!(batches[0].duplicate_rows, 1);
    assert_eq!(batches[0].duplicate_handling, DuplicateHandling::Skip);
    assert_eq!(session.batch_record().unwrap().batch_id, batches[0].batch_id);
}

#[tokio::test]
async fn test_employee_import_include_duplicates_with_update() {
    logging::init_test();

    let store = MemoryStore::new();
    store.seed(catalog::EMPLOYEE, "E002");

    let file = write_csv(&employee_csv_12_rows());
    let mut session = employee_session();
    session.load_file(file.path()).unwrap();
    session.auto_map().unwrap();
    session.validate(fixed_today()).unwrap();

    let options = ImportOptions {
        duplicate_handling: DuplicateHandling::Update,
        include_duplicates: true,
    };
    let outcome = session.import(&store, options, |_| {}, None).await.unwrap();

    // 11 行: 10 有效 + 1 文件内重复；Update 下已存在也计 Imported
    assert_eq!(outcome.imported, 11);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(store.get(catalog::EMPLOYEE, "E003").unwrap().row_number, 10);
}

#[tokio::test]
async fn test_reports_after_import() {
    logging::init_test();

    let store = MemoryStore::new();
    store.seed(catalog::EMPLOYEE, "E004");

    let file = write_csv(&employee_csv_12_rows());
    let mut session = employee_session();
    session.load_file(file.path()).unwrap();
    session.auto_map().unwrap();
    session.validate(fixed_today()).unwrap();

    // 导入前无结果报告
    assert!(session.outcome_csv().is_err());

    let error_log = session.error_log_csv().unwrap();
    let lines: Vec<&str> = error_log.lines().collect();
    assert_eq!(lines[0], "Row,Field,Message");
    assert_eq!(lines.len(), 5);
    assert!(lines[3].starts_with("8,hire_date,"));

    session
        .import(&store, ImportOptions::default(), |_| {}, None)
        .await
        .unwrap();

    let report = session.outcome_csv().unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "Row,employee_number,Status,Reason");
    assert_eq!(lines[1], "2,E001,imported,");
    assert!(lines.contains(&"5,E004,skipped,already exists"));

    let snapshot = session.snapshot();
    assert_eq!(snapshot.stage, PipelineStage::Complete);
    assert_eq!(snapshot.outcome.unwrap().imported, 9);
}

// ==========================================
// 阶段流转
// ==========================================

#[tokio::test]
async fn test_missing_required_mapping_blocks_validation() {
    logging::init_test();

    let csv = "Employee ID,Full Name,Province\nE001,Jane Smith,ON\n";
    let mut session = employee_session();
    session.load_bytes("employees.csv", csv.as_bytes()).unwrap();

    let mapper = session.auto_map().unwrap();
    assert!(!mapper.can_proceed());
    assert_eq!(mapper.missing_required_fields(), vec!["hire_date"]);

    let err = session.validate(fixed_today()).unwrap_err();
    assert!(err.is_mapping_error());
    assert_eq!(session.stage(), PipelineStage::Mapped);

    // 取消映射后再补回
    session.set_mapping("employee_name", None).unwrap();
    assert!(session.validate(fixed_today()).is_err());
    session
        .set_mapping("employee_name", Some("Full Name"))
        .unwrap();
    assert!(matches!(
        session.set_mapping("employee_name", Some("Nope")),
        Err(ImportError::UnknownHeader(_))
    ));
}

#[tokio::test]
async fn test_back_and_reset() {
    logging::init_test();

    let file = write_csv(&employee_csv_12_rows());
    let mut session = employee_session();

    assert!(session.back().is_err());

    session.load_file(file.path()).unwrap();
    session.auto_map().unwrap();
    session.validate(fixed_today()).unwrap();
    assert!(session.summary().is_some());

    assert_eq!(session.back().unwrap(), PipelineStage::Mapped);
    assert!(session.records().is_empty());
    assert!(session.summary().is_none());

    // 改映射后重新校验
    session.set_mapping("email", None).unwrap();
    let summary = session.validate(fixed_today()).unwrap();
    assert_eq!(summary.warning_rows, 2);

    assert_eq!(session.back().unwrap(), PipelineStage::Mapped);
    assert_eq!(session.back().unwrap(), PipelineStage::Idle);
    assert!(session.parsed().is_none());

    session.load_file(file.path()).unwrap();
    session.reset().unwrap();
    assert_eq!(session.stage(), PipelineStage::Idle);
}

#[tokio::test]
async fn test_import_requires_validated_stage() {
    logging::init_test();

    let store = MemoryStore::new();
    let mut session = employee_session();
    let err = session
        .import(&store, ImportOptions::default(), |_| {}, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::InvalidTransition { .. }));
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test]
async fn test_unknown_entity_is_rejected() {
    assert!(ImportSession::for_entity("payslip", ImportConfig::default()).is_err());
}

// ==========================================
// 员工标识: 工会参照表
// ==========================================

#[tokio::test]
async fn test_identifier_union_lookup() {
    logging::init_test();

    let store = MemoryStore::new();
    store.add_lookup(catalog::UNION_LOOKUP, "UNIFOR-444", &["Unifor Local 444"]);
    store.add_lookup(catalog::UNION_LOOKUP, "CUPE-79", &["CUPE Local 79"]);

    let csv = [
        "Employee ID,ID Type,Identifier,Source,Union",
        "E001,Badge,b-1001,Kronos,Unifor Local 444",
        "E002,union member,U-22,,cupe-79",
        "E003,badge,B-1003,Kronos,Teamsters",
        "E004,badge,B-1001,KRONOS,",
    ]
    .join("\n");

    let mut session =
        ImportSession::for_entity(catalog::EMPLOYEE_IDENTIFIER, ImportConfig::default()).unwrap();
    assert_eq!(session.load_lookups(&store).await.unwrap(), 1);
    session.load_bytes("ids.csv", csv.as_bytes()).unwrap();
    session.auto_map().unwrap();
    let summary = session.validate(fixed_today()).unwrap();

    assert_eq!(summary.total_rows, 4);
    assert_eq!(summary.error_rows, 1);
    assert_eq!(summary.duplicate_rows, 1);
    assert_eq!(summary.valid_rows, 2);

    let records = session.records();
    assert_eq!(records[0].record.text("union").as_deref(), Some("UNIFOR-444"));
    assert_eq!(
        records[0].record.text("identifier_type").as_deref(),
        Some("badge")
    );
    assert_eq!(records[0].business_key, "B-1001|KRONOS");
    assert_eq!(records[1].record.text("union").as_deref(), Some("CUPE-79"));
    assert_eq!(
        records[1].record.text("identifier_type").as_deref(),
        Some("union_member")
    );
    assert_eq!(records[1].business_key, "U-22|");

    let union_issue = session.issues().iter().find(|i| i.row == 4).unwrap();
    assert_eq!(union_issue.field, "union");
    assert_eq!(union_issue.severity, Severity::Error);

    assert!(records[3].is_duplicate);
    assert_eq!(records[3].duplicate_of, Some(2));
}

#[tokio::test]
async fn test_identifier_with_separator_in_value_is_not_duplicate() {
    logging::init_test();

    let csv = [
        "Employee ID,ID Type,Identifier,Source",
        "E001,badge,A|B,X",
        "E002,badge,A,B|X",
    ]
    .join("\n");

    let mut session =
        ImportSession::for_entity(catalog::EMPLOYEE_IDENTIFIER, ImportConfig::default()).unwrap();
    session.load_bytes("ids.csv", csv.as_bytes()).unwrap();
    session.auto_map().unwrap();
    let summary = session.validate(fixed_today()).unwrap();

    assert_eq!(summary.duplicate_rows, 0);
    assert_eq!(summary.valid_rows, 2);

    let records = session.records();
    assert_ne!(records[0].business_key, records[1].business_key);

    let store = MemoryStore::new();
    let outcome = session
        .import(&store, ImportOptions::default(), |_| {}, None)
        .await
        .unwrap();
    assert_eq!(outcome.imported, 2);
    assert_eq!(store.record_count(catalog::EMPLOYEE_IDENTIFIER), 2);

    let report = session.outcome_csv().unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[1], "2,A|B,X,imported,");
    assert_eq!(lines[2], "3,A,B|X,imported,");
}

// ==========================================
// 打卡记录: 不同写法的同一时刻视为重复
// ==========================================

#[tokio::test]
async fn test_time_punch_duplicates_across_formats() {
    logging::init_test();

    let csv = [
        "Clock ID,Badge,Punch Time,In/Out",
        "clk-1,B100,2024-01-31 08:00,IN",
        "CLK-1,b100,31/01/2024 8:00 AM,in",
        "CLK-1,B100,2024-01-31 17:00,Out",
        "CLK-1,B100,2024-01-31 17:00,sideways",
    ]
    .join("\n");

    let mut session =
        ImportSession::for_entity(catalog::TIME_PUNCH, ImportConfig::default()).unwrap();
    session.load_bytes("punches.csv", csv.as_bytes()).unwrap();
    session.auto_map().unwrap();
    let summary = session.validate(fixed_today()).unwrap();

    assert_eq!(summary.total_rows, 4);
    assert_eq!(summary.duplicate_rows, 1);
    assert_eq!(summary.error_rows, 1);
    assert_eq!(summary.valid_rows, 2);

    let records = session.records();
    assert_eq!(records[0].business_key, "CLK-1|B100|2024-01-31 08:00:00|in");
    assert!(records[1].is_duplicate);
    assert_eq!(records[1].duplicate_of, Some(2));

    let store = MemoryStore::new();
    let token = CancelToken::new();
    let outcome = session
        .import(&store, ImportOptions::default(), |_| {}, Some(token))
        .await
        .unwrap();
    assert_eq!(outcome.imported, 2);
    assert_eq!(store.record_count(catalog::TIME_PUNCH), 2);
}

// ==========================================
// 解析失败
// ==========================================

#[tokio::test]
async fn test_header_only_file_is_rejected() {
    logging::init_test();

    let mut session = employee_session();
    let err = session
        .load_bytes("empty.csv", b"Employee ID,Full Name\n")
        .unwrap_err();
    assert!(err.is_parse_error());
    assert_eq!(session.stage(), PipelineStage::Idle);
}

#[tokio::test]
async fn test_unsupported_extension_is_rejected() {
    logging::init_test();

    let mut session = employee_session();
    assert!(session.load_bytes("employees.txt", b"a,b\n1,2\n").is_err());
    assert_eq!(session.stage(), PipelineStage::Idle);
}
