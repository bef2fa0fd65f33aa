// ==========================================
// 薪酬批量导入管道 - 报告导出
// ==========================================
// 错误日志: Row,Field,Message（每条校验问题一行，文件行序）
// 导入结果: Row,<业务主键字段...>,Status,Reason
// 引号转义交给 csv::Writer
// ==========================================

use crate::domain::record::{ImportOutcome, ValidationIssue};
use crate::importer::deduplicator::split_business_key;
use crate::importer::error::{ImportError, ImportResult};
use csv::Writer;

/// 校验问题 → CSV 文本
pub fn issues_to_csv(issues: &[ValidationIssue]) -> ImportResult<String> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(["Row", "Field", "Message"])?;
    for issue in issues {
        writer.write_record([issue.row.to_string(), issue.field.clone(), issue.message.clone()])?;
    }
    finish(writer)
}

/// 导入结果 → CSV 文本
///
/// 业务主键按转义规则拆回各字段列
pub fn outcome_to_csv(outcome: &ImportOutcome, key_fields: &[String]) -> ImportResult<String> {
    let mut writer = Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = vec!["Row"];
    header.extend(key_fields.iter().map(|f| f.as_str()));
    header.extend(["Status", "Reason"]);
    writer.write_record(&header)?;

    for row in &outcome.rows {
        let mut parts = split_business_key(&row.business_key);
        parts.resize(key_fields.len(), String::new());

        let mut record = Vec::with_capacity(key_fields.len() + 3);
        record.push(row.row.to_string());
        record.extend(parts);
        record.push(row.status.to_string());
        record.push(row.reason.clone().unwrap_or_default());
        writer.write_record(&record)?;
    }
    finish(writer)
}

fn finish(writer: Writer<Vec<u8>>) -> ImportResult<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ImportError::ReportError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ImportError::ReportError(e.to_string()))
}
