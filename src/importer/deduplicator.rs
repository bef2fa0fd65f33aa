// ==========================================
// 薪酬批量导入管道 - 文件内去重
// ==========================================
// 阶段 4: 按业务主键标记文件内重复行
// 口径: 首次出现的行永不标记；业务主键全空的行不参与去重
// 边界: 仅文件内，库内已存在由 BatchImporter 按冲突策略处理
// 编码: 各字段内的 \ 与 | 先转义再以 | 连接，不同字段组合不会拼出同一主键
// ==========================================

use crate::domain::record::{NormalizedRecord, StagedRecord};
use crate::domain::schema::ImportSchema;
use crate::importer::validator::ValidationReport;
use std::collections::HashMap;
use tracing::debug;

/// 业务主键分隔符
pub const KEY_SEPARATOR: char = '|';

const KEY_ESCAPE: char = '\\';

/// 转义单个主键字段（\ → \\，| → \|）
pub fn escape_key_part(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        if c == KEY_ESCAPE || c == KEY_SEPARATOR {
            escaped.push(KEY_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// 拼接业务主键
pub fn join_business_key<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| escape_key_part(p.as_ref()))
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR.to_string().as_str())
}

/// 拆分业务主键（join_business_key 的逆操作）
pub fn split_business_key(key: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = key.chars();
    while let Some(c) = chars.next() {
        match c {
            KEY_ESCAPE => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            KEY_SEPARATOR => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

pub struct Deduplicator<'a> {
    key_fields: &'a [String],
}

impl<'a> Deduplicator<'a> {
    pub fn new(schema: &'a ImportSchema) -> Self {
        Self {
            key_fields: &schema.business_key,
        }
    }

    /// 业务主键（各字段规范值转义后以 | 连接）
    ///
    /// 全部为空时返回 None
    pub fn business_key(&self, record: &NormalizedRecord) -> Option<String> {
        let parts: Vec<String> = self
            .key_fields
            .iter()
            .map(|f| record.text(f).unwrap_or_default())
            .collect();
        if parts.iter().all(|p| p.is_empty()) {
            None
        } else {
            Some(join_business_key(&parts))
        }
    }

    /// 合并校验结果并标记重复
    pub fn stage(
        &self,
        records: Vec<NormalizedRecord>,
        report: &ValidationReport,
    ) -> Vec<StagedRecord> {
        let mut first_seen: HashMap<String, usize> = HashMap::new();

        records
            .into_iter()
            .map(|record| {
                let row = record.row_number;
                let key = self.business_key(&record);

                let duplicate_of = key.as_ref().and_then(|k| {
                    let folded = k.to_lowercase();
                    match first_seen.get(&folded) {
                        Some(first) => Some(*first),
                        None => {
                            first_seen.insert(folded, row);
                            None
                        }
                    }
                });

                if let Some(first) = duplicate_of {
                    debug!(row, first, "文件内业务主键重复");
                }

                StagedRecord {
                    business_key: key.unwrap_or_default(),
                    has_error: report.row_has_error(row),
                    warning_count: report.row_warning_count(row),
                    is_duplicate: duplicate_of.is_some(),
                    duplicate_of,
                    record,
                }
            })
            .collect()
    }
}
