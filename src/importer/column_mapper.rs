// ==========================================
// 薪酬批量导入管道 - 列映射器
// ==========================================
// 阶段 1: 文件表头 → 标准字段
// 自动识别: 小写 + 去除非字母数字后比较（字段名 / 展示名 / 别名）
// 手工调整: set_mapping 覆盖自动结果
// ==========================================

use crate::domain::schema::ImportSchema;
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// 表头比较键: 小写并去掉所有非字母数字字符
///
/// "Emp. ID" / "emp_id" / "EMP ID" → "empid"
pub fn fold_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

// ==========================================
// FieldMapping - 单个标准字段的映射
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field: String,
    pub header: Option<String>,
    pub required: bool,
    pub auto_detected: bool,
}

// ==========================================
// ColumnMapper
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapper {
    headers: Vec<String>,
    mappings: Vec<FieldMapping>, // Schema 字段顺序
}

impl ColumnMapper {
    /// 空映射（所有字段未映射）
    pub fn new(schema: &ImportSchema, headers: &[String]) -> Self {
        Self {
            headers: headers.to_vec(),
            mappings: schema
                .fields
                .iter()
                .map(|f| FieldMapping {
                    field: f.name.clone(),
                    header: None,
                    required: f.required,
                    auto_detected: false,
                })
                .collect(),
        }
    }

    /// 自动识别
    ///
    /// 规则:
    /// - 按 Schema 字段顺序依次匹配
    /// - 每个字段取表头顺序中第一个命中的列
    /// - 已被前面字段占用的列不再自动分配
    pub fn auto_detect(schema: &ImportSchema, headers: &[String]) -> Self {
        let mut mapper = Self::new(schema, headers);
        let header_keys: Vec<String> = headers.iter().map(|h| fold_key(h)).collect();
        let mut claimed: HashSet<usize> = HashSet::new();

        for (field, mapping) in schema.fields.iter().zip(mapper.mappings.iter_mut()) {
            let candidates: HashSet<String> = field
                .match_candidates()
                .map(fold_key)
                .filter(|k| !k.is_empty())
                .collect();

            let hit = header_keys
                .iter()
                .enumerate()
                .find(|(idx, key)| !claimed.contains(idx) && candidates.contains(*key))
                .map(|(idx, _)| idx);

            if let Some(idx) = hit {
                claimed.insert(idx);
                mapping.header = Some(headers[idx].clone());
                mapping.auto_detected = true;
                debug!(field = %field.name, header = %headers[idx], "自动识别列映射");
            }
        }

        mapper
    }

    /// 手工指定（None 表示取消映射）
    pub fn set_mapping(&mut self, field: &str, header: Option<&str>) -> ImportResult<()> {
        if let Some(h) = header {
            if !self.headers.iter().any(|existing| existing == h) {
                return Err(ImportError::UnknownHeader(h.to_string()));
            }
        }

        let mapping = self
            .mappings
            .iter_mut()
            .find(|m| m.field == field)
            .ok_or_else(|| ImportError::UnknownField(field.to_string()))?;

        mapping.header = header.map(|h| h.to_string());
        mapping.auto_detected = false;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    pub fn header_for(&self, field: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.field == field)
            .and_then(|m| m.header.as_deref())
    }

    /// 未映射的必填字段
    pub fn missing_required_fields(&self) -> Vec<String> {
        self.mappings
            .iter()
            .filter(|m| m.required && m.header.is_none())
            .map(|m| m.field.clone())
            .collect()
    }

    /// 被多个字段同时使用的列
    pub fn duplicate_columns(&self) -> Vec<String> {
        let mut usage: BTreeMap<&str, usize> = BTreeMap::new();
        for header in self.mappings.iter().filter_map(|m| m.header.as_deref()) {
            *usage.entry(header).or_default() += 1;
        }
        // 按表头顺序输出
        self.headers
            .iter()
            .filter(|h| usage.get(h.as_str()).is_some_and(|n| *n > 1))
            .cloned()
            .collect()
    }

    pub fn can_proceed(&self) -> bool {
        self.missing_required_fields().is_empty() && self.duplicate_columns().is_empty()
    }

    /// 未被任何字段使用的列（界面提示用）
    pub fn unmapped_headers(&self) -> Vec<&str> {
        let used: HashSet<&str> = self
            .mappings
            .iter()
            .filter_map(|m| m.header.as_deref())
            .collect();
        self.headers
            .iter()
            .map(|h| h.as_str())
            .filter(|h| !used.contains(h))
            .collect()
    }

    /// 进入下一阶段前的检查
    pub fn check(&self) -> ImportResult<()> {
        if self.can_proceed() {
            return Ok(());
        }
        Err(ImportError::MappingIncomplete {
            missing: self.missing_required_fields(),
            duplicates: self.duplicate_columns(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportConfig;
    use crate::domain::catalog::employee_schema;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn test_fold_key() {
        assert_eq!(fold_key("Emp. ID"), "empid");
        assert_eq!(fold_key("emp_id"), "empid");
        assert_eq!(fold_key("  Hire-Date "), "hiredate");
        assert_eq!(fold_key("#"), "");
    }

    #[test]
    fn test_auto_detect_aliases() {
        let schema = employee_schema(&ImportConfig::default());
        let mapper = ColumnMapper::auto_detect(
            &schema,
            &headers(&["Emp ID", "Full Name", "DOB", "Start Date", "Prov", "Notes"]),
        );

        assert_eq!(mapper.header_for("employee_number"), Some("Emp ID"));
        assert_eq!(mapper.header_for("employee_name"), Some("Full Name"));
        assert_eq!(mapper.header_for("birth_date"), Some("DOB"));
        assert_eq!(mapper.header_for("hire_date"), Some("Start Date"));
        assert_eq!(mapper.header_for("province"), Some("Prov"));
        assert_eq!(mapper.header_for("sin"), None);
        assert!(mapper.can_proceed());
        assert_eq!(mapper.unmapped_headers(), vec!["Notes"]);
    }

    #[test]
    fn test_auto_detect_first_header_wins_and_no_reuse() {
        let schema = employee_schema(&ImportConfig::default());
        let mapper = ColumnMapper::auto_detect(
            &schema,
            &headers(&["employee id", "EMPLOYEE_ID", "Name", "Hire Date", "Province"]),
        );
        assert_eq!(mapper.header_for("employee_number"), Some("employee id"));
        assert!(mapper.duplicate_columns().is_empty());
    }

    #[test]
    fn test_missing_required_blocks_progress() {
        let schema = employee_schema(&ImportConfig::default());
        let mapper =
            ColumnMapper::auto_detect(&schema, &headers(&["Emp ID", "Name", "Province"]));

        assert_eq!(mapper.missing_required_fields(), vec!["hire_date"]);
        assert!(!mapper.can_proceed());
        let err = mapper.check().unwrap_err();
        assert!(err.is_mapping_error());
    }

    #[test]
    fn test_manual_override_and_duplicates() {
        let schema = employee_schema(&ImportConfig::default());
        let mut mapper = ColumnMapper::auto_detect(
            &schema,
            &headers(&["Emp ID", "Name", "Hired", "Province", "Joined"]),
        );
        assert_eq!(mapper.header_for("hire_date"), Some("Hired"));

        mapper.set_mapping("hire_date", Some("Joined")).unwrap();
        assert_eq!(mapper.header_for("hire_date"), Some("Joined"));

        mapper.set_mapping("termination_date", Some("Joined")).unwrap();
        assert_eq!(mapper.duplicate_columns(), vec!["Joined"]);
        assert!(!mapper.can_proceed());

        mapper.set_mapping("termination_date", None).unwrap();
        assert!(mapper.can_proceed());
    }

    #[test]
    fn test_set_mapping_unknown_field_or_header() {
        let schema = employee_schema(&ImportConfig::default());
        let mut mapper = ColumnMapper::new(&schema, &headers(&["Emp ID"]));

        assert!(matches!(
            mapper.set_mapping("salary", Some("Emp ID")),
            Err(ImportError::UnknownField(_))
        ));
        assert!(matches!(
            mapper.set_mapping("employee_number", Some("Missing")),
            Err(ImportError::UnknownHeader(_))
        ));
    }
}
