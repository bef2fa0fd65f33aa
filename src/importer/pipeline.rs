// ==========================================
// 薪酬批量导入管道 - 导入会话（状态机）
// ==========================================
// 阶段: Idle → Parsed → Mapped → Validated → Importing → Complete
// 回退: Mapped → Idle（丢弃文件）/ Validated → Mapped（丢弃校验结果）
// 约束: 会话是显式值，各阶段产物只存在于会话内，无全局状态
// 红线: 仅解析/映射问题返回 Err；校验及之后的问题按行记录
// ==========================================

use crate::config::ImportConfig;
use crate::domain::catalog;
use crate::domain::record::{
    ImportBatch, ImportBatchRecord, ImportOptions, ImportOutcome, ImportProgress, ImportRecord,
    ImportSummary, ParsedFile, SessionSnapshot, StagedRecord, ValidationIssue,
};
use crate::domain::schema::ImportSchema;
use crate::domain::types::{PipelineStage, Severity};
use crate::importer::batch_importer::{BatchImporter, CancelToken};
use crate::importer::column_mapper::ColumnMapper;
use crate::importer::deduplicator::Deduplicator;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{ParseOptions, UniversalFileParser};
use crate::importer::normalizer::{AliasTable, Normalizer};
use crate::importer::report;
use crate::importer::validator::{ValidationReport, Validator};
use crate::repository::ImportStore;
use chrono::{NaiveDate, Utc};
use futures::future::try_join_all;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// ImportSession
// ==========================================
pub struct ImportSession {
    schema: ImportSchema,
    config: ImportConfig,
    normalizer: Normalizer,

    stage: PipelineStage,
    parsed: Option<ParsedFile>,
    mapper: Option<ColumnMapper>,
    records: Vec<StagedRecord>,
    report: Option<ValidationReport>,
    existing_count: Option<usize>,
    outcome: Option<ImportOutcome>,
    batch_record: Option<ImportBatchRecord>,
}

impl ImportSession {
    /// 创建会话
    ///
    /// # 错误
    /// - SchemaError: Schema 自检失败
    pub fn new(schema: ImportSchema, config: ImportConfig) -> ImportResult<Self> {
        schema.check().map_err(ImportError::SchemaError)?;
        let normalizer = Normalizer::new(config.date_order);
        Ok(Self {
            schema,
            config,
            normalizer,
            stage: PipelineStage::Idle,
            parsed: None,
            mapper: None,
            records: Vec::new(),
            report: None,
            existing_count: None,
            outcome: None,
            batch_record: None,
        })
    }

    /// 按内置实体名创建会话
    pub fn for_entity(entity: &str, config: ImportConfig) -> ImportResult<Self> {
        let schema = catalog::builtin_schema(entity, &config)
            .ok_or_else(|| ImportError::SchemaError(format!("未知导入实体: {}", entity)))?;
        Self::new(schema, config)
    }

    // ===== 只读访问 =====

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn schema(&self) -> &ImportSchema {
        &self.schema
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn parsed(&self) -> Option<&ParsedFile> {
        self.parsed.as_ref()
    }

    pub fn mapper(&self) -> Option<&ColumnMapper> {
        self.mapper.as_ref()
    }

    pub fn records(&self) -> &[StagedRecord] {
        &self.records
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        self.report.as_ref().map(|r| r.issues.as_slice()).unwrap_or(&[])
    }

    pub fn outcome(&self) -> Option<&ImportOutcome> {
        self.outcome.as_ref()
    }

    pub fn batch_record(&self) -> Option<&ImportBatchRecord> {
        self.batch_record.as_ref()
    }

    /// 预检查得到的库内已存在行数（未执行 preview_existing 时为 None）
    pub fn existing_count(&self) -> Option<usize> {
        self.existing_count
    }

    // ===== 参照表 =====

    /// 注册参照表（对下一次 validate 生效）
    pub fn register_lookup(&mut self, name: &str, table: AliasTable) {
        self.normalizer.set_lookup(name, table);
    }

    /// 从存储加载 Schema 引用的全部参照表
    ///
    /// # 返回
    /// - Ok(n): 加载的参照表数量
    pub async fn load_lookups<S>(&mut self, store: &S) -> ImportResult<usize>
    where
        S: ImportStore + ?Sized,
    {
        let tables: Vec<String> = self
            .schema
            .lookup_tables()
            .into_iter()
            .map(|t| t.to_string())
            .collect();
        let loaded = try_join_all(tables.iter().map(|t| store.load_lookup(t))).await?;

        for (table, entries) in tables.iter().zip(loaded) {
            info!(table = %table, entries = entries.len(), "参照表已加载");
            self.normalizer
                .set_lookup(table, AliasTable::from_entries(&entries));
        }
        Ok(tables.len())
    }

    // ===== Idle → Parsed =====

    /// 从磁盘读取文件
    #[instrument(skip(self, path), fields(entity = %self.schema.entity))]
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> ImportResult<&ParsedFile> {
        self.require(PipelineStage::Idle, PipelineStage::Parsed)?;
        let parsed = self.parser().parse_path(path).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        Ok(self.accept_parsed(parsed))
    }

    /// 解析内存中的文件
    #[instrument(skip(self, bytes), fields(entity = %self.schema.entity))]
    pub fn load_bytes(&mut self, file_name: &str, bytes: &[u8]) -> ImportResult<&ParsedFile> {
        self.require(PipelineStage::Idle, PipelineStage::Parsed)?;
        let parsed = self.parser().parse_bytes(file_name, bytes).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        Ok(self.accept_parsed(parsed))
    }

    fn parser(&self) -> UniversalFileParser {
        UniversalFileParser::new(ParseOptions::from(&self.config))
    }

    fn accept_parsed(&mut self, parsed: ParsedFile) -> &ParsedFile {
        info!(
            file = %parsed.file_name,
            rows = parsed.total_rows,
            dropped = parsed.dropped_rows.len(),
            headers = parsed.headers.len(),
            "文件解析完成"
        );
        self.stage = PipelineStage::Parsed;
        self.parsed.insert(parsed)
    }

    // ===== Parsed → Mapped =====

    /// 自动识别列映射并进入映射阶段
    pub fn auto_map(&mut self) -> ImportResult<&ColumnMapper> {
        self.require(PipelineStage::Parsed, PipelineStage::Mapped)?;
        let headers = self
            .parsed
            .as_ref()
            .map(|p| p.headers.clone())
            .ok_or_else(|| ImportError::InternalError("Parsed 阶段缺少文件".to_string()))?;

        let mapper = ColumnMapper::auto_detect(&self.schema, &headers);
        let missing = mapper.missing_required_fields();
        if !missing.is_empty() {
            warn!(missing = ?missing, "自动识别后仍有必填字段未映射");
        }
        self.stage = PipelineStage::Mapped;
        Ok(self.mapper.insert(mapper))
    }

    /// 手工调整映射（仅映射阶段）
    pub fn set_mapping(&mut self, field: &str, header: Option<&str>) -> ImportResult<()> {
        self.require(PipelineStage::Mapped, PipelineStage::Mapped)?;
        self.mapper
            .as_mut()
            .ok_or_else(|| ImportError::InternalError("Mapped 阶段缺少映射".to_string()))?
            .set_mapping(field, header)
    }

    // ===== Mapped → Validated =====

    /// 标准化 + 校验 + 去重
    ///
    /// # 错误
    /// - MappingIncomplete: 必填字段未映射或同一列被多个字段使用
    #[instrument(skip(self), fields(entity = %self.schema.entity))]
    pub fn validate(&mut self, today: NaiveDate) -> ImportResult<ImportSummary> {
        self.require(PipelineStage::Mapped, PipelineStage::Validated)?;
        let (parsed, mapper) = match (self.parsed.as_ref(), self.mapper.as_ref()) {
            (Some(p), Some(m)) => (p, m),
            _ => {
                return Err(ImportError::InternalError(
                    "Mapped 阶段缺少文件或映射".to_string(),
                ))
            }
        };
        mapper.check()?;

        let normalized: Vec<_> = parsed
            .rows
            .iter()
            .map(|raw| self.normalizer.normalize_record(&self.schema, mapper, raw))
            .collect();

        let validator = Validator::new(&self.schema, today)?;
        let report = validator.validate(&normalized);
        let records = Deduplicator::new(&self.schema).stage(normalized, &report);

        self.records = records;
        self.report = Some(report);
        self.existing_count = None;
        self.stage = PipelineStage::Validated;

        let summary = self.build_summary();
        info!(
            total = summary.total_rows,
            valid = summary.valid_rows,
            errors = summary.error_rows,
            warnings = summary.warning_rows,
            duplicates = summary.duplicate_rows,
            "校验完成"
        );
        Ok(summary)
    }

    // ===== 回退 =====

    /// Mapped/Parsed → Idle，Validated → Mapped
    pub fn back(&mut self) -> ImportResult<PipelineStage> {
        match self.stage {
            PipelineStage::Parsed | PipelineStage::Mapped => {
                self.parsed = None;
                self.mapper = None;
                self.stage = PipelineStage::Idle;
            }
            PipelineStage::Validated => {
                self.clear_validation();
                self.stage = PipelineStage::Mapped;
            }
            from => {
                return Err(ImportError::InvalidTransition {
                    from,
                    to: PipelineStage::Idle,
                })
            }
        }
        Ok(self.stage)
    }

    /// 导入完成后开始新的会话
    pub fn reset(&mut self) -> ImportResult<()> {
        if self.stage == PipelineStage::Importing {
            return Err(ImportError::InvalidTransition {
                from: self.stage,
                to: PipelineStage::Idle,
            });
        }
        self.parsed = None;
        self.mapper = None;
        self.clear_validation();
        self.outcome = None;
        self.batch_record = None;
        self.stage = PipelineStage::Idle;
        Ok(())
    }

    fn clear_validation(&mut self) {
        self.records.clear();
        self.report = None;
        self.existing_count = None;
    }

    // ===== 汇总 =====

    /// 校验汇总（Validated 之后可用）
    pub fn summary(&self) -> Option<ImportSummary> {
        self.report.as_ref().map(|_| self.build_summary())
    }

    /// 将被导入的行数（无错误且非重复）
    pub fn importable_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_importable(false)).count()
    }

    fn build_summary(&self) -> ImportSummary {
        let report = self.report.as_ref();
        ImportSummary {
            total_rows: self.records.len(),
            valid_rows: self.importable_count(),
            error_rows: self.records.iter().filter(|r| r.has_error).count(),
            warning_rows: report.map(|r| r.rows_with(Severity::Warning)).unwrap_or(0),
            duplicate_rows: self.records.iter().filter(|r| r.is_duplicate).count(),
            dropped_rows: self
                .parsed
                .as_ref()
                .map(|p| p.dropped_rows.len())
                .unwrap_or(0),
        }
    }

    /// 库内预检查: 可导入行中业务主键已存在的数量
    pub async fn preview_existing<S>(&mut self, store: &S) -> ImportResult<usize>
    where
        S: ImportStore + ?Sized,
    {
        self.require(PipelineStage::Validated, PipelineStage::Validated)?;
        let keys: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.is_importable(false))
            .map(|r| r.business_key.clone())
            .collect();
        let existing = store.existing_keys(&self.schema.entity, &keys).await?;
        self.existing_count = Some(existing.len());
        Ok(existing.len())
    }

    // ===== Validated → Importing → Complete =====

    /// 执行导入
    ///
    /// # 参数
    /// - store: 持久化协作方
    /// - options: 冲突策略 / 是否包含文件内重复行
    /// - on_progress: 每批回调
    /// - cancel: 可选取消标记
    #[instrument(skip_all, fields(entity = %self.schema.entity))]
    pub async fn import<S, F>(
        &mut self,
        store: &S,
        options: ImportOptions,
        on_progress: F,
        cancel: Option<CancelToken>,
    ) -> ImportResult<&ImportOutcome>
    where
        S: ImportStore + ?Sized,
        F: FnMut(ImportProgress),
    {
        self.require(PipelineStage::Validated, PipelineStage::Importing)?;

        let batch = ImportBatch {
            batch_id: Uuid::new_v4().to_string(),
            entity: self.schema.entity.clone(),
            records: self
                .records
                .iter()
                .filter(|r| r.is_importable(options.include_duplicates))
                .map(|r| ImportRecord {
                    row_number: r.row_number(),
                    business_key: r.business_key.clone(),
                    payload: r.record.payload(),
                })
                .collect(),
            options,
        };
        info!(batch_id = %batch.batch_id, rows = batch.records.len(), "开始导入");

        self.stage = PipelineStage::Importing;
        let started_at = Utc::now();
        let timer = Instant::now();

        let mut importer = BatchImporter::new(self.config.import_batch_size);
        if let Some(token) = cancel {
            importer = importer.with_cancel_token(token);
        }
        let outcome = importer.run(store, &batch, on_progress).await;

        let summary = self.build_summary();
        let batch_record = ImportBatchRecord {
            batch_id: batch.batch_id.clone(),
            entity: batch.entity.clone(),
            file_name: self.parsed.as_ref().map(|p| p.file_name.clone()),
            duplicate_handling: options.duplicate_handling,
            total_rows: summary.total_rows,
            imported: outcome.imported,
            skipped: outcome.skipped,
            errored: outcome.errored,
            error_rows: summary.error_rows,
            duplicate_rows: summary.duplicate_rows,
            cancelled: outcome.cancelled,
            started_at,
            finished_at: Utc::now(),
            elapsed_ms: timer.elapsed().as_millis() as i64,
        };

        // 批次留痕失败不影响已落库的行
        if let Err(e) = store.record_batch(&batch_record).await {
            error!(batch_id = %batch_record.batch_id, error = %e, "导入批次记录写入失败");
        }

        info!(
            batch_id = %batch_record.batch_id,
            imported = outcome.imported,
            skipped = outcome.skipped,
            errored = outcome.errored,
            elapsed_ms = batch_record.elapsed_ms,
            "导入完成"
        );

        self.batch_record = Some(batch_record);
        self.stage = PipelineStage::Complete;
        Ok(self.outcome.insert(outcome))
    }

    // ===== 报告 =====

    /// 错误日志 CSV（Row,Field,Message）
    pub fn error_log_csv(&self) -> ImportResult<String> {
        report::issues_to_csv(self.issues())
    }

    /// 导入结果 CSV（Complete 之后可用）
    pub fn outcome_csv(&self) -> ImportResult<String> {
        let outcome = self.outcome.as_ref().ok_or(ImportError::InvalidTransition {
            from: self.stage,
            to: PipelineStage::Complete,
        })?;
        report::outcome_to_csv(outcome, &self.schema.business_key)
    }

    /// 对外可见状态快照
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stage: self.stage,
            file_name: self.parsed.as_ref().map(|p| p.file_name.clone()),
            summary: self.summary(),
            outcome: self.outcome.clone(),
        }
    }

    fn require(&self, expected: PipelineStage, to: PipelineStage) -> ImportResult<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(ImportError::InvalidTransition {
                from: self.stage,
                to,
            })
        }
    }
}
