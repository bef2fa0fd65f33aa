// ==========================================
// 薪酬批量导入管道 - 命令行入口
// ==========================================
// 子命令:
// - import   解析 → 自动映射 → 校验 → 分批导入 SQLite
// - lookup   维护参照表别名（如工会）
// - config   写入 config_kv 覆写项
// - history  查看最近的导入批次
// ==========================================

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use payroll_import::config::{ConfigManager, ImportConfigReader};
use payroll_import::domain::catalog;
use payroll_import::importer::{CancelToken, ImportSession};
use payroll_import::logging::{self, LogFormat};
use payroll_import::{DuplicateHandling, ImportOptions, SqliteImportStore};
use std::path::{Path, PathBuf};
use tokio::signal;
use tracing::{info, warn};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "payroll-import")]
#[command(about = "Bulk CSV/Excel import pipeline for payroll master data")]
#[command(version)]
struct Args {
    /// SQLite 数据库路径
    #[arg(long, global = true, env = "PAYROLL_IMPORT_DB_PATH")]
    db: Option<PathBuf>,

    /// 输出 JSON 格式日志
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 导入文件
    Import {
        /// CSV / Excel 文件
        file: PathBuf,

        /// 导入实体: employee / employee_identifier / pay_code / time_punch
        #[arg(short, long, default_value = catalog::EMPLOYEE)]
        entity: String,

        /// 库内已存在记录的处理方式
        #[arg(short, long, value_enum, default_value_t = Policy::Skip)]
        policy: Policy,

        /// 文件内重复行也导入
        #[arg(long)]
        include_duplicates: bool,

        /// 手工列映射，格式 field=header（header 为空表示取消映射）
        #[arg(short, long = "map", value_name = "FIELD=HEADER")]
        mappings: Vec<String>,

        /// 校验日期（默认今天，格式 YYYY-MM-DD）
        #[arg(long)]
        today: Option<NaiveDate>,

        /// 只校验不落库
        #[arg(long)]
        dry_run: bool,

        /// 错误日志 CSV 输出路径
        #[arg(long)]
        error_log: Option<PathBuf>,

        /// 导入结果 CSV 输出路径
        #[arg(long)]
        outcome_report: Option<PathBuf>,
    },

    /// 登记参照表代码及别名
    Lookup {
        /// 参照表名（如 union）
        table: String,
        /// 代码
        code: String,
        /// 别名
        aliases: Vec<String>,
    },

    /// 写入配置项
    Config { key: String, value: String },

    /// 查看最近的导入批次
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Policy {
    Skip,
    Update,
}

impl From<Policy> for DuplicateHandling {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Skip => DuplicateHandling::Skip,
            Policy::Update => DuplicateHandling::Update,
        }
    }
}

/// 默认数据库路径（用户数据目录下）
fn default_db_path() -> PathBuf {
    match dirs::data_dir() {
        Some(data_dir) => data_dir.join("payroll-import").join("payroll_import.db"),
        None => PathBuf::from("./payroll_import.db"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_with(if args.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    });

    let db_path = args.db.clone().unwrap_or_else(default_db_path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("无法创建数据目录: {}", parent.display()))?;
        }
    }
    let db_path_str = db_path.to_string_lossy().to_string();
    info!(version = payroll_import::VERSION, db = %db_path_str, "{}", payroll_import::APP_NAME);

    let store = SqliteImportStore::new(&db_path_str).context("无法打开数据库")?;
    let config_manager = ConfigManager::from_connection(store.connection())?;

    match args.command {
        Command::Import {
            file,
            entity,
            policy,
            include_duplicates,
            mappings,
            today,
            dry_run,
            error_log,
            outcome_report,
        } => {
            let config = config_manager.load_import_config().await?;
            let mut session = ImportSession::for_entity(&entity, config)?;
            let options = ImportOptions {
                duplicate_handling: policy.into(),
                include_duplicates,
            };
            run_import(
                &mut session,
                &store,
                &file,
                &mappings,
                today.unwrap_or_else(|| Local::now().date_naive()),
                dry_run,
                options,
            )
            .await?;

            if let Some(path) = error_log {
                write_report(&path, &session.error_log_csv()?)?;
            }
            if let Some(path) = outcome_report {
                if session.outcome().is_some() {
                    write_report(&path, &session.outcome_csv()?)?;
                } else {
                    warn!("未执行导入，跳过结果报告");
                }
            }
        }
        Command::Lookup {
            table,
            code,
            aliases,
        } => {
            let aliases: Vec<&str> = aliases.iter().map(|a| a.as_str()).collect();
            let n = store.insert_lookup(&table, &code, &aliases)?;
            println!("{}: {} 已登记 {} 个别名", table, code, n);
        }
        Command::Config { key, value } => {
            config_manager.set_config_value(&key, &value)?;
            // 回读校验，值非法时立即报错
            config_manager.load_import_config().await?;
            println!("{} = {}", key, value);
        }
        Command::History { limit } => {
            for batch in store.recent_batches(limit)? {
                println!(
                    "{}  {:<20} {:<24} imported={} skipped={} errored={}{}",
                    batch.started_at.format("%Y-%m-%d %H:%M:%S"),
                    batch.entity,
                    batch.file_name.as_deref().unwrap_or("-"),
                    batch.imported,
                    batch.skipped,
                    batch.errored,
                    if batch.cancelled { " (cancelled)" } else { "" }
                );
            }
        }
    }

    Ok(())
}

async fn run_import(
    session: &mut ImportSession,
    store: &SqliteImportStore,
    file: &Path,
    mappings: &[String],
    today: NaiveDate,
    dry_run: bool,
    options: ImportOptions,
) -> Result<()> {
    let lookups = session.load_lookups(store).await?;
    if lookups > 0 {
        info!(lookups, "参照表已加载");
    }

    session.load_file(file)?;
    session.auto_map()?;
    for mapping in mappings {
        let Some((field, header)) = mapping.split_once('=') else {
            bail!("映射格式应为 field=header: {}", mapping);
        };
        let header = header.trim();
        session.set_mapping(field.trim(), (!header.is_empty()).then_some(header))?;
    }

    if let Some(mapper) = session.mapper() {
        println!("列映射:");
        for m in mapper.mappings() {
            println!(
                "  {:<20} <- {}{}",
                m.field,
                m.header.as_deref().unwrap_or("(未映射)"),
                if m.required { " *" } else { "" }
            );
        }
        let unmapped = mapper.unmapped_headers();
        if !unmapped.is_empty() {
            println!("  未使用的列: {}", unmapped.join(", "));
        }
    }

    let summary = session.validate(today)?;
    let existing = session.preview_existing(store).await?;
    println!(
        "校验结果: 总计 {} 行，有效 {}，错误 {}，告警 {}，重复 {}，丢弃 {}，库内已存在 {}",
        summary.total_rows,
        summary.valid_rows,
        summary.error_rows,
        summary.warning_rows,
        summary.duplicate_rows,
        summary.dropped_rows,
        existing
    );
    for issue in session.issues().iter().take(20) {
        println!(
            "  第 {} 行 [{}] {}: {}",
            issue.row, issue.severity, issue.field, issue.message
        );
    }
    if session.issues().len() > 20 {
        println!("  ...（共 {} 条，见错误日志）", session.issues().len());
    }

    if dry_run {
        return Ok(());
    }

    let token = CancelToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let outcome = session
        .import(
            store,
            options,
            |p| println!("进度: {:>3}% ({}/{})", p.percent, p.completed_batches, p.total_batches),
            Some(token),
        )
        .await?;
    println!(
        "导入完成: 成功 {}，跳过 {}，失败 {}{}",
        outcome.imported,
        outcome.skipped,
        outcome.errored,
        if outcome.cancelled { "（已取消）" } else { "" }
    );
    Ok(())
}

fn write_report(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("无法写入报告: {}", path.display()))?;
    info!(path = %path.display(), "报告已写出");
    Ok(())
}
