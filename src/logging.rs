// ==========================================
// 薪酬批量导入管道 - 日志初始化
// ==========================================
// 工具: tracing + tracing-subscriber
// 级别: RUST_LOG 优先，否则本 crate info、依赖 warn
// 格式: 终端文本 / JSON 行（供日志采集）
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 未设置 RUST_LOG 时的默认过滤器
pub const DEFAULT_FILTER: &str = "payroll_import=info,warn";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// 按格式初始化全局日志
///
/// # 示例
/// ```no_run
/// use payroll_import::logging::{self, LogFormat};
/// logging::init_with(LogFormat::Json);
/// ```
pub fn init_with(format: LogFormat) {
    let filter = env_filter(DEFAULT_FILTER);
    match format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true)
            .init(),
        // 导入批次的 span 字段（batch_id / entity）随每行输出
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(false)
            .init(),
    }
}

/// 文本格式
pub fn init() {
    init_with(LogFormat::Text);
}

/// 测试用: debug 级别，输出交给测试框架捕获，可重复调用
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(env_filter("payroll_import=debug"))
        .with_test_writer()
        .try_init();
}
