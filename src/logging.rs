// ==========================================
// 供应链计划引擎 - 日志系统初始化
// ==========================================
// 职责: 按计划引擎模块给出默认过滤规则；文本/JSON 两种输出
// RUST_LOG 存在时完全以其为准
// ==========================================

use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter};

/// 计划引擎各模块的默认级别
///
/// 过滤逐选项输出 debug，求解器在位解更新同样是 debug，
/// perf 目标单独保留 info 以便看到 plan_item 耗时
const ENGINE_DIRECTIVES: &[(&str, &str)] = &[
    ("scpe_planner::engine::filter", "info"),
    ("scpe_planner::engine::scoring", "info"),
    ("scpe_planner::engine::decision", "info"),
    ("scpe_planner::engine::algorithms", "info"),
    ("scpe_planner::engine::optimization", "info"),
    ("scpe_planner::engine::orchestrator", "info"),
    ("perf", "info"),
];

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// JSON 行，附带当前 span（requisition_id / item_id）
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("未知日志格式: {}", other)),
        }
    }
}

/// 默认过滤串
///
/// # 参数
/// - verbose: true 时引擎模块提升为 debug（逐选项过滤/评分明细）
pub fn default_directives(verbose: bool) -> String {
    let mut directives = vec!["warn".to_string()];
    for (target, level) in ENGINE_DIRECTIVES {
        let level = if verbose && target.starts_with("scpe_planner::engine") {
            "debug"
        } else {
            level
        };
        directives.push(format!("{}={}", target, level));
    }
    directives.push("scpe_planner=info".to_string());
    directives.push("scpe_plan=info".to_string());
    directives.join(",")
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 覆盖默认过滤串
///   例如: RUST_LOG=scpe_planner::engine::optimization=trace
///
/// # 示例
/// ```no_run
/// use scpe_planner::logging::{self, LogFormat};
/// logging::init_with(LogFormat::Json, false);
/// ```
pub fn init_with(format: LogFormat, verbose: bool) {
    let filter = env_filter(verbose);
    let _ = match format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .try_init(),
    };
}

/// 初始化测试环境的日志系统
///
/// 引擎模块为 debug；重复调用安全
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new(default_directives(true)))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_engine_modules() {
        let quiet = default_directives(false);
        assert!(quiet.starts_with("warn,"));
        assert!(quiet.contains("scpe_planner::engine::filter=info"));
        assert!(quiet.contains("perf=info"));

        let verbose = default_directives(true);
        assert!(verbose.contains("scpe_planner::engine::optimization=debug"));
        assert!(verbose.contains("scpe_planner::engine::decision=debug"));
        // perf 不随 verbose 变化
        assert!(verbose.contains("perf=info"));
        assert!(EnvFilter::try_new(&verbose).is_ok());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
