// ==========================================
// 供应链计划引擎 - 命令行入口
// ==========================================
// 用法:
//   scpe-plan <request.json> [--config file] [--strategy s] [--html out] [--features csv] [--gate-audit csv] [--log-format text|json] [-v]
// 输入: PlanningBundle（物料/库存快照/候选选项/请求列表）
// 输出: 计划结果 JSON（stdout），可选 HTML 报告、可行选项特征 CSV、决策门审计 CSV
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use scpe_planner::engine::decision::{write_evaluations_csv, GateEvaluation};
use scpe_planner::engine::scoring::FeatureExtractor;
use scpe_planner::engine::{InMemoryDataSource, PlanningBundle};
use scpe_planner::logging::{self, LogFormat};
use scpe_planner::{ConfigManager, PlanningContext, SolverStrategy, SourcingPlanner};
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct CliArgs {
    input: PathBuf,
    config: Option<PathBuf>,
    strategy: Option<SolverStrategy>,
    html: Option<PathBuf>,
    features: Option<PathBuf>,
    gate_audit: Option<PathBuf>,
    log_format: LogFormat,
    verbose: bool,
}

fn parse_args() -> Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut input = None;
    let mut config = None;
    let mut strategy = None;
    let mut html = None;
    let mut features = None;
    let mut gate_audit = None;
    let mut log_format = LogFormat::default();
    let mut verbose = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(PathBuf::from(args.next().context("--config 缺少文件路径")?));
            }
            "--strategy" => {
                let value = args.next().context("--strategy 缺少取值")?;
                strategy = Some(value.parse::<SolverStrategy>().map_err(|e| anyhow!(e))?);
            }
            "--html" => {
                html = Some(PathBuf::from(args.next().context("--html 缺少输出路径")?));
            }
            "--features" => {
                features = Some(PathBuf::from(args.next().context("--features 缺少输出路径")?));
            }
            "--gate-audit" => {
                gate_audit = Some(PathBuf::from(args.next().context("--gate-audit 缺少输出路径")?));
            }
            "--log-format" => {
                let value = args.next().context("--log-format 缺少取值")?;
                log_format = value.parse::<LogFormat>().map_err(|e| anyhow!(e))?;
            }
            "-v" | "--verbose" => verbose = true,
            other if other.starts_with("--") => bail!("未知参数: {}", other),
            other => {
                if input.replace(PathBuf::from(other)).is_some() {
                    bail!("只能指定一个输入文件");
                }
            }
        }
    }

    Ok(CliArgs {
        input: input.context("用法: scpe-plan <request.json> [--config file] [--strategy s] [--html out]")?,
        config,
        strategy,
        html,
        features,
        gate_audit,
        log_format,
        verbose,
    })
}

/// 多个请求时在文件名后追加申请单号
fn html_path(base: &Path, requisition_id: &str, multiple: bool) -> PathBuf {
    if !multiple {
        return base.to_path_buf();
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("report");
    let ext = base.extension().and_then(|s| s.to_str()).unwrap_or("html");
    base.with_file_name(format!("{}-{}.{}", stem, requisition_id, ext))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    logging::init_with(args.log_format, args.verbose);

    tracing::info!("==================================================");
    tracing::info!("{} v{}", scpe_planner::APP_NAME, scpe_planner::VERSION);
    tracing::info!("==================================================");

    let manager = ConfigManager::load(args.config.as_deref()).context("加载计划配置失败")?;
    let mut config = manager.into_config();
    if let Some(strategy) = args.strategy {
        config.solver.strategy = strategy;
    }
    let context = Arc::new(PlanningContext::new(config).context("构建计划上下文失败")?);
    let planner = SourcingPlanner::new(context.clone());

    let bundle = PlanningBundle::from_file(&args.input)
        .with_context(|| format!("读取计划输入失败: {}", args.input.display()))?;
    if bundle.requests.is_empty() {
        bail!("输入文件中没有计划请求: {}", args.input.display());
    }
    let source = InMemoryDataSource::from_bundle(&bundle);

    let results = planner.plan_all_from_source(&source, &bundle.requests).await;
    let multiple = results.len() > 1;

    let mut outcomes = Vec::new();
    let mut extractor = FeatureExtractor::new();
    let mut gate_evaluations: Vec<GateEvaluation> = Vec::new();
    let mut failures = 0usize;
    for (request, result) in bundle.requests.iter().zip(results) {
        match result {
            Ok(outcome) => {
                if let Some(base) = &args.html {
                    let path = html_path(base, &outcome.requisition_id, multiple);
                    context
                        .analyzer()
                        .write_html(&outcome.report, &path)
                        .with_context(|| format!("写入 HTML 报告失败: {}", path.display()))?;
                }
                if args.features.is_some() {
                    for option in outcome.path.options.iter().filter(|o| o.feasible) {
                        extractor.extract(option, None);
                    }
                }
                if let Some(decision) = &outcome.decision {
                    gate_evaluations.extend(decision.gate_evaluations().cloned());
                }
                outcomes.push(outcome);
            }
            Err(e) => {
                failures += 1;
                eprintln!("计划失败 requisition_id={}: {}", request.requisition_id, e);
            }
        }
    }

    if let Some(path) = &args.features {
        extractor
            .export_csv(path)
            .with_context(|| format!("写入特征 CSV 失败: {}", path.display()))?;
    }

    if let Some(path) = &args.gate_audit {
        let file = std::fs::File::create(path)
            .with_context(|| format!("创建决策门审计文件失败: {}", path.display()))?;
        write_evaluations_csv(&gate_evaluations, file)
            .with_context(|| format!("写入决策门审计失败: {}", path.display()))?;
    }

    println!("{}", serde_json::to_string_pretty(&outcomes).context("序列化计划结果失败")?);

    if failures > 0 && outcomes.is_empty() {
        bail!("全部 {} 个请求计划失败", failures);
    }
    Ok(())
}
