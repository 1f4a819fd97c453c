// ==========================================
// 组合优化集成测试
// ==========================================
// 职责: 求解策略/降级/FEFO/批量求解/报告导出 的对外行为
// ==========================================


use rust_decimal::Decimal;
use scpe_planner::config::PlannerConfig;
use scpe_planner::domain::money::money_to_f64;
use scpe_planner::engine::optimization::{
    BatchItem, ExactSolver, MipProblem, MipSolution, SolveLimits, SolverError,
};
use scpe_planner::engine::{
    ConstraintBuilder, PlanningContext, PortfolioCandidate, SolverManager, SourcingPlanner,
};
use scpe_planner::SolverStrategy;
use std::sync::Arc;
use test_helpers::*;

/// 始终超时的精确求解器
struct AlwaysTimeout;

impl ExactSolver for AlwaysTimeout {
    fn name(&self) -> &'static str {
        "always-timeout"
    }

    fn solve(&self, _problem: &MipProblem, _limits: &SolveLimits) -> Result<MipSolution, SolverError> {
        Err(SolverError::TimeLimit { nodes: 0 })
    }
}

#[test]
fn test_exact_solver_failure_falls_back_inside_planner() {
    let context = PlanningContext::new(PlannerConfig::default())
        .unwrap()
        .with_exact_solver(Arc::new(AlwaysTimeout));
    let planner = SourcingPlanner::new(Arc::new(context));
    let snapshot = create_baseline_snapshot();

    let outcome = planner
        .plan(&create_test_request(100.0), &create_test_item(), Some(&snapshot), create_baseline_options())
        .unwrap();

    let result = &outcome.solver_result;
    assert!(result.success);
    assert!(result.used_fallback());
    assert_eq!(result.strategy_requested, SolverStrategy::Exact);
    assert_eq!(result.strategy_used, SolverStrategy::Greedy);
    assert!(approx(money_to_f64(result.total_cost()), 4500.0, 1e-3));
    assert_eq!(outcome.report.fallback_reason, result.fallback_reason);
}

#[test]
fn test_reopt_strategy_on_baseline() {
    let planner = SourcingPlanner::new(create_test_context());
    let snapshot = create_baseline_snapshot();
    let mut request = create_test_request(100.0);
    request.strategy = Some(SolverStrategy::GreedyWithReopt);

    let outcome = planner
        .plan(&request, &create_test_item(), Some(&snapshot), create_baseline_options())
        .unwrap();

    assert_eq!(outcome.solver_result.strategy_used, SolverStrategy::GreedyWithReopt);
    assert!(outcome.demand_met());
    assert!(approx(money_to_f64(outcome.solver_result.total_cost()), 4500.0, 1e-3));
}

#[test]
fn test_greedy_consumes_earliest_expiring_lot_first() {
    let planner = SourcingPlanner::new(create_test_context());
    let snapshot = create_test_snapshot(vec![
        create_test_lot("LOT-A", 50.0, date(2026, 1, 10), Some(date(2026, 6, 30))),
        create_test_lot("LOT-B", 50.0, date(2026, 1, 20), Some(date(2026, 4, 30))),
    ]);
    let options = vec![
        create_stock_option("ITEM-001:STOCK_LOCAL:LOT-A", "LOT-A", 50.0, 40),
        create_stock_option("ITEM-001:STOCK_LOCAL:LOT-B", "LOT-B", 50.0, 40),
    ];
    let mut request = create_test_request(60.0);
    request.strategy = Some(SolverStrategy::Greedy);

    let outcome = planner
        .plan(&request, &create_test_item(), Some(&snapshot), options)
        .unwrap();

    let solution = &outcome.solver_result.solution;
    assert!(outcome.demand_met());
    assert!(approx(solution.quantity_of("ITEM-001:STOCK_LOCAL:LOT-B"), 50.0, 1e-3));
    assert!(approx(solution.quantity_of("ITEM-001:STOCK_LOCAL:LOT-A"), 10.0, 1e-3));
}

#[test]
fn test_portfolio_summary_over_planned_items() {
    let planner = SourcingPlanner::new(create_test_context());
    let snapshot = create_baseline_snapshot();
    let mut boxed = create_test_request(10.0);
    boxed.requisition_id = "REQ-0002".to_string();
    boxed.unit_of_measure = Some("BOX".to_string());

    let results: Vec<_> = [create_test_request(100.0), boxed]
        .iter()
        .map(|request| {
            planner
                .plan(request, &create_test_item(), Some(&snapshot), create_baseline_options())
                .unwrap()
                .solver_result
        })
        .collect();

    let summary = SolverManager::portfolio_summary(&results);
    assert_eq!(summary.num_items, 2);
    assert_eq!(summary.num_feasible, 2);
    assert!(approx(summary.feasibility_rate, 1.0, 1e-9));
    assert_eq!(summary.strategies.get("EXACT"), Some(&2));
    assert!(approx(money_to_f64(summary.total_cost), 9000.0, 1e-3));
}

#[tokio::test]
async fn test_batch_solve_parallel_through_context() {
    let context = create_test_context();
    let candidates = vec![
        PortfolioCandidate::new("ITEM-001:STOCK_LOCAL:LOT-A", "ITEM-001", 40.0, Decimal::from(40), 50.0),
        PortfolioCandidate::new("ITEM-001:PURCHASE:SUP-01", "ITEM-001", 50.0, Decimal::from(50), 500.0)
            .with_supplier("SUP-01"),
    ];
    let batch: Vec<BatchItem> = [100.0, 30.0, 600.0]
        .iter()
        .map(|demand| BatchItem {
            item_id: ITEM_ID.to_string(),
            demand: *demand,
            candidates: candidates.clone(),
            constraints: ConstraintBuilder::new()
                .add_demand(ITEM_ID, *demand, "EA")
                .unwrap()
                .build(),
        })
        .collect();

    let results = context.solver().batch_solve_parallel(batch).await;

    assert_eq!(results.len(), 3);
    let first = results[0].as_ref().unwrap();
    assert!(approx(money_to_f64(first.total_cost()), 4500.0, 1e-3));
    let second = results[1].as_ref().unwrap();
    assert!(approx(money_to_f64(second.total_cost()), 1200.0, 1e-3));
    // 需求超过总可供量
    let third = results[2].as_ref().unwrap();
    assert!(!third.success);
    assert!(approx(third.solution.gap_demand, 50.0, 1e-3));
}

#[test]
fn test_report_exports_to_files() {
    let context = create_test_context();
    let planner = SourcingPlanner::new(context.clone());
    let snapshot = create_baseline_snapshot();
    let outcome = planner
        .plan(&create_test_request(100.0), &create_test_item(), Some(&snapshot), create_baseline_options())
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let html_path = dir.path().join("report.html");
    let json_path = dir.path().join("report.json");

    context.analyzer().write_html(&outcome.report, &html_path).unwrap();
    context.analyzer().write_json(&outcome.report, &json_path).unwrap();

    let html = std::fs::read_to_string(&html_path).unwrap();
    assert!(html.contains("ITEM-001"));
    assert!(html.contains("<table"));

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["item_id"], "ITEM-001");
    assert_eq!(json["strategy_used"], "EXACT");
}
