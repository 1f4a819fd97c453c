// ==========================================
// 路径决策集成测试
// ==========================================
// 职责: 过滤/评分结果 → 决策级联 → 主路径与门审计
// 基准场景: 需求 100 EA，库存 LOT-A 50 @ 40，采购 SUP-01 500 @ 50
// ==========================================


use scpe_planner::config::PlannerConfig;
use scpe_planner::domain::money::money_to_f64;
use scpe_planner::engine::decision::{
    export_traces_json, DecisionInput, DecisionTrace, GateRule, GateSeverity, GateState, RouteFacts,
};
use scpe_planner::engine::{PlanningContext, SourcingPlanner};
use scpe_planner::SourcingPathType;
use std::sync::Arc;
use test_helpers::*;

struct SupplierOnHold;

impl GateRule for SupplierOnHold {
    fn name(&self) -> &str {
        "supplier_on_hold"
    }

    fn evaluate(&self, _facts: &RouteFacts, _input: &DecisionInput) -> Result<bool, String> {
        Ok(false)
    }
}

fn plan_baseline(planner: &SourcingPlanner, quantity: f64) -> scpe_planner::engine::PlanningOutcome {
    let snapshot = create_baseline_snapshot();
    planner
        .plan(&create_test_request(quantity), &create_test_item(), Some(&snapshot), create_baseline_options())
        .unwrap()
}

#[test]
fn test_partial_stock_routes_to_purchase() {
    let planner = SourcingPlanner::new(create_test_context());
    let outcome = plan_baseline(&planner, 100.0);

    let decision = outcome.decision.as_ref().unwrap();
    assert_eq!(decision.selected_route, Some(SourcingPathType::Purchase));
    assert!(decision.open_routes.contains(&SourcingPathType::Purchase));
    assert!(!decision.open_routes.contains(&SourcingPathType::StockLocal));
    assert!(decision
        .gate_evaluations()
        .any(|e| e.gate_id == "stock_local.coverage" && e.state == GateState::Closed));
    assert_eq!(decision.ranking[0].route, SourcingPathType::Purchase);
}

#[test]
fn test_stock_covering_demand_is_primary_route() {
    let planner = SourcingPlanner::new(create_test_context());
    let outcome = plan_baseline(&planner, 40.0);

    let decision = outcome.decision.as_ref().unwrap();
    assert_eq!(decision.selected_route, Some(SourcingPathType::StockLocal));
    assert_eq!(decision.open_routes.first(), Some(&SourcingPathType::StockLocal));
}

#[test]
fn test_decision_does_not_change_solution() {
    let with_decision = plan_baseline(&SourcingPlanner::new(create_test_context()), 100.0);

    let mut config = PlannerConfig::default();
    config.decision.enabled = false;
    let without_decision = plan_baseline(&SourcingPlanner::new(create_test_context_with(config)), 100.0);

    assert!(without_decision.decision.is_none());
    assert!(approx(
        money_to_f64(with_decision.solver_result.total_cost()),
        money_to_f64(without_decision.solver_result.total_cost()),
        1e-6
    ));
    assert_eq!(with_decision.path.allocations, without_decision.path.allocations);
}

#[test]
fn test_custom_gate_closes_route_without_blocking_plan() {
    scpe_planner::logging::init_test();
    let context = PlanningContext::new(PlannerConfig::default()).unwrap().with_gate_rule(
        SourcingPathType::Purchase,
        Arc::new(SupplierOnHold),
        GateSeverity::Normal,
    );
    let planner = SourcingPlanner::new(Arc::new(context));
    let outcome = plan_baseline(&planner, 100.0);

    let decision = outcome.decision.as_ref().unwrap();
    assert!(!decision.is_decided());
    assert!(decision
        .gate_evaluations()
        .any(|e| e.gate_id == "purchase.supplier_on_hold" && !e.passed));
    // 决策只作参考，求解照常满足需求
    assert!(outcome.demand_met());
}

#[test]
fn test_export_decision_traces() {
    let planner = SourcingPlanner::new(create_test_context());
    let traces: Vec<DecisionTrace> = [100.0, 40.0]
        .iter()
        .filter_map(|&qty| plan_baseline(&planner, qty).decision)
        .collect();
    assert_eq!(traces.len(), 2);

    let file = tempfile::NamedTempFile::new().unwrap();
    export_traces_json(&traces, file.path()).unwrap();
    let parsed: Vec<DecisionTrace> = serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[1].selected_route, Some(SourcingPathType::StockLocal));
}
