use super::*;
use crate::config::DecisionConfig;
use crate::domain::sourcing::{SourcingOption, SourcingPath};
use crate::domain::types::{Criticality, SourcingPathType};
use crate::engine::scoring::{CteScore, NormalizedScore, ScoreWeights, ScoringContext, ScoringDimension};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;

// ==========================================
// 测试辅助函数
// ==========================================

fn create_test_facts(route: SourcingPathType, qty: f64, cost: f64, lead: f64, reliability: f64) -> RouteFacts {
    RouteFacts {
        route,
        total_options: 1,
        filter_feasible: 1,
        accepted_options: 1,
        accepted_quantity: qty,
        best_unit_cost: Some(cost),
        min_lead_time_days: Some(lead),
        best_on_time_probability: Some(0.9),
        best_reliability: Some(reliability),
        best_cte: Some(0.7),
    }
}

/// 需求 100，剩余 30 天，标准成本 45
fn create_test_input(criticality: Criticality) -> DecisionInput {
    let mut input = DecisionInput::new("ITEM-001", 100.0, 30.0, criticality);
    input.reference_unit_cost = Some(45.0);
    input
}

fn create_test_engine(config: &DecisionConfig) -> DecisionEngine {
    DecisionEngine::standard(config).unwrap()
}

struct FixedRule {
    name: &'static str,
    result: Result<bool, String>,
}

impl GateRule for FixedRule {
    fn name(&self) -> &str {
        self.name
    }

    fn evaluate(&self, _facts: &RouteFacts, _input: &DecisionInput) -> Result<bool, String> {
        self.result.clone()
    }
}

// ==========================================
// 级联
// ==========================================

#[test]
fn test_standard_cascade_selects_first_open_route() {
    let mut engine = create_test_engine(&DecisionConfig::default());
    let input = create_test_input(Criticality::Medium)
        .with_route(create_test_facts(SourcingPathType::StockLocal, 50.0, 40.0, 0.0, 0.99))
        .with_route(create_test_facts(SourcingPathType::Purchase, 500.0, 50.0, 10.0, 0.97));

    let trace = engine.execute(&input);

    assert_eq!(trace.selected_route, Some(SourcingPathType::Purchase));
    assert_eq!(trace.open_routes, vec![SourcingPathType::Purchase]);
    assert_eq!(trace.visits.len(), engine.cascade().len());

    let stock = &trace.visits[0];
    assert_eq!(stock.route, SourcingPathType::StockLocal);
    assert!(!stock.open);
    let closed = stock.evaluations.iter().find(|e| e.blocks()).unwrap();
    assert_eq!(closed.gate_id, "stock_local.coverage");
    assert_eq!(closed.actual, Some(0.5));
    assert!(trace.reasoning.iter().any(|r| r.contains("stock_local.coverage")));

    assert_eq!(trace.ranking.len(), 1);
    assert_eq!(trace.recommended_route, Some(SourcingPathType::Purchase));
    assert_eq!(engine.statistics().decided, 1);
}

#[test]
fn test_stock_covering_demand_wins_and_can_stop_early() {
    let input = create_test_input(Criticality::Medium)
        .with_route(create_test_facts(SourcingPathType::StockLocal, 120.0, 40.0, 0.0, 0.99))
        .with_route(create_test_facts(SourcingPathType::Purchase, 500.0, 50.0, 10.0, 0.97));

    let mut engine = create_test_engine(&DecisionConfig::default());
    let trace = engine.execute(&input);
    assert_eq!(trace.selected_route, Some(SourcingPathType::StockLocal));
    assert_eq!(trace.open_routes, vec![SourcingPathType::StockLocal, SourcingPathType::Purchase]);
    // 排序第一为库存（成本更低、交期为 0）
    assert_eq!(trace.ranking[0].route, SourcingPathType::StockLocal);

    let config = DecisionConfig { stop_at_first_open: true, ..DecisionConfig::default() };
    let mut engine = create_test_engine(&config);
    let trace = engine.execute(&input);
    assert_eq!(trace.visits.len(), 1);
    assert_eq!(trace.open_routes, vec![SourcingPathType::StockLocal]);
}

#[test]
fn test_no_open_route_is_undecided() {
    let mut engine = create_test_engine(&DecisionConfig::default());
    let trace = engine.execute(&create_test_input(Criticality::High));

    assert!(!trace.is_decided());
    assert!(trace.ranking.is_empty());
    assert_eq!(trace.recommended_route, None);
    assert!(trace.reasoning.iter().any(|r| r.contains("所有路径")));
    assert_eq!(engine.statistics().undecided, 1);
    assert_eq!(engine.statistics().decision_rate(), 0.0);
}

#[test]
fn test_expedite_fallback_only_for_critical_items() {
    let expedite = create_test_facts(SourcingPathType::Expedite, 200.0, 80.0, 3.0, 0.95);
    let mut engine = create_test_engine(&DecisionConfig::default());

    let mut medium = DecisionInput::new("ITEM-001", 100.0, 5.0, Criticality::Medium).with_route(expedite.clone());
    medium.budget = Some(1000.0);
    let trace = engine.execute(&medium);
    assert!(!trace.is_decided());
    let visit = trace.visits.iter().find(|v| v.route == SourcingPathType::Expedite).unwrap();
    assert!(visit.used_fallback);
    assert!(!visit.open);

    let mut critical = DecisionInput::new("ITEM-001", 100.0, 5.0, Criticality::Critical).with_route(expedite);
    critical.budget = Some(1000.0);
    let trace = engine.execute(&critical);
    assert_eq!(trace.selected_route, Some(SourcingPathType::Expedite));
    let visit = trace.visits.iter().find(|v| v.route == SourcingPathType::Expedite).unwrap();
    assert!(visit.used_fallback);
    assert!(visit
        .evaluations
        .iter()
        .any(|e| e.gate_id == "expedite.budget" && e.state == GateState::Closed));
    assert!(trace.reasoning[0].contains("回退"));
}

#[test]
fn test_warning_gate_does_not_close_route() {
    let mut engine = create_test_engine(&DecisionConfig::default());
    // 采购交期 40 天 > 剩余 30 天，采购交期门为 WARNING
    let input = create_test_input(Criticality::Medium)
        .with_route(create_test_facts(SourcingPathType::Purchase, 500.0, 50.0, 40.0, 0.97));

    let trace = engine.execute(&input);
    assert_eq!(trace.selected_route, Some(SourcingPathType::Purchase));
    let visit = trace.visits.iter().find(|v| v.route == SourcingPathType::Purchase).unwrap();
    assert_eq!(visit.warnings, 1);
    // 交期不达标在可行性评估中仍计为失败指标
    assert!(trace.ranking[0].failed_metrics.contains(&FeasibilityMetric::LeadTime));
}

#[test]
fn test_disabled_gate_is_bypassed() {
    let config = DecisionConfig {
        disabled_gates: vec!["stock_local.coverage".to_string()],
        ..DecisionConfig::default()
    };
    let mut engine = create_test_engine(&config);
    let input = create_test_input(Criticality::Medium)
        .with_route(create_test_facts(SourcingPathType::StockLocal, 50.0, 40.0, 0.0, 0.99));

    let trace = engine.execute(&input);
    assert_eq!(trace.selected_route, Some(SourcingPathType::StockLocal));
    assert!(trace
        .gate_evaluations()
        .any(|e| e.gate_id == "stock_local.coverage" && e.state == GateState::Bypassed));

    let config = DecisionConfig {
        disabled_gates: vec!["no_such.gate".to_string()],
        ..DecisionConfig::default()
    };
    assert!(DecisionEngine::standard(&config).is_err());
}

#[test]
fn test_custom_gate_rule() {
    let input = create_test_input(Criticality::Medium)
        .with_route(create_test_facts(SourcingPathType::Purchase, 500.0, 50.0, 10.0, 0.97));

    // 规则无法判定 → UNKNOWN，按关闭处理
    let mut engine = create_test_engine(&DecisionConfig::default());
    let gate_id = engine
        .add_custom_gate(
            SourcingPathType::Purchase,
            Arc::new(FixedRule { name: "supplier_audit", result: Err("审计系统不可用".to_string()) }),
            GateSeverity::Normal,
        )
        .unwrap();
    assert_eq!(gate_id, "purchase.supplier_audit");
    let trace = engine.execute(&input);
    assert!(!trace.is_decided());
    let unknown = trace.gate_evaluations().find(|e| e.gate_id == gate_id).unwrap();
    assert_eq!(unknown.state, GateState::Unknown);
    assert!(unknown.note.contains("审计系统不可用"));

    // WARNING 级规则拒绝时路径仍开放
    let mut engine = create_test_engine(&DecisionConfig::default());
    engine
        .add_custom_gate(
            SourcingPathType::Purchase,
            Arc::new(FixedRule { name: "preferred_supplier", result: Ok(false) }),
            GateSeverity::Warning,
        )
        .unwrap();
    assert_eq!(engine.execute(&input).selected_route, Some(SourcingPathType::Purchase));
}

#[test]
fn test_cascade_builder_validation() {
    assert!(RouteCascade::builder().build().is_err());
    assert!(RouteCascade::builder()
        .route(SourcingPathType::Purchase, &["purchase.available"])
        .route(SourcingPathType::Purchase, &["purchase.available"])
        .build()
        .is_err());

    let cascade = RouteCascade::builder()
        .route(SourcingPathType::Purchase, &["purchase.available", "missing.gate"])
        .build()
        .unwrap();
    let result = DecisionEngine::new(cascade, GateManager::new(10), RouteEvaluator::default(), false);
    assert!(result.is_err());
}

// ==========================================
// 门管理器
// ==========================================

#[test]
fn test_gate_cache_statistics_and_audit() {
    let mut manager = GateManager::new(2);
    for (id, check) in [
        ("g.available", GateCheck::HasAcceptedOptions),
        ("g.quality", GateCheck::MinReliability(0.98)),
        ("g.deadline", GateCheck::LeadTimeWithinDeadline),
    ] {
        manager.register_gate(Gate::new(id, GateKind::Complex, id, check), GateConfig::default());
    }
    let facts = create_test_facts(SourcingPathType::Purchase, 500.0, 50.0, 10.0, 0.97);
    let input = create_test_input(Criticality::Medium);

    let first = manager.evaluate_gate("g.quality", &facts, &input, true);
    assert_eq!(first.state, GateState::Closed);
    assert!(!first.cached);
    let second = manager.evaluate_gate("g.quality", &facts, &input, true);
    assert!(second.cached);
    assert_eq!(manager.statistics("g.quality").unwrap().total, 1);

    manager.evaluate_gate("g.quality", &facts, &input, false);
    let stats = manager.statistics("g.quality").unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.pass_rate(), 0.0);

    // 缓存上限 2
    manager.evaluate_gate("g.available", &facts, &input, true);
    manager.evaluate_gate("g.deadline", &facts, &input, true);
    assert_eq!(manager.cache_len(), 2);
    assert_eq!(manager.audit_trail().len(), 4);

    let unknown = manager.evaluate_gate("g.missing", &facts, &input, true);
    assert_eq!(unknown.state, GateState::Unknown);
    assert!(unknown.blocks());
}

#[test]
fn test_batch_stop_on_fail() {
    let mut manager = GateManager::new(0);
    manager.register_gate(
        Gate::new("a", GateKind::Availability, "a", GateCheck::HasAcceptedOptions),
        GateConfig::with_severity(GateSeverity::Critical),
    );
    manager.register_gate(
        Gate::new("b", GateKind::Timing, "b", GateCheck::LeadTimeWithinDeadline),
        GateConfig::default(),
    );
    let gate_ids = vec!["a".to_string(), "b".to_string()];
    let empty = RouteFacts::empty(SourcingPathType::Transfer);
    let input = create_test_input(Criticality::Low);

    let stopped = manager.evaluate_batch(&gate_ids, &empty, &input, true);
    assert!(!stopped.open);
    assert_eq!(stopped.evaluations.len(), 1);

    let full = manager.evaluate_batch(&gate_ids, &empty, &input, false);
    assert!(!full.open);
    assert_eq!(full.evaluations.len(), 2);
    assert_eq!(manager.cache_len(), 0);
}

#[test]
fn test_audit_export() {
    let mut engine = create_test_engine(&DecisionConfig::default());
    let input = create_test_input(Criticality::Medium)
        .with_route(create_test_facts(SourcingPathType::Purchase, 500.0, 50.0, 10.0, 0.97));
    engine.execute(&input);

    let mut buf = Vec::new();
    engine.gates().write_audit_csv(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("evaluated_at,gate_id,kind,route,state"));
    assert_eq!(lines.count(), engine.gates().audit_trail().len());
    assert!(text.contains("purchase.deadline"));

    let file = tempfile::NamedTempFile::new().unwrap();
    engine.gates().export_audit_json(file.path()).unwrap();
    let parsed: Vec<GateEvaluation> =
        serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
    assert_eq!(parsed.len(), engine.gates().audit_trail().len());
}

// ==========================================
// 可行性评估
// ==========================================

#[test]
fn test_piecewise_scores() {
    assert_eq!(lead_time_score(3.0, 2.0), 1.0);
    assert!((lead_time_score(-1.0, 2.0) - 0.75).abs() < 1e-9);
    assert!((lead_time_score(-2.0, 2.0) - 0.5).abs() < 1e-9);
    assert!((lead_time_score(-3.0, 2.0) - 0.25).abs() < 1e-9);
    assert_eq!(lead_time_score(-10.0, 2.0), 0.0);

    assert_eq!(cost_score(0.8, 0.2), 1.0);
    assert!((cost_score(1.2, 0.2) - 0.5).abs() < 1e-9);
    assert_eq!(cost_score(1.5, 0.2), 0.0);

    // 迟到越多分越低
    let mut previous = 1.0;
    for step in 0..40 {
        let score = lead_time_score(-(step as f64) * 0.25, 2.0);
        assert!(score <= previous + 1e-12);
        previous = score;
    }
}

#[test]
fn test_feasibility_levels() {
    let evaluator = RouteEvaluator::default();
    let input = create_test_input(Criticality::Medium);

    let full = evaluator.evaluate(&create_test_facts(SourcingPathType::Purchase, 500.0, 50.0, 10.0, 0.97), &input);
    assert_eq!(full.level, FeasibilityLevel::Full);
    assert!(full.failed_metrics.is_empty());
    assert!((0.0..=1.0).contains(&full.composite_score));

    let low_quality =
        evaluator.evaluate(&create_test_facts(SourcingPathType::Purchase, 500.0, 50.0, 10.0, 0.90), &input);
    assert_eq!(low_quality.level, FeasibilityLevel::Partial);
    assert_eq!(low_quality.failed_metrics, vec![FeasibilityMetric::Quality]);

    // 借用只适用于停线级；交期超期 + 关键度不适配
    let loan = evaluator.evaluate(&create_test_facts(SourcingPathType::Loan, 500.0, 40.0, 35.0, 0.97), &input);
    assert_eq!(loan.level, FeasibilityLevel::Marginal);

    let empty = evaluator.evaluate(&RouteFacts::empty(SourcingPathType::Vmi), &input);
    assert_eq!(empty.level, FeasibilityLevel::Infeasible);
    assert_eq!(empty.composite_score, 0.0);
}

#[test]
fn test_budget_drives_cost_ratio() {
    let evaluator = RouteEvaluator::default();
    let mut input = create_test_input(Criticality::Medium);
    input.budget = Some(4000.0);

    let facts = create_test_facts(SourcingPathType::Purchase, 500.0, 50.0, 10.0, 0.97);
    let over = evaluator.evaluate(&facts, &input);
    assert!((over.cost_ratio.unwrap() - 1.25).abs() < 1e-9);
    assert!(over.failed_metrics.contains(&FeasibilityMetric::Cost));
}

#[test]
fn test_rank_and_compare() {
    let evaluator = RouteEvaluator::default();
    let input = create_test_input(Criticality::Medium)
        .with_route(create_test_facts(SourcingPathType::Purchase, 500.0, 60.0, 25.0, 0.96))
        .with_route(create_test_facts(SourcingPathType::Transfer, 150.0, 42.0, 2.0, 0.99));

    let ranking = evaluator.rank(
        &input,
        &[SourcingPathType::Purchase, SourcingPathType::Transfer, SourcingPathType::Loan],
    );
    assert_eq!(ranking.len(), 3);
    assert_eq!(ranking[0].route, SourcingPathType::Transfer);
    assert_eq!(ranking[2].level, FeasibilityLevel::Infeasible);

    let (best, score) = evaluator.compare(&ranking).unwrap();
    assert_eq!(best, SourcingPathType::Transfer);
    assert!(score > 0.0 && score <= 1.0);
    assert!(evaluator.compare(&ranking[2..]).is_none());

    let mut buf = Vec::new();
    write_feasibility_csv(&ranking, &mut buf).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 4);
}

// ==========================================
// 输入汇总
// ==========================================

fn create_test_score(option_id: &str, on_time: f64, reliability: f64, cte: f64) -> CteScore {
    CteScore {
        option_id: option_id.to_string(),
        item_id: "ITEM-001".to_string(),
        cost_score: NormalizedScore::new(ScoringDimension::Cost, 0.5, 0.5),
        time_score: NormalizedScore::new(ScoringDimension::Time, on_time, on_time),
        risk_score: NormalizedScore::new(ScoringDimension::Risk, reliability, reliability),
        cte_value: cte,
        weights: ScoreWeights::default(),
        sourcing_path: None,
        supplier_id: None,
    }
}

#[test]
fn test_route_facts_from_planning() {
    let as_of = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let required = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
    let mut path = SourcingPath::new("REQ-1", "ITEM-001", 100.0, required).unwrap();

    let stock = SourcingOption::new("ITEM-001:STOCK_LOCAL:L1", "ITEM-001", SourcingPathType::StockLocal, 50.0, Decimal::from(40), 0.0).unwrap();
    let purchase_a = SourcingOption::new("ITEM-001:PURCHASE:A", "ITEM-001", SourcingPathType::Purchase, 300.0, Decimal::from(55), 12.0).unwrap();
    let purchase_b = SourcingOption::new("ITEM-001:PURCHASE:B", "ITEM-001", SourcingPathType::Purchase, 200.0, Decimal::from(50), 8.0).unwrap();
    let mut rejected = SourcingOption::new("ITEM-001:PURCHASE:C", "ITEM-001", SourcingPathType::Purchase, 900.0, Decimal::from(30), 5.0).unwrap();
    rejected.mark_feasibility(false, Some("供应商已停用".to_string()));
    for option in [stock, purchase_a, purchase_b, rejected] {
        path.add_option(option, None);
    }

    // B 通过过滤但被评分截断
    let scores = vec![
        create_test_score("ITEM-001:STOCK_LOCAL:L1", 1.0, 0.99, 0.9),
        create_test_score("ITEM-001:PURCHASE:A", 0.92, 0.95, 0.6),
    ];
    let mut context = ScoringContext::new(required, as_of, Criticality::High);
    context.demand_quantity = 100.0;

    let input = DecisionInput::from_planning(&path, &scores, &context, Some(Decimal::from(8000)), Decimal::ZERO);
    assert_eq!(input.routes.len(), SourcingPathType::ALL.len());
    assert_eq!(input.days_to_deadline, 30.0);
    assert_eq!(input.budget, Some(8000.0));
    assert_eq!(input.reference_unit_cost, None);

    let purchase = input.route(SourcingPathType::Purchase).unwrap();
    assert_eq!(purchase.total_options, 3);
    assert_eq!(purchase.filter_feasible, 2);
    assert_eq!(purchase.accepted_options, 1);
    assert_eq!(purchase.accepted_quantity, 300.0);
    assert_eq!(purchase.best_unit_cost, Some(55.0));
    assert_eq!(purchase.best_on_time_probability, Some(0.92));

    let stock = input.route(SourcingPathType::StockLocal).unwrap();
    assert!((stock.coverage(100.0) - 0.5).abs() < 1e-9);
    assert!(!input.route(SourcingPathType::Vmi).unwrap().has_accepted());
}
