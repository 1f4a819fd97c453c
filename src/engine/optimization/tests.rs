use super::*;
use crate::config::SolverConfig;
use crate::domain::money::money_to_f64;
use crate::domain::types::SourcingPathType;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;

// ==========================================
// 测试辅助函数
// ==========================================

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn create_test_manager(strategy: SolverStrategy) -> SolverManager {
    SolverManager::new(SolverConfig {
        strategy,
        ..SolverConfig::default()
    })
}

/// 库存 50 @ 40 + 采购 100 @ 50
fn create_test_candidates() -> Vec<PortfolioCandidate> {
    vec![
        PortfolioCandidate::new("STOCK", "ITEM-001", 40.0, Decimal::from(40), 50.0)
            .with_path(SourcingPathType::StockLocal)
            .with_location("WH-1"),
        PortfolioCandidate::new("PURCH", "ITEM-001", 50.0, Decimal::from(50), 100.0)
            .with_path(SourcingPathType::Purchase)
            .with_supplier("SUP-01"),
    ]
}

fn create_test_constraints(demand: f64) -> ConstraintSet {
    ConstraintBuilder::new()
        .add_demand("ITEM-001", demand, "EA")
        .unwrap()
        .build()
}

struct AlwaysTimeout;

impl ExactSolver for AlwaysTimeout {
    fn name(&self) -> &'static str {
        "ALWAYS_TIMEOUT"
    }

    fn solve(&self, _problem: &MipProblem, _limits: &SolveLimits) -> Result<MipSolution, SolverError> {
        Err(SolverError::TimeLimit { nodes: 0 })
    }
}

// ==========================================
// 约束构建
// ==========================================

#[test]
fn test_builder_summary_and_validation() {
    let set = ConstraintBuilder::new()
        .add_demand("ITEM-001", 100.0, "EA")
        .unwrap()
        .add_fefo("ITEM-001", Vec::new())
        .add_budget(Decimal::from(1000), "EUR", 10.0)
        .unwrap()
        .build();

    let summary = set.summary();
    assert_eq!(summary.get(&ConstraintType::Demand), Some(&1));
    assert_eq!(summary.get(&ConstraintType::Budget), Some(&1));
    assert!(summary.get(&ConstraintType::Capacity).is_none());
    assert_eq!(set.total(), 3);

    let issues = set.validate();
    assert_eq!(issues.len(), 1);
    assert!(issues[0].contains("FEFO"));
    assert_eq!(set.available_budget(), Some(Decimal::from(900)));
}

#[test]
fn test_builder_rejects_invalid_constraints() {
    assert!(ConstraintBuilder::new().add_demand("ITEM-001", 0.0, "EA").is_err());
    assert!(ConstraintBuilder::new().add_one_in("ITEM-001", Vec::new()).is_err());
    assert!(ConstraintBuilder::new().add_budget(Decimal::from(-1), "EUR", 0.0).is_err());

    let mut builder = ConstraintBuilder::new().add_capacity("WH-1", 100.0, None, 0.0);
    builder.clear();
    assert!(builder.build().is_empty());
}

#[test]
fn test_constraint_derived_values() {
    let set = ConstraintBuilder::new()
        .add_capacity("WH-1", 100.0, None, 25.0)
        .add_lead_time("PURCH", as_of() + chrono::Duration::days(12), as_of(), 10.0, 2.0, 0.95)
        .add_transfer("WH-2", "WH-1", Some(30.0), Decimal::from(5), 2)
        .add_fefo(
            "ITEM-001",
            vec![
                FefoBatch {
                    batch_id: "NO-EXP".to_string(),
                    expiration_date: None,
                    receipt_date: Some(as_of()),
                    quantity: 10.0,
                },
                FefoBatch {
                    batch_id: "LATE".to_string(),
                    expiration_date: NaiveDate::from_ymd_opt(2026, 9, 1),
                    receipt_date: Some(as_of()),
                    quantity: 10.0,
                },
                FefoBatch {
                    batch_id: "EARLY".to_string(),
                    expiration_date: NaiveDate::from_ymd_opt(2026, 5, 1),
                    receipt_date: Some(as_of()),
                    quantity: 10.0,
                },
            ],
        )
        .build();

    let capacity = set.capacity_for("WH-1").unwrap();
    assert!(approx(capacity.available_capacity(), 75.0));
    assert!(approx(capacity.utilization_rate(), 25.0));

    // 10 + 1.645 × 2 ≈ 13.29 > 12
    let lead_time = set.lead_time_for("PURCH").unwrap();
    assert!(lead_time.sl_lead_time_days() > 13.2 && lead_time.sl_lead_time_days() < 13.4);
    assert!(!lead_time.is_met());

    assert_eq!(set.transfer_from("WH-2").unwrap().transfer_cost_total(), Decimal::from(150));
    assert_eq!(set.fefo[0].consumption_sequence, vec!["EARLY", "LATE", "NO-EXP"]);
    assert_eq!(set.fefo_rank("LATE"), Some(1));
}

// ==========================================
// 单纯形 / 分支定界
// ==========================================

#[test]
fn test_simplex_equality_with_lower_bound() {
    // min 2x + y, x + y = 3, x ≥ 1
    let mut lp = LinearProgram::new(vec![2.0, 1.0]);
    lp.rows.push(LinearRow::new("SUM", vec![1.0, 1.0], RowSense::Eq, 3.0));
    lp.lower_bounds[0] = 1.0;

    let solution = solve_lp(&lp, 1_000);
    assert_eq!(solution.status, LpStatus::Optimal);
    assert!(approx(solution.values[0], 1.0));
    assert!(approx(solution.values[1], 2.0));
    assert!(approx(solution.objective, 4.0));
    assert!(approx(lp.rows[0].slack(&solution.values), 0.0));
}

#[test]
fn test_simplex_detects_infeasible_and_unbounded() {
    let mut infeasible = LinearProgram::new(vec![1.0]);
    infeasible.rows.push(LinearRow::new("MIN", vec![1.0], RowSense::Ge, 2.0));
    infeasible.upper_bounds[0] = Some(1.0);
    assert_eq!(solve_lp(&infeasible, 1_000).status, LpStatus::Infeasible);

    let unbounded = LinearProgram::new(vec![-1.0]);
    assert_eq!(solve_lp(&unbounded, 1_000).status, LpStatus::Unbounded);
}

fn create_test_knapsack() -> MipProblem {
    // 价值 (3,4,5)，重量 (2,3,4)，容量 6 → 最优取 0 与 2
    let mut lp = LinearProgram::new(vec![-3.0, -4.0, -5.0]);
    lp.rows.push(LinearRow::new("WEIGHT", vec![2.0, 3.0, 4.0], RowSense::Le, 6.0));
    lp.upper_bounds = vec![Some(1.0); 3];
    let mut problem = MipProblem::new(lp);
    for j in 0..3 {
        problem.set_integer(j);
    }
    problem
}

#[test]
fn test_branch_and_bound_binary_knapsack() {
    let limits = SolveLimits {
        gap_tolerance: 0.0,
        ..SolveLimits::default()
    };
    let solution = BranchAndBoundSolver::new().solve(&create_test_knapsack(), &limits).unwrap();

    assert_eq!(solution.status, MipStatus::Optimal);
    assert!(approx(solution.gap, 0.0));
    assert_eq!(solution.values, vec![1.0, 0.0, 1.0]);
    assert!(approx(solution.objective, -8.0));
    assert!(solution.nodes_explored >= 2);
}

#[test]
fn test_branch_and_bound_reports_gap_left_by_tolerance() {
    // 价值 (6,6,5)，重量 (3,3,4)，容量 7 → 最优 12；上分支先得到 11
    let mut lp = LinearProgram::new(vec![-6.0, -6.0, -5.0]);
    lp.rows.push(LinearRow::new("WEIGHT", vec![3.0, 3.0, 4.0], RowSense::Le, 7.0));
    lp.upper_bounds = vec![Some(1.0); 3];
    let mut problem = MipProblem::new(lp);
    for j in 0..3 {
        problem.set_integer(j);
    }

    let loose = SolveLimits {
        gap_tolerance: 0.1,
        ..SolveLimits::default()
    };
    let solution = BranchAndBoundSolver::new().solve(&problem, &loose).unwrap();
    assert!(approx(solution.objective, -11.0));
    assert!((solution.gap - 1.0 / 11.0).abs() < 1e-6);
    assert!(solution.gap <= loose.gap_tolerance);
    assert_eq!(solution.status, MipStatus::Optimal);

    let tight = SolveLimits {
        gap_tolerance: 0.0,
        ..SolveLimits::default()
    };
    let solution = BranchAndBoundSolver::new().solve(&problem, &tight).unwrap();
    assert!(approx(solution.objective, -12.0));
    assert!(approx(solution.gap, 0.0));
}

#[test]
fn test_branch_and_bound_node_limit_without_incumbent() {
    let limits = SolveLimits {
        max_nodes: 1,
        ..SolveLimits::default()
    };
    let err = BranchAndBoundSolver::new()
        .solve(&create_test_knapsack(), &limits)
        .unwrap_err();
    assert_eq!(err, SolverError::TimeLimit { nodes: 1 });
}

#[test]
fn test_branch_and_bound_rejects_malformed_problem() {
    let mut lp = LinearProgram::new(vec![1.0, 1.0]);
    lp.rows.push(LinearRow::new("BAD", vec![1.0], RowSense::Le, 1.0));
    let err = BranchAndBoundSolver::new()
        .solve(&MipProblem::new(lp), &SolveLimits::default())
        .unwrap_err();
    assert!(matches!(err, SolverError::InvalidProblem(_)));
}

// ==========================================
// 建模
// ==========================================

#[test]
fn test_model_marks_small_options_binary() {
    let candidates = vec![
        PortfolioCandidate::new("UNIT", "ITEM-001", 5.0, Decimal::from(5), 1.0),
        PortfolioCandidate::new("BULK", "ITEM-001", 6.0, Decimal::from(6), 10.0),
    ];
    let model = OptimizationModel::build("ITEM-001", 5.0, &candidates, &create_test_constraints(5.0));

    assert_eq!(model.num_variables(), 2);
    assert!(model.variables[0].binary);
    assert!(!model.variables[1].binary);
    assert_eq!(model.problem.integer, vec![true, false]);
    assert_eq!(model.problem.lp.rows[0].name, "DEMAND");
}

#[test]
fn test_model_applies_preference_and_transfer() {
    let candidates = vec![
        PortfolioCandidate::new("REMOTE", "ITEM-001", 40.0, Decimal::from(40), 100.0).with_location("WH-2"),
        PortfolioCandidate::new("OTHER", "ITEM-001", 45.0, Decimal::from(45), 100.0).with_supplier("SUP-02"),
    ];
    let constraints = ConstraintBuilder::new()
        .add_transfer("WH-2", "WH-1", Some(30.0), Decimal::from(5), 2)
        .add_sourcing_preference("ITEM-001", "SUP-01", 1.2)
        .build();

    let (admitted, excluded) = prepare_candidates(&candidates, &constraints);
    assert!(excluded.is_empty());
    assert!(approx(admitted[0].cte, 45.0));
    assert_eq!(admitted[0].unit_cost, Decimal::from(45));
    assert!(approx(admitted[0].max_qty, 30.0));
    assert!(approx(admitted[0].lead_time_days, 2.0));
    assert!(approx(admitted[1].cte, 54.0));
}

// ==========================================
// 求解策略
// ==========================================

#[test]
fn test_greedy_two_option_scenario() {
    let manager = create_test_manager(SolverStrategy::Greedy);
    let result = manager
        .solve("ITEM-001", 100.0, &create_test_candidates(), &create_test_constraints(100.0))
        .unwrap();

    assert!(result.success);
    assert_eq!(result.status, SolveStatus::Feasible);
    assert_eq!(result.strategy_used, SolverStrategy::Greedy);
    assert!(approx(result.solution.quantity_of("STOCK"), 50.0));
    assert!(approx(result.solution.quantity_of("PURCH"), 50.0));
    assert_eq!(result.solution.total_cost, Decimal::from(4500));
}

#[test]
fn test_greedy_demand_satisfaction_and_cost_floor() {
    let candidates = vec![
        PortfolioCandidate::new("A", "ITEM-001", 30.0, Decimal::from(30), 20.0),
        PortfolioCandidate::new("B", "ITEM-001", 20.0, Decimal::from(20), 35.0),
        PortfolioCandidate::new("C", "ITEM-001", 25.0, Decimal::from(25), 40.0),
    ];
    let manager = create_test_manager(SolverStrategy::Greedy);
    let result = manager
        .solve("ITEM-001", 80.0, &candidates, &create_test_constraints(80.0))
        .unwrap();

    assert!(result.solution.total_quantity >= 80.0 - 1e-6);
    let min_cte = result
        .solution
        .selected
        .iter()
        .map(|s| s.cte)
        .fold(f64::INFINITY, f64::min);
    assert!(result.objective_value >= 80.0 * min_cte - 1e-6);
    // B 35 + C 40 + A 5
    assert!(approx(result.solution.quantity_of("A"), 5.0));
}

#[test]
fn test_greedy_takes_unit_option_whole_to_close_gap() {
    // A 10 @ 10 + 单件 B @ 20，需求 10.5
    let candidates = vec![
        PortfolioCandidate::new("A", "ITEM-001", 10.0, Decimal::from(10), 10.0),
        PortfolioCandidate::new("B", "ITEM-001", 20.0, Decimal::from(20), 1.0),
    ];
    assert!(candidates[1].is_binary());

    for strategy in [SolverStrategy::Greedy, SolverStrategy::GreedyWithReopt, SolverStrategy::Exact] {
        let result = create_test_manager(strategy)
            .solve("ITEM-001", 10.5, &candidates, &create_test_constraints(10.5))
            .unwrap();
        assert!(result.success, "{:?}", strategy);
        assert!(result.solution.total_quantity >= 10.5 - 1e-6);
        assert!(approx(result.solution.gap_demand, 0.0));
    }

    let greedy = create_test_manager(SolverStrategy::Greedy)
        .solve("ITEM-001", 10.5, &candidates, &create_test_constraints(10.5))
        .unwrap();
    assert!(approx(greedy.solution.quantity_of("B"), 1.0));
}

#[test]
fn test_greedy_skips_unit_option_over_budget() {
    let candidates = vec![
        PortfolioCandidate::new("A", "ITEM-001", 10.0, Decimal::from(10), 10.0),
        PortfolioCandidate::new("B", "ITEM-001", 20.0, Decimal::from(20), 1.0),
    ];
    let constraints = ConstraintBuilder::new()
        .add_demand("ITEM-001", 10.5, "EA")
        .unwrap()
        .add_budget(Decimal::from(110), "CNY", 0.0)
        .unwrap()
        .build();

    let result = create_test_manager(SolverStrategy::Greedy)
        .solve("ITEM-001", 10.5, &candidates, &constraints)
        .unwrap();

    assert!(!result.success);
    assert!(approx(result.solution.quantity_of("B"), 0.0));
    assert!(money_to_f64(result.solution.total_cost) <= 110.0 + 1e-6);
}

/// 线性同余序列（测试内可复现的伪随机）
fn next_unit(state: &mut u64) -> f64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (*state >> 11) as f64 / (1u64 << 53) as f64
}

#[test]
fn test_greedy_meets_demand_whenever_supply_suffices() {
    let mut state = 7u64;
    for round in 0..300 {
        let count = 2 + (next_unit(&mut state) * 4.0) as usize;
        let candidates: Vec<PortfolioCandidate> = (0..count)
            .map(|i| {
                let cost = 1 + (next_unit(&mut state) * 50.0) as i64;
                // 约三分之一为单件选项
                let max_qty = if next_unit(&mut state) < 0.33 {
                    1.0
                } else {
                    1.0 + (next_unit(&mut state) * 40.0).floor()
                };
                PortfolioCandidate::new(&format!("O{}", i), "ITEM-001", cost as f64, Decimal::from(cost), max_qty)
            })
            .collect();
        let supply: f64 = candidates.iter().map(|c| c.max_qty).sum();
        let demand = (supply * (0.2 + 0.8 * next_unit(&mut state))).max(0.5);

        let greedy = create_test_manager(SolverStrategy::Greedy)
            .solve("ITEM-001", demand, &candidates, &create_test_constraints(demand))
            .unwrap();
        assert!(
            greedy.solution.total_quantity >= demand - 1e-6,
            "round {}: demand {} total {}",
            round,
            demand,
            greedy.solution.total_quantity
        );
        assert!(greedy.success);

        let exact = SolverManager::new(SolverConfig {
            strategy: SolverStrategy::Exact,
            gap_tolerance: 0.0,
            ..SolverConfig::default()
        })
        .solve("ITEM-001", demand, &candidates, &create_test_constraints(demand))
        .unwrap();
        assert!(exact.success);
        if !exact.used_fallback() {
            assert!(exact.objective_value <= greedy.objective_value + 1e-6, "round {}", round);
        }
    }
}

#[test]
fn test_exact_matches_greedy_on_simple_case() {
    let manager = create_test_manager(SolverStrategy::Exact);
    let result = manager
        .solve("ITEM-001", 100.0, &create_test_candidates(), &create_test_constraints(100.0))
        .unwrap();

    assert!(result.success);
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_eq!(result.strategy_used, SolverStrategy::Exact);
    assert!(result.fallback_reason.is_none());
    assert!(approx(money_to_f64(result.solution.total_cost), 4500.0));
}

#[test]
fn test_capacity_limits_both_strategies() {
    let constraints = ConstraintBuilder::new()
        .add_demand("ITEM-001", 100.0, "EA")
        .unwrap()
        .add_capacity("WH-1", 30.0, None, 0.0)
        .build();

    for strategy in [SolverStrategy::Greedy, SolverStrategy::Exact] {
        let result = create_test_manager(strategy)
            .solve("ITEM-001", 100.0, &create_test_candidates(), &constraints)
            .unwrap();
        assert!(result.success, "strategy={}", strategy);
        assert!(approx(result.solution.quantity_of("STOCK"), 30.0), "strategy={}", strategy);
        assert!(approx(money_to_f64(result.solution.total_cost), 4700.0), "strategy={}", strategy);
        assert!(result
            .constraint_activity
            .iter()
            .any(|a| a.name == "CAPACITY:WH-1" && a.binding));
    }
}

#[test]
fn test_exact_covers_demand_where_greedy_exhausts_budget() {
    // 低系数选项单价高: 贪心先用光预算
    let candidates = vec![
        PortfolioCandidate::new("PREMIUM", "ITEM-001", 10.0, Decimal::from(100), 100.0),
        PortfolioCandidate::new("BUDGET", "ITEM-001", 20.0, Decimal::from(10), 100.0),
    ];
    let constraints = ConstraintBuilder::new()
        .add_demand("ITEM-001", 50.0, "EA")
        .unwrap()
        .add_budget(Decimal::from(2000), "EUR", 0.0)
        .unwrap()
        .build();

    let greedy = create_test_manager(SolverStrategy::Greedy)
        .solve("ITEM-001", 50.0, &candidates, &constraints)
        .unwrap();
    assert!(!greedy.success);
    assert_eq!(greedy.status, SolveStatus::Partial);
    assert!(approx(greedy.solution.gap_demand, 30.0));

    let exact = create_test_manager(SolverStrategy::Exact)
        .solve("ITEM-001", 50.0, &candidates, &constraints)
        .unwrap();
    assert!(exact.success);
    assert!((exact.solution.quantity_of("PREMIUM") - 50.0 / 3.0).abs() < 1e-3);
    assert!(ModelAnalyzer::new().feasibility(&exact, &constraints).is_feasible);
}

#[test]
fn test_exact_failure_falls_back_to_greedy() {
    let manager = SolverManager::with_exact_solver(SolverConfig::default(), Arc::new(AlwaysTimeout));
    let result = manager
        .solve("ITEM-001", 100.0, &create_test_candidates(), &create_test_constraints(100.0))
        .unwrap();

    assert!(result.success);
    assert!(result.used_fallback());
    assert_eq!(result.strategy_requested, SolverStrategy::Exact);
    assert_eq!(result.strategy_used, SolverStrategy::Greedy);
    assert_eq!(result.solution.total_cost, Decimal::from(4500));
}

#[test]
fn test_exact_infeasible_reports_gap_without_error() {
    let candidates = vec![PortfolioCandidate::new("ONLY", "ITEM-001", 10.0, Decimal::from(10), 40.0)];
    let result = create_test_manager(SolverStrategy::Exact)
        .solve("ITEM-001", 100.0, &candidates, &create_test_constraints(100.0))
        .unwrap();

    assert!(!result.success);
    assert!(result.used_fallback());
    assert_eq!(result.status, SolveStatus::Partial);
    assert!(approx(result.solution.gap_demand, 60.0));
}

#[test]
fn test_invalid_demand_is_validation_error() {
    let err = create_test_manager(SolverStrategy::Greedy)
        .solve("ITEM-001", 0.0, &create_test_candidates(), &ConstraintSet::default())
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_one_in_selects_single_supplier() {
    let candidates = vec![
        PortfolioCandidate::new("S1", "ITEM-001", 45.0, Decimal::from(45), 60.0).with_supplier("SUP-01"),
        PortfolioCandidate::new("S2", "ITEM-001", 50.0, Decimal::from(50), 100.0).with_supplier("SUP-02"),
    ];
    let constraints = ConstraintBuilder::new()
        .add_demand("ITEM-001", 100.0, "EA")
        .unwrap()
        .add_one_in("ITEM-001", vec!["SUP-01".to_string(), "SUP-02".to_string()])
        .unwrap()
        .build();

    for strategy in [SolverStrategy::Greedy, SolverStrategy::Exact] {
        let result = create_test_manager(strategy)
            .solve("ITEM-001", 100.0, &candidates, &constraints)
            .unwrap();
        assert!(result.success, "strategy={}", strategy);
        assert_eq!(result.solution.suppliers().len(), 1, "strategy={}", strategy);
        assert!(approx(result.solution.quantity_of("S2"), 100.0), "strategy={}", strategy);
    }
}

#[test]
fn test_greedy_consumes_lots_in_fefo_order() {
    let candidates = vec![
        PortfolioCandidate::new("OPT-A", "ITEM-001", 40.0, Decimal::from(40), 50.0).with_lot("LOT-A"),
        PortfolioCandidate::new("OPT-B", "ITEM-001", 40.0, Decimal::from(40), 50.0).with_lot("LOT-B"),
    ];
    let constraints = ConstraintBuilder::new()
        .add_demand("ITEM-001", 60.0, "EA")
        .unwrap()
        .add_capacity("WH-1", 1000.0, None, 0.0)
        .add_fefo(
            "ITEM-001",
            vec![
                FefoBatch {
                    batch_id: "LOT-A".to_string(),
                    expiration_date: NaiveDate::from_ymd_opt(2026, 12, 1),
                    receipt_date: Some(as_of()),
                    quantity: 50.0,
                },
                FefoBatch {
                    batch_id: "LOT-B".to_string(),
                    expiration_date: NaiveDate::from_ymd_opt(2026, 11, 1),
                    receipt_date: Some(as_of()),
                    quantity: 50.0,
                },
            ],
        )
        .build();

    let result = create_test_manager(SolverStrategy::GreedyWithReopt)
        .solve("ITEM-001", 60.0, &candidates, &constraints)
        .unwrap();
    assert!(approx(result.solution.quantity_of("OPT-B"), 50.0));
    assert!(approx(result.solution.quantity_of("OPT-A"), 10.0));
}

#[test]
fn test_lead_time_constraint_excludes_late_option() {
    let constraints = ConstraintBuilder::new()
        .add_demand("ITEM-001", 100.0, "EA")
        .unwrap()
        .add_lead_time("PURCH", as_of() + chrono::Duration::days(5), as_of(), 10.0, 2.0, 0.95)
        .build();

    let result = create_test_manager(SolverStrategy::Greedy)
        .solve("ITEM-001", 100.0, &create_test_candidates(), &constraints)
        .unwrap();
    assert_eq!(result.excluded.len(), 1);
    assert_eq!(result.excluded[0].option_id, "PURCH");
    assert_eq!(result.excluded[0].constraint, ConstraintType::LeadTime);
    assert_eq!(result.status, SolveStatus::Partial);
    assert!(approx(result.solution.total_quantity, 50.0));
}

#[test]
fn test_reopt_never_worse_than_greedy() {
    let candidates = vec![
        PortfolioCandidate::new("A", "ITEM-001", 12.0, Decimal::from(12), 70.0).with_location("WH-1"),
        PortfolioCandidate::new("B", "ITEM-001", 15.0, Decimal::from(15), 70.0).with_location("WH-2"),
        PortfolioCandidate::new("C", "ITEM-001", 18.0, Decimal::from(18), 70.0),
    ];
    let constraints = ConstraintBuilder::new()
        .add_demand("ITEM-001", 150.0, "EA")
        .unwrap()
        .add_capacity("WH-1", 60.0, None, 0.0)
        .build();

    let greedy = create_test_manager(SolverStrategy::Greedy)
        .solve("ITEM-001", 150.0, &candidates, &constraints)
        .unwrap();
    let reopt = create_test_manager(SolverStrategy::GreedyWithReopt)
        .solve("ITEM-001", 150.0, &candidates, &constraints)
        .unwrap();

    assert_eq!(reopt.strategy_used, SolverStrategy::GreedyWithReopt);
    assert!(reopt.objective_value <= greedy.objective_value + 1e-9);
    assert!(approx(reopt.solution.total_quantity, 150.0));
    assert!(approx(reopt.solution.quantity_of("A"), 60.0));
}

#[test]
fn test_portfolio_summary() {
    let manager = create_test_manager(SolverStrategy::Greedy);
    let ok = manager
        .solve("ITEM-001", 100.0, &create_test_candidates(), &create_test_constraints(100.0))
        .unwrap();
    let short = manager
        .solve("ITEM-001", 200.0, &create_test_candidates(), &create_test_constraints(200.0))
        .unwrap();

    let summary = SolverManager::portfolio_summary(&[ok, short]);
    assert_eq!(summary.num_items, 2);
    assert_eq!(summary.num_feasible, 1);
    assert!(approx(summary.feasibility_rate, 0.5));
    // 4500 + (2000 + 5000)
    assert_eq!(summary.total_cost, Decimal::from(11500));
    assert_eq!(summary.avg_cost_per_item, Decimal::from(5750));
    assert_eq!(summary.strategies.get("GREEDY"), Some(&2));
}

#[tokio::test]
async fn test_batch_solve_parallel_preserves_order() {
    let manager = create_test_manager(SolverStrategy::Exact);
    let items = vec![
        BatchItem {
            item_id: "ITEM-001".to_string(),
            demand: 100.0,
            candidates: create_test_candidates(),
            constraints: create_test_constraints(100.0),
        },
        BatchItem {
            item_id: "ITEM-002".to_string(),
            demand: 0.0,
            candidates: create_test_candidates(),
            constraints: ConstraintSet::default(),
        },
        BatchItem {
            item_id: "ITEM-003".to_string(),
            demand: 40.0,
            candidates: create_test_candidates(),
            constraints: ConstraintSet::default(),
        },
    ];

    let sequential = manager.batch_solve(&items);
    let parallel = manager.batch_solve_parallel(items).await;
    assert_eq!(parallel.len(), 3);
    assert!(parallel[1].is_err());
    assert_eq!(parallel[0].as_ref().unwrap().item_id, "ITEM-001");
    let third = parallel[2].as_ref().unwrap();
    assert_eq!(third.item_id, "ITEM-003");
    assert!(approx(money_to_f64(third.solution.total_cost), 1600.0));
    assert_eq!(
        sequential[2].as_ref().unwrap().solution.total_cost,
        third.solution.total_cost
    );
}

// ==========================================
// 分析
// ==========================================

#[test]
fn test_analyzer_breakdown_and_recommendations() {
    let constraints = create_test_constraints(100.0);
    let result = create_test_manager(SolverStrategy::Greedy)
        .solve("ITEM-001", 100.0, &create_test_candidates(), &constraints)
        .unwrap();
    let analyzer = ModelAnalyzer::new();
    let report = analyzer.generate_report(&result, &constraints);

    let breakdown = &report.analysis.cost_breakdown;
    assert_eq!(breakdown[0].option_id, "PURCH");
    assert!((breakdown[0].cost_percentage - 55.5556).abs() < 1e-3);
    assert!(report.analysis.feasibility.is_feasible);
    assert_eq!(report.analysis.robustness.num_options, 2);
    assert!(report
        .analysis
        .recommendations
        .iter()
        .any(|r| r.contains("启发式")));
    assert!(report.analysis.sensitivity.binding_constraints.contains(&"DEMAND".to_string()));
}

#[test]
fn test_analyzer_flags_demand_gap() {
    let constraints = create_test_constraints(200.0);
    let result = create_test_manager(SolverStrategy::Greedy)
        .solve("ITEM-001", 200.0, &create_test_candidates(), &constraints)
        .unwrap();
    let feasibility = ModelAnalyzer::new().feasibility(&result, &constraints);

    assert!(!feasibility.is_feasible);
    assert!(approx(feasibility.feasibility_gap, 50.0));
    assert_eq!(feasibility.constraint_violations, vec!["DEMAND_NOT_COVERED"]);
}

#[test]
fn test_scenario_analysis_resolves_each_scenario() {
    let manager = create_test_manager(SolverStrategy::Greedy);
    let constraints = create_test_constraints(100.0);
    let candidates = create_test_candidates();
    let base = manager.solve("ITEM-001", 100.0, &candidates, &constraints).unwrap();

    let outcomes = ModelAnalyzer::new()
        .scenario_analysis(&manager, &base, &candidates, &constraints, &Scenario::standard_set())
        .unwrap();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].cost_delta, Decimal::from(500));
    assert_eq!(outcomes[1].cost_delta, Decimal::from(-500));
    assert_eq!(outcomes[2].cost_delta, Decimal::ZERO);
}

#[test]
fn test_report_export_html_and_json() {
    let constraints = create_test_constraints(100.0);
    let result = create_test_manager(SolverStrategy::Greedy)
        .solve("ITEM-001", 100.0, &create_test_candidates(), &constraints)
        .unwrap();
    let analyzer = ModelAnalyzer::new();
    let report = analyzer.generate_report(&result, &constraints);

    let html = analyzer.to_html(&report);
    assert!(html.contains("ITEM-001"));
    assert!(html.contains("PURCH"));

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("report.json");
    analyzer.write_json(&report, &json_path).unwrap();
    let parsed: PlanningReport = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(parsed.item_id, "ITEM-001");
    assert_eq!(parsed.total_cost, Decimal::from(4500));

    let html_path = dir.path().join("report.html");
    analyzer.write_html(&report, &html_path).unwrap();
    assert!(html_path.exists());
}
