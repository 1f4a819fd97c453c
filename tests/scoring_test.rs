// ==========================================
// CTE 评分与关键度截断集成测试
// ==========================================


use scpe_planner::domain::money::money_to_f64;
use scpe_planner::engine::scoring::CutDimension;
use scpe_planner::engine::{ScoreWeights, ScoringContext, SourcingPlanner};
use scpe_planner::Criticality;
use test_helpers::*;

fn create_planner() -> SourcingPlanner {
    SourcingPlanner::new(create_test_context())
}

#[test]
fn test_cheaper_option_scores_higher_when_equal_otherwise() {
    let context = create_test_context();
    let mut scorer = context.cte_scorer();
    let cheap = create_purchase_option("ITEM-001:PURCHASE:SUP-01", "SUP-01", 100.0, 40);
    let dear = create_purchase_option("ITEM-001:PURCHASE:SUP-02", "SUP-02", 100.0, 60);
    let scoring_context = ScoringContext::new(required_date(), as_of(), Criticality::Medium);

    let scores = scorer.score_options(&[&cheap, &dear], &scoring_context, None).unwrap();

    assert_eq!(scores.len(), 2);
    assert!(scores[0].cte_value > scores[1].cte_value);
    assert!(approx(scores[0].cost_score.value, 1.0, 1e-9));
    assert!(approx(scores[1].cost_score.value, 0.0, 1e-9));
    assert!(scores.iter().all(|s| (0.0..=1.0).contains(&s.cte_value)));
    assert_eq!(scorer.top_options(1)[0].option_id, "ITEM-001:PURCHASE:SUP-01");
}

#[test]
fn test_high_criticality_cuts_default_reliability_on_risk() {
    let context = create_test_context();
    let mut scorer = context.criticality_scorer();
    let options = create_baseline_options();
    let refs: Vec<_> = options.iter().collect();
    let scoring_context = ScoringContext::new(required_date(), as_of(), Criticality::High);

    // 默认可靠度 0.99 × 0.95 低于 HIGH 的 0.95 门槛
    let accepted = scorer.score_and_cut(&refs, &scoring_context).unwrap();

    assert!(accepted.is_empty());
    let report = scorer.cut_report(Criticality::High);
    assert_eq!(report.rejected, 2);
    assert_eq!(report.rejected_by.get(&CutDimension::Risk), Some(&2));
}

#[test]
fn test_planner_reports_cost_cut_against_standard_cost() {
    let planner = create_planner();
    let snapshot = create_baseline_snapshot();
    let mut options = create_baseline_options();
    // MEDIUM: 标准成本 45 × 1.2 = 54
    options.push(create_purchase_option("ITEM-001:PURCHASE:SUP-07", "SUP-07", 500.0, 60));

    let outcome = planner
        .plan(&create_test_request(100.0), &create_test_item(), Some(&snapshot), options)
        .unwrap();

    let cut = outcome.cut_report.as_ref().unwrap();
    assert_eq!(cut.rejected_by.get(&CutDimension::Cost), Some(&1));
    assert_eq!(cut.accepted, 2);
    assert!(outcome.scores.iter().all(|s| s.option_id != "ITEM-001:PURCHASE:SUP-07"));
    assert!(approx(money_to_f64(outcome.solver_result.total_cost()), 4500.0, 1e-3));
}

#[test]
fn test_planner_applies_weight_override() {
    let planner = create_planner();
    let snapshot = create_baseline_snapshot();
    let weights = ScoreWeights::new(0.2, 0.5, 0.3).unwrap();
    let mut request = create_test_request(100.0);
    request.weights = Some(weights);

    let outcome = planner
        .plan(&request, &create_test_item(), Some(&snapshot), create_baseline_options())
        .unwrap();

    assert_eq!(outcome.scores.len(), 2);
    assert!(outcome.scores.iter().all(|s| s.weights == weights));
    assert!(outcome.cut_report.is_some());
}

#[test]
fn test_invalid_weight_override_is_rejected() {
    let planner = create_planner();
    let mut request = create_test_request(100.0);
    request.weights = Some(ScoreWeights {
        cost: 0.5,
        time: 0.5,
        risk: 0.5,
    });

    let err = planner
        .plan(&request, &create_test_item(), None, create_baseline_options())
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_low_criticality_accepts_everything_in_range() {
    let planner = create_planner();
    let snapshot = create_baseline_snapshot();
    let mut item = create_test_item();
    item.criticality = Criticality::Low;
    // LOW 成本倍数 1.0 → 参考成本需覆盖采购单价
    item.standard_cost = rust_decimal::Decimal::from(50);

    let outcome = planner
        .plan(&create_test_request(100.0), &item, Some(&snapshot), create_baseline_options())
        .unwrap();

    let cut = outcome.cut_report.unwrap();
    assert_eq!(cut.rejected, 0);
    assert_eq!(cut.accepted_by_cte.len(), 2);
    // CTE 降序
    assert!(cut.accepted_by_cte[0].1 >= cut.accepted_by_cte[1].1);
}
