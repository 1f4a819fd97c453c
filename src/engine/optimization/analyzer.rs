// ==========================================
// 供应链计划引擎 - 求解后分析
// ==========================================
// 职责: 可行性 / 成本构成 / 鲁棒性 / 敏感性 / 情景 / 建议
// 输出: 结构化报告，可导出 JSON 或 HTML
// ==========================================

use super::constraints::ConstraintSet;
use super::formulation::{ConstraintActivity, PortfolioCandidate};
use super::solver_manager::{SolveStatus, SolverManager, SolverResult, SolverStrategy};
use crate::domain::money::{money_from_f64, money_to_f64, share_pct, Money};
use crate::error::PlannerResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, instrument};

const CONCENTRATION_ALERT_PCT: f64 = 80.0;

// ==========================================
// 报告结构
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityReport {
    pub is_feasible: bool,
    pub feasibility_gap: f64,
    pub constraint_violations: Vec<String>,
    pub infeasibility_reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdownEntry {
    pub option_id: String,
    pub supplier_id: Option<String>,
    pub quantity: f64,
    pub unit_cost: Money,
    pub total_cost: Money,
    pub cost_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessReport {
    pub num_options: usize,
    pub num_suppliers: usize,
    pub supplier_concentration_pct: f64, // 最大单一选项成本占比
    pub cost_variance: f64,              // 各选项单价方差
    pub critical_parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub binding_constraints: Vec<String>,
    pub slacks: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionAnalysis {
    pub feasibility: FeasibilityReport,
    pub cost_breakdown: Vec<CostBreakdownEntry>,
    pub robustness: RobustnessReport,
    pub sensitivity: SensitivityReport,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningReport {
    pub generated_at: DateTime<Utc>,
    pub item_id: String,
    pub solution_status: SolveStatus,
    pub strategy_used: SolverStrategy,
    pub objective_value: f64,
    pub total_cost: Money,
    pub solve_time_ms: u64,
    #[serde(default)]
    pub fallback_reason: Option<String>,
    pub analysis: SolutionAnalysis,
    #[serde(default)]
    pub scenarios: Vec<ScenarioOutcome>,
}

/// 情景: 需求/预算按比例变化后重新求解
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub demand_factor: f64,
    #[serde(default)]
    pub budget_factor: Option<f64>,
}

impl Scenario {
    pub fn new(name: &str, demand_factor: f64, budget_factor: Option<f64>) -> Self {
        Self {
            name: name.to_string(),
            demand_factor,
            budget_factor,
        }
    }

    /// 需求 +10% / 需求 -10% / 预算 -10%
    pub fn standard_set() -> Vec<Scenario> {
        vec![
            Scenario::new("DEMAND_UP_10", 1.10, None),
            Scenario::new("DEMAND_DOWN_10", 0.90, None),
            Scenario::new("BUDGET_DOWN_10", 1.0, Some(0.90)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub demand: f64,
    pub feasible: bool,
    pub total_quantity: f64,
    pub total_cost: Money,
    pub cost_delta: Money,
    pub gap_demand: f64,
}

// ==========================================
// ModelAnalyzer
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ModelAnalyzer;

impl ModelAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, result: &SolverResult, constraints: &ConstraintSet) -> SolutionAnalysis {
        SolutionAnalysis {
            feasibility: self.feasibility(result, constraints),
            cost_breakdown: self.cost_breakdown(result),
            robustness: self.robustness(result),
            sensitivity: self.sensitivity(&result.constraint_activity),
            recommendations: self.recommendations(result),
        }
    }

    #[instrument(skip(self, result, constraints), fields(item_id = %result.item_id))]
    pub fn generate_report(&self, result: &SolverResult, constraints: &ConstraintSet) -> PlanningReport {
        let report = PlanningReport {
            generated_at: Utc::now(),
            item_id: result.item_id.clone(),
            solution_status: result.status,
            strategy_used: result.strategy_used,
            objective_value: result.objective_value,
            total_cost: result.solution.total_cost,
            solve_time_ms: result.solve_time_ms,
            fallback_reason: result.fallback_reason.clone(),
            analysis: self.analyze(result, constraints),
            scenarios: Vec::new(),
        };
        info!(
            feasible = report.analysis.feasibility.is_feasible,
            recommendations = report.analysis.recommendations.len(),
            "分析报告已生成"
        );
        report
    }

    /// 可行性: 需求缺口 + 预算超支
    pub fn feasibility(&self, result: &SolverResult, constraints: &ConstraintSet) -> FeasibilityReport {
        let mut violations = Vec::new();
        let mut reasons = Vec::new();
        let gap = result.solution.gap_demand;

        if gap > 1e-6 {
            violations.push("DEMAND_NOT_COVERED".to_string());
            reasons.push(format!("需求未覆盖: 缺口 {:.2} 单位", gap));
        }
        if let Some(budget) = constraints.available_budget() {
            // 每条分配允许 0.01 的金额舍入误差
            let tolerance = money_from_f64(0.01 * result.solution.selected.len() as f64);
            if result.solution.total_cost > budget + tolerance {
                violations.push("BUDGET_EXCEEDED".to_string());
                reasons.push(format!(
                    "预算超支: {} > {}",
                    result.solution.total_cost, budget
                ));
            }
        }

        FeasibilityReport {
            is_feasible: violations.is_empty(),
            feasibility_gap: gap,
            constraint_violations: violations,
            infeasibility_reasons: reasons,
        }
    }

    /// 成本构成，按总成本降序
    pub fn cost_breakdown(&self, result: &SolverResult) -> Vec<CostBreakdownEntry> {
        let total = result.solution.total_cost;
        let mut entries: Vec<CostBreakdownEntry> = result
            .solution
            .selected
            .iter()
            .map(|s| CostBreakdownEntry {
                option_id: s.option_id.clone(),
                supplier_id: s.supplier_id.clone(),
                quantity: s.quantity,
                unit_cost: s.unit_cost,
                total_cost: s.cost,
                cost_percentage: share_pct(s.cost, total),
            })
            .collect();
        entries.sort_by(|a, b| b.total_cost.cmp(&a.total_cost).then_with(|| a.option_id.cmp(&b.option_id)));
        entries
    }

    pub fn robustness(&self, result: &SolverResult) -> RobustnessReport {
        let selected = &result.solution.selected;
        let total = result.solution.total_cost;
        let concentration = selected
            .iter()
            .map(|s| share_pct(s.cost, total))
            .fold(0.0, f64::max);

        let unit_costs: Vec<f64> = selected.iter().map(|s| money_to_f64(s.unit_cost)).collect();
        let cost_variance = crate::stats::sample_std_dev(&unit_costs).powi(2);

        let mut critical = Vec::new();
        if !selected.is_empty() && selected.len() <= 2 {
            critical.push("supplier_selection".to_string());
        }
        for activity in result.constraint_activity.iter().filter(|a| a.binding) {
            if activity.name != "DEMAND" {
                critical.push(activity.name.to_lowercase());
            }
        }

        RobustnessReport {
            num_options: selected.len(),
            num_suppliers: result.solution.suppliers().len(),
            supplier_concentration_pct: concentration,
            cost_variance,
            critical_parameters: critical,
        }
    }

    /// 紧约束（松弛≈0）与全部松弛量
    pub fn sensitivity(&self, activity: &[ConstraintActivity]) -> SensitivityReport {
        SensitivityReport {
            binding_constraints: activity
                .iter()
                .filter(|a| a.binding)
                .map(|a| a.name.clone())
                .collect(),
            slacks: activity.iter().map(|a| (a.name.clone(), a.slack)).collect(),
        }
    }

    pub fn recommendations(&self, result: &SolverResult) -> Vec<String> {
        let mut out = Vec::new();
        let solution = &result.solution;

        if solution.selected.is_empty() {
            out.push("未找到可行组合，请检查约束或考虑加急/放宽条件".to_string());
            return out;
        }
        if solution.selected.len() == 1 || solution.suppliers().len() == 1 {
            out.push("单一来源供货，建议引入第 2 家供应商以分散风险".to_string());
        }
        let concentration = self.robustness(result).supplier_concentration_pct;
        if solution.selected.len() > 1 && concentration >= CONCENTRATION_ALERT_PCT {
            out.push(format!("成本集中度 {:.0}%，供应依赖单一选项", concentration));
        }
        if solution.gap_demand > 1e-6 {
            out.push(format!(
                "库存与供应不足，缺口 {:.2} 单位，建议评估紧急采购",
                solution.gap_demand
            ));
        }
        if result.strategy_used.is_heuristic() {
            out.push("结果来自启发式求解，时间允许时建议以精确求解复核".to_string());
        }
        if let Some(reason) = &result.fallback_reason {
            out.push(format!("精确求解已降级: {}", reason));
        }
        out
    }

    /// 情景分析: 按情景调整需求/预算后重新求解
    pub fn scenario_analysis(
        &self,
        manager: &SolverManager,
        base: &SolverResult,
        candidates: &[PortfolioCandidate],
        constraints: &ConstraintSet,
        scenarios: &[Scenario],
    ) -> PlannerResult<Vec<ScenarioOutcome>> {
        let mut outcomes = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let demand = base.solution.demand * scenario.demand_factor;
            let mut adjusted = constraints.clone();
            for d in adjusted.demand.iter_mut() {
                d.quantity_required = demand;
            }
            if let Some(factor) = scenario.budget_factor {
                for b in adjusted.budget.iter_mut() {
                    b.total_budget = (b.total_budget * money_from_f64(factor))
                        .round_dp(crate::domain::money::MONEY_SCALE);
                }
            }

            let result = manager.solve_with(
                base.strategy_requested,
                &base.item_id,
                demand,
                candidates,
                &adjusted,
            )?;
            outcomes.push(ScenarioOutcome {
                name: scenario.name.clone(),
                demand,
                feasible: result.success,
                total_quantity: result.solution.total_quantity,
                total_cost: result.solution.total_cost,
                cost_delta: result.solution.total_cost - base.solution.total_cost,
                gap_demand: result.solution.gap_demand,
            });
        }
        Ok(outcomes)
    }

    // ==========================================
    // 导出
    // ==========================================

    pub fn to_json(&self, report: &PlanningReport) -> PlannerResult<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    pub fn write_json(&self, report: &PlanningReport, path: &Path) -> PlannerResult<()> {
        std::fs::write(path, self.to_json(report)?)?;
        info!(path = %path.display(), "JSON 报告已导出");
        Ok(())
    }

    pub fn write_html(&self, report: &PlanningReport, path: &Path) -> PlannerResult<()> {
        std::fs::write(path, self.to_html(report))?;
        info!(path = %path.display(), "HTML 报告已导出");
        Ok(())
    }

    pub fn to_html(&self, report: &PlanningReport) -> String {
        let analysis = &report.analysis;
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(html, "<title>寻源计划报告 - {}</title>", escape(&report.item_id));
        html.push_str(
            "<style>body{font-family:Arial,sans-serif;margin:20px}table{border-collapse:collapse;width:100%}\
             th,td{border:1px solid #ddd;padding:6px;text-align:left}th{background:#f2f2f2}\
             .ok{color:#2e7d32}.bad{color:#c62828}</style>\n</head>\n<body>\n",
        );

        let _ = writeln!(html, "<h1>寻源计划报告: {}</h1>", escape(&report.item_id));
        let _ = writeln!(
            html,
            "<p>生成时间: {} | 状态: {:?} | 策略: {} | 总成本: {} | 耗时: {} ms</p>",
            report.generated_at.to_rfc3339(),
            report.solution_status,
            report.strategy_used,
            report.total_cost,
            report.solve_time_ms
        );

        let (class, label) = if analysis.feasibility.is_feasible {
            ("ok", "可行")
        } else {
            ("bad", "不可行")
        };
        let _ = writeln!(html, "<h2>可行性</h2>\n<p class=\"{}\">{}</p>", class, label);
        if !analysis.feasibility.infeasibility_reasons.is_empty() {
            html.push_str("<ul>\n");
            for reason in &analysis.feasibility.infeasibility_reasons {
                let _ = writeln!(html, "<li>{}</li>", escape(reason));
            }
            html.push_str("</ul>\n");
        }

        html.push_str("<h2>成本构成</h2>\n<table>\n<tr><th>选项</th><th>供应商</th><th>数量</th><th>单价</th><th>总成本</th><th>占比</th></tr>\n");
        for entry in &analysis.cost_breakdown {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{:.2}</td><td>{}</td><td>{}</td><td>{:.1}%</td></tr>",
                escape(&entry.option_id),
                escape(entry.supplier_id.as_deref().unwrap_or("-")),
                entry.quantity,
                entry.unit_cost,
                entry.total_cost,
                entry.cost_percentage
            );
        }
        html.push_str("</table>\n");

        let robustness = &analysis.robustness;
        let _ = writeln!(
            html,
            "<h2>鲁棒性</h2>\n<p>选项数: {} | 供应商数: {} | 集中度: {:.1}%</p>",
            robustness.num_options, robustness.num_suppliers, robustness.supplier_concentration_pct
        );

        if !analysis.sensitivity.binding_constraints.is_empty() {
            html.push_str("<h2>紧约束</h2>\n<ul>\n");
            for name in &analysis.sensitivity.binding_constraints {
                let _ = writeln!(html, "<li>{}</li>", escape(name));
            }
            html.push_str("</ul>\n");
        }

        if !report.scenarios.is_empty() {
            html.push_str("<h2>情景分析</h2>\n<table>\n<tr><th>情景</th><th>需求</th><th>可行</th><th>总成本</th><th>成本变化</th></tr>\n");
            for s in &report.scenarios {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{:.2}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape(&s.name),
                    s.demand,
                    if s.feasible { "是" } else { "否" },
                    s.total_cost,
                    s.cost_delta
                );
            }
            html.push_str("</table>\n");
        }

        html.push_str("<h2>建议</h2>\n<ul>\n");
        for rec in &analysis.recommendations {
            let _ = writeln!(html, "<li>{}</li>", escape(rec));
        }
        html.push_str("</ul>\n</body>\n</html>\n");
        html
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
