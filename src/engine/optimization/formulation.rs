// ==========================================
// 供应链计划引擎 - 组合优化模型
// ==========================================
// 职责: 候选选项预筛 + 混合整数规划建模 + 解释求解结果
// 模型: min Σ c_i·q_i·x_i
//       s.t. Σ q_i·x_i ≥ demand
//            Σ_{loc} q_i·x_i ≤ 库位可用容量
//            Σ cost_i·q_i·x_i ≤ 可用预算
//            one-in 供应商至多选一
// 变量: 可供量 < 1.5 视为 0/1 选择 (q_i = max_qty)，否则连续 (q_i = 1)
// ==========================================

use super::constraints::{ConstraintSet, ConstraintType};
use super::simplex::{LinearProgram, LinearRow, RowSense};
use super::solver::MipProblem;
use crate::domain::money::{extend, money_to_f64, Money};
use crate::domain::{SelectedAllocation, SourcingOption, SourcingPathType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

const BINARY_THRESHOLD: f64 = 1.5;
const QTY_EPS: f64 = 1e-6;

// ==========================================
// PortfolioCandidate - 求解器输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioCandidate {
    pub option_id: String,
    pub item_id: String,
    pub path_type: SourcingPathType,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub lot_number: Option<String>,

    // ===== 目标 =====
    pub cte: f64,                // 单位目标系数（越小越优）
    #[serde(default)]
    pub cte_score: Option<f64>,  // 原始 CTE 综合分 [0,1]
    pub unit_cost: Money,

    // ===== 供给 =====
    pub max_qty: f64,
    #[serde(default)]
    pub lead_time_days: f64,
    #[serde(default)]
    pub on_time_probability: Option<f64>,
}

impl PortfolioCandidate {
    pub fn new(option_id: &str, item_id: &str, cte: f64, unit_cost: Money, max_qty: f64) -> Self {
        Self {
            option_id: option_id.to_string(),
            item_id: item_id.to_string(),
            path_type: SourcingPathType::Purchase,
            supplier_id: None,
            location_id: None,
            lot_number: None,
            cte,
            cte_score: None,
            unit_cost,
            max_qty,
            lead_time_days: 0.0,
            on_time_probability: None,
        }
    }

    /// 由寻源选项构造
    ///
    /// # 参数
    /// - coefficient: 单位目标系数
    /// - cte_score: CTE 综合分（无评分时为 None）
    pub fn from_option(option: &SourcingOption, coefficient: f64, cte_score: Option<f64>) -> Self {
        Self {
            option_id: option.option_id.clone(),
            item_id: option.item_id.clone(),
            path_type: option.sourcing_path,
            supplier_id: option.supplier_id.clone(),
            location_id: option.location_id.clone(),
            lot_number: option.lot_number.clone(),
            cte: coefficient,
            cte_score,
            unit_cost: option.total_cost_per_unit(),
            max_qty: option.max_quantity(),
            lead_time_days: option.lead_time_days_mean,
            on_time_probability: None,
        }
    }

    pub fn with_supplier(mut self, supplier_id: &str) -> Self {
        self.supplier_id = Some(supplier_id.to_string());
        self
    }

    pub fn with_location(mut self, location_id: &str) -> Self {
        self.location_id = Some(location_id.to_string());
        self
    }

    pub fn with_lot(mut self, lot_number: &str) -> Self {
        self.lot_number = Some(lot_number.to_string());
        self
    }

    pub fn with_path(mut self, path_type: SourcingPathType) -> Self {
        self.path_type = path_type;
        self
    }

    pub fn is_binary(&self) -> bool {
        self.max_qty < BINARY_THRESHOLD
    }
}

/// 预筛阶段被排除的候选
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedCandidate {
    pub option_id: String,
    pub constraint: ConstraintType,
    pub detail: String,
}

/// 预筛: 交期/服务水平不满足的候选排除；叠加偏好惩罚与调拨成本
///
/// # 返回
/// (准入候选, 排除清单)
pub fn prepare_candidates(
    candidates: &[PortfolioCandidate],
    constraints: &ConstraintSet,
) -> (Vec<PortfolioCandidate>, Vec<ExcludedCandidate>) {
    let min_service_level = constraints.min_service_level();
    let mut admitted = Vec::with_capacity(candidates.len());
    let mut excluded = Vec::new();

    for candidate in candidates {
        if let Some(lt) = constraints.lead_time_for(&candidate.option_id) {
            if !lt.is_met() {
                excluded.push(ExcludedCandidate {
                    option_id: candidate.option_id.clone(),
                    constraint: ConstraintType::LeadTime,
                    detail: format!(
                        "服务水平交期 {:.1} 天 > 剩余 {:.0} 天",
                        lt.sl_lead_time_days(),
                        lt.days_available()
                    ),
                });
                continue;
            }
        }
        if let (Some(min_sl), Some(p)) = (min_service_level, candidate.on_time_probability) {
            if p < min_sl {
                excluded.push(ExcludedCandidate {
                    option_id: candidate.option_id.clone(),
                    constraint: ConstraintType::ServiceLevel,
                    detail: format!("准时概率 {:.3} < 服务水平 {:.3}", p, min_sl),
                });
                continue;
            }
        }

        let mut adjusted = candidate.clone();
        adjusted.cte *= constraints.preference_penalty(adjusted.supplier_id.as_deref());
        if let Some(transfer) = adjusted
            .location_id
            .as_deref()
            .and_then(|loc| constraints.transfer_from(loc))
        {
            adjusted.unit_cost += transfer.transfer_cost_per_unit;
            adjusted.cte += money_to_f64(transfer.transfer_cost_per_unit);
            adjusted.lead_time_days += transfer.transfer_lead_time_days as f64;
            if let Some(max) = transfer.max_transfer_qty {
                adjusted.max_qty = adjusted.max_qty.min(max);
            }
        }

        if adjusted.max_qty <= QTY_EPS {
            excluded.push(ExcludedCandidate {
                option_id: candidate.option_id.clone(),
                constraint: ConstraintType::Transfer,
                detail: "可供数量为 0".to_string(),
            });
            continue;
        }
        admitted.push(adjusted);
    }

    (admitted, excluded)
}

// ==========================================
// PortfolioSolution - 组合结果（精确/启发式共用）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedPortfolioOption {
    pub option_id: String,
    pub path_type: SourcingPathType,
    pub supplier_id: Option<String>,
    pub location_id: Option<String>,
    pub quantity: f64,
    pub cte: f64,
    pub unit_cost: Money,
    pub cost: Money,
    pub objective_contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSolution {
    pub item_id: String,
    pub demand: f64,
    pub total_quantity: f64,
    pub total_cost: Money,
    pub objective_value: f64,
    pub selected: Vec<SelectedPortfolioOption>,
    pub gap_demand: f64,
}

impl PortfolioSolution {
    pub fn empty(item_id: &str, demand: f64) -> Self {
        Self {
            item_id: item_id.to_string(),
            demand,
            total_quantity: 0.0,
            total_cost: Money::ZERO,
            objective_value: 0.0,
            selected: Vec::new(),
            gap_demand: demand.max(0.0),
        }
    }

    /// 由 (候选, 数量) 汇总；数量为 0 的条目忽略
    pub fn from_allocations<'a>(
        item_id: &str,
        demand: f64,
        allocations: impl IntoIterator<Item = (&'a PortfolioCandidate, f64)>,
    ) -> Self {
        let mut solution = Self::empty(item_id, demand);
        for (candidate, quantity) in allocations {
            if quantity <= QTY_EPS {
                continue;
            }
            let cost = extend(candidate.unit_cost, quantity);
            let contribution = candidate.cte * quantity;
            solution.selected.push(SelectedPortfolioOption {
                option_id: candidate.option_id.clone(),
                path_type: candidate.path_type,
                supplier_id: candidate.supplier_id.clone(),
                location_id: candidate.location_id.clone(),
                quantity,
                cte: candidate.cte,
                unit_cost: candidate.unit_cost,
                cost,
                objective_contribution: contribution,
            });
            solution.total_quantity += quantity;
            solution.total_cost += cost;
            solution.objective_value += contribution;
        }
        solution.gap_demand = (demand - solution.total_quantity).max(0.0);
        solution
    }

    pub fn demand_met(&self) -> bool {
        self.total_quantity >= self.demand - QTY_EPS
    }

    pub fn suppliers(&self) -> BTreeSet<&str> {
        self.selected
            .iter()
            .filter_map(|s| s.supplier_id.as_deref())
            .collect()
    }

    pub fn quantity_of(&self, option_id: &str) -> f64 {
        self.selected
            .iter()
            .filter(|s| s.option_id == option_id)
            .map(|s| s.quantity)
            .sum()
    }

    pub fn to_allocations(&self) -> Vec<SelectedAllocation> {
        self.selected
            .iter()
            .map(|s| SelectedAllocation {
                option_id: s.option_id.clone(),
                quantity: s.quantity,
                cost: s.cost,
            })
            .collect()
    }
}

/// 约束活动度（用于敏感性分析）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintActivity {
    pub name: String,
    pub constraint_type: ConstraintType,
    pub activity: f64,
    pub bound: f64,
    pub slack: f64,
    pub binding: bool,
}

impl ConstraintActivity {
    fn new(name: String, constraint_type: ConstraintType, activity: f64, bound: f64, slack: f64) -> Self {
        let tolerance = 1e-6 * bound.abs().max(1.0);
        Self {
            name,
            constraint_type,
            activity,
            bound,
            slack,
            binding: slack.abs() <= tolerance,
        }
    }
}

/// 按业务约束计算结果的活动度与松弛
pub fn constraint_activity(solution: &PortfolioSolution, constraints: &ConstraintSet) -> Vec<ConstraintActivity> {
    let mut rows = Vec::new();

    rows.push(ConstraintActivity::new(
        "DEMAND".to_string(),
        ConstraintType::Demand,
        solution.total_quantity,
        solution.demand,
        solution.total_quantity - solution.demand,
    ));

    for capacity in &constraints.capacity {
        let used: f64 = solution
            .selected
            .iter()
            .filter(|s| s.location_id.as_deref() == Some(capacity.location_id.as_str()))
            .map(|s| s.quantity)
            .sum();
        let bound = capacity.available_capacity();
        rows.push(ConstraintActivity::new(
            format!("CAPACITY:{}", capacity.location_id),
            ConstraintType::Capacity,
            used,
            bound,
            bound - used,
        ));
    }

    if let Some(budget) = constraints.available_budget() {
        let spent = money_to_f64(solution.total_cost);
        let bound = money_to_f64(budget);
        rows.push(ConstraintActivity::new(
            "BUDGET".to_string(),
            ConstraintType::Budget,
            spent,
            bound,
            bound - spent,
        ));
    }

    for one_in in &constraints.one_in {
        let used = solution
            .suppliers()
            .into_iter()
            .filter(|s| one_in.covers(s))
            .count() as f64;
        rows.push(ConstraintActivity::new(
            format!("ONE_IN:{}", one_in.item_id),
            ConstraintType::OneIn,
            used,
            1.0,
            1.0 - used,
        ));
    }

    rows
}

// ==========================================
// OptimizationModel - MIP 建模
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVariable {
    pub name: String,
    pub candidate: Option<usize>, // None = one-in 指示变量
    pub binary: bool,
    pub quantity_per_unit: f64,
}

#[derive(Debug, Clone)]
pub struct OptimizationModel {
    pub item_id: String,
    pub demand: f64,
    pub candidates: Vec<PortfolioCandidate>,
    pub excluded: Vec<ExcludedCandidate>,
    pub variables: Vec<ModelVariable>,
    pub problem: MipProblem,
}

impl OptimizationModel {
    /// 构建模型
    ///
    /// # 参数
    /// - demand: 需求量（> 0，由调用方校验）
    /// - candidates: 已评分候选
    /// - constraints: 约束集
    pub fn build(
        item_id: &str,
        demand: f64,
        candidates: &[PortfolioCandidate],
        constraints: &ConstraintSet,
    ) -> Self {
        let (candidates, excluded) = prepare_candidates(candidates, constraints);

        let mut variables: Vec<ModelVariable> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let binary = c.is_binary();
                ModelVariable {
                    name: format!("x[{}]", c.option_id),
                    candidate: Some(i),
                    binary,
                    quantity_per_unit: if binary { c.max_qty } else { 1.0 },
                }
            })
            .collect();

        // one-in 指示变量: 每个出现在候选中的允许供应商一个
        let mut indicators: Vec<(usize, String, usize)> = Vec::new(); // (约束序号, 供应商, 变量下标)
        for (k, one_in) in constraints.one_in.iter().enumerate() {
            let suppliers: BTreeSet<&str> = candidates
                .iter()
                .filter_map(|c| c.supplier_id.as_deref())
                .filter(|s| one_in.covers(s))
                .collect();
            for supplier in suppliers {
                indicators.push((k, supplier.to_string(), variables.len()));
                variables.push(ModelVariable {
                    name: format!("y[{}:{}]", one_in.item_id, supplier),
                    candidate: None,
                    binary: true,
                    quantity_per_unit: 0.0,
                });
            }
        }

        let n = variables.len();
        let mut objective = vec![0.0; n];
        for (j, v) in variables.iter().enumerate() {
            if let Some(i) = v.candidate {
                objective[j] = candidates[i].cte * v.quantity_per_unit;
            }
        }
        let mut lp = LinearProgram::new(objective);
        for (j, v) in variables.iter().enumerate() {
            lp.upper_bounds[j] = match v.candidate {
                Some(i) if !v.binary => Some(candidates[i].max_qty),
                _ => Some(1.0),
            };
        }

        // 需求
        let demand_row: Vec<f64> = variables.iter().map(|v| v.quantity_per_unit).collect();
        lp.rows.push(LinearRow::new("DEMAND", demand_row, RowSense::Ge, demand));

        // 库位容量
        for capacity in &constraints.capacity {
            let coefficients: Vec<f64> = variables
                .iter()
                .map(|v| match v.candidate {
                    Some(i) if candidates[i].location_id.as_deref() == Some(capacity.location_id.as_str()) => {
                        v.quantity_per_unit
                    }
                    _ => 0.0,
                })
                .collect();
            if coefficients.iter().any(|a| *a != 0.0) {
                lp.rows.push(LinearRow::new(
                    format!("CAPACITY:{}", capacity.location_id),
                    coefficients,
                    RowSense::Le,
                    capacity.available_capacity(),
                ));
            }
        }

        // 预算
        if let Some(budget) = constraints.available_budget() {
            let coefficients: Vec<f64> = variables
                .iter()
                .map(|v| match v.candidate {
                    Some(i) => money_to_f64(candidates[i].unit_cost) * v.quantity_per_unit,
                    None => 0.0,
                })
                .collect();
            lp.rows.push(LinearRow::new("BUDGET", coefficients, RowSense::Le, money_to_f64(budget)));
        }

        // one-in: x_i ≤ U_i·y_s, Σ y_s ≤ 1
        for (k, one_in) in constraints.one_in.iter().enumerate() {
            let group: Vec<&(usize, String, usize)> = indicators.iter().filter(|(c, _, _)| *c == k).collect();
            if group.is_empty() {
                continue;
            }
            for (_, supplier, y) in &group {
                for (j, v) in variables.iter().enumerate() {
                    let Some(i) = v.candidate else { continue };
                    if candidates[i].supplier_id.as_deref() != Some(supplier.as_str()) {
                        continue;
                    }
                    let mut coefficients = vec![0.0; n];
                    coefficients[j] = 1.0;
                    coefficients[*y] = if v.binary { -1.0 } else { -candidates[i].max_qty };
                    lp.rows.push(LinearRow::new(
                        format!("LINK:{}:{}", candidates[i].option_id, supplier),
                        coefficients,
                        RowSense::Le,
                        0.0,
                    ));
                }
            }
            let mut coefficients = vec![0.0; n];
            for (_, _, y) in &group {
                coefficients[*y] = 1.0;
            }
            lp.rows.push(LinearRow::new(
                format!("ONE_IN:{}", one_in.item_id),
                coefficients,
                RowSense::Le,
                1.0,
            ));
        }

        let mut problem = MipProblem::new(lp);
        for (j, v) in variables.iter().enumerate() {
            if v.binary {
                problem.set_integer(j);
            }
        }

        debug!(
            item_id,
            variables = variables.len(),
            rows = problem.lp.rows.len(),
            excluded = excluded.len(),
            "优化模型已构建"
        );

        Self {
            item_id: item_id.to_string(),
            demand,
            candidates,
            excluded,
            variables,
            problem,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_rows(&self) -> usize {
        self.problem.lp.rows.len()
    }

    /// 变量值 → 组合结果
    pub fn interpret(&self, values: &[f64]) -> PortfolioSolution {
        let allocations = self.variables.iter().zip(values).filter_map(|(v, x)| {
            v.candidate
                .map(|i| (&self.candidates[i], (x * v.quantity_per_unit).max(0.0)))
        });
        PortfolioSolution::from_allocations(&self.item_id, self.demand, allocations)
    }
}
