// ==========================================
// 供应链计划引擎 - 求解器管理
// ==========================================
// 职责: 按策略求解单物料组合 (精确 / 贪心 / 贪心+局部搜索)
// 红线: 精确求解失败/超时不向调用方报错，降级为贪心并记录原因
// 红线: 批量求解各物料相互独立
// ==========================================

use super::constraints::ConstraintSet;
use super::formulation::{
    constraint_activity, prepare_candidates, ConstraintActivity, ExcludedCandidate,
    OptimizationModel, PortfolioCandidate, PortfolioSolution,
};
use super::solver::{BranchAndBoundSolver, ExactSolver, MipStatus, SolveLimits, SolverError};
use crate::config::SolverConfig;
use crate::domain::money::{money_from_f64, money_to_f64, Money};
use crate::error::{PlannerError, PlannerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const QTY_EPS: f64 = 1e-6;

// ==========================================
// SolverStrategy
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverStrategy {
    Exact,
    Greedy,
    #[serde(alias = "GREEDY_REOPT")]
    GreedyWithReopt,
}

impl SolverStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverStrategy::Exact => "EXACT",
            SolverStrategy::Greedy => "GREEDY",
            SolverStrategy::GreedyWithReopt => "GREEDY_WITH_REOPT",
        }
    }

    pub fn is_heuristic(&self) -> bool {
        !matches!(self, SolverStrategy::Exact)
    }
}

impl Default for SolverStrategy {
    fn default() -> Self {
        SolverStrategy::Exact
    }
}

impl fmt::Display for SolverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SolverStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "EXACT" | "MIP" => Ok(SolverStrategy::Exact),
            "GREEDY" => Ok(SolverStrategy::Greedy),
            "GREEDY_WITH_REOPT" | "GREEDY_REOPT" => Ok(SolverStrategy::GreedyWithReopt),
            other => Err(format!("未知求解策略: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Partial,
    Infeasible,
}

// ==========================================
// SolverResult
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverResult {
    pub item_id: String,
    pub success: bool, // 需求是否满足
    pub status: SolveStatus,
    pub strategy_requested: SolverStrategy,
    pub strategy_used: SolverStrategy,
    pub objective_value: f64,
    pub solution: PortfolioSolution,
    pub solve_time_ms: u64,
    pub iterations: u64,
    #[serde(default)]
    pub gap: Option<f64>,
    #[serde(default)]
    pub fallback_reason: Option<String>,
    #[serde(default)]
    pub excluded: Vec<ExcludedCandidate>,
    #[serde(default)]
    pub constraint_activity: Vec<ConstraintActivity>,
}

impl SolverResult {
    pub fn total_cost(&self) -> Money {
        self.solution.total_cost
    }

    pub fn used_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// 批量结果汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub num_items: usize,
    pub num_feasible: usize,
    pub total_cost: Money,
    pub avg_cost_per_item: Money,
    pub feasibility_rate: f64,
    pub strategies: BTreeMap<String, usize>,
}

// ==========================================
// SolverManager
// ==========================================
#[derive(Clone)]
pub struct SolverManager {
    config: SolverConfig,
    exact: Arc<dyn ExactSolver>,
}

impl fmt::Debug for SolverManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolverManager")
            .field("config", &self.config)
            .field("exact", &self.exact.name())
            .finish()
    }
}

impl Default for SolverManager {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl SolverManager {
    pub fn new(config: SolverConfig) -> Self {
        Self::with_exact_solver(config, Arc::new(BranchAndBoundSolver::new()))
    }

    /// 替换精确求解后端
    pub fn with_exact_solver(config: SolverConfig, exact: Arc<dyn ExactSolver>) -> Self {
        Self { config, exact }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn limits(&self) -> SolveLimits {
        SolveLimits {
            time_limit: Duration::from_secs(self.config.time_limit_seconds),
            gap_tolerance: self.config.gap_tolerance,
            max_nodes: self.config.max_nodes,
            max_simplex_iterations: self.config.max_simplex_iterations,
        }
    }

    /// 按配置策略求解
    pub fn solve(
        &self,
        item_id: &str,
        demand: f64,
        candidates: &[PortfolioCandidate],
        constraints: &ConstraintSet,
    ) -> PlannerResult<SolverResult> {
        self.solve_with(self.config.strategy, item_id, demand, candidates, constraints)
    }

    /// 按指定策略求解
    ///
    /// # 返回
    /// - Err: 仅输入校验失败（需求非正、物料号为空）
    /// - Ok: 含不可行结果（success = false，gap_demand > 0）
    #[instrument(skip(self, candidates, constraints), fields(candidates = candidates.len()))]
    pub fn solve_with(
        &self,
        strategy: SolverStrategy,
        item_id: &str,
        demand: f64,
        candidates: &[PortfolioCandidate],
        constraints: &ConstraintSet,
    ) -> PlannerResult<SolverResult> {
        if item_id.trim().is_empty() {
            return Err(PlannerError::MissingField("item_id"));
        }
        if !(demand > 0.0) || !demand.is_finite() {
            return Err(PlannerError::InvalidInput(format!(
                "需求数量必须 > 0: item_id={}, demand={}",
                item_id, demand
            )));
        }

        let started = Instant::now();
        let mut result = match strategy {
            SolverStrategy::Exact => self.solve_exact(item_id, demand, candidates, constraints),
            SolverStrategy::Greedy => self.solve_greedy(item_id, demand, candidates, constraints, false),
            SolverStrategy::GreedyWithReopt => self.solve_greedy(item_id, demand, candidates, constraints, true),
        };
        result.strategy_requested = strategy;
        result.solve_time_ms = started.elapsed().as_millis() as u64;
        result.constraint_activity = constraint_activity(&result.solution, constraints);

        info!(
            item_id,
            strategy = %result.strategy_used,
            status = ?result.status,
            total_quantity = result.solution.total_quantity,
            total_cost = money_to_f64(result.solution.total_cost),
            gap_demand = result.solution.gap_demand,
            elapsed_ms = result.solve_time_ms,
            "组合求解完成"
        );
        Ok(result)
    }

    fn solve_exact(
        &self,
        item_id: &str,
        demand: f64,
        candidates: &[PortfolioCandidate],
        constraints: &ConstraintSet,
    ) -> SolverResult {
        let model = OptimizationModel::build(item_id, demand, candidates, constraints);
        match self.exact.solve(&model.problem, &self.limits()) {
            Ok(mip) => {
                let solution = model.interpret(&mip.values);
                let status = match mip.status {
                    MipStatus::Optimal => SolveStatus::Optimal,
                    MipStatus::Feasible => SolveStatus::Feasible,
                };
                SolverResult {
                    item_id: item_id.to_string(),
                    success: solution.demand_met(),
                    status,
                    strategy_requested: SolverStrategy::Exact,
                    strategy_used: SolverStrategy::Exact,
                    objective_value: solution.objective_value,
                    solution,
                    solve_time_ms: 0,
                    iterations: mip.nodes_explored,
                    gap: Some(mip.gap),
                    fallback_reason: None,
                    excluded: model.excluded,
                    constraint_activity: Vec::new(),
                }
            }
            Err(err) => {
                match &err {
                    SolverError::Infeasible => {
                        info!(item_id, solver = self.exact.name(), "精确模型不可行，改用贪心求最大覆盖")
                    }
                    other => warn!(
                        item_id,
                        solver = self.exact.name(),
                        error = %other,
                        "精确求解失败，降级为贪心"
                    ),
                }
                let mut result = self.solve_greedy(item_id, demand, candidates, constraints, false);
                result.fallback_reason = Some(err.to_string());
                result
            }
        }
    }

    /// 贪心（可选局部搜索）
    ///
    /// # 规则
    /// - 按单位系数升序取量，系数相同按选项号
    /// - 同批次候选按 FEFO 消耗顺序重排
    /// - 受库位容量、预算与 one-in 限制
    /// - one-in 存在时逐个尝试允许供应商（至多 greedy_iterations 次），取覆盖量最大、成本最低者
    fn solve_greedy(
        &self,
        item_id: &str,
        demand: f64,
        candidates: &[PortfolioCandidate],
        constraints: &ConstraintSet,
        reopt: bool,
    ) -> SolverResult {
        let (admitted, excluded) = prepare_candidates(candidates, constraints);
        let order = greedy_order(&admitted, constraints);

        // one-in 供应商选择的候选方案
        let mut supplier_choices: Vec<Option<String>> = vec![None];
        if let Some(one_in) = constraints.one_in.first() {
            let mut seen: Vec<String> = Vec::new();
            for &i in &order {
                if let Some(s) = admitted[i].supplier_id.as_deref() {
                    if one_in.covers(s) && !seen.iter().any(|x| x == s) {
                        seen.push(s.to_string());
                    }
                }
            }
            if !seen.is_empty() {
                supplier_choices = seen.into_iter().map(Some).collect();
            }
        }

        let max_passes = (self.config.greedy_iterations.max(1)) as usize;
        let mut best: Option<Vec<f64>> = None;
        let mut passes = 0_u64;
        for choice in supplier_choices.iter().take(max_passes) {
            passes += 1;
            let quantities = greedy_fill(&admitted, &order, demand, constraints, choice.as_deref());
            let better = match &best {
                None => true,
                Some(current) => {
                    let (q_new, c_new) = totals(&admitted, &quantities);
                    let (q_old, c_old) = totals(&admitted, current);
                    q_new > q_old + QTY_EPS || ((q_new - q_old).abs() <= QTY_EPS && c_new < c_old - 1e-9)
                }
            };
            if better {
                best = Some(quantities);
            }
        }
        let mut quantities = best.unwrap_or_else(|| vec![0.0; admitted.len()]);

        let mut iterations = passes;
        let strategy_used = if reopt {
            iterations += local_search(&admitted, &mut quantities, constraints, self.config.reopt_max_iterations);
            SolverStrategy::GreedyWithReopt
        } else {
            SolverStrategy::Greedy
        };

        let solution = PortfolioSolution::from_allocations(
            item_id,
            demand,
            admitted.iter().zip(quantities.iter().copied()),
        );
        let status = if solution.demand_met() {
            SolveStatus::Feasible
        } else if solution.total_quantity > QTY_EPS {
            SolveStatus::Partial
        } else {
            SolveStatus::Infeasible
        };

        debug!(item_id, passes, iterations, status = ?status, "贪心求解完成");
        SolverResult {
            item_id: item_id.to_string(),
            success: solution.demand_met(),
            status,
            strategy_requested: strategy_used,
            strategy_used,
            objective_value: solution.objective_value,
            solution,
            solve_time_ms: 0,
            iterations,
            gap: None,
            fallback_reason: None,
            excluded,
            constraint_activity: Vec::new(),
        }
    }

    /// 批量求解（顺序）
    ///
    /// # 参数
    /// - requests: (物料号, 需求, 候选, 约束)
    pub fn batch_solve(&self, requests: &[BatchItem]) -> Vec<PlannerResult<SolverResult>> {
        requests
            .iter()
            .map(|r| self.solve(&r.item_id, r.demand, &r.candidates, &r.constraints))
            .collect()
    }

    /// 批量求解（tokio 阻塞线程池并行，结果顺序与输入一致）
    pub async fn batch_solve_parallel(&self, requests: Vec<BatchItem>) -> Vec<PlannerResult<SolverResult>> {
        let handles: Vec<_> = requests
            .into_iter()
            .map(|r| {
                let manager = self.clone();
                tokio::task::spawn_blocking(move || {
                    manager.solve(&r.item_id, r.demand, &r.candidates, &r.constraints)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            results.push(joined.unwrap_or_else(|e| {
                Err(PlannerError::Other(anyhow::anyhow!("批量求解任务异常: {}", e)))
            }));
        }
        results
    }

    /// 组合汇总（仅统计成功求解的结果）
    pub fn portfolio_summary(results: &[SolverResult]) -> PortfolioSummary {
        let num_items = results.len();
        let num_feasible = results.iter().filter(|r| r.success).count();
        let total_cost: Money = results.iter().map(|r| r.solution.total_cost).sum();
        let avg_cost_per_item = if num_items > 0 {
            (total_cost / Money::from(num_items as u64)).round_dp(crate::domain::money::MONEY_SCALE)
        } else {
            Money::ZERO
        };
        let mut strategies = BTreeMap::new();
        for r in results {
            *strategies.entry(r.strategy_used.to_string()).or_insert(0) += 1;
        }
        PortfolioSummary {
            num_items,
            num_feasible,
            total_cost,
            avg_cost_per_item,
            feasibility_rate: if num_items > 0 {
                num_feasible as f64 / num_items as f64
            } else {
                0.0
            },
            strategies,
        }
    }
}

/// 批量求解条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub item_id: String,
    pub demand: f64,
    pub candidates: Vec<PortfolioCandidate>,
    #[serde(default)]
    pub constraints: ConstraintSet,
}

// ==========================================
// 贪心内部
// ==========================================

/// 按系数升序；带 FEFO 排名的批次在其占据的位置上按消耗顺序重排
fn greedy_order(candidates: &[PortfolioCandidate], constraints: &ConstraintSet) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[a]
            .cte
            .total_cmp(&candidates[b].cte)
            .then_with(|| candidates[a].option_id.cmp(&candidates[b].option_id))
    });

    let rank = |i: usize| {
        candidates[i]
            .lot_number
            .as_deref()
            .and_then(|lot| constraints.fefo_rank(lot))
    };
    let slots: Vec<usize> = (0..order.len()).filter(|&p| rank(order[p]).is_some()).collect();
    let mut lots: Vec<usize> = slots.iter().map(|&p| order[p]).collect();
    lots.sort_by_key(|&i| rank(i));
    for (slot, lot) in slots.into_iter().zip(lots) {
        order[slot] = lot;
    }
    order
}

fn greedy_fill(
    candidates: &[PortfolioCandidate],
    order: &[usize],
    demand: f64,
    constraints: &ConstraintSet,
    chosen_supplier: Option<&str>,
) -> Vec<f64> {
    let mut quantities = vec![0.0; candidates.len()];
    let mut remaining = demand;
    let mut capacity_left: BTreeMap<&str, f64> = constraints
        .capacity
        .iter()
        .map(|c| (c.location_id.as_str(), c.available_capacity()))
        .collect();
    let mut budget_left: Option<Money> = constraints.available_budget();

    for &i in order {
        if remaining <= QTY_EPS {
            break;
        }
        let candidate = &candidates[i];

        if let (Some(one_in), Some(supplier)) = (constraints.one_in.first(), candidate.supplier_id.as_deref()) {
            if one_in.covers(supplier) && chosen_supplier.map_or(false, |c| c != supplier) {
                continue;
            }
        }

        // 整件选项只能整取，允许超出剩余需求
        let mut take = if candidate.is_binary() {
            candidate.max_qty
        } else {
            remaining.min(candidate.max_qty)
        };
        if let Some(loc) = candidate.location_id.as_deref() {
            if let Some(left) = capacity_left.get(loc) {
                take = take.min(*left);
            }
        }
        if let Some(budget) = budget_left {
            let unit = money_to_f64(candidate.unit_cost);
            if unit > 0.0 {
                take = take.min(money_to_f64(budget) / unit);
            }
        }
        if candidate.is_binary() && take + QTY_EPS < candidate.max_qty {
            continue;
        }
        if take <= QTY_EPS {
            continue;
        }

        quantities[i] = take;
        remaining -= take;
        if let Some(left) = candidate.location_id.as_deref().and_then(|loc| capacity_left.get_mut(loc)) {
            *left -= take;
        }
        if let Some(budget) = budget_left.as_mut() {
            *budget -= money_from_f64(money_to_f64(candidate.unit_cost) * take);
            if *budget < Money::ZERO {
                *budget = Money::ZERO;
            }
        }
    }
    quantities
}

fn fefo_ranked(candidate: &PortfolioCandidate, constraints: &ConstraintSet) -> bool {
    candidate
        .lot_number
        .as_deref()
        .and_then(|lot| constraints.fefo_rank(lot))
        .is_some()
}

fn totals(candidates: &[PortfolioCandidate], quantities: &[f64]) -> (f64, f64) {
    let qty = quantities.iter().sum();
    let objective = candidates.iter().zip(quantities).map(|(c, q)| c.cte * q).sum();
    (qty, objective)
}

/// 局部搜索: 把高系数已选项的数量转移到低系数已选项的剩余余量上
///
/// # 返回
/// 实际执行的改进轮数
fn local_search(
    candidates: &[PortfolioCandidate],
    quantities: &mut [f64],
    constraints: &ConstraintSet,
    max_iterations: u32,
) -> u64 {
    let mut rounds = 0_u64;
    for _ in 0..max_iterations {
        let selected: Vec<usize> = (0..candidates.len()).filter(|&i| quantities[i] > QTY_EPS).collect();
        let mut best_move: Option<(usize, usize, f64, f64)> = None; // (from, to, qty, 改进量)

        for &from in &selected {
            for &to in &selected {
                if from == to || candidates[to].cte >= candidates[from].cte - 1e-12 {
                    continue;
                }
                if candidates[to].is_binary() || candidates[from].is_binary() {
                    continue;
                }
                // 批次之间不转移，保持 FEFO 消耗顺序
                if fefo_ranked(&candidates[from], constraints) && fefo_ranked(&candidates[to], constraints) {
                    continue;
                }
                let mut shift = quantities[from].min(candidates[to].max_qty - quantities[to]);
                if candidates[to].location_id != candidates[from].location_id {
                    if let Some(loc) = candidates[to].location_id.as_deref() {
                        if let Some(cap) = constraints.capacity_for(loc) {
                            let used: f64 = (0..candidates.len())
                                .filter(|&k| candidates[k].location_id.as_deref() == Some(loc))
                                .map(|k| quantities[k])
                                .sum();
                            shift = shift.min(cap.available_capacity() - used);
                        }
                    }
                }
                if let Some(budget) = constraints.available_budget() {
                    let delta_unit =
                        money_to_f64(candidates[to].unit_cost) - money_to_f64(candidates[from].unit_cost);
                    if delta_unit > 0.0 {
                        let spent: f64 = (0..candidates.len())
                            .map(|k| money_to_f64(candidates[k].unit_cost) * quantities[k])
                            .sum();
                        shift = shift.min((money_to_f64(budget) - spent) / delta_unit);
                    }
                }
                if shift <= QTY_EPS {
                    continue;
                }
                let improvement = (candidates[from].cte - candidates[to].cte) * shift;
                if best_move.map_or(true, |(_, _, _, best)| improvement > best) {
                    best_move = Some((from, to, shift, improvement));
                }
            }
        }

        let Some((from, to, shift, improvement)) = best_move else {
            break;
        };
        quantities[from] -= shift;
        quantities[to] += shift;
        rounds += 1;
        debug!(
            from = %candidates[from].option_id,
            to = %candidates[to].option_id,
            shift,
            improvement,
            "局部搜索转移数量"
        );
    }
    rounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::optimization::{ConstraintBuilder, FefoBatch};

    #[test]
    fn test_strategy_parsing_accepts_aliases() {
        assert_eq!("exact".parse::<SolverStrategy>().unwrap(), SolverStrategy::Exact);
        assert_eq!("greedy-with-reopt".parse::<SolverStrategy>().unwrap(), SolverStrategy::GreedyWithReopt);
        assert_eq!("GREEDY_REOPT".parse::<SolverStrategy>().unwrap(), SolverStrategy::GreedyWithReopt);
        assert!("simulated_annealing".parse::<SolverStrategy>().is_err());
    }

    #[test]
    fn test_local_search_shifts_to_cheaper_selected_option() {
        let candidates = vec![
            PortfolioCandidate::new("CHEAP", "ITEM-001", 10.0, Money::from(10), 100.0),
            PortfolioCandidate::new("DEAR", "ITEM-001", 20.0, Money::from(20), 100.0),
        ];
        let mut quantities = vec![10.0, 40.0];
        let rounds = local_search(&candidates, &mut quantities, &ConstraintSet::default(), 5);

        assert_eq!(rounds, 1);
        assert!((quantities[0] - 50.0).abs() < 1e-9);
        assert!(quantities[1].abs() < 1e-9);
    }

    #[test]
    fn test_local_search_keeps_fefo_lots_in_place() {
        let constraints = ConstraintBuilder::new()
            .add_fefo(
                "ITEM-001",
                vec![
                    FefoBatch {
                        batch_id: "LOT-A".to_string(),
                        expiration_date: None,
                        receipt_date: None,
                        quantity: 100.0,
                    },
                    FefoBatch {
                        batch_id: "LOT-B".to_string(),
                        expiration_date: None,
                        receipt_date: None,
                        quantity: 100.0,
                    },
                ],
            )
            .build();
        let candidates = vec![
            PortfolioCandidate::new("OPT-A", "ITEM-001", 10.0, Money::from(10), 100.0).with_lot("LOT-A"),
            PortfolioCandidate::new("OPT-B", "ITEM-001", 20.0, Money::from(20), 100.0).with_lot("LOT-B"),
        ];
        let mut quantities = vec![10.0, 40.0];
        let rounds = local_search(&candidates, &mut quantities, &constraints, 5);

        assert_eq!(rounds, 0);
        assert_eq!(quantities, vec![10.0, 40.0]);
    }

    #[test]
    fn test_local_search_respects_budget() {
        let constraints = ConstraintBuilder::new()
            .add_budget(Money::from(1000), "EUR", 0.0)
            .unwrap()
            .build();
        // 低系数选项单价更高: 每转移 1 单位预算 +10
        let candidates = vec![
            PortfolioCandidate::new("LOW_CTE", "ITEM-001", 10.0, Money::from(20), 100.0),
            PortfolioCandidate::new("HIGH_CTE", "ITEM-001", 20.0, Money::from(10), 100.0),
        ];
        let mut quantities = vec![0.0001, 60.0]; // 已花费 ≈ 600
        local_search(&candidates, &mut quantities, &constraints, 5);

        let spent = 20.0 * quantities[0] + 10.0 * quantities[1];
        assert!(spent <= 1000.0 + 1e-6);
        assert!((quantities[0] - 40.0).abs() < 1e-3);
    }
}
