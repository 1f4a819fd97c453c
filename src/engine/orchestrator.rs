// ==========================================
// 供应链计划引擎 - 计划编排器
// ==========================================
// 职责: 单物料计划主流程
//   过滤 → CTE 评分(关键度截断) → 路径决策(参考) → 路径算法修正 → 约束构建 → 组合求解 → 分析报告
// 红线: 过滤拒绝/不可行均以结果表达；仅输入校验失败返回 Err
// ==========================================

use crate::domain::money::{money_to_f64, Money};
use crate::domain::{
    AbcClass, Criticality, InventoryLot, InventorySnapshot, ItemMaster, ResourceCapacity,
    SourcingOption, SourcingPath, SourcingPathType,
};
use crate::engine::algorithms::{AlgorithmContext, AlgorithmInput, AlgorithmOutput, AlgorithmType};
use crate::engine::context::PlanningContext;
use crate::engine::data_source::PlanningDataSource;
use crate::engine::decision::{DecisionInput, DecisionTrace};
use crate::engine::filter::FilterReport;
use crate::engine::optimization::{
    ConstraintBuilder, ConstraintSet, FefoBatch, PlanningReport, PortfolioCandidate, Scenario,
    SolverResult, SolverStrategy,
};
use crate::engine::scoring::{CteScore, CutReport, ScoreWeights, ScoringContext};
use crate::error::{PlannerError, PlannerResult};
use crate::perf::PerfGuard;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// PlanningRequest - 计划请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningRequest {
    // ===== 需求 =====
    pub requisition_id: String,
    pub item_id: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit_of_measure: Option<String>, // None = 物料基本单位
    pub required_date: NaiveDate,
    pub as_of: NaiveDate,

    // ===== 覆盖项（None 时取物料主数据/配置） =====
    #[serde(default)]
    pub criticality: Option<Criticality>,
    #[serde(default)]
    pub abc_class: Option<AbcClass>,
    #[serde(default)]
    pub weights: Option<ScoreWeights>,
    #[serde(default)]
    pub strategy: Option<SolverStrategy>,

    // ===== 约束输入 =====
    #[serde(default)]
    pub budget: Option<Money>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub capacities: Vec<ResourceCapacity>,
    #[serde(default)]
    pub preferred_supplier: Option<SupplierPreference>,

    // ===== 路径算法上下文 =====
    #[serde(default)]
    pub algorithm_context: AlgorithmContext,

    #[serde(default)]
    pub run_scenarios: bool,
}

/// 供应商偏好：非偏好供应商的目标系数乘以惩罚倍数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierPreference {
    pub supplier_id: String,
    pub penalty_multiplier: f64,
}

fn default_currency() -> String {
    "CNY".to_string()
}

impl PlanningRequest {
    pub fn new(requisition_id: &str, item_id: &str, quantity: f64, required_date: NaiveDate, as_of: NaiveDate) -> Self {
        Self {
            requisition_id: requisition_id.to_string(),
            item_id: item_id.to_string(),
            quantity,
            unit_of_measure: None,
            required_date,
            as_of,
            criticality: None,
            abc_class: None,
            weights: None,
            strategy: None,
            budget: None,
            currency: default_currency(),
            capacities: Vec::new(),
            preferred_supplier: None,
            algorithm_context: AlgorithmContext::default(),
            run_scenarios: false,
        }
    }

    /// 输入校验（快速失败）
    pub fn validate(&self) -> PlannerResult<()> {
        if self.requisition_id.trim().is_empty() {
            return Err(PlannerError::MissingField("requisition_id"));
        }
        if self.item_id.trim().is_empty() {
            return Err(PlannerError::MissingField("item_id"));
        }
        if !(self.quantity > 0.0) || !self.quantity.is_finite() {
            return Err(PlannerError::InvalidInput(format!(
                "需求数量必须 > 0: requisition_id={}, quantity={}",
                self.requisition_id, self.quantity
            )));
        }
        if self.required_date < self.as_of {
            return Err(PlannerError::InvalidInput(format!(
                "需求日期 {} 早于计划基准日 {}",
                self.required_date, self.as_of
            )));
        }
        if let Some(weights) = &self.weights {
            weights.validate()?;
        }
        if let Some(budget) = self.budget {
            if budget.is_sign_negative() {
                return Err(PlannerError::InvalidConstraint(format!("预算不能为负: {}", budget)));
            }
        }
        if let Some(pref) = &self.preferred_supplier {
            if !(pref.penalty_multiplier >= 1.0) {
                return Err(PlannerError::InvalidConstraint(format!(
                    "偏好惩罚倍数必须 ≥ 1: {}",
                    pref.penalty_multiplier
                )));
            }
        }
        Ok(())
    }
}

// ==========================================
// PlanningOutcome - 计划结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct PlanningOutcome {
    pub run_id: Uuid,
    pub requisition_id: String,
    pub item_id: String,
    pub criticality: Criticality,
    pub demand_base_qty: f64, // 基本单位需求量

    // ===== 各阶段输出 =====
    pub path: SourcingPath, // 含选定组合
    pub filter_report: FilterReport,
    pub scores: Vec<CteScore>, // 通过评分（及截断）的选项
    pub cut_report: Option<CutReport>,
    pub decision: Option<DecisionTrace>, // 关闭决策时为 None
    pub algorithm_outputs: Vec<AlgorithmOutput>,
    pub solver_result: SolverResult,
    pub report: PlanningReport,

    pub elapsed_ms: u64,
}

impl PlanningOutcome {
    pub fn demand_met(&self) -> bool {
        self.solver_result.success
    }
}

/// 组合求解的单位目标系数: 单位成本 × (2 − CTE)
///
/// CTE 越高系数越小；CTE=1 时等于单位成本，CTE=0 时为两倍
pub fn objective_coefficient(unit_cost: f64, cte_value: f64) -> f64 {
    unit_cost * (2.0 - cte_value.clamp(0.0, 1.0))
}

/// 按算法输出修正同路径候选
///
/// # 规则
/// - 失败输出: 不修正
/// - 判定不走该路径 (_NONE): 移除该路径全部候选
/// - 建议数量 > 0: 候选可供量上限取 min(原值, 建议数量)
///
/// # 返回
/// 受影响的候选数
pub fn apply_algorithm_output(
    candidates: &mut Vec<PortfolioCandidate>,
    path_type: SourcingPathType,
    output: &AlgorithmOutput,
) -> usize {
    if !output.success {
        return 0;
    }
    if output.is_decline() {
        let before = candidates.len();
        candidates.retain(|c| c.path_type != path_type);
        return before - candidates.len();
    }
    if output.proposed_quantity <= 0.0 {
        return 0;
    }
    let mut affected = 0;
    for candidate in candidates.iter_mut().filter(|c| c.path_type == path_type) {
        if candidate.max_qty > output.proposed_quantity {
            candidate.max_qty = output.proposed_quantity;
            affected += 1;
        }
    }
    affected
}

// ==========================================
// SourcingPlanner - 计划编排器
// ==========================================
#[derive(Debug, Clone)]
pub struct SourcingPlanner {
    context: Arc<PlanningContext>,
}

impl SourcingPlanner {
    pub fn new(context: Arc<PlanningContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &PlanningContext {
        &self.context
    }

    /// 执行单物料计划
    ///
    /// # 参数
    /// - request: 计划请求
    /// - item: 物料主数据
    /// - snapshot: 库存快照（无库存时为 None）
    /// - options: 候选寻源选项（按偏好顺序）
    ///
    /// # 返回
    /// - Err: 请求/主数据校验失败、单位无法换算
    /// - Ok: 计划结果（含不可行结论）
    #[instrument(skip_all, fields(requisition_id = %request.requisition_id, item_id = %request.item_id))]
    pub fn plan(
        &self,
        request: &PlanningRequest,
        item: &ItemMaster,
        snapshot: Option<&InventorySnapshot>,
        options: Vec<SourcingOption>,
    ) -> PlannerResult<PlanningOutcome> {
        let perf = PerfGuard::new("plan_item");
        let config = self.context.config();

        // ==========================================
        // 步骤0: 校验与单位换算
        // ==========================================
        request.validate()?;
        item.validate()?;
        if item.item_id != request.item_id {
            return Err(PlannerError::InvalidInput(format!(
                "物料主数据与请求不一致: request={}, item={}",
                request.item_id, item.item_id
            )));
        }
        let uom = request.unit_of_measure.as_deref().unwrap_or(&item.base_unit);
        let demand = item.quantity_in_base_unit(request.quantity, uom)?;
        let criticality = request.criticality.unwrap_or(item.criticality);

        let mut path = SourcingPath::new(&request.requisition_id, &item.item_id, demand, request.required_date)?;
        for option in options {
            if option.item_id != item.item_id {
                warn!(option_id = %option.option_id, option_item = %option.item_id, "候选物料号不一致，已忽略");
                continue;
            }
            path.add_option(option, None);
        }
        info!(
            demand,
            uom,
            criticality = %criticality,
            options = path.options.len(),
            "开始计划"
        );

        // ==========================================
        // 步骤1: 技术/法规过滤
        // ==========================================
        let lots: HashMap<String, InventoryLot> = snapshot
            .map(|s| s.lots.iter().map(|l| (l.lot_number.clone(), l.clone())).collect())
            .unwrap_or_default();
        let filter_results = self.context.filter().filter_path(&mut path, item, request.as_of, &lots);
        let filter_report = self.context.filter().generate_report(&path);
        debug!(
            rejected = filter_results.iter().filter(|r| !r.feasible).count(),
            "步骤1: 过滤完成"
        );

        // ==========================================
        // 步骤2: CTE 评分 + 关键度截断
        // ==========================================
        let scoring_context = self.scoring_context(request, item, criticality, demand);
        let (scores, cut_report) = self.score(&path, item, &scoring_context, request.weights)?;
        debug!(scored = scores.len(), "步骤2: 评分完成");

        // ==========================================
        // 步骤2b: 路径决策（只读，不改变候选）
        // ==========================================
        let decision = if config.decision.enabled {
            let input =
                DecisionInput::from_planning(&path, &scores, &scoring_context, request.budget, item.standard_cost);
            let trace = self.context.decision_engine()?.execute(&input);
            debug!(
                selected = ?trace.selected_route,
                recommended = ?trace.recommended_route,
                "步骤2b: 路径决策完成"
            );
            Some(trace)
        } else {
            None
        };

        let mut candidates: Vec<PortfolioCandidate> = scores
            .iter()
            .filter_map(|score| {
                path.find_option(&score.option_id).map(|option| {
                    let coefficient =
                        objective_coefficient(money_to_f64(option.total_cost_per_unit()), score.cte_value);
                    let mut candidate = PortfolioCandidate::from_option(option, coefficient, Some(score.cte_value));
                    candidate.on_time_probability = Some(score.time_score.raw_value);
                    candidate
                })
            })
            .collect();

        // ==========================================
        // 步骤3: 路径算法修正
        // ==========================================
        let algorithm_outputs = if config.planner.run_algorithms && !candidates.is_empty() {
            self.refine_with_algorithms(request, item, snapshot, criticality, demand, &mut candidates)
        } else {
            Vec::new()
        };

        // ==========================================
        // 步骤4: 约束构建
        // ==========================================
        let constraints = self.build_constraints(request, item, snapshot, criticality, demand, &path, &candidates)?;

        // ==========================================
        // 步骤5: 组合求解
        // ==========================================
        let strategy = request.strategy.unwrap_or(config.solver.strategy);
        let solver_result = self
            .context
            .solver()
            .solve_with(strategy, &item.item_id, demand, &candidates, &constraints)?;
        path.apply_selection(solver_result.solution.to_allocations(), solver_result.success);

        // ==========================================
        // 步骤6: 分析报告
        // ==========================================
        let analyzer = self.context.analyzer();
        let mut report = analyzer.generate_report(&solver_result, &constraints);
        if request.run_scenarios {
            report.scenarios = analyzer.scenario_analysis(
                self.context.solver(),
                &solver_result,
                &candidates,
                &constraints,
                &Scenario::standard_set(),
            )?;
        }

        let outcome = PlanningOutcome {
            run_id: Uuid::new_v4(),
            requisition_id: request.requisition_id.clone(),
            item_id: item.item_id.clone(),
            criticality,
            demand_base_qty: demand,
            path,
            filter_report,
            scores,
            cut_report,
            decision,
            algorithm_outputs,
            solver_result,
            report,
            elapsed_ms: perf.elapsed_ms(),
        };

        info!(
            run_id = %outcome.run_id,
            demand_met = outcome.demand_met(),
            strategy = %outcome.solver_result.strategy_used,
            selected = outcome.path.allocations.len(),
            primary_route = ?outcome.decision.as_ref().and_then(|d| d.selected_route),
            total_cost = money_to_f64(outcome.solver_result.total_cost()),
            elapsed_ms = outcome.elapsed_ms,
            "计划完成"
        );
        Ok(outcome)
    }

    /// 从数据源读取后执行计划
    pub async fn plan_from_source<S>(&self, source: &S, request: &PlanningRequest) -> PlannerResult<PlanningOutcome>
    where
        S: PlanningDataSource + ?Sized,
    {
        let item = source.item_master(&request.item_id).await?;
        let snapshot = source.inventory_snapshot(&request.item_id).await?;
        let options = source.candidate_options(&request.item_id).await?;
        self.plan(request, &item, snapshot.as_ref(), options)
    }

    /// 逐个请求计划（单个失败不影响其他请求）
    pub async fn plan_all_from_source<S>(
        &self,
        source: &S,
        requests: &[PlanningRequest],
    ) -> Vec<PlannerResult<PlanningOutcome>>
    where
        S: PlanningDataSource + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let outcome = self.plan_from_source(source, request).await;
            if let Err(e) = &outcome {
                warn!(requisition_id = %request.requisition_id, error = %e, "计划失败");
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    // ==========================================
    // 内部步骤
    // ==========================================

    fn scoring_context(
        &self,
        request: &PlanningRequest,
        item: &ItemMaster,
        criticality: Criticality,
        demand: f64,
    ) -> ScoringContext {
        let config = self.context.config();
        let mut context = ScoringContext::new(request.required_date, request.as_of, criticality);
        context.abc_class = request.abc_class.unwrap_or(item.abc_class);
        context.demand_quantity = demand;
        context.target_service_level = config.planner.target_service_level;
        context.cost_penalty_multiplier = config.scoring.cost_penalty_multiplier;
        context
    }

    /// 对可行选项评分；开启关键度截断时只返回通过截断的选项
    fn score(
        &self,
        path: &SourcingPath,
        item: &ItemMaster,
        context: &ScoringContext,
        weights: Option<ScoreWeights>,
    ) -> PlannerResult<(Vec<CteScore>, Option<CutReport>)> {
        let feasible = self.context.filter().feasible_options(path);
        if !self.context.config().planner.apply_criticality_cut {
            let mut scorer = self.context.cte_scorer();
            return Ok((scorer.score_options(&feasible, context, weights)?, None));
        }

        let mut scorer = self.context.criticality_scorer();
        let reference_cost = money_to_f64(item.standard_cost);
        if reference_cost > 0.0 {
            scorer.set_reference_cost(&item.item_id, reference_cost);
        }

        let accepted = match weights {
            None => scorer.score_and_cut(&feasible, context)?,
            Some(weights) => scorer.score_and_cut_with(&feasible, context, weights)?,
        };
        let report = scorer.cut_report(context.criticality);
        Ok((accepted, Some(report)))
    }

    fn algorithm_input(
        &self,
        request: &PlanningRequest,
        item: &ItemMaster,
        snapshot: Option<&InventorySnapshot>,
        criticality: Criticality,
        demand: f64,
    ) -> AlgorithmInput {
        let mut input = AlgorithmInput::new(&item.item_id, demand, request.required_date, request.as_of);
        if let Some(snapshot) = snapshot {
            input.local_stock = snapshot.available_by_warehouse();
        }
        input.bom_components = item
            .bom
            .iter()
            .map(|c| (c.component_id.clone(), c.gross_quantity()))
            .collect();
        input.criticality = criticality;
        input.budget = request.budget;
        input.reference_unit_cost = item.standard_cost;
        input.context = request.algorithm_context.clone();
        input
    }

    /// 每类路径执行一次对应算法；回退算法的输出只记录不修正
    fn refine_with_algorithms(
        &self,
        request: &PlanningRequest,
        item: &ItemMaster,
        snapshot: Option<&InventorySnapshot>,
        criticality: Criticality,
        demand: f64,
        candidates: &mut Vec<PortfolioCandidate>,
    ) -> Vec<AlgorithmOutput> {
        let input = self.algorithm_input(request, item, snapshot, criticality, demand);
        let executor = self.context.executor();

        let mut path_types: Vec<SourcingPathType> = Vec::new();
        for candidate in candidates.iter() {
            if !path_types.contains(&candidate.path_type) {
                path_types.push(candidate.path_type);
            }
        }

        let mut outputs = Vec::new();
        for path_type in path_types {
            let Some(algorithm) = AlgorithmType::for_path(path_type) else {
                continue;
            };
            let Some(output) = executor.execute(algorithm, &input, None) else {
                continue;
            };
            if output.algorithm_type == algorithm {
                let affected = apply_algorithm_output(candidates, path_type, &output);
                debug!(
                    path = path_type.as_str(),
                    algorithm = %algorithm,
                    success = output.success,
                    proposed = output.proposed_quantity,
                    affected,
                    "算法修正候选"
                );
            } else {
                debug!(path = path_type.as_str(), used = %output.algorithm_type, "回退算法输出不修正候选");
            }
            outputs.push(output);
        }

        info!(
            executed = outputs.len(),
            succeeded = outputs.iter().filter(|o| o.success).count(),
            candidates = candidates.len(),
            "步骤3: 路径算法完成"
        );
        outputs
    }

    /// 构建约束集
    ///
    /// # 规则
    /// - 需求: 基本单位需求量
    /// - FEFO: 库存快照的可分配批次；快照仓库无显式容量时按可用量补容量约束
    /// - 预算: 请求预算 + 配置预留比例
    /// - one-in: 配置开启且关键度规则允许单一来源，且候选涉及 ≥ 2 个供应商
    /// - 交期: 每个候选按目标服务水平检查
    #[allow(clippy::too_many_arguments)]
    fn build_constraints(
        &self,
        request: &PlanningRequest,
        item: &ItemMaster,
        snapshot: Option<&InventorySnapshot>,
        criticality: Criticality,
        demand: f64,
        path: &SourcingPath,
        candidates: &[PortfolioCandidate],
    ) -> PlannerResult<ConstraintSet> {
        let config = self.context.config();
        let mut builder = ConstraintBuilder::new().add_demand(&item.item_id, demand, &item.base_unit)?;

        for capacity in &request.capacities {
            builder = builder.add_capacity(
                &capacity.resource_id,
                capacity.capacity_value,
                None,
                capacity.allocated_value + capacity.reserved_value,
            );
        }

        if let Some(snapshot) = snapshot {
            let batches: Vec<FefoBatch> = snapshot
                .allocation_sequence_fefo()
                .into_iter()
                .map(FefoBatch::from_lot)
                .collect();
            if !batches.is_empty() {
                builder = builder.add_fefo(&item.item_id, batches);
                let has_capacity = request
                    .capacities
                    .iter()
                    .any(|c| c.resource_id == snapshot.warehouse_code);
                if !has_capacity {
                    builder = builder.add_capacity(&snapshot.warehouse_code, snapshot.quantity_available(), None, 0.0);
                }
            }
        }

        if let Some(budget) = request.budget {
            builder = builder.add_budget(budget, &request.currency, config.planner.budget_contingency_pct)?;
        }

        let rule = config.criticality_rules.for_criticality(criticality);
        if config.planner.enforce_single_source && rule.allow_single_source {
            let mut suppliers: Vec<String> = Vec::new();
            for supplier in candidates.iter().filter_map(|c| c.supplier_id.as_ref()) {
                if !suppliers.contains(supplier) {
                    suppliers.push(supplier.clone());
                }
            }
            if suppliers.len() >= 2 {
                builder = builder.add_one_in(&item.item_id, suppliers)?;
            }
        }

        if let Some(pref) = &request.preferred_supplier {
            builder = builder.add_sourcing_preference(&item.item_id, &pref.supplier_id, pref.penalty_multiplier);
        }

        builder = builder.add_service_level(&item.item_id, config.planner.target_service_level, None);
        for candidate in candidates {
            if let Some(option) = path.find_option(&candidate.option_id) {
                builder = builder.add_lead_time(
                    &option.option_id,
                    request.required_date,
                    request.as_of,
                    option.lead_time_days_mean,
                    option.lead_time_days_std,
                    config.planner.target_service_level,
                );
            }
        }

        let constraints = builder.build();
        debug!(total = constraints.total(), summary = ?constraints.summary(), "步骤4: 约束构建完成");
        Ok(constraints)
    }
}
