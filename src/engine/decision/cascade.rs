// ==========================================
// 供应链计划引擎 - 路径决策级联
// ==========================================
// 职责: 按偏好顺序逐条路径判定门组，首条开放路径为主路径；
//       开放路径再经可行性评估排序并给出推荐
// 红线: 决策结论只作参考，不修改候选与求解结果
// ==========================================

use super::evaluator::{ComparisonWeights, RouteEvaluator, RouteFeasibility};
use super::facts::DecisionInput;
use super::gates::{GateCheck, GateConfig, GateEvaluation, GateKind, GateManager, GateRule, GateSeverity, Gate};
use crate::config::DecisionConfig;
use crate::domain::types::{Criticality, SourcingPathType};
use crate::error::{PlannerError, PlannerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

// ==========================================
// RouteNode / RouteCascade
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNode {
    pub node_id: String,
    pub route: SourcingPathType,
    pub gates: Vec<String>,
    #[serde(default)]
    pub fallback_gates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCascade {
    nodes: Vec<RouteNode>,
}

impl RouteCascade {
    pub fn builder() -> RouteCascadeBuilder {
        RouteCascadeBuilder::default()
    }

    pub fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }

    pub fn node_for(&self, route: SourcingPathType) -> Option<&RouteNode> {
        self.nodes.iter().find(|n| n.route == route)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node_mut(&mut self, route: SourcingPathType) -> Option<&mut RouteNode> {
        self.nodes.iter_mut().find(|n| n.route == route)
    }
}

#[derive(Debug, Default)]
pub struct RouteCascadeBuilder {
    nodes: Vec<RouteNode>,
}

impl RouteCascadeBuilder {
    /// 追加一条路径节点（顺序即偏好）
    pub fn route(mut self, route: SourcingPathType, gates: &[&str]) -> Self {
        self.nodes.push(RouteNode {
            node_id: format!("node.{}", route.as_str().to_lowercase()),
            route,
            gates: gates.iter().map(|g| g.to_string()).collect(),
            fallback_gates: Vec::new(),
        });
        self
    }

    /// 为最近追加的节点设置回退门组
    pub fn fallback(mut self, gates: &[&str]) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.fallback_gates = gates.iter().map(|g| g.to_string()).collect();
        }
        self
    }

    /// # 返回
    /// - Err(Config): 无节点或同一路径出现两次
    pub fn build(self) -> PlannerResult<RouteCascade> {
        if self.nodes.is_empty() {
            return Err(PlannerError::Config("决策级联至少需要一个路径节点".to_string()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if self.nodes[..i].iter().any(|n| n.route == node.route) {
                return Err(PlannerError::Config(format!("决策级联中路径重复: {}", node.route)));
            }
        }
        Ok(RouteCascade { nodes: self.nodes })
    }
}

// ==========================================
// 决策轨迹
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeVisit {
    pub node_id: String,
    pub route: SourcingPathType,
    pub open: bool,
    pub used_fallback: bool,
    pub warnings: usize,
    pub evaluations: Vec<GateEvaluation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub item_id: String,
    pub criticality: Criticality,
    pub demand: f64,
    pub visits: Vec<NodeVisit>,
    pub selected_route: Option<SourcingPathType>, // 首条开放路径
    pub open_routes: Vec<SourcingPathType>,
    pub ranking: Vec<RouteFeasibility>, // 开放路径的可行性排序
    #[serde(default)]
    pub recommended_route: Option<SourcingPathType>,
    pub reasoning: Vec<String>,
}

impl DecisionTrace {
    pub fn is_decided(&self) -> bool {
        self.selected_route.is_some()
    }

    pub fn gate_evaluations(&self) -> impl Iterator<Item = &GateEvaluation> {
        self.visits.iter().flat_map(|v| v.evaluations.iter())
    }
}

pub fn export_traces_json(traces: &[DecisionTrace], path: &Path) -> PlannerResult<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, traces)?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatistics {
    pub executions: usize,
    pub decided: usize,
    pub undecided: usize,
    pub routes_selected: BTreeMap<SourcingPathType, usize>,
}

impl ExecutionStatistics {
    pub fn decision_rate(&self) -> f64 {
        if self.executions == 0 {
            return 0.0;
        }
        self.decided as f64 / self.executions as f64
    }
}

// ==========================================
// DecisionEngine
// ==========================================
#[derive(Debug)]
pub struct DecisionEngine {
    cascade: RouteCascade,
    gates: GateManager,
    evaluator: RouteEvaluator,
    stop_at_first_open: bool,
    stats: ExecutionStatistics,
}

impl DecisionEngine {
    /// # 返回
    /// - Err(Config): 级联引用了未登记的门
    pub fn new(
        cascade: RouteCascade,
        gates: GateManager,
        evaluator: RouteEvaluator,
        stop_at_first_open: bool,
    ) -> PlannerResult<Self> {
        for node in cascade.nodes() {
            for gate_id in node.gates.iter().chain(node.fallback_gates.iter()) {
                if !gates.is_registered(gate_id) {
                    return Err(PlannerError::Config(format!(
                        "节点 {} 引用了未登记的门: {}",
                        node.node_id, gate_id
                    )));
                }
            }
        }
        Ok(Self {
            cascade,
            gates,
            evaluator,
            stop_at_first_open,
            stats: ExecutionStatistics::default(),
        })
    }

    /// 标准级联: 库存 → 释放 → 拆解 → 替代 → 修复 → 调拨 → 公司间 → VMI → 借用 → 加急 → 采购 → 进口 → 自制
    pub fn standard(config: &DecisionConfig) -> PlannerResult<Self> {
        use SourcingPathType as P;

        let mut gates = GateManager::new(config.cache_size);
        let critical = GateConfig::with_severity(GateSeverity::Critical);
        let normal = GateConfig::with_severity(GateSeverity::Normal);
        let warning = GateConfig::with_severity(GateSeverity::Warning);

        for route in SourcingPathType::ALL {
            let kind = match route {
                P::Intercompany | P::Vmi | P::Loan => GateKind::Relationship,
                _ => GateKind::Availability,
            };
            gates.register_gate(
                Gate::new(available_gate(route), kind, "存在通过过滤与评分的选项", GateCheck::HasAcceptedOptions),
                critical,
            );
        }
        let coverage = GateCheck::MinCoverage(config.min_coverage_ratio);
        let mut add = |id: &str, kind: GateKind, desc: &str, check: GateCheck, cfg: GateConfig| {
            gates.register_gate(Gate::new(id, kind, desc, check), cfg);
        };
        add("stock_local.coverage", GateKind::Availability, "本地库存覆盖需求", coverage.clone(), normal);
        add("transfer.coverage", GateKind::Availability, "调拨量覆盖需求", coverage.clone(), normal);
        add("stock_liberation.coverage", GateKind::Availability, "释放量覆盖需求", coverage, warning);
        add(
            "equivalent.quality",
            GateKind::Quality,
            "替代件可靠度达标",
            GateCheck::MinReliability(config.min_reliability),
            normal,
        );
        add("equivalent.regulatory", GateKind::Regulatory, "替代件通过法规过滤", GateCheck::FilterPassed, normal);
        add(
            "recovery.cost",
            GateKind::Cost,
            "修复成本不超过标准成本倍数",
            GateCheck::CostWithinReference(config.max_cost_multiplier),
            normal,
        );
        add(
            "partner.on_time",
            GateKind::Risk,
            "协作方准时概率达标",
            GateCheck::MinOnTimeProbability(config.min_on_time_probability),
            warning,
        );
        add("expedite.deadline", GateKind::Timing, "加急交期赶得上需求日", GateCheck::LeadTimeWithinDeadline, normal);
        add("expedite.budget", GateKind::Cost, "加急支出在预算内", GateCheck::WithinBudget, normal);
        add(
            "expedite.emergency",
            GateKind::Complex,
            "停线级物料允许超预算加急",
            GateCheck::CriticalityAtLeast(Criticality::Critical),
            normal,
        );
        add("purchase.budget", GateKind::Cost, "采购支出在预算内", GateCheck::WithinBudget, warning);
        add("purchase.deadline", GateKind::Timing, "采购交期赶得上需求日", GateCheck::LeadTimeWithinDeadline, warning);
        add(
            "manufacturing.deadline",
            GateKind::Timing,
            "自制周期赶得上需求日",
            GateCheck::LeadTimeWithinDeadline,
            normal,
        );

        for gate_id in &config.disabled_gates {
            if !gates.set_enabled(gate_id, false) {
                return Err(PlannerError::Config(format!("停用的门不存在: {}", gate_id)));
            }
        }

        let avail = available_gate;
        let cascade = RouteCascade::builder()
            .route(P::StockLocal, &[avail(P::StockLocal), "stock_local.coverage"])
            .route(P::StockLiberation, &[avail(P::StockLiberation), "stock_liberation.coverage"])
            .route(P::Disassembly, &[avail(P::Disassembly)])
            .route(P::Equivalent, &[avail(P::Equivalent), "equivalent.regulatory", "equivalent.quality"])
            .route(P::Recovery, &[avail(P::Recovery), "recovery.cost"])
            .route(P::Transfer, &[avail(P::Transfer), "transfer.coverage"])
            .route(P::Intercompany, &[avail(P::Intercompany), "partner.on_time"])
            .route(P::Vmi, &[avail(P::Vmi), "partner.on_time"])
            .route(P::Loan, &[avail(P::Loan), "partner.on_time"])
            .route(P::Expedite, &[avail(P::Expedite), "expedite.deadline", "expedite.budget"])
            .fallback(&[avail(P::Expedite), "expedite.deadline", "expedite.emergency"])
            .route(P::Purchase, &[avail(P::Purchase), "purchase.budget", "purchase.deadline"])
            .route(P::PurchaseImport, &[avail(P::PurchaseImport), "purchase.budget", "purchase.deadline"])
            .route(P::Manufacturing, &[avail(P::Manufacturing), "manufacturing.deadline"])
            .build()?;

        let comparison = ComparisonWeights {
            composite: config.compare_weight_composite,
            lead_time: config.compare_weight_lead_time,
            cost: config.compare_weight_cost,
        };
        comparison.validate()?;

        Self::new(cascade, gates, RouteEvaluator::new(comparison), config.stop_at_first_open)
    }

    /// 为某条路径追加一个自定义门
    ///
    /// # 返回
    /// 新门的 gate_id；路径不在级联中时 Err(Config)
    pub fn add_custom_gate(
        &mut self,
        route: SourcingPathType,
        rule: Arc<dyn GateRule>,
        severity: GateSeverity,
    ) -> PlannerResult<String> {
        let gate_id = format!("{}.{}", route.as_str().to_lowercase(), rule.name());
        let node = self
            .cascade
            .node_mut(route)
            .ok_or_else(|| PlannerError::Config(format!("决策级联中没有路径: {}", route)))?;
        if !node.gates.contains(&gate_id) {
            node.gates.push(gate_id.clone());
        }
        self.gates.register_gate(
            Gate::new(&gate_id, GateKind::Complex, rule.name(), GateCheck::Custom(rule.name().to_string())),
            GateConfig::with_severity(severity),
        );
        self.gates.register_rule(rule);
        Ok(gate_id)
    }

    // ==========================================
    // 执行
    // ==========================================

    pub fn execute(&mut self, input: &DecisionInput) -> DecisionTrace {
        let mut visits = Vec::new();
        let mut open_routes = Vec::new();
        let mut reasoning = Vec::new();

        for node in self.cascade.nodes.iter() {
            let facts = input.route_or_empty(node.route);
            let outcome = self
                .gates
                .evaluate_with_fallback(&node.gates, &node.fallback_gates, &facts, input);

            if outcome.open {
                if open_routes.is_empty() {
                    reasoning.push(format!(
                        "主路径 {}{}",
                        node.route,
                        if outcome.used_fallback { "（经回退门组放行）" } else { "" }
                    ));
                }
                open_routes.push(node.route);
            } else if let Some(closed) = outcome.evaluations.iter().find(|e| e.blocks()) {
                if facts.total_options > 0 {
                    reasoning.push(format!("{} 关闭: {} - {}", node.route, closed.gate_id, closed.note));
                }
            }

            visits.push(NodeVisit {
                node_id: node.node_id.clone(),
                route: node.route,
                open: outcome.open,
                used_fallback: outcome.used_fallback,
                warnings: outcome.warnings,
                evaluations: outcome.evaluations,
            });

            if self.stop_at_first_open && !open_routes.is_empty() {
                break;
            }
        }

        let selected_route = open_routes.first().copied();
        let ranking = self.evaluator.rank(input, &open_routes);
        let recommended_route = self.evaluator.compare(&ranking).map(|(route, _)| route);
        if selected_route.is_none() {
            reasoning.push("所有路径均被门关闭".to_string());
        }

        self.stats.executions += 1;
        match selected_route {
            Some(route) => {
                self.stats.decided += 1;
                *self.stats.routes_selected.entry(route).or_insert(0) += 1;
            }
            None => self.stats.undecided += 1,
        }

        info!(
            item_id = %input.item_id,
            selected = ?selected_route,
            recommended = ?recommended_route,
            open_routes = open_routes.len(),
            "路径决策完成"
        );
        debug!(reasoning = ?reasoning, "路径决策说明");

        DecisionTrace {
            item_id: input.item_id.clone(),
            criticality: input.criticality,
            demand: input.demand,
            visits,
            selected_route,
            open_routes,
            ranking,
            recommended_route,
            reasoning,
        }
    }

    pub fn execute_batch(&mut self, inputs: &[DecisionInput]) -> Vec<DecisionTrace> {
        inputs.iter().map(|input| self.execute(input)).collect()
    }

    // ==========================================
    // 访问器
    // ==========================================

    pub fn cascade(&self) -> &RouteCascade {
        &self.cascade
    }

    pub fn gates(&self) -> &GateManager {
        &self.gates
    }

    pub fn gates_mut(&mut self) -> &mut GateManager {
        &mut self.gates
    }

    pub fn evaluator(&self) -> &RouteEvaluator {
        &self.evaluator
    }

    pub fn statistics(&self) -> &ExecutionStatistics {
        &self.stats
    }
}

/// 各路径的可用性门 id
pub fn available_gate(route: SourcingPathType) -> &'static str {
    match route {
        SourcingPathType::StockLocal => "stock_local.available",
        SourcingPathType::StockLiberation => "stock_liberation.available",
        SourcingPathType::Disassembly => "disassembly.available",
        SourcingPathType::Equivalent => "equivalent.available",
        SourcingPathType::Recovery => "recovery.available",
        SourcingPathType::Manufacturing => "manufacturing.available",
        SourcingPathType::Transfer => "transfer.available",
        SourcingPathType::Intercompany => "intercompany.available",
        SourcingPathType::Vmi => "vmi.available",
        SourcingPathType::Loan => "loan.available",
        SourcingPathType::Expedite => "expedite.available",
        SourcingPathType::Purchase => "purchase.available",
        SourcingPathType::PurchaseImport => "purchase_import.available",
    }
}
