// ==========================================
// 供应链计划引擎 - 路径决策输入
// ==========================================
// 职责: 把过滤 + 评分结果按路径类型汇总为门判定所需的事实
// 约定: 只统计通过评分（及截断）的选项为"已接受"
// ==========================================

use crate::domain::money::{money_to_f64, Money};
use crate::domain::sourcing::SourcingPath;
use crate::domain::types::{Criticality, SourcingPathType};
use crate::engine::scoring::{CteScore, ScoringContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// RouteFacts - 单条路径的汇总事实
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteFacts {
    pub route: SourcingPathType,
    pub total_options: usize,
    pub filter_feasible: usize,
    pub accepted_options: usize,
    pub accepted_quantity: f64,

    // ===== 已接受选项中的最优值 =====
    #[serde(default)]
    pub best_unit_cost: Option<f64>,
    #[serde(default)]
    pub min_lead_time_days: Option<f64>,
    #[serde(default)]
    pub best_on_time_probability: Option<f64>,
    #[serde(default)]
    pub best_reliability: Option<f64>,
    #[serde(default)]
    pub best_cte: Option<f64>,
}

impl RouteFacts {
    pub fn empty(route: SourcingPathType) -> Self {
        Self {
            route,
            total_options: 0,
            filter_feasible: 0,
            accepted_options: 0,
            accepted_quantity: 0.0,
            best_unit_cost: None,
            min_lead_time_days: None,
            best_on_time_probability: None,
            best_reliability: None,
            best_cte: None,
        }
    }

    pub fn has_accepted(&self) -> bool {
        self.accepted_options > 0 && self.accepted_quantity > 0.0
    }

    /// 已接受数量 / 需求（需求 ≤ 0 时视为 0）
    pub fn coverage(&self, demand: f64) -> f64 {
        if demand <= 0.0 {
            return 0.0;
        }
        self.accepted_quantity / demand
    }

    /// 缓存键用的事实摘要
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{:.4}|{}|{}|{}|{}",
            self.total_options,
            self.filter_feasible,
            self.accepted_options,
            self.accepted_quantity,
            fmt_opt(self.best_unit_cost),
            fmt_opt(self.min_lead_time_days),
            fmt_opt(self.best_on_time_probability),
            fmt_opt(self.best_reliability),
        )
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string())
}

fn keep_min(slot: &mut Option<f64>, value: f64) {
    *slot = Some(slot.map_or(value, |current| current.min(value)));
}

fn keep_max(slot: &mut Option<f64>, value: f64) {
    *slot = Some(slot.map_or(value, |current| current.max(value)));
}

// ==========================================
// DecisionInput - 一次决策的全部输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionInput {
    pub item_id: String,
    pub demand: f64,
    pub days_to_deadline: f64,
    pub criticality: Criticality,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub reference_unit_cost: Option<f64>,
    pub routes: Vec<RouteFacts>,
}

impl DecisionInput {
    pub fn new(item_id: &str, demand: f64, days_to_deadline: f64, criticality: Criticality) -> Self {
        Self {
            item_id: item_id.to_string(),
            demand,
            days_to_deadline,
            criticality,
            budget: None,
            reference_unit_cost: None,
            routes: Vec::new(),
        }
    }

    /// 由已过滤路径与评分结果构建
    ///
    /// # 参数
    /// - path: 已经过滤器回写 feasible 的寻源路径
    /// - scores: 通过评分（及关键度截断）的选项
    /// - context: 评分上下文（需求量/剩余天数/关键度）
    /// - budget / reference_unit_cost: 可选预算与标准成本（0 视为无）
    pub fn from_planning(
        path: &SourcingPath,
        scores: &[CteScore],
        context: &ScoringContext,
        budget: Option<Money>,
        reference_unit_cost: Money,
    ) -> Self {
        let mut input = Self::new(
            &path.item_id,
            context.demand_quantity,
            context.days_to_deadline(),
            context.criticality,
        );
        input.budget = budget.map(money_to_f64);
        let reference = money_to_f64(reference_unit_cost);
        input.reference_unit_cost = (reference > 0.0).then_some(reference);
        input.routes = collect_route_facts(path, scores);
        input
    }

    pub fn with_route(mut self, facts: RouteFacts) -> Self {
        self.routes.retain(|r| r.route != facts.route);
        self.routes.push(facts);
        self
    }

    pub fn route(&self, route: SourcingPathType) -> Option<&RouteFacts> {
        self.routes.iter().find(|r| r.route == route)
    }

    /// 取路径事实；未出现的路径返回空事实
    pub fn route_or_empty(&self, route: SourcingPathType) -> RouteFacts {
        self.route(route).cloned().unwrap_or_else(|| RouteFacts::empty(route))
    }
}

/// 按 13 类路径汇总（无候选的路径也给出空事实）
pub fn collect_route_facts(path: &SourcingPath, scores: &[CteScore]) -> Vec<RouteFacts> {
    let by_option: HashMap<&str, &CteScore> = scores.iter().map(|s| (s.option_id.as_str(), s)).collect();

    SourcingPathType::ALL
        .iter()
        .map(|&route| {
            let mut facts = RouteFacts::empty(route);
            for option in path.options.iter().filter(|o| o.sourcing_path == route) {
                facts.total_options += 1;
                if !option.feasible {
                    continue;
                }
                facts.filter_feasible += 1;

                let Some(score) = by_option.get(option.option_id.as_str()) else {
                    continue;
                };
                facts.accepted_options += 1;
                facts.accepted_quantity += option.max_quantity().max(0.0);
                keep_min(&mut facts.best_unit_cost, money_to_f64(option.total_cost_per_unit()));
                keep_min(&mut facts.min_lead_time_days, option.lead_time_days_mean);
                keep_max(&mut facts.best_on_time_probability, score.time_score.raw_value);
                keep_max(&mut facts.best_reliability, score.risk_score.value);
                keep_max(&mut facts.best_cte, score.cte_value);
            }
            facts
        })
        .collect()
}
