// ==========================================
// 供应链计划引擎 - 关键度感知评分
// ==========================================
// 职责: 按物料关键度选择权重并施加硬截断
// 截断顺序: TIME (准时概率 < 最低服务水平)
//        → RISK (可靠度 < 1 − 最大风险)
//        → COST (单位成本 > 参考成本 × 倍数，仅当登记了参考成本)
// ==========================================

use crate::config::{CriticalityRule, CriticalityRules, ScoringConfig};
use crate::domain::money::money_to_f64;
use crate::domain::sourcing::SourcingOption;
use crate::domain::types::Criticality;
use crate::error::PlannerResult;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, instrument};

use super::core::CteScorer;
use super::model::{CteScore, ScoreWeights, ScoringContext};

// ==========================================
// CutDimension - 截断维度
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CutDimension {
    Time,
    Risk,
    Cost,
}

impl fmt::Display for CutDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CutDimension::Time => "TIME",
            CutDimension::Risk => "RISK",
            CutDimension::Cost => "COST",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringCutResult {
    pub option_id: String,
    pub accepted: bool,
    pub reason: String,
    pub rejected_by: Option<CutDimension>,
    pub score: CteScore,
}

#[derive(Debug, Clone, Serialize)]
pub struct CutReport {
    pub criticality: Criticality,
    pub accepted: usize,
    pub rejected: usize,
    pub rejected_by: HashMap<CutDimension, usize>,
    pub accepted_by_cte: Vec<(String, f64)>, // CTE 降序
}

// ==========================================
// CriticalityAwareScorer
// ==========================================
#[derive(Debug, Clone)]
pub struct CriticalityAwareScorer {
    base: CteScorer,
    rules: CriticalityRules,
    cut_results: Vec<ScoringCutResult>,
    reference_costs: HashMap<String, f64>, // item_id → 参考单位成本
}

impl Default for CriticalityAwareScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default(), CriticalityRules::default())
    }
}

impl CriticalityAwareScorer {
    pub fn new(config: ScoringConfig, rules: CriticalityRules) -> Self {
        Self {
            base: CteScorer::new(config),
            rules,
            cut_results: Vec::new(),
            reference_costs: HashMap::new(),
        }
    }

    pub fn base(&self) -> &CteScorer {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut CteScorer {
        &mut self.base
    }

    pub fn set_reference_cost(&mut self, item_id: &str, cost: f64) {
        self.reference_costs.insert(item_id.to_string(), cost);
    }

    pub fn rules_for(&self, criticality: Criticality) -> &CriticalityRule {
        self.rules.for_criticality(criticality)
    }

    /// 施加关键度截断（结果同时记入 cut_results）
    pub fn apply_criticality_cut(&mut self, score: &CteScore, context: &ScoringContext) -> ScoringCutResult {
        let rule = self.rules.for_criticality(context.criticality);
        let verdict = evaluate_cut(score, rule, self.reference_costs.get(&score.item_id).copied());

        let result = match verdict {
            Some((dimension, reason)) => {
                debug!(option_id = %score.option_id, rejected_by = %dimension, %reason, "关键度截断");
                ScoringCutResult {
                    option_id: score.option_id.clone(),
                    accepted: false,
                    reason,
                    rejected_by: Some(dimension),
                    score: score.clone(),
                }
            }
            None => ScoringCutResult {
                option_id: score.option_id.clone(),
                accepted: true,
                reason: format!("接受 (CTE={:.3})", score.cte_value),
                rejected_by: None,
                score: score.clone(),
            },
        };
        self.cut_results.push(result.clone());
        result
    }

    /// 评分 + 截断
    ///
    /// # 返回
    /// 通过截断的 CTE 列表（输入顺序）
    #[instrument(skip(self, options, context), fields(criticality = %context.criticality, options = options.len()))]
    pub fn score_and_cut(&mut self, options: &[&SourcingOption], context: &ScoringContext) -> PlannerResult<Vec<CteScore>> {
        let weights = ScoreWeights::from_rule(self.rules.for_criticality(context.criticality));
        self.score_and_cut_with(options, context, weights)
    }

    /// 以指定权重评分 + 截断（请求级权重覆盖）
    pub fn score_and_cut_with(
        &mut self,
        options: &[&SourcingOption],
        context: &ScoringContext,
        weights: ScoreWeights,
    ) -> PlannerResult<Vec<CteScore>> {
        weights.validate()?;
        self.base
            .observe_costs(options.iter().map(|o| money_to_f64(o.total_cost_per_unit())));

        let mut accepted = Vec::new();
        for option in options {
            let score = self.base.score_option(option, context, Some(weights))?;
            if self.apply_criticality_cut(&score, context).accepted {
                accepted.push(score);
            }
        }

        info!(accepted = accepted.len(), rejected = options.len() - accepted.len(), "关键度评分完成");
        Ok(accepted)
    }

    pub fn cut_results(&self) -> &[ScoringCutResult] {
        &self.cut_results
    }

    pub fn feasible_set(&self) -> Vec<&CteScore> {
        self.cut_results
            .iter()
            .filter(|c| c.accepted)
            .map(|c| &c.score)
            .collect()
    }

    pub fn rejected_set(&self) -> Vec<&ScoringCutResult> {
        self.cut_results.iter().filter(|c| !c.accepted).collect()
    }

    pub fn cut_report(&self, criticality: Criticality) -> CutReport {
        let mut rejected_by = HashMap::new();
        for cut in self.rejected_set() {
            if let Some(dim) = cut.rejected_by {
                *rejected_by.entry(dim).or_insert(0) += 1;
            }
        }
        let mut accepted_by_cte: Vec<(String, f64)> = self
            .feasible_set()
            .iter()
            .map(|s| (s.option_id.clone(), s.cte_value))
            .collect();
        accepted_by_cte.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        CutReport {
            criticality,
            accepted: accepted_by_cte.len(),
            rejected: self.cut_results.len() - accepted_by_cte.len(),
            rejected_by,
            accepted_by_cte,
        }
    }
}

/// 返回 Some((维度, 原因)) 表示被截断
fn evaluate_cut(score: &CteScore, rule: &CriticalityRule, reference_cost: Option<f64>) -> Option<(CutDimension, String)> {
    let on_time = score.time_score.raw_value;
    if on_time < rule.min_acceptable_service_level {
        return Some((
            CutDimension::Time,
            format!(
                "准时概率不足: {:.1}% < {:.1}%",
                on_time * 100.0,
                rule.min_acceptable_service_level * 100.0
            ),
        ));
    }

    let reliability = score.risk_score.raw_value;
    if reliability < 1.0 - rule.max_acceptable_risk {
        return Some((
            CutDimension::Risk,
            format!(
                "风险过高: {:.1}% > {:.1}%",
                (1.0 - reliability) * 100.0,
                rule.max_acceptable_risk * 100.0
            ),
        ));
    }

    if let Some(reference) = reference_cost {
        let max_allowed = reference * rule.cost_threshold_multiplier;
        let actual = score.cost_score.raw_value;
        if actual > max_allowed {
            return Some((CutDimension::Cost, format!("成本过高: {:.2} > {:.2}", actual, max_allowed)));
        }
    }
    None
}
